//! Dependency context: which files seed the prompt, and their contents.

use std::collections::HashSet;
use std::path::{Component, Path};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::domain::{ChangeRequest, RepoKind, Result, SeedFiles};
use crate::prompt::ContextFile;

/// Paths (relative to `checkout`) whose contents go into the prompt.
pub fn resolve_seeds(checkout: &Path, request: &ChangeRequest) -> Result<Vec<String>> {
    let paths = match &request.seeds {
        SeedFiles::Paths(paths) => {
            let mut seen = HashSet::new();
            paths
                .iter()
                .filter(|p| !p.trim().is_empty())
                .filter(|p| seen.insert(p.as_str()))
                .cloned()
                .collect()
        }
        SeedFiles::WholeRepository => source_files(checkout, request.repo_kind)?,
    };

    for (i, path) in paths.iter().enumerate() {
        debug!(index = i, path = %path, "dependency");
    }
    info!(count = paths.len(), "resolved dependency context");
    Ok(paths)
}

/// Every file under `checkout` with one of `kind`'s source extensions,
/// sorted, skipping dot-directories such as `.git`.
pub fn source_files(checkout: &Path, kind: RepoKind) -> Result<Vec<String>> {
    let extensions = kind.source_extensions();
    let mut files = Vec::new();

    for entry in WalkDir::new(checkout)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry.path().extension().and_then(|e| e.to_str()).unwrap_or("");
        if !extensions.contains(&ext) {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(checkout) {
            files.push(to_slash_path(rel));
        }
    }

    files.sort();
    Ok(files)
}

/// Read every path; unreadable files are kept with their error text.
pub fn load_context(checkout: &Path, paths: &[String]) -> Vec<ContextFile> {
    paths
        .iter()
        .map(|p| match std::fs::read_to_string(checkout.join(p)) {
            Ok(content) => ContextFile::loaded(p.clone(), content),
            Err(e) => ContextFile::unreadable(p.clone(), e.to_string()),
        })
        .collect()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn to_slash_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
