//! Apply parsed file blocks to the checkout.
//!
//! Each block is resolved against the checkout root, spliced when it
//! contains the elision placeholder, and written. A failing block is
//! logged and skipped; the rest of the batch is still written.

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{AutopatchError, FileBlock, SkippedFile};
use crate::splice::{has_placeholder, splice_file, SpliceError};

/// Where block paths may point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPolicy {
    /// Reject absolute paths, `..` components, and paths that pass through
    /// a symlink inside the checkout pointing outside it.
    #[default]
    Contained,
    /// Write wherever the path resolves, as the model wrote it.
    Unrestricted,
}

impl FromStr for PathPolicy {
    type Err = AutopatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contained" => Ok(PathPolicy::Contained),
            "unrestricted" => Ok(PathPolicy::Unrestricted),
            other => Err(AutopatchError::InvalidConfig(format!(
                "path policy must be `contained` or `unrestricted`, got `{other}`"
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("path `{0}` escapes the checkout")]
    PathEscapesCheckout(String),

    #[error(transparent)]
    Splice(#[from] SpliceError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Files written and skipped by one apply pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub written: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

/// Resolve a block path against the checkout under `policy`.
pub fn resolve_path(checkout: &Path, path: &str, policy: PathPolicy) -> Result<PathBuf, ApplyError> {
    let rel = Path::new(path);
    if policy == PathPolicy::Contained {
        let escapes = rel.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || leaves_through_symlink(checkout, rel) {
            return Err(ApplyError::PathEscapesCheckout(path.to_string()));
        }
    }
    Ok(checkout.join(rel))
}

/// Whether an existing symlink along `rel` resolves outside the checkout.
/// Dangling links count as escaping.
fn leaves_through_symlink(checkout: &Path, rel: &Path) -> bool {
    let Ok(root) = checkout.canonicalize() else {
        return false;
    };
    let mut current = checkout.to_path_buf();
    for component in rel.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => match current.canonicalize() {
                Ok(target) if target.starts_with(&root) => continue,
                _ => return true,
            },
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
    false
}

/// Reconcile one block into the content that should land on disk.
pub fn reconcile(target: &Path, block: &FileBlock) -> Result<String, ApplyError> {
    if has_placeholder(&block.content) {
        info!(path = %block.path, "placeholder detected, splicing with original");
        return Ok(splice_file(target, &block.content)?);
    }
    Ok(block.content.clone())
}

async fn apply_one(checkout: &Path, block: &FileBlock, policy: PathPolicy) -> Result<(), ApplyError> {
    let target = resolve_path(checkout, &block.path, policy)?;
    let content = reconcile(&target, block)?;

    let write_err = |source| ApplyError::Write {
        path: block.path.clone(),
        source,
    };
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(&target, content).await.map_err(write_err)?;
    Ok(())
}

/// Write every block; failures are recorded in the report, never raised.
pub async fn apply_blocks(checkout: &Path, blocks: &[FileBlock], policy: PathPolicy) -> ApplyReport {
    let mut report = ApplyReport::default();

    for block in blocks {
        match apply_one(checkout, block, policy).await {
            Ok(()) => {
                info!(path = %block.path, "applied changes");
                report.written.push(block.path.clone());
            }
            Err(e) => {
                warn!(path = %block.path, error = %e, "skipping file");
                report.skipped.push(SkippedFile {
                    path: block.path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}
