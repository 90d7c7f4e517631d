//! Change requests and repository kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::AutopatchError;

/// Repository kind, used only to select the build and test oracles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoKind {
    Go,
    Rust,
    Cpp,
    Python,
}

impl RepoKind {
    /// Stable lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            RepoKind::Go => "go",
            RepoKind::Rust => "rust",
            RepoKind::Cpp => "cpp",
            RepoKind::Python => "python",
        }
    }

    /// File extensions included when the whole repository is the context.
    pub fn source_extensions(&self) -> &'static [&'static str] {
        match self {
            RepoKind::Go => &["go"],
            RepoKind::Rust => &["rs"],
            RepoKind::Cpp => &["c", "cc", "cpp", "cxx", "h", "hh", "hpp"],
            RepoKind::Python => &["py"],
        }
    }

    /// Whether the test stage runs by default for this kind.
    ///
    /// Python is build-only: byte-compilation is the build and there is
    /// no test runner every project agrees on.
    pub fn default_test_policy(&self) -> TestPolicy {
        match self {
            RepoKind::Python => TestPolicy::Skip,
            RepoKind::Go | RepoKind::Rust | RepoKind::Cpp => TestPolicy::Run,
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RepoKind {
    type Err = AutopatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "go" | "golang" => Ok(RepoKind::Go),
            "rust" => Ok(RepoKind::Rust),
            "cpp" | "c++" => Ok(RepoKind::Cpp),
            "python" | "py" => Ok(RepoKind::Python),
            _ => Err(AutopatchError::UnknownRepoKind(s.to_string())),
        }
    }
}

/// Whether the test stage runs or is replaced by a no-op tester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPolicy {
    Run,
    Skip,
}

impl FromStr for TestPolicy {
    type Err = AutopatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "run" => Ok(TestPolicy::Run),
            "skip" => Ok(TestPolicy::Skip),
            other => Err(AutopatchError::InvalidConfig(format!(
                "test policy must be `run` or `skip`, got `{other}`"
            ))),
        }
    }
}

/// Files whose contents seed the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "paths", rename_all = "snake_case")]
pub enum SeedFiles {
    /// Paths relative to the checkout root, in the order given.
    Paths(Vec<String>),
    /// Every source file of the repository kind.
    WholeRepository,
}

/// Immutable input to one repair session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Natural-language description of the change.
    pub prompt: String,
    pub seeds: SeedFiles,
    pub repo_kind: RepoKind,
    /// Clone source. `None` means the checkout already exists.
    pub repo_url: Option<String>,
}

impl ChangeRequest {
    pub fn new(prompt: impl Into<String>, seeds: SeedFiles, repo_kind: RepoKind) -> Self {
        Self {
            prompt: prompt.into(),
            seeds,
            repo_kind,
            repo_url: None,
        }
    }

    /// Clone `url` into the checkout at session start.
    pub fn with_repo_url(mut self, url: impl Into<String>) -> Self {
        self.repo_url = Some(url.into());
        self
    }
}
