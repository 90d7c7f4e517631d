//! Build and test command definitions per repository kind.

use autopatch_core::{RepoKind, Stage};
use serde::{Deserialize, Serialize};

/// Builtin build/test commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KindStage {
    /// go build ./...
    GoBuild,
    /// go test ./...
    GoTest,
    /// cargo build
    CargoBuild,
    /// cargo test
    CargoTest,
    /// make
    Make,
    /// make tests
    MakeTests,
    /// python3 -m compileall -q .
    PyCompile,
    /// python3 -m pytest -q
    PyTest,
}

impl KindStage {
    /// The builtin command for `stage` of a `kind` repository.
    pub fn for_kind(kind: RepoKind, stage: Stage) -> Self {
        match (kind, stage) {
            (RepoKind::Go, Stage::Build) => KindStage::GoBuild,
            (RepoKind::Go, Stage::Test) => KindStage::GoTest,
            (RepoKind::Rust, Stage::Build) => KindStage::CargoBuild,
            (RepoKind::Rust, Stage::Test) => KindStage::CargoTest,
            (RepoKind::Cpp, Stage::Build) => KindStage::Make,
            (RepoKind::Cpp, Stage::Test) => KindStage::MakeTests,
            (RepoKind::Python, Stage::Build) => KindStage::PyCompile,
            (RepoKind::Python, Stage::Test) => KindStage::PyTest,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KindStage::GoBuild => "go_build",
            KindStage::GoTest => "go_test",
            KindStage::CargoBuild => "cargo_build",
            KindStage::CargoTest => "cargo_test",
            KindStage::Make => "make",
            KindStage::MakeTests => "make_tests",
            KindStage::PyCompile => "py_compile",
            KindStage::PyTest => "py_test",
        }
    }

    pub fn command(&self) -> Vec<String> {
        let argv: &[&str] = match self {
            KindStage::GoBuild => &["go", "build", "./..."],
            KindStage::GoTest => &["go", "test", "./..."],
            KindStage::CargoBuild => &["cargo", "build"],
            KindStage::CargoTest => &["cargo", "test"],
            KindStage::Make => &["make"],
            KindStage::MakeTests => &["make", "tests"],
            KindStage::PyCompile => &["python3", "-m", "compileall", "-q", "."],
            KindStage::PyTest => &["python3", "-m", "pytest", "-q"],
        };
        argv.iter().map(|s| s.to_string()).collect()
    }
}

/// One command to run in the checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Timeout in seconds; 0 waits forever.
    pub timeout_secs: u64,
}

impl StageConfig {
    pub fn from_builtin(stage: KindStage, timeout_secs: u64) -> Self {
        Self {
            name: stage.name().to_string(),
            command: stage.command(),
            timeout_secs,
        }
    }

    pub fn custom(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_stage_mapping() {
        assert_eq!(KindStage::for_kind(RepoKind::Go, Stage::Build), KindStage::GoBuild);
        assert_eq!(KindStage::for_kind(RepoKind::Cpp, Stage::Test), KindStage::MakeTests);
        assert_eq!(
            KindStage::for_kind(RepoKind::Python, Stage::Build),
            KindStage::PyCompile
        );
    }

    #[test]
    fn test_builtin_commands() {
        assert_eq!(KindStage::GoTest.command(), vec!["go", "test", "./..."]);
        assert_eq!(KindStage::MakeTests.command(), vec!["make", "tests"]);
        assert_eq!(KindStage::CargoBuild.command()[0], "cargo");
    }

    #[test]
    fn test_stage_config_from_builtin() {
        let config = StageConfig::from_builtin(KindStage::Make, 600);
        assert_eq!(config.name, "make");
        assert_eq!(config.command, vec!["make"]);
        assert_eq!(config.timeout_secs, 600);
    }
}
