//! Collaborator seams of the repair loop.
//!
//! The loop only talks to the outside world through these traits: the
//! model, the build and test executors, version control, and pull-request
//! publication. Process-backed implementations live in [`crate::git`],
//! [`crate::publish`] and the `autopatch-ci` crate; in-memory ones in
//! [`crate::fakes`].

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{Result, Stage, StageOutcome};

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Prompt in, complete reply out. One request per attempt, no streaming.
#[async_trait]
pub trait ModelOracle: Send + Sync {
    async fn send(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Build / test
// ---------------------------------------------------------------------------

/// Build oracle, run with the checkout root as working directory.
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(&self, checkout: &Path) -> Result<StageOutcome>;
}

/// Test oracle, run with the checkout root as working directory.
#[async_trait]
pub trait Tester: Send + Sync {
    async fn test(&self, checkout: &Path) -> Result<StageOutcome>;
}

/// Tester for build-only repository kinds: always passes, never runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTester;

#[async_trait]
impl Tester for NoopTester {
    async fn test(&self, _checkout: &Path) -> Result<StageOutcome> {
        Ok(StageOutcome::skipped(Stage::Test))
    }
}

// ---------------------------------------------------------------------------
// Version control / publication
// ---------------------------------------------------------------------------

/// Version-control operations on the session checkout.
#[async_trait]
pub trait Vcs: Send + Sync {
    async fn clone_repo(&self, url: &str, target: &Path) -> Result<()>;
    async fn create_branch(&self, name: &str) -> Result<()>;
    async fn rename_branch(&self, old: &str, new: &str) -> Result<()>;
    async fn commit_all(&self, message: &str) -> Result<()>;
    async fn push(&self, branch: &str) -> Result<()>;
}

/// Opens a pull request for the pushed branch and returns its link.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn create_pull_request(&self, title: &str, body: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_tester_reports_skipped_pass() {
        let outcome = NoopTester.test(Path::new("/nonexistent")).await.unwrap();
        assert_eq!(outcome.stage, Stage::Test);
        assert!(outcome.passed);
        assert!(outcome.skipped);
    }
}
