//! Pull-request publication through the GitHub CLI.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::domain::error::{AutopatchError, Result};
use crate::oracle::Publisher;

/// PR title for a change request prompt.
pub fn pr_title(prompt: &str) -> String {
    format!("Automated changes based on: {prompt}")
}

/// PR body listing what the session did.
pub fn pr_body(prompt: &str, summary: &str, attempts: u32) -> String {
    format!(
        "Automated changes based on: {prompt}\n\nSummary: {summary}\nAttempts: {attempts}\n"
    )
}

/// Runs `gh pr create` in the checkout; the PR link is gh's stdout.
#[derive(Debug, Clone)]
pub struct GhCliPublisher {
    checkout: PathBuf,
    program: String,
}

impl GhCliPublisher {
    pub fn new(checkout: impl Into<PathBuf>) -> Self {
        Self {
            checkout: checkout.into(),
            program: "gh".to_string(),
        }
    }

    /// Use a different executable than `gh`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl Publisher for GhCliPublisher {
    async fn create_pull_request(&self, title: &str, body: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["pr", "create", "--title", title, "--body", body])
            .current_dir(&self.checkout)
            .output()
            .await
            .map_err(|e| AutopatchError::Publish(format!("failed to run {}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(stdout = %stdout, stderr = %stderr.trim(), "pull request creation failed");
            return Err(AutopatchError::Publish(format!(
                "{} pr create failed ({}): {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        info!(link = %stdout, "pull request created");
        Ok(stdout)
    }
}
