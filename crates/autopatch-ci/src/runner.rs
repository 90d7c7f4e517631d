//! Stage execution in a checkout directory.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info};

use crate::stage::StageConfig;

/// Result of a stage execution.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage_name: String,

    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,

    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub success: bool,
}

impl StageResult {
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// stdout followed by stderr.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => {
                let sep = if self.stdout.ends_with('\n') { "" } else { "\n" };
                format!("{}{}{}", self.stdout, sep, self.stderr)
            }
        }
    }
}

/// Runs stage commands as child processes.
pub struct CiRunner;

impl CiRunner {
    /// Run `config` with `dir` as working directory.
    ///
    /// Errors only when the command cannot be started or times out; a
    /// non-zero exit is a normal, failed `StageResult`.
    pub async fn execute_stage(config: &StageConfig, dir: &Path) -> anyhow::Result<StageResult> {
        let start = Instant::now();

        let Some((exe, args)) = config.command.split_first() else {
            anyhow::bail!("Stage {} has empty command", config.name);
        };
        debug!(stage = %config.name, command = ?config.command, dir = %dir.display(), "starting stage");

        let child = Command::new(exe)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("Stage {} failed to start `{exe}`: {e}", config.name))?;

        let output = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Stage {} timed out after {} seconds",
                    config.name,
                    config.timeout_secs
                )
            })??
        } else {
            child.wait_with_output().await?
        };

        let result = StageResult {
            stage_name: config.name.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: output.status.success(),
        };
        info!(
            stage = %result.stage_name,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "stage finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stdout: &str, stderr: &str, exit_code: i32) -> StageResult {
        StageResult {
            stage_name: "make".to_string(),
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration_ms: 100,
            success: exit_code == 0,
        }
    }

    #[test]
    fn test_stage_result_passed() {
        assert!(result("", "", 0).passed());
        assert!(!result("", "error", 2).passed());
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(result("out\n", "err\n", 1).combined_output(), "out\nerr\n");
        assert_eq!(result("out", "err", 1).combined_output(), "out\nerr");
        assert_eq!(result("", "err", 1).combined_output(), "err");
        assert_eq!(result("out", "", 0).combined_output(), "out");
    }

    #[tokio::test]
    async fn test_execute_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let config = StageConfig::custom("ls", vec!["ls".to_string()], 60);

        let result = CiRunner::execute_stage(&config, dir.path()).await.unwrap();
        assert!(result.passed());
        assert!(result.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let config = StageConfig::custom("false_test", vec!["false".to_string()], 60);

        let result = CiRunner::execute_stage(&config, dir.path()).await.unwrap();
        assert!(!result.passed());
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let config = StageConfig::custom("empty", Vec::new(), 60);
        let err = CiRunner::execute_stage(&config, Path::new("."))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty command"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let config = StageConfig::custom(
            "sleepy",
            vec!["sleep".to_string(), "5".to_string()],
            1,
        );
        let err = CiRunner::execute_stage(&config, Path::new("."))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
