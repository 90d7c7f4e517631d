//! `git` command-line implementation of [`Vcs`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::error::{AutopatchError, Result};
use crate::oracle::Vcs;

/// Runs `git` in a session checkout.
#[derive(Debug, Clone)]
pub struct GitCli {
    checkout: PathBuf,
}

impl GitCli {
    pub fn new(checkout: impl Into<PathBuf>) -> Self {
        Self {
            checkout: checkout.into(),
        }
    }

    pub fn checkout(&self) -> &Path {
        &self.checkout
    }

    /// Name of the branch currently checked out.
    pub async fn current_branch(&self) -> Result<String> {
        let out = run_git(Some(&self.checkout), &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }
}

/// Run `git <args>` and return stdout; a non-zero exit carries both streams.
async fn run_git(dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    debug!(args = ?args, "running git");

    let output = cmd
        .output()
        .await
        .map_err(|e| AutopatchError::GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(args = ?args, stderr = %stderr.trim(), "git command failed");
        return Err(AutopatchError::GitError(format!(
            "git {} failed ({}):\nstdout: {}\nstderr: {}",
            args.first().copied().unwrap_or_default(),
            output.status,
            stdout.trim(),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl Vcs for GitCli {
    async fn clone_repo(&self, url: &str, target: &Path) -> Result<()> {
        if tokio::fs::try_exists(target).await? {
            info!(target = %target.display(), "removing existing checkout");
            tokio::fs::remove_dir_all(target).await?;
        }
        let target_str = target.to_string_lossy();
        run_git(None, &["clone", url, target_str.as_ref()]).await?;
        info!(url = %url, target = %target.display(), "cloned repository");
        Ok(())
    }

    async fn create_branch(&self, name: &str) -> Result<()> {
        run_git(Some(&self.checkout), &["checkout", "-b", name]).await?;
        info!(branch = %name, "created branch");
        Ok(())
    }

    async fn rename_branch(&self, old: &str, new: &str) -> Result<()> {
        run_git(Some(&self.checkout), &["branch", "-m", old, new]).await?;
        info!(from = %old, to = %new, "renamed branch");
        Ok(())
    }

    async fn commit_all(&self, message: &str) -> Result<()> {
        run_git(Some(&self.checkout), &["add", "."]).await?;
        run_git(Some(&self.checkout), &["commit", "-m", message]).await?;
        info!("committed changes");
        Ok(())
    }

    async fn push(&self, branch: &str) -> Result<()> {
        run_git(Some(&self.checkout), &["push", "-u", "origin", branch]).await?;
        info!(branch = %branch, "pushed branch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run(dir: &Path, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    fn configure_identity(dir: &Path) {
        run(dir, &["config", "user.name", "test-user"]);
        run(dir, &["config", "user.email", "test@example.com"]);
    }

    /// A bare remote with one commit, plus the scratch dir that holds it.
    fn make_remote() -> (tempfile::TempDir, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        std::fs::create_dir(&src).unwrap();
        run(&src, &["init"]);
        configure_identity(&src);
        std::fs::write(src.join("x.c"), "int x;\n").unwrap();
        run(&src, &["add", "."]);
        run(&src, &["commit", "-m", "initial"]);

        let remote = root.path().join("remote.git");
        run(
            root.path(),
            &["clone", "--bare", "src", remote.to_str().unwrap()],
        );
        (root, remote)
    }

    #[tokio::test]
    async fn clone_replaces_existing_target() {
        let (root, remote) = make_remote();
        let target = root.path().join("checkout");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("stale.txt"), "old").unwrap();

        let git = GitCli::new(&target);
        git.clone_repo(remote.to_str().unwrap(), &target).await.unwrap();

        assert!(!target.join("stale.txt").exists());
        assert_eq!(std::fs::read_to_string(target.join("x.c")).unwrap(), "int x;\n");
    }

    #[tokio::test]
    async fn branch_commit_and_push_round_trip() {
        let (root, remote) = make_remote();
        let target = root.path().join("checkout");
        let git = GitCli::new(&target);
        git.clone_repo(remote.to_str().unwrap(), &target).await.unwrap();
        configure_identity(&target);

        git.create_branch("assistant-branch").await.unwrap();
        git.rename_branch("assistant-branch", "assistant-fix-x-20240309070501")
            .await
            .unwrap();
        assert_eq!(
            git.current_branch().await.unwrap(),
            "assistant-fix-x-20240309070501"
        );

        std::fs::write(target.join("x.c"), "int x = 1;\n").unwrap();
        git.commit_all("Applying changes from user prompt: set x")
            .await
            .unwrap();
        git.push("assistant-fix-x-20240309070501").await.unwrap();

        let log = run(
            &remote,
            &["log", "-1", "--format=%s", "assistant-fix-x-20240309070501"],
        );
        assert_eq!(log.trim(), "Applying changes from user prompt: set x");
    }

    #[tokio::test]
    async fn failing_command_surfaces_git_error() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new(dir.path());
        let err = git.rename_branch("a", "b").await.unwrap_err();
        assert!(matches!(err, AutopatchError::GitError(_)));
        assert!(err.to_string().contains("git branch failed"));
    }
}
