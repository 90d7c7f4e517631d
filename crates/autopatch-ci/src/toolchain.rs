//! Process-backed `Builder` / `Tester` pairs per repository kind.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use autopatch_core::{
    AutopatchError, Builder, NoopTester, RepoKind, Result, Stage, StageOutcome, TestPolicy,
    Tester,
};
use tracing::info;

use crate::runner::CiRunner;
use crate::stage::{KindStage, StageConfig};

/// Runs one command in the checkout and reports it as a build or test stage.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    stage: Stage,
    config: StageConfig,
}

impl CommandOracle {
    pub fn new(stage: Stage, config: StageConfig) -> Self {
        Self { stage, config }
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    async fn run(&self, checkout: &Path) -> Result<StageOutcome> {
        let result = CiRunner::execute_stage(&self.config, checkout)
            .await
            .map_err(|e| AutopatchError::Oracle(format!("{e:#}")))?;

        let output = result.combined_output();
        let outcome = if result.passed() {
            StageOutcome::passed(self.stage, output)
        } else {
            StageOutcome::failed(self.stage, output)
        };
        Ok(outcome.with_duration(result.duration_ms))
    }
}

#[async_trait]
impl Builder for CommandOracle {
    async fn build(&self, checkout: &Path) -> Result<StageOutcome> {
        self.run(checkout).await
    }
}

#[async_trait]
impl Tester for CommandOracle {
    async fn test(&self, checkout: &Path) -> Result<StageOutcome> {
        self.run(checkout).await
    }
}

/// The build and test oracles used for one repository kind.
#[derive(Clone)]
pub struct Toolchain {
    builder: Arc<dyn Builder>,
    tester: Arc<dyn Tester>,
}

impl Toolchain {
    /// Builtin commands for `kind`; `TestPolicy::Skip` swaps in [`NoopTester`].
    pub fn for_kind(kind: RepoKind, policy: TestPolicy, timeout_secs: u64) -> Self {
        let build = StageConfig::from_builtin(KindStage::for_kind(kind, Stage::Build), timeout_secs);
        let builder: Arc<dyn Builder> = Arc::new(CommandOracle::new(Stage::Build, build));

        let tester: Arc<dyn Tester> = match policy {
            TestPolicy::Run => {
                let test =
                    StageConfig::from_builtin(KindStage::for_kind(kind, Stage::Test), timeout_secs);
                Arc::new(CommandOracle::new(Stage::Test, test))
            }
            TestPolicy::Skip => {
                info!(kind = %kind, "test stage skipped by policy");
                Arc::new(NoopTester)
            }
        };

        Self { builder, tester }
    }

    /// Arbitrary commands, e.g. a project-specific build script.
    pub fn custom(build: StageConfig, test: Option<StageConfig>) -> Self {
        let tester: Arc<dyn Tester> = match test {
            Some(config) => Arc::new(CommandOracle::new(Stage::Test, config)),
            None => Arc::new(NoopTester),
        };
        Self {
            builder: Arc::new(CommandOracle::new(Stage::Build, build)),
            tester,
        }
    }

    pub fn builder(&self) -> Arc<dyn Builder> {
        self.builder.clone()
    }

    pub fn tester(&self) -> Arc<dyn Tester> {
        self.tester.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_command_oracle_maps_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let ok = CommandOracle::new(
            Stage::Build,
            StageConfig::custom("ok", vec!["true".to_string()], 60),
        );
        let outcome = ok.build(dir.path()).await.unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.stage, Stage::Build);

        let bad = CommandOracle::new(
            Stage::Test,
            StageConfig::custom("bad", vec!["false".to_string()], 60),
        );
        let outcome = bad.test(dir.path()).await.unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.stage, Stage::Test);
    }

    #[tokio::test]
    async fn test_unspawnable_command_is_oracle_error() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = CommandOracle::new(
            Stage::Build,
            StageConfig::custom("nope", vec!["autopatch-no-such-binary".to_string()], 60),
        );
        let err = oracle.build(dir.path()).await.unwrap_err();
        assert!(matches!(err, AutopatchError::Oracle(_)));
    }

    #[tokio::test]
    async fn test_skip_policy_uses_noop_tester() {
        let toolchain = Toolchain::for_kind(RepoKind::Python, TestPolicy::Skip, 0);
        let outcome = toolchain.tester().test(Path::new("/nonexistent")).await.unwrap();
        assert!(outcome.skipped);
        assert!(outcome.passed);
    }
}
