//! Repair loop controller.
//!
//! One session drives a change request through
//! `START → PROMPTING → PARSING → APPLYING → BUILDING → TESTING` and ends in
//! `SUCCEEDED` (commit, push, pull request) or `EXHAUSTED` once the attempt
//! budget is spent. Build and test failures feed their output back into the
//! prompt; model, parse and collaborator errors end the session at once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::apply::apply_blocks;
use crate::artifact::{SessionLog, SessionOutcome};
use crate::branch::BranchNamer;
use crate::config::SessionConfig;
use crate::context::{load_context, resolve_seeds};
use crate::domain::{
    AttemptRecord, AutopatchError, ChangeRequest, SessionState, Stage, StageOutcome,
};
use crate::obs;
use crate::oracle::{Builder, ModelOracle, Publisher, Tester, Vcs};
use crate::parse::{parse_response, ParseError};
use crate::prompt::{build_prompt, PromptBuffer};
use crate::publish::{pr_body, pr_title};

/// Source of "now" for branch names.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Why a session ended without publishing.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("version control failed during {stage}: {source}")]
    Vcs {
        stage: &'static str,
        #[source]
        source: AutopatchError,
    },

    #[error("failed to gather dependency context: {0}")]
    Context(#[source] AutopatchError),

    #[error("model request failed: {0}")]
    Model(#[source] AutopatchError),

    #[error("failed to parse model response: {0}")]
    Parse(#[from] ParseError),

    #[error(
        "exceeded maximum attempts ({attempts}), please review manually; last {} failure:\n{last_output}",
        .stage.name()
    )]
    AttemptsExhausted {
        attempts: u32,
        stage: Stage,
        last_output: String,
    },

    #[error("failed to create pull request: {0}")]
    Publish(#[source] AutopatchError),
}

impl SessionError {
    fn outcome(&self) -> SessionOutcome {
        match self {
            SessionError::AttemptsExhausted { .. } => SessionOutcome::Exhausted,
            _ => SessionOutcome::Aborted,
        }
    }
}

/// Result of a published session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub branch: String,
    pub pr_link: String,
    pub attempts: Vec<AttemptRecord>,
}

/// A finished session: its audit log plus the caller-facing result.
#[derive(Debug)]
pub struct SessionRun {
    pub log: SessionLog,
    pub result: Result<SessionReport, SessionError>,
}

/// The external collaborators one session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn ModelOracle>,
    pub builder: Arc<dyn Builder>,
    pub tester: Arc<dyn Tester>,
    pub vcs: Arc<dyn Vcs>,
    pub publisher: Arc<dyn Publisher>,
}

/// Drives change requests against one checkout.
pub struct RepairLoop {
    checkout: PathBuf,
    config: SessionConfig,
    collab: Collaborators,
    clock: Clock,
}

/// Mutable state of a single session.
struct RepairSession {
    id: String,
    state: SessionState,
    branch: String,
    attempts: Vec<AttemptRecord>,
    pr_link: Option<String>,
}

impl RepairSession {
    fn enter(&mut self, state: SessionState) {
        debug!(from = self.state.as_str(), to = state.as_str(), "state transition");
        self.state = state;
    }
}

impl RepairLoop {
    pub fn new(checkout: impl Into<PathBuf>, config: SessionConfig, collab: Collaborators) -> Self {
        Self {
            checkout: checkout.into(),
            config,
            collab,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn checkout(&self) -> &Path {
        &self.checkout
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run a session and return only the caller-facing result.
    pub async fn run(&self, request: &ChangeRequest) -> Result<SessionReport, SessionError> {
        self.run_recorded(request).await.result
    }

    /// Run a session and keep its audit log alongside the result.
    pub async fn run_recorded(&self, request: &ChangeRequest) -> SessionRun {
        let mut session = RepairSession {
            id: Uuid::new_v4().to_string(),
            state: SessionState::Start,
            branch: self.config.base_branch.clone(),
            attempts: Vec::new(),
            pr_link: None,
        };

        let span = obs::session_span(&session.id);
        let started = Instant::now();
        obs::emit_session_started(
            &session.id,
            request.repo_kind.name(),
            self.config.max_attempts,
        );

        let result = self
            .drive(&mut session, request)
            .instrument(span)
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let attempts = session.attempts.len() as u32;
        let (outcome, error) = match &result {
            Ok(_) => (SessionOutcome::Succeeded, None),
            Err(e) => {
                if !matches!(e, SessionError::AttemptsExhausted { .. }) {
                    obs::emit_session_aborted(&session.id, session.state, e);
                }
                (e.outcome(), Some(e.to_string()))
            }
        };
        obs::emit_session_finished(&session.id, duration_ms, attempts, result.is_ok());

        let log = SessionLog {
            session_id: session.id.clone(),
            request_prompt: request.prompt.clone(),
            repo_kind: request.repo_kind,
            config: self.config.clone(),
            attempts: session.attempts.clone(),
            outcome,
            branch: Some(session.branch.clone()),
            pr_link: session.pr_link.clone(),
            error,
            finished_at: Utc::now(),
        };
        SessionRun { log, result }
    }

    async fn drive(
        &self,
        session: &mut RepairSession,
        request: &ChangeRequest,
    ) -> Result<SessionReport, SessionError> {
        let vcs = &self.collab.vcs;

        if let Some(url) = &request.repo_url {
            info!(url = %url, "cloning repository");
            vcs.clone_repo(url, &self.checkout)
                .await
                .map_err(|source| SessionError::Vcs {
                    stage: "clone",
                    source,
                })?;
        }
        vcs.create_branch(&self.config.base_branch)
            .await
            .map_err(|source| SessionError::Vcs {
                stage: "create branch",
                source,
            })?;

        let paths = resolve_seeds(&self.checkout, request).map_err(SessionError::Context)?;
        let files = load_context(&self.checkout, &paths);
        let mut prompt = PromptBuffer::new(
            build_prompt(&request.prompt, &files),
            self.config.prompt_budget,
        );
        debug!(prompt = %prompt.as_str(), "initial prompt");

        let namer = BranchNamer::new(&self.config.branch_prefix);
        let mut last_failure: Option<StageOutcome> = None;

        for attempt in 1..=self.config.max_attempts {
            obs::emit_attempt_started(&session.id, attempt, prompt.as_str().len());

            session.enter(SessionState::Prompting);
            let reply = self
                .collab
                .model
                .send(prompt.as_str())
                .await
                .map_err(SessionError::Model)?;

            session.enter(SessionState::Parsing);
            let parsed = parse_response(&reply)?;
            info!(
                attempt,
                summary = %parsed.summary,
                files = parsed.files.len(),
                "parsed model response"
            );

            let branch = namer.name(&parsed.summary, (self.clock)());
            if branch != session.branch {
                vcs.rename_branch(&session.branch, &branch)
                    .await
                    .map_err(|source| SessionError::Vcs {
                        stage: "rename branch",
                        source,
                    })?;
                session.branch = branch;
            }

            session.enter(SessionState::Applying);
            let applied =
                apply_blocks(&self.checkout, &parsed.files, self.config.path_policy).await;

            session.enter(SessionState::Building);
            let build = self.run_stage(Stage::Build).await;
            obs::emit_stage_finished(&session.id, attempt, &build);

            let test = if build.passed {
                session.enter(SessionState::Testing);
                let test = self.run_stage(Stage::Test).await;
                obs::emit_stage_finished(&session.id, attempt, &test);
                Some(test)
            } else {
                None
            };

            let record = AttemptRecord {
                attempt,
                summary: parsed.summary.to_string(),
                branch: session.branch.clone(),
                files_written: applied.written,
                files_skipped: applied.skipped,
                build,
                test,
            };
            let failed = record.failed_stage().cloned();
            session.attempts.push(record);

            match failed {
                None => {
                    session.enter(SessionState::Succeeded);
                    obs::emit_attempt_finished(&session.id, attempt, session.state);
                    return self
                        .publish(session, request, parsed.commit_message.as_deref())
                        .await;
                }
                Some(failure) => {
                    warn!(
                        attempt,
                        stage = failure.stage.name(),
                        "validation failed"
                    );
                    prompt.push_feedback(failure.stage, &failure.output);
                    let next = if attempt < self.config.max_attempts {
                        SessionState::Retry
                    } else {
                        SessionState::Exhausted
                    };
                    session.enter(next);
                    obs::emit_attempt_finished(&session.id, attempt, next);
                    last_failure = Some(failure);
                }
            }
        }

        warn!("exceeded maximum attempts, please review manually");
        let (stage, last_output) = match last_failure {
            Some(f) => (f.stage, f.output),
            None => (Stage::Build, String::new()),
        };
        Err(SessionError::AttemptsExhausted {
            attempts: self.config.max_attempts,
            stage,
            last_output,
        })
    }

    /// Run build or test; an oracle error counts as a failed stage.
    async fn run_stage(&self, stage: Stage) -> StageOutcome {
        let result = match stage {
            Stage::Build => self.collab.builder.build(&self.checkout).await,
            Stage::Test => self.collab.tester.test(&self.checkout).await,
        };
        result.unwrap_or_else(|e| {
            warn!(stage = stage.name(), error = %e, "oracle error");
            StageOutcome::failed(stage, e.to_string())
        })
    }

    async fn publish(
        &self,
        session: &mut RepairSession,
        request: &ChangeRequest,
        commit_message: Option<&str>,
    ) -> Result<SessionReport, SessionError> {
        let message = commit_message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Applying changes from user prompt: {}", request.prompt));

        let vcs = &self.collab.vcs;
        vcs.commit_all(&message)
            .await
            .map_err(|source| SessionError::Vcs {
                stage: "commit",
                source,
            })?;
        vcs.push(&session.branch)
            .await
            .map_err(|source| SessionError::Vcs {
                stage: "push",
                source,
            })?;
        info!(branch = %session.branch, "changes pushed");

        let summary = session
            .attempts
            .last()
            .map(|a| a.summary.clone())
            .unwrap_or_default();
        let body = pr_body(&request.prompt, &summary, session.attempts.len() as u32);
        let link = self
            .collab
            .publisher
            .create_pull_request(&pr_title(&request.prompt), &body)
            .await
            .map_err(SessionError::Publish)?;
        info!(link = %link, "pull request created");
        session.pr_link = Some(link.clone());

        Ok(SessionReport {
            session_id: session.id.clone(),
            branch: session.branch.clone(),
            pr_link: link,
            attempts: session.attempts.clone(),
        })
    }
}
