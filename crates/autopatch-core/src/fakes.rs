//! In-memory collaborators (testing only)
//!
//! Scripted model/build/test oracles and recording VCS/publish fakes that
//! satisfy the [`crate::oracle`] contracts without processes or network.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{AutopatchError, Result, Stage, StageOutcome};
use crate::oracle::{Builder, ModelOracle, Publisher, Tester, Vcs};

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// Returns canned replies in order and records every prompt it was sent.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelOracle for ScriptedModel {
    async fn send(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AutopatchError::Model("no scripted reply left".to_string()))
    }
}

// ---------------------------------------------------------------------------
// ScriptedBuilder / ScriptedTester
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Script {
    stage: Stage,
    outcomes: Mutex<VecDeque<StageOutcome>>,
    calls: Mutex<u32>,
}

impl Script {
    fn from_passes(stage: Stage, passes: Vec<bool>) -> Self {
        let outcomes = passes
            .into_iter()
            .enumerate()
            .map(|(i, passed)| {
                if passed {
                    StageOutcome::passed(stage, format!("{} ok", stage.name()))
                } else {
                    StageOutcome::failed(stage, format!("{} failure #{}", stage.name(), i + 1))
                }
            })
            .collect();
        Self::from_outcomes(stage, outcomes)
    }

    fn from_outcomes(stage: Stage, outcomes: Vec<StageOutcome>) -> Self {
        Self {
            stage,
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(0),
        }
    }

    fn next(&self) -> Result<StageOutcome> {
        *self.calls.lock().unwrap() += 1;
        self.outcomes.lock().unwrap().pop_front().ok_or_else(|| {
            AutopatchError::Oracle(format!("no scripted outcome for {}", self.stage.name()))
        })
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

/// Build oracle that replays a fixed pass/fail sequence.
#[derive(Debug)]
pub struct ScriptedBuilder(Script);

impl ScriptedBuilder {
    pub fn new(passes: Vec<bool>) -> Self {
        Self(Script::from_passes(Stage::Build, passes))
    }

    pub fn from_outcomes(outcomes: Vec<StageOutcome>) -> Self {
        Self(Script::from_outcomes(Stage::Build, outcomes))
    }

    pub fn calls(&self) -> u32 {
        self.0.calls()
    }
}

#[async_trait]
impl Builder for ScriptedBuilder {
    async fn build(&self, _checkout: &Path) -> Result<StageOutcome> {
        self.0.next()
    }
}

/// Test oracle that replays a fixed pass/fail sequence.
#[derive(Debug)]
pub struct ScriptedTester(Script);

impl ScriptedTester {
    pub fn new(passes: Vec<bool>) -> Self {
        Self(Script::from_passes(Stage::Test, passes))
    }

    pub fn from_outcomes(outcomes: Vec<StageOutcome>) -> Self {
        Self(Script::from_outcomes(Stage::Test, outcomes))
    }

    pub fn calls(&self) -> u32 {
        self.0.calls()
    }
}

#[async_trait]
impl Tester for ScriptedTester {
    async fn test(&self, _checkout: &Path) -> Result<StageOutcome> {
        self.0.next()
    }
}

// ---------------------------------------------------------------------------
// RecordingVcs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Clone { url: String, target: PathBuf },
    CreateBranch(String),
    RenameBranch { old: String, new: String },
    CommitAll(String),
    Push(String),
}

impl VcsCall {
    fn op(&self) -> &'static str {
        match self {
            VcsCall::Clone { .. } => "clone",
            VcsCall::CreateBranch(_) => "create_branch",
            VcsCall::RenameBranch { .. } => "rename_branch",
            VcsCall::CommitAll(_) => "commit",
            VcsCall::Push(_) => "push",
        }
    }
}

/// Records every VCS call; can be told to fail one operation.
#[derive(Debug, Default)]
pub struct RecordingVcs {
    calls: Mutex<Vec<VcsCall>>,
    fail_on: Mutex<Option<&'static str>>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call of `op` (`clone`, `create_branch`, `rename_branch`,
    /// `commit`, `push`).
    pub fn fail_on(&self, op: &'static str) {
        *self.fail_on.lock().unwrap() = Some(op);
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: VcsCall) -> Result<()> {
        let op = call.op();
        self.calls.lock().unwrap().push(call);
        if *self.fail_on.lock().unwrap() == Some(op) {
            return Err(AutopatchError::GitError(format!("{op} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl Vcs for RecordingVcs {
    async fn clone_repo(&self, url: &str, target: &Path) -> Result<()> {
        self.record(VcsCall::Clone {
            url: url.to_string(),
            target: target.to_path_buf(),
        })
    }

    async fn create_branch(&self, name: &str) -> Result<()> {
        self.record(VcsCall::CreateBranch(name.to_string()))
    }

    async fn rename_branch(&self, old: &str, new: &str) -> Result<()> {
        self.record(VcsCall::RenameBranch {
            old: old.to_string(),
            new: new.to_string(),
        })
    }

    async fn commit_all(&self, message: &str) -> Result<()> {
        self.record(VcsCall::CommitAll(message.to_string()))
    }

    async fn push(&self, branch: &str) -> Result<()> {
        self.record(VcsCall::Push(branch.to_string()))
    }
}

// ---------------------------------------------------------------------------
// RecordingPublisher
// ---------------------------------------------------------------------------

/// Records PR requests and answers with a fixed link, or fails.
#[derive(Debug)]
pub struct RecordingPublisher {
    link: Option<String>,
    requests: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: Some(link.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            link: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(title, body)` of every request, in order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn create_pull_request(&self, title: &str, body: &str) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        self.link
            .clone()
            .ok_or_else(|| AutopatchError::Publish("pull request rejected".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_model_replays_and_records() {
        let model = ScriptedModel::new(["one"]);
        assert_eq!(model.send("p1").await.unwrap(), "one");
        assert!(model.send("p2").await.is_err());
        assert_eq!(model.prompts(), vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn scripted_builder_counts_calls() {
        let builder = ScriptedBuilder::new(vec![false, true]);
        let dir = Path::new(".");
        assert!(!builder.build(dir).await.unwrap().passed);
        assert!(builder.build(dir).await.unwrap().passed);
        assert!(builder.build(dir).await.is_err());
        assert_eq!(builder.calls(), 3);
    }

    #[tokio::test]
    async fn recording_vcs_fails_selected_op() {
        let vcs = RecordingVcs::new();
        vcs.fail_on("push");
        vcs.commit_all("m").await.unwrap();
        assert!(vcs.push("b").await.is_err());
        assert_eq!(
            vcs.calls(),
            vec![VcsCall::CommitAll("m".into()), VcsCall::Push("b".into())]
        );
    }

    #[tokio::test]
    async fn failing_publisher_records_request() {
        let publisher = RecordingPublisher::failing();
        assert!(publisher.create_pull_request("t", "b").await.is_err());
        assert_eq!(publisher.requests().len(), 1);
    }
}
