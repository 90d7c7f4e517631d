//! Attempt bookkeeping for repair sessions.

use serde::{Deserialize, Serialize};

/// Validation stage executed against the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Build,
    Test,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Test => "test",
        }
    }

    /// Capitalised label used in feedback text.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Build => "Build",
            Stage::Test => "Test",
        }
    }
}

/// Pass/fail plus combined output of one oracle call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub passed: bool,
    /// Combined stdout and stderr.
    pub output: String,
    pub duration_ms: u64,
    /// True when the stage was not executed and counted as passing.
    #[serde(default)]
    pub skipped: bool,
}

impl StageOutcome {
    pub fn passed(stage: Stage, output: impl Into<String>) -> Self {
        Self {
            stage,
            passed: true,
            output: output.into(),
            duration_ms: 0,
            skipped: false,
        }
    }

    pub fn failed(stage: Stage, output: impl Into<String>) -> Self {
        Self {
            stage,
            passed: false,
            output: output.into(),
            duration_ms: 0,
            skipped: false,
        }
    }

    /// Outcome reported by a no-op tester.
    pub fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            passed: true,
            output: format!("{} skipped by policy", stage.name()),
            duration_ms: 0,
            skipped: true,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// One path the apply step could not write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Record of one prompt/apply/build/test cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt index.
    pub attempt: u32,
    pub summary: String,
    pub branch: String,
    pub files_written: Vec<String>,
    pub files_skipped: Vec<SkippedFile>,
    pub build: StageOutcome,
    /// `None` when the build failed and tests were not run.
    pub test: Option<StageOutcome>,
}

impl AttemptRecord {
    pub fn succeeded(&self) -> bool {
        self.build.passed && self.test.as_ref().is_some_and(|t| t.passed)
    }

    /// The stage that failed this attempt, if any.
    pub fn failed_stage(&self) -> Option<&StageOutcome> {
        if !self.build.passed {
            return Some(&self.build);
        }
        self.test.as_ref().filter(|t| !t.passed)
    }
}

/// Repair loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Start,
    Prompting,
    Parsing,
    Applying,
    Building,
    Testing,
    Succeeded,
    Retry,
    Exhausted,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Start => "start",
            SessionState::Prompting => "prompting",
            SessionState::Parsing => "parsing",
            SessionState::Applying => "applying",
            SessionState::Building => "building",
            SessionState::Testing => "testing",
            SessionState::Succeeded => "succeeded",
            SessionState::Retry => "retry",
            SessionState::Exhausted => "exhausted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Exhausted)
    }
}
