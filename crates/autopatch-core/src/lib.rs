//! Autopatch Core Library
//!
//! Turns a natural-language change request into a validated branch: prompt a
//! model, parse and splice its reply into the checkout, build and test, and
//! retry with the failure output until the attempt budget runs out.

pub mod apply;
pub mod artifact;
pub mod branch;
pub mod config;
pub mod context;
pub mod domain;
pub mod fakes;
pub mod git;
pub mod obs;
pub mod oracle;
pub mod parse;
pub mod prompt;
pub mod publish;
pub mod session;
pub mod splice;
pub mod telemetry;

pub use domain::{
    AttemptRecord, AutopatchError, ChangeRequest, FileBlock, ParsedResponse, RepoKind, Result,
    SeedFiles, SessionState, SkippedFile, Stage, StageOutcome, Summary, TestPolicy,
};

pub use apply::{apply_blocks, ApplyError, ApplyReport, PathPolicy};
pub use artifact::{read_session_artifact, write_session_artifact, SessionLog, SessionOutcome};
pub use branch::{branch_name, BranchNamer};
pub use config::SessionConfig;
pub use context::{load_context, resolve_seeds};
pub use git::GitCli;
pub use oracle::{Builder, ModelOracle, NoopTester, Publisher, Tester, Vcs};
pub use parse::{parse_response, ParseError};
pub use prompt::{build_prompt, PromptBuffer, RESPONSE_FORMAT};
pub use publish::GhCliPublisher;
pub use session::{Clock, Collaborators, RepairLoop, SessionError, SessionReport, SessionRun};
pub use splice::{splice, splice_file, SpliceError, PLACEHOLDER};

pub use obs::{
    emit_attempt_finished, emit_attempt_started, emit_session_aborted, emit_session_finished,
    emit_session_started, emit_stage_finished, session_span,
};
pub use telemetry::init_tracing;

/// Autopatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
