//! Domain models for Autopatch.
//!
//! Canonical definitions for the core entities:
//! - `ChangeRequest`: immutable input of a repair session
//! - `ParsedResponse` / `FileBlock` / `Summary`: one parsed model reply
//! - `AttemptRecord` / `StageOutcome`: bookkeeping of repair attempts

pub mod attempt;
pub mod error;
pub mod request;
pub mod response;

pub use attempt::{AttemptRecord, SessionState, SkippedFile, Stage, StageOutcome};
pub use error::{AutopatchError, Result};
pub use request::{ChangeRequest, RepoKind, SeedFiles, TestPolicy};
pub use response::{FileBlock, ParsedResponse, Summary};
