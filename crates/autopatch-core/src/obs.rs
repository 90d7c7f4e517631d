//! Structured lifecycle events for repair sessions.
//!
//! Every event carries `event = "<area>.<what>"` plus the session id so a
//! JSON log stream can be filtered per session:
//! - `session.started` / `session.finished`
//! - `attempt.started` / `attempt.finished`
//! - `stage.finished` for build and test
//! - `session.aborted` on a fatal error

use tracing::{info, warn};

use crate::domain::{SessionState, StageOutcome};

/// Span tagged with the session id; attach it with `Instrument`.
///
/// ```ignore
/// drive(session).instrument(session_span("3f2c...")).await;
/// // every event below carries session_id = "3f2c..."
/// ```
pub fn session_span(session_id: &str) -> tracing::Span {
    tracing::info_span!("autopatch.session", session_id = %session_id)
}

pub fn emit_session_started(session_id: &str, repo_kind: &str, max_attempts: u32) {
    info!(
        event = "session.started",
        session_id = %session_id,
        repo_kind = %repo_kind,
        max_attempts = max_attempts,
    );
}

pub fn emit_attempt_started(session_id: &str, attempt: u32, prompt_bytes: usize) {
    info!(
        event = "attempt.started",
        session_id = %session_id,
        attempt = attempt,
        prompt_bytes = prompt_bytes,
    );
}

/// Emit event: a build or test stage completed.
pub fn emit_stage_finished(session_id: &str, attempt: u32, outcome: &StageOutcome) {
    info!(
        event = "stage.finished",
        session_id = %session_id,
        attempt = attempt,
        stage = outcome.stage.name(),
        passed = outcome.passed,
        skipped = outcome.skipped,
        duration_ms = outcome.duration_ms,
    );
}

pub fn emit_attempt_finished(session_id: &str, attempt: u32, next: SessionState) {
    info!(
        event = "attempt.finished",
        session_id = %session_id,
        attempt = attempt,
        next = next.as_str(),
    );
}

/// Emit event: session reached a terminal state.
pub fn emit_session_finished(session_id: &str, duration_ms: u64, attempts: u32, success: bool) {
    info!(
        event = "session.finished",
        session_id = %session_id,
        duration_ms = duration_ms,
        attempts = attempts,
        success = success,
    );
}

/// Emit event: session stopped on a fatal error (warning level).
pub fn emit_session_aborted(session_id: &str, state: SessionState, error: &dyn std::fmt::Display) {
    warn!(
        event = "session.aborted",
        session_id = %session_id,
        state = state.as_str(),
        error = %error,
    );
}
