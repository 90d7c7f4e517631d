//! Persisted record of a repair session, with an integrity digest.
//!
//! Layout: `<dir>/<session_id>/session.json` plus `session.digest`, the
//! SHA-256 hex of the JSON bytes. Reading verifies the digest.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::SessionConfig;
use crate::domain::{AttemptRecord, AutopatchError, RepoKind, Result};

const ARTIFACT_FILE: &str = "session.json";
const DIGEST_FILE: &str = "session.digest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Succeeded,
    Exhausted,
    /// Stopped by a fatal error before the attempt budget ran out.
    Aborted,
}

/// Everything a reviewer needs to audit one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLog {
    pub session_id: String,
    pub request_prompt: String,
    pub repo_kind: RepoKind,
    pub config: SessionConfig,
    pub attempts: Vec<AttemptRecord>,
    pub outcome: SessionOutcome,
    pub branch: Option<String>,
    pub pr_link: Option<String>,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `<dir>/<session_id>/session.json` and its digest.
pub fn write_session_artifact(log: &SessionLog, dir: &Path) -> Result<PathBuf> {
    let session_dir = dir.join(&log.session_id);
    std::fs::create_dir_all(&session_dir)?;

    let artifact_path = session_dir.join(ARTIFACT_FILE);
    let json = serde_json::to_vec_pretty(log)?;
    std::fs::write(&artifact_path, &json)?;
    std::fs::write(session_dir.join(DIGEST_FILE), sha256_hex(&json))?;

    Ok(artifact_path)
}

/// Read `<dir>/<session_id>/session.json`, failing on digest mismatch.
pub fn read_session_artifact(session_id: &str, dir: &Path) -> Result<SessionLog> {
    let session_dir = dir.join(session_id);
    let json = std::fs::read(session_dir.join(ARTIFACT_FILE))?;
    let expected = std::fs::read_to_string(session_dir.join(DIGEST_FILE))?;

    let actual = sha256_hex(&json);
    if expected.trim() != actual {
        return Err(AutopatchError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }

    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Stage, StageOutcome};

    fn sample_log() -> SessionLog {
        SessionLog {
            session_id: "sess-1".to_string(),
            request_prompt: "fix off-by-one".to_string(),
            repo_kind: RepoKind::Cpp,
            config: SessionConfig::default(),
            attempts: vec![AttemptRecord {
                attempt: 1,
                summary: "fix-offbyone".to_string(),
                branch: "assistant-fix-offbyone-20240309070501".to_string(),
                files_written: vec!["x.c".to_string()],
                files_skipped: Vec::new(),
                build: StageOutcome::passed(Stage::Build, "ok"),
                test: Some(StageOutcome::failed(Stage::Test, "FAIL")),
            }],
            outcome: SessionOutcome::Exhausted,
            branch: Some("assistant-fix-offbyone-20240309070501".to_string()),
            pr_link: None,
            error: Some("exceeded maximum attempts".to_string()),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_write_then_read_verifies_digest() {
        let dir = tempfile::tempdir().unwrap();
        let log = sample_log();
        let path = write_session_artifact(&log, dir.path()).unwrap();
        assert!(path.ends_with("sess-1/session.json"));

        let digest = std::fs::read_to_string(dir.path().join("sess-1/session.digest")).unwrap();
        assert_eq!(digest.len(), 64);

        let back = read_session_artifact("sess-1", dir.path()).unwrap();
        assert_eq!(back, log);
    }

    #[test]
    fn test_tampered_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_session_artifact(&sample_log(), dir.path()).unwrap();
        let tampered = std::fs::read_to_string(&path)
            .unwrap()
            .replace("exhausted", "succeeded");
        std::fs::write(&path, &tampered).unwrap();

        let recorded = std::fs::read_to_string(dir.path().join("sess-1/session.digest")).unwrap();
        let err = read_session_artifact("sess-1", dir.path()).unwrap_err();
        match &err {
            AutopatchError::DigestMismatch { expected, actual } => {
                assert_eq!(expected, recorded.trim());
                assert_eq!(actual, &sha256_hex(tampered.as_bytes()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with(&format!("digest mismatch: expected {}", recorded.trim())));
    }

    #[test]
    fn test_missing_artifact_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_session_artifact("nope", dir.path()).unwrap_err();
        assert!(matches!(err, AutopatchError::Io(_)));
    }
}
