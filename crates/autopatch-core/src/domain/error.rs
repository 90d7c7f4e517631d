//! Domain-level error taxonomy for Autopatch.

/// Autopatch domain errors.
///
/// Collaborators (model, build/test, VCS, publish) report failures through
/// this type so the repair loop can tell which stage failed.
#[derive(Debug, thiserror::Error)]
pub enum AutopatchError {
    #[error("invalid summary token: {0:?}")]
    InvalidSummary(String),

    #[error("unknown repository kind: {0}")]
    UnknownRepoKind(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("git error: {0}")]
    GitError(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Autopatch domain operations.
pub type Result<T> = std::result::Result<T, AutopatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autopatch_error_display() {
        let err = AutopatchError::InvalidSummary("has space".to_string());
        assert!(err.to_string().contains("invalid summary token"));

        let err = AutopatchError::GitError("push rejected".to_string());
        assert_eq!(err.to_string(), "git error: push rejected");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AutopatchError = io.into();
        assert!(err.to_string().starts_with("io error"));
    }
}
