//! Branch naming for repair sessions.

use chrono::{DateTime, Utc};

use crate::domain::Summary;

/// Timestamp layout appended to branch names (`YYYYMMDDHHMMSS`).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Default prefix of generated branch names.
pub const DEFAULT_PREFIX: &str = "assistant";

/// `assistant-<summary>-<timestamp>`.
///
/// Second resolution is the only collision avoidance: the same summary
/// named twice within one second yields the same name.
pub fn branch_name(summary: &Summary, now: DateTime<Utc>) -> String {
    BranchNamer::default().name(summary, now)
}

/// Builds VCS-safe branch names from a prefix, summary and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNamer {
    prefix: String,
}

impl BranchNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn name(&self, summary: &Summary, now: DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}",
            self.prefix,
            summary.as_str(),
            now.format(TIMESTAMP_FORMAT)
        )
    }
}

impl Default for BranchNamer {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
