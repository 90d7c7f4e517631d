//! Parsed model replies.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{AutopatchError, Result};

/// Short change summary, restricted to ASCII letters, digits and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Summary(String);

impl Summary {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let valid = !token.is_empty()
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(AutopatchError::InvalidSummary(token));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Summary {
    type Error = AutopatchError;

    fn try_from(value: String) -> Result<Self> {
        Summary::new(value)
    }
}

impl From<Summary> for String {
    fn from(value: Summary) -> Self {
        value.0
    }
}

/// One file's content as emitted by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlock {
    /// Path text exactly as captured from the start marker.
    pub path: String,
    /// Trimmed content; may contain one elision placeholder.
    pub content: String,
}

impl FileBlock {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Result of parsing one model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    /// File blocks in document order.
    pub files: Vec<FileBlock>,
    pub summary: Summary,
    pub commit_message: Option<String>,
    /// Paths whose start marker had no end marker after it.
    pub unterminated: Vec<String>,
}

impl ParsedResponse {
    pub fn get(&self, path: &str) -> Option<&FileBlock> {
        self.files.iter().find(|f| f.path == path)
    }
}
