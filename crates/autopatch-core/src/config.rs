//! Repair session configuration.

use serde::{Deserialize, Serialize};

use crate::apply::PathPolicy;
use crate::branch::DEFAULT_PREFIX;
use crate::domain::{AutopatchError, Result};
use crate::prompt::DEFAULT_PROMPT_BUDGET;

/// Default attempt budget of a session.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Branch created right after clone, renamed once a summary is known.
pub const DEFAULT_BASE_BRANCH: &str = "assistant-branch";

/// Knobs of one repair session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum prompt cycles before the session is exhausted.
    pub max_attempts: u32,
    /// Byte cap of the prompt including accumulated failure feedback.
    pub prompt_budget: usize,
    pub path_policy: PathPolicy,
    pub base_branch: String,
    pub branch_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            prompt_budget: DEFAULT_PROMPT_BUDGET,
            path_policy: PathPolicy::default(),
            base_branch: DEFAULT_BASE_BRANCH.to_string(),
            branch_prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden from the environment.
    ///
    /// Reads (all optional):
    /// - AUTOPATCH_MAX_ATTEMPTS
    /// - AUTOPATCH_PROMPT_BUDGET
    /// - AUTOPATCH_PATH_POLICY (`contained` | `unrestricted`)
    /// - AUTOPATCH_BASE_BRANCH
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("AUTOPATCH_MAX_ATTEMPTS") {
            config.max_attempts = parse_number("AUTOPATCH_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("AUTOPATCH_PROMPT_BUDGET") {
            config.prompt_budget = parse_number("AUTOPATCH_PROMPT_BUDGET", &v)?;
        }
        if let Some(v) = lookup("AUTOPATCH_PATH_POLICY") {
            config.path_policy = v.parse()?;
        }
        if let Some(v) = lookup("AUTOPATCH_BASE_BRANCH") {
            config.base_branch = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_path_policy(mut self, policy: PathPolicy) -> Self {
        self.path_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(AutopatchError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_branch.trim().is_empty() {
            return Err(AutopatchError::InvalidConfig(
                "base_branch must not be empty".to_string(),
            ));
        }
        if self.branch_prefix.trim().is_empty() {
            return Err(AutopatchError::InvalidConfig(
                "branch_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AutopatchError::InvalidConfig(format!("{key} is not a number: {value:?}")))
}
