//! Run configuration loaded from YAML.
//!
//! ```rust
//! use tracegraph::RunConfig;
//!
//! let config = RunConfig::from_yaml_str(
//!     "retry:\n  initial_backoff_ms: 2\n  max_again: 50\nchannel_capacity: 8\n",
//! )
//! .unwrap();
//! assert_eq!(config.retry.max_again, Some(50));
//! assert_eq!(config.log_filter, "info");
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{GraphError, Result};

/// How a driver waits when every sink answers `AGAIN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Wait after the first `AGAIN` round
    pub initial_backoff_ms: u64,
    /// Upper bound for the doubling wait
    pub max_backoff_ms: u64,
    /// Consecutive `AGAIN` rounds tolerated before the run stalls; unlimited if unset
    pub max_again: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { initial_backoff_ms: 1, max_backoff_ms: 100, max_again: None }
    }
}

impl RetryPolicy {
    /// Retry immediately, without sleeping.
    pub fn busy() -> Self {
        Self { initial_backoff_ms: 0, max_backoff_ms: 0, max_again: None }
    }

    pub fn with_max_again(mut self, max_again: u32) -> Self {
        self.max_again = Some(max_again);
        self
    }

    /// Wait before retrying after `attempt` consecutive `AGAIN` rounds (1-based).
    ///
    /// Exponential: initial, 2x, 4x, ... capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let millis = self.initial_backoff_ms.saturating_mul(1 << shift).min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    /// Whether `attempts` consecutive `AGAIN` rounds exceed the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_again.is_some_and(|max| attempts > max)
    }

    fn validate(&self) -> Result<()> {
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(GraphError::config(format!(
                "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }
}

/// Settings for running a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub retry: RetryPolicy,
    /// `tracing` filter directive, e.g. `info` or `tracegraph=debug`
    pub log_filter: String,
    /// Capacity of channels feeding async consumers
    pub channel_capacity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { retry: RetryPolicy::default(), log_filter: "info".to_string(), channel_capacity: 64 }
    }
}

impl RunConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: RunConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| GraphError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(GraphError::config("channel_capacity must be greater than zero"));
        }
        self.retry.validate()
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}
