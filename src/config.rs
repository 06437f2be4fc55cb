//! Coordinator configuration.
//!
//! All settings can be configured via environment variables:
//! - `COMPOSITION_SYNC_CALL_TIMEOUT_MS`: Per-call timeout (default: 10000)
//! - `COMPOSITION_SYNC_MAX_ATTEMPTS`: Attempts for idempotent calls (default: 3)
//! - `COMPOSITION_SYNC_RETRY_BACKOFF_MS`: Backoff step between attempts (default: 200)
//! - `COMPOSITION_SYNC_COPY_PREFIX`: Copy title prefix (default: `copy %index%: `)
//! - `COMPOSITION_SYNC_COPY_PATTERN`: Copy marker pattern (default: `^copy [0-9]+: `)

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::title::{TitleError, TitleTemplate, DEFAULT_COPY_PATTERN, DEFAULT_COPY_PREFIX};

/// Settings for the synchronization coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Timeout for a single collaborator call, in milliseconds.
    pub call_timeout_ms: u64,
    /// Attempts for idempotent calls (1 = no retry). Inserts always get one.
    pub max_attempts: u32,
    /// Linear backoff step between attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Prefix template for duplicated titles.
    pub copy_prefix_template: String,
    /// Pattern recognizing an applied copy marker.
    pub copy_marker_pattern: String,
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            call_timeout_ms: env_parse("COMPOSITION_SYNC_CALL_TIMEOUT_MS").unwrap_or(defaults.call_timeout_ms),
            max_attempts: env_parse("COMPOSITION_SYNC_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            retry_backoff_ms: env_parse("COMPOSITION_SYNC_RETRY_BACKOFF_MS").unwrap_or(defaults.retry_backoff_ms),
            copy_prefix_template: std::env::var("COMPOSITION_SYNC_COPY_PREFIX")
                .unwrap_or(defaults.copy_prefix_template),
            copy_marker_pattern: std::env::var("COMPOSITION_SYNC_COPY_PATTERN")
                .unwrap_or(defaults.copy_marker_pattern),
        }
    }

    /// Settings for tests: short timeout, no backoff.
    pub fn fast() -> Self {
        Self {
            call_timeout_ms: 1_000,
            retry_backoff_ms: 0,
            ..Self::default()
        }
    }

    /// Per-call timeout.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Backoff before attempt `attempt` (1-based; the first attempt waits nothing).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(attempt.saturating_sub(1) as u64))
    }

    /// Compile the title template.
    pub fn title_template(&self) -> Result<TitleTemplate, TitleError> {
        TitleTemplate::new(self.copy_prefix_template.clone(), &self.copy_marker_pattern)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 10_000,
            max_attempts: 3,
            retry_backoff_ms: 200,
            copy_prefix_template: DEFAULT_COPY_PREFIX.to_string(),
            copy_marker_pattern: DEFAULT_COPY_PATTERN.to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
