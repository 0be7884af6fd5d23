use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_VALIDITY_DAYS: &str = "SCOREBOARD_VALIDITY_DAYS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "SCOREBOARD_REQUEST_TIMEOUT_MS";
pub const ENV_RETRY_ATTEMPTS: &str = "SCOREBOARD_RETRY_ATTEMPTS";
pub const ENV_RETRY_BACKOFF_MS: &str = "SCOREBOARD_RETRY_BACKOFF_MS";

/// Client settings. Every field has a default, so a partial JSON document
/// (or none at all) is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Lifetime of a freshly signed decryption capability.
    pub validity_days: u32,
    /// Deadline for one call to the ciphertext runtime.
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            validity_days: 365,
            request_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 4_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): doubles each time,
    /// capped at `max_backoff_ms`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Defaults with `SCOREBOARD_*` environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup` (usually the process environment).
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(days) = parse_var(&lookup, ENV_VALIDITY_DAYS)? {
            self.validity_days = days;
        }
        if let Some(ms) = parse_var(&lookup, ENV_REQUEST_TIMEOUT_MS)? {
            self.request_timeout_ms = ms;
        }
        if let Some(attempts) = parse_var(&lookup, ENV_RETRY_ATTEMPTS)? {
            self.retry.max_attempts = attempts;
        }
        if let Some(ms) = parse_var(&lookup, ENV_RETRY_BACKOFF_MS)? {
            self.retry.initial_backoff_ms = ms;
        }
        self.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.validity_days == 0 {
            return Err(ConfigError::Invalid("validity_days must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive"));
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
    }
}
