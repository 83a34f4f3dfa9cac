//! Session configuration.
//!
//! Loaded once before the session arms; limits are immutable for the rest
//! of the day.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use veris_risk::RiskLimits;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub limits: RiskLimits,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub journal_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub poll_interval_secs: u64,
}

impl SessionConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig {
                journal_path: PathBuf::from("data/journal.jsonl"),
                snapshot_path: PathBuf::from("data/snapshot.json"),
                poll_interval_secs: 5,
            },
            limits: RiskLimits::default(),
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 250,
                max_delay_ms: 5000,
            },
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads session configuration by merging defaults, TOML, and
    /// environment variables. Nested keys use double underscores
    /// (`VERIS_LIMITS__MAX_DAILY_LOSS`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be read or parsed, or if
    /// the resulting limits fail validation.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/veris.toml")
    }

    /// Loads from an explicit TOML path. A missing file falls back to
    /// defaults; environment variables still apply.
    ///
    /// # Errors
    ///
    /// As for [`load`](Self::load).
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("VERIS_").split("__"))
            .extract()?;

        config.limits.validate()?;
        Ok(config)
    }
}
