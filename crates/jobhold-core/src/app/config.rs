//! TrackerConfig - 設定値 (TOML から読み込み可能)
//!
//! ```toml
//! sweep_interval_secs = 60
//! retention_minutes = 10
//! max_concurrent_jobs = 4
//! ```
//!
//! 省略されたキーは下記のデフォルト値になる。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::domain::{DEFAULT_MAX_QUEUE_MINUTES, DEFAULT_MAX_RUNTIME_MINUTES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Seconds between sweeper passes.
    pub sweep_interval_secs: u64,
    /// How long terminal records wait for retrieval before eviction.
    pub retention_minutes: u32,
    pub default_max_queue_minutes: u32,
    pub default_max_runtime_minutes: u32,
    /// Worker pool size.
    pub max_concurrent_jobs: usize,
    /// How long `cancel` waits for an interrupted worker to stop.
    pub cancel_grace_millis: u64,
    pub notification_subject: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            retention_minutes: 10,
            default_max_queue_minutes: DEFAULT_MAX_QUEUE_MINUTES,
            default_max_runtime_minutes: DEFAULT_MAX_RUNTIME_MINUTES,
            max_concurrent_jobs: 4,
            cancel_grace_millis: 5_000,
            notification_subject: "Your task has finished".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse tracker config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid tracker config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl TrackerConfig {
    /// Parses and validates.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: TrackerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.sweep_interval_secs == 0 {
            return invalid("sweep_interval_secs", "must be positive");
        }
        if self.max_concurrent_jobs == 0 {
            return invalid("max_concurrent_jobs", "must be positive");
        }
        if self.max_concurrent_jobs > Semaphore::MAX_PERMITS {
            return invalid("max_concurrent_jobs", "exceeds the worker pool limit");
        }
        if self.cancel_grace_millis == 0 {
            return invalid("cancel_grace_millis", "must be positive");
        }
        if self.default_max_queue_minutes == 0 {
            return invalid("default_max_queue_minutes", "must be positive");
        }
        if self.default_max_runtime_minutes == 0 {
            return invalid("default_max_runtime_minutes", "must be positive");
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.retention_minutes))
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_document_yields_defaults() {
        let config = TrackerConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.retention(), chrono::Duration::minutes(10));
    }

    #[test]
    fn partial_document_overrides_given_keys() {
        let config = TrackerConfig::from_toml_str(
            r#"
            retention_minutes = 30
            max_concurrent_jobs = 1
            notification_subject = "done"
            "#,
        )
        .unwrap();
        assert_eq!(config.retention_minutes, 30);
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.notification_subject, "done");
        assert_eq!(config.default_max_queue_minutes, DEFAULT_MAX_QUEUE_MINUTES);
    }

    #[rstest]
    #[case("sweep_interval_secs = 0", "sweep_interval_secs")]
    #[case("max_concurrent_jobs = 0", "max_concurrent_jobs")]
    #[case("cancel_grace_millis = 0", "cancel_grace_millis")]
    #[case("default_max_queue_minutes = 0", "default_max_queue_minutes")]
    #[case("default_max_runtime_minutes = 0", "default_max_runtime_minutes")]
    #[case("max_concurrent_jobs = 9223372036854775807", "max_concurrent_jobs")]
    fn out_of_range_values_are_rejected(#[case] doc: &str, #[case] expected: &str) {
        match TrackerConfig::from_toml_str(doc) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            TrackerConfig::from_toml_str("retention_minutes = \"ten\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
