//! Service configuration.

use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_parse_or};
use std::str::FromStr;
use strum::{Display, EnumString};
use uuid::Uuid;

/// How records reach the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mode {
    /// Long-running Redis Stream consumer.
    Stream,
    /// One SNS-shaped document on stdin, then exit.
    Stdin,
}

/// Redis Stream source settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub stream_name: String,
    pub consumer_group: String,
    /// Stable across restarts so this consumer can resume its own pending entries.
    pub consumer_id: String,
    pub batch_size: usize,
    pub block_ms: u64,
}

impl StreamConfig {
    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
            consumer_id: format!("notifier-{}", Uuid::new_v4()),
            batch_size: 10,
            block_ms: 1_000,
        }
    }
}

impl FromEnv for StreamConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let consumer_id = env_optional("NOTIFIER_CONSUMER_ID")
            .or_else(|| env_optional("HOSTNAME"))
            .unwrap_or_else(|| format!("notifier-{}", Uuid::new_v4()));

        let batch_size = env_parse_or("NOTIFIER_BATCH_SIZE", 10usize)?;
        if batch_size == 0 {
            return Err(ConfigError::ParseError {
                key: "NOTIFIER_BATCH_SIZE".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            stream_name: env_or_default("NOTIFIER_STREAM_NAME", "qa:answer-events"),
            consumer_group: env_or_default("NOTIFIER_CONSUMER_GROUP", "answer_notifiers"),
            consumer_id,
            batch_size,
            block_ms: env_parse_or("NOTIFIER_BLOCK_MS", 1_000u64)?,
        })
    }
}

/// Top-level settings of the binary.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub mode: Mode,
    pub stream: StreamConfig,
    pub health_port: u16,
}

impl FromEnv for NotifierConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_mode = env_or_default("NOTIFIER_MODE", "stream");
        let mode = Mode::from_str(raw_mode.trim()).map_err(|_| ConfigError::ParseError {
            key: "NOTIFIER_MODE".to_string(),
            details: format!("expected 'stream' or 'stdin', got '{}'", raw_mode),
        })?;

        Ok(Self {
            mode,
            stream: StreamConfig::from_env()?,
            health_port: env_parse_or("NOTIFIER_HEALTH_PORT", 8083u16)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 9] = [
        "NOTIFIER_MODE",
        "NOTIFIER_STREAM_NAME",
        "NOTIFIER_CONSUMER_GROUP",
        "NOTIFIER_CONSUMER_ID",
        "HOSTNAME",
        "NOTIFIER_BATCH_SIZE",
        "NOTIFIER_BLOCK_MS",
        "NOTIFIER_HEALTH_PORT",
        "APP_ENV",
    ];

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(VARS, || {
            let config = NotifierConfig::from_env().unwrap();
            assert_eq!(config.mode, Mode::Stream);
            assert_eq!(config.health_port, 8083);
            assert_eq!(config.stream.stream_name, "qa:answer-events");
            assert_eq!(config.stream.consumer_group, "answer_notifiers");
            assert!(config.stream.consumer_id.starts_with("notifier-"));
            assert_eq!(config.stream.batch_size, 10);
            assert_eq!(config.stream.block_ms, 1_000);
        });
    }

    #[test]
    fn test_consumer_id_falls_back_to_hostname() {
        temp_env::with_vars(
            [("NOTIFIER_CONSUMER_ID", None), ("HOSTNAME", Some("notifier-7d9f"))],
            || {
                assert_eq!(StreamConfig::from_env().unwrap().consumer_id, "notifier-7d9f");
            },
        );
    }

    #[test]
    fn test_stdin_mode() {
        temp_env::with_var("NOTIFIER_MODE", Some("STDIN"), || {
            assert_eq!(NotifierConfig::from_env().unwrap().mode, Mode::Stdin);
        });
    }

    #[test]
    fn test_invalid_values() {
        temp_env::with_var("NOTIFIER_MODE", Some("lambda"), || {
            assert!(NotifierConfig::from_env().is_err());
        });
        temp_env::with_var("NOTIFIER_BATCH_SIZE", Some("0"), || {
            assert!(StreamConfig::from_env().is_err());
        });
        temp_env::with_var("NOTIFIER_HEALTH_PORT", Some("99999"), || {
            assert!(NotifierConfig::from_env().is_err());
        });
    }
}
