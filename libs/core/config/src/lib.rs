pub mod redis;
pub mod tracing;

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Application environment (dev = local/kind, prod = deployed)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Name and version of the running binary, reported by health endpoints.
#[derive(Clone, Debug)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Capture the calling crate's package name and version.
#[macro_export]
macro_rules! app_info {
    () => {
        $crate::AppInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    };
}

/// Helper to load and parse environment variable with a default value
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Helper to load and parse environment variable or return error
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Optional variable; unset and empty are both `None`.
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable into `T`, falling back to `default` when unset.
///
/// A set but unparsable value is an error rather than a silent default.
pub fn env_parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Boolean flag: `true`/`1`/`yes` (any case) are true, anything else false.
pub fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.is_production());
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        temp_env::with_var("APP_ENV", Some("PRODUCTION"), || {
            assert_eq!(Environment::from_env(), Environment::Production);
        });

        temp_env::with_var("APP_ENV", Some("staging"), || {
            assert_eq!(Environment::from_env(), Environment::Development);
        });
    }

    #[test]
    fn test_env_or_default() {
        temp_env::with_var("NOTIFIER_TEST_VAR", Some("value"), || {
            assert_eq!(env_or_default("NOTIFIER_TEST_VAR", "default"), "value");
        });
        temp_env::with_var_unset("NOTIFIER_TEST_VAR", || {
            assert_eq!(env_or_default("NOTIFIER_TEST_VAR", "default"), "default");
        });
    }

    #[test]
    fn test_env_required_missing() {
        temp_env::with_var_unset("MISSING_REQUIRED", || {
            let err = env_required("MISSING_REQUIRED").unwrap_err();
            assert!(err.to_string().contains("MISSING_REQUIRED"));
            assert!(err.to_string().contains("required"));
        });
    }

    #[test]
    fn test_env_optional_treats_blank_as_unset() {
        temp_env::with_var("NOTIFIER_OPTIONAL", Some("  "), || {
            assert_eq!(env_optional("NOTIFIER_OPTIONAL"), None);
        });
        temp_env::with_var("NOTIFIER_OPTIONAL", Some("set"), || {
            assert_eq!(env_optional("NOTIFIER_OPTIONAL").as_deref(), Some("set"));
        });
    }

    #[test]
    fn test_env_parse_or() {
        temp_env::with_var_unset("NOTIFIER_BATCH", || {
            assert_eq!(env_parse_or("NOTIFIER_BATCH", 10usize).unwrap(), 10);
        });
        temp_env::with_var("NOTIFIER_BATCH", Some(" 25 "), || {
            assert_eq!(env_parse_or("NOTIFIER_BATCH", 10usize).unwrap(), 25);
        });
        temp_env::with_var("NOTIFIER_BATCH", Some("lots"), || {
            let err = env_parse_or("NOTIFIER_BATCH", 10usize).unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "NOTIFIER_BATCH"));
        });
    }

    #[test]
    fn test_env_flag() {
        temp_env::with_var("NOTIFIER_FLAG", Some("TRUE"), || assert!(env_flag("NOTIFIER_FLAG")));
        temp_env::with_var("NOTIFIER_FLAG", Some("1"), || assert!(env_flag("NOTIFIER_FLAG")));
        temp_env::with_var("NOTIFIER_FLAG", Some("off"), || assert!(!env_flag("NOTIFIER_FLAG")));
        temp_env::with_var_unset("NOTIFIER_FLAG", || assert!(!env_flag("NOTIFIER_FLAG")));
    }

    #[test]
    fn test_app_info_macro() {
        let info = app_info!();
        assert_eq!(info.name, "core_config");
        assert!(!info.version.is_empty());
    }
}
