//! Email provider implementations.
//!
//! This module contains the `EmailProvider` trait and the concrete
//! delivery backends. Providers classify their own failures into
//! `DeliveryError` so callers never see SDK or transport error types.

mod recording;
mod ses;
mod smtp;

pub use recording::RecordingProvider;
pub use ses::{SesConfig, SesProvider, classify_ses_error};
pub use smtp::{SmtpConfig, SmtpProvider, classify_smtp_reply};

use crate::error::DeliveryError;
use crate::models::{EmailMessage, MessageHandle};
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_optional, env_or_default};
use std::str::FromStr;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumString};

/// Default sending identity.
pub const DEFAULT_FROM_ADDRESS: &str = "update@prod.bh7cw.me";

/// Trait for email sending providers.
///
/// One call sends one message to one recipient. No retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email.
    async fn send(&self, email: &EmailMessage) -> Result<MessageHandle, DeliveryError>;

    /// Get the provider name for logging.
    fn name(&self) -> &'static str;

    /// Check that the provider is reachable and configured.
    async fn health_check(&self) -> Result<(), DeliveryError>;
}

/// The fixed sender identity for every outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub address: String,
    pub name: Option<String>,
}

impl Sender {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `Name <address>` when a display name is set, the bare address otherwise.
    pub fn mailbox(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, self.address),
            _ => self.address.clone(),
        }
    }
}

impl Default for Sender {
    fn default() -> Self {
        Self::new(DEFAULT_FROM_ADDRESS)
    }
}

impl FromEnv for Sender {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            address: env_or_default("EMAIL_FROM_ADDRESS", DEFAULT_FROM_ADDRESS),
            name: env_optional("EMAIL_FROM_NAME"),
        })
    }
}

/// Which delivery backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    Ses,
    Smtp,
    /// Dry run: nothing leaves the process.
    Recording,
}

/// Provider selection plus the settings of the selected backend.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Ses(SesConfig),
    Smtp(SmtpConfig),
    Recording,
}

impl FromEnv for ProviderConfig {
    /// `EMAIL_PROVIDER` picks the backend, `ses` when unset.
    fn from_env() -> Result<Self, ConfigError> {
        let raw = env_or_default("EMAIL_PROVIDER", "ses");
        let kind = ProviderKind::from_str(raw.trim()).map_err(|_| ConfigError::ParseError {
            key: "EMAIL_PROVIDER".to_string(),
            details: format!("expected 'ses', 'smtp' or 'recording', got '{}'", raw),
        })?;

        Ok(match kind {
            ProviderKind::Ses => ProviderConfig::Ses(SesConfig::from_env()?),
            ProviderKind::Smtp => ProviderConfig::Smtp(SmtpConfig::from_env()?),
            ProviderKind::Recording => ProviderConfig::Recording,
        })
    }
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::Ses(_) => ProviderKind::Ses,
            ProviderConfig::Smtp(_) => ProviderKind::Smtp,
            ProviderConfig::Recording => ProviderKind::Recording,
        }
    }
}

/// Construct the configured provider. Called once at start-up; the result is
/// shared by every dispatch.
pub async fn build_provider(config: ProviderConfig) -> Result<Arc<dyn EmailProvider>, DeliveryError> {
    let provider: Arc<dyn EmailProvider> = match config {
        ProviderConfig::Ses(ses) => Arc::new(SesProvider::from_config(ses).await),
        ProviderConfig::Smtp(smtp) => Arc::new(SmtpProvider::new(smtp)?),
        ProviderConfig::Recording => Arc::new(RecordingProvider::new()),
    };
    Ok(provider)
}
