//! Error types for the answer notifications domain.
//!
//! Every error here is scoped to a single event except [`TriggerError`],
//! which rejects a whole batch document.

use strum::{AsRefStr, Display, IntoStaticStr};
use thiserror::Error;

/// Why a raw notification record could not become a `ChangeEvent`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Field 0 is not one of the recognised kind phrases.
    #[error("Unrecognized event kind: '{0}'")]
    UnrecognizedEventKind(String),

    /// Wrong field count or an empty required field.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
}

/// Template registration or rendering failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Template rendering error: {0}")]
pub struct TemplateError(pub String);

impl From<handlebars::RenderError> for TemplateError {
    fn from(err: handlebars::RenderError) -> Self {
        TemplateError(err.to_string())
    }
}

/// Dedup store failures, split by the operation that failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DedupError {
    /// Existence of the key could not be determined.
    #[error("Dedup lookup failed: {0}")]
    Lookup(String),

    /// The record could not be written.
    #[error("Dedup persist failed: {0}")]
    Persist(String),
}

/// Provider failures, classified so callers never inspect provider-specific
/// error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The provider refused the content or the recipient.
    #[error("Delivery rejected: {0}")]
    Rejected(String),

    /// The sending identity is not authorised.
    #[error("Sender not verified: {0}")]
    SenderNotVerified(String),

    /// The delivery configuration is invalid.
    #[error("Delivery configuration error: {0}")]
    ConfigurationError(String),

    /// Anything else: network, throttling, timeouts.
    #[error("Transient delivery failure: {0}")]
    Transient(String),
}

impl DeliveryError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Rejected(_) => "rejected",
            DeliveryError::SenderNotVerified(_) => "sender_not_verified",
            DeliveryError::ConfigurationError(_) => "configuration_error",
            DeliveryError::Transient(_) => "transient",
        }
    }
}

/// The pipeline stage an event stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Parsing,
    Rendering,
    DedupCheck,
    Persisting,
    Sending,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        self.into()
    }
}

/// Per-event dispatch failure. Never fatal to the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Render(#[from] TemplateError),

    /// Fail closed: existence unknown, so the email is not sent.
    #[error("Dedup lookup failed, email not sent: {0}")]
    DedupLookupFailure(String),

    /// The record was not written, so the email is not sent.
    #[error("Dedup persist failed, email not sent: {0}")]
    PersistFailure(String),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl DispatchError {
    pub fn stage(&self) -> Stage {
        match self {
            DispatchError::Parse(_) => Stage::Parsing,
            DispatchError::Render(_) => Stage::Rendering,
            DispatchError::DedupLookupFailure(_) => Stage::DedupCheck,
            DispatchError::PersistFailure(_) => Stage::Persisting,
            DispatchError::Delivery(_) => Stage::Sending,
        }
    }
}

impl From<DedupError> for DispatchError {
    fn from(err: DedupError) -> Self {
        match err {
            DedupError::Lookup(msg) => DispatchError::DedupLookupFailure(msg),
            DedupError::Persist(msg) => DispatchError::PersistFailure(msg),
        }
    }
}

/// The trigger document itself is unusable; fatal to the invocation.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Malformed notification batch: {0}")]
    MalformedBatch(String),
}

impl From<serde_json::Error> for TriggerError {
    fn from(err: serde_json::Error) -> Self {
        TriggerError::MalformedBatch(err.to_string())
    }
}
