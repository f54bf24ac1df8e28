//! Answer Notifications Domain
//!
//! Turns "answer changed" notifications from the Q&A service into emails to
//! the question's author, sending each distinct email at most once.
//!
//! # Architecture
//!
//! ```text
//! raw record ──► EventParser ──► TemplateEngine ──► DedupStore ──► EmailProvider
//!                 ChangeEvent      EmailMessage     insert-if-absent   SES / SMTP
//! ```
//!
//! The `Dispatcher` runs that pipeline once per record. Failures are scoped to
//! the record: a batch always runs to completion and reports one
//! `EventOutcome` per input.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_answer_notifications::{
//!     Branding, Dispatcher, DispatcherConfig, InMemoryDedupStore, PositionalEventParser,
//!     RecordingProvider, TemplateEngine,
//! };
//! use std::sync::Arc;
//!
//! let dispatcher = Dispatcher::new(
//!     Arc::new(PositionalEventParser::new()),
//!     Arc::new(TemplateEngine::new(Branding::default())?),
//!     Arc::new(InMemoryDedupStore::new()),
//!     Arc::new(RecordingProvider::new()),
//!     DispatcherConfig::default(),
//! );
//!
//! let report = dispatcher.dispatch_batch(&records).await;
//! ```

pub mod dedup;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod providers;
pub mod templates;
pub mod trigger;

// Re-export commonly used types
pub use dedup::{DedupRecord, DedupStore, InMemoryDedupStore, RedisDedupStore, dedup_key};
pub use dispatcher::{BatchReport, Dispatcher, DispatcherConfig, EventOutcome};
pub use error::{
    DedupError, DeliveryError, DispatchError, ParseError, Stage, TemplateError, TriggerError,
};
pub use models::{ChangeEvent, EmailMessage, EventKind, MessageHandle};
pub use parser::{EventParser, PositionalEventParser};
pub use providers::{
    EmailProvider, ProviderConfig, ProviderKind, RecordingProvider, Sender, SesProvider,
    SmtpProvider, build_provider,
};
pub use templates::{Branding, TemplateEngine};
pub use trigger::decode_sns_event;
