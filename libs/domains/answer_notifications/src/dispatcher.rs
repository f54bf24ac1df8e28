//! Per-event pipeline: parse, render, claim the dedup key, send.
//!
//! A failure at any stage ends that event only; the batch always runs to
//! completion.

use crate::dedup::{DEFAULT_KEY_PREFIX, DedupRecord, DedupStore, dedup_key};
use crate::error::{DeliveryError, DispatchError};
use crate::metrics;
use crate::models::MessageHandle;
use crate::parser::EventParser;
use crate::providers::EmailProvider;
use crate::templates::TemplateEngine;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Namespace prepended to every dedup key.
    pub dedup_key_prefix: String,
    /// Bound on each dedup store and provider call.
    pub call_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            dedup_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            call_timeout: Duration::from_millis(5_000),
        }
    }
}

impl FromEnv for DispatcherConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dedup_key_prefix: env_or_default("DEDUP_KEY_PREFIX", DEFAULT_KEY_PREFIX),
            call_timeout: Duration::from_millis(env_parse_or("EXTERNAL_CALL_TIMEOUT_MS", 5_000u64)?),
        })
    }
}

/// What happened to one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// The provider accepted the email.
    Sent(MessageHandle),
    /// The email had already been sent (or claimed) under `key`.
    Duplicate { key: String },
    Failed(DispatchError),
}

impl EventOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, EventOutcome::Sent(_))
    }
}

/// Summary of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub sent: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// One entry per input record, in input order.
    pub outcomes: Vec<EventOutcome>,
}

impl BatchReport {
    fn record(&mut self, outcome: EventOutcome) {
        self.total += 1;
        match &outcome {
            EventOutcome::Sent(_) => self.sent += 1,
            EventOutcome::Duplicate { .. } => self.duplicates += 1,
            EventOutcome::Failed(_) => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Orchestrates parsing, rendering, deduplication and delivery.
///
/// All collaborators are constructed once at start-up and shared read-only.
#[derive(Clone)]
pub struct Dispatcher {
    parser: Arc<dyn EventParser>,
    templates: Arc<TemplateEngine>,
    store: Arc<dyn DedupStore>,
    provider: Arc<dyn EmailProvider>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        parser: Arc<dyn EventParser>,
        templates: Arc<TemplateEngine>,
        store: Arc<dyn DedupStore>,
        provider: Arc<dyn EmailProvider>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            parser,
            templates,
            store,
            provider,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Process one raw record. Never panics and never returns early for the
    /// caller: every failure is folded into `EventOutcome::Failed`.
    pub async fn dispatch(&self, raw: &str) -> EventOutcome {
        match self.process(raw).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(stage = %err.stage(), error = %err, "Dropping notification");
                metrics::event_failed(err.stage());
                EventOutcome::Failed(err)
            }
        }
    }

    /// Process records sequentially, in order.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn dispatch_batch<S: AsRef<str>>(&self, records: &[S]) -> BatchReport {
        let started = Instant::now();
        let mut report = BatchReport::default();

        for raw in records {
            report.record(self.dispatch(raw.as_ref()).await);
        }

        report.elapsed = started.elapsed();
        metrics::batch_completed(report.elapsed);

        info!(
            total = report.total,
            sent = report.sent,
            duplicates = report.duplicates,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Batch dispatched"
        );

        report
    }

    async fn process(&self, raw: &str) -> Result<EventOutcome, DispatchError> {
        let event = self.parser.parse(raw)?;
        let email = self.templates.render(&event)?;

        let key = dedup_key(&self.config.dedup_key_prefix, &email);
        let record = DedupRecord::new(key.clone(), event.kind, &email);

        // Check and persist in one atomic claim.
        let created = timeout(self.config.call_timeout, self.store.insert_if_absent(&record))
            .await
            .map_err(|_| {
                DispatchError::DedupLookupFailure(format!(
                    "dedup store timed out after {}ms",
                    self.config.call_timeout.as_millis()
                ))
            })??;

        if !created {
            info!(key = %key, kind = event.kind.label(), answer_id = %event.answer_id, "Duplicate notification skipped");
            metrics::event_duplicate();
            return Ok(EventOutcome::Duplicate { key });
        }

        debug!(key = %key, "Dedup record written");

        // The record stays if the send fails; no retry.
        let handle = timeout(self.config.call_timeout, self.provider.send(&email))
            .await
            .map_err(|_| {
                DeliveryError::Transient(format!(
                    "provider timed out after {}ms",
                    self.config.call_timeout.as_millis()
                ))
            })??;

        info!(
            to = %email.recipient,
            kind = event.kind.label(),
            answer_id = %event.answer_id,
            message_id = %handle,
            "Notification sent"
        );
        metrics::event_sent();

        Ok(EventOutcome::Sent(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::MockDedupStore;
    use crate::error::{DedupError, ParseError, Stage};
    use crate::parser::PositionalEventParser;
    use crate::providers::MockEmailProvider;
    use crate::templates::Branding;
    use async_trait::async_trait;

    const CREATED: &str = "create answer,1,meaning of cat,Jane,Jenny,jane@x.com,1,lovely,http://x/q/1/a/1";

    fn dispatcher(store: impl DedupStore + 'static, provider: impl EmailProvider + 'static) -> Dispatcher {
        Dispatcher::new(
            Arc::new(PositionalEventParser::new()),
            Arc::new(TemplateEngine::new(Branding::default()).unwrap()),
            Arc::new(store),
            Arc::new(provider),
            DispatcherConfig::default(),
        )
    }

    fn handle() -> MessageHandle {
        MessageHandle {
            provider: "mock".to_string(),
            message_id: "m-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sends_new_message() {
        let mut store = MockDedupStore::new();
        store
            .expect_insert_if_absent()
            .withf(|record| record.key.starts_with(DEFAULT_KEY_PREFIX) && record.recipient == "jane@x.com")
            .times(1)
            .returning(|_| Ok(true));

        let mut provider = MockEmailProvider::new();
        provider
            .expect_send()
            .withf(|email| email.recipient == "jane@x.com" && email.subject.contains("meaning of cat"))
            .times(1)
            .returning(|_| Ok(handle()));

        let outcome = dispatcher(store, provider).dispatch(CREATED).await;
        assert_eq!(outcome, EventOutcome::Sent(handle()));
    }

    #[tokio::test]
    async fn test_duplicate_is_not_sent() {
        let mut store = MockDedupStore::new();
        store.expect_insert_if_absent().times(1).returning(|_| Ok(false));

        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();

        let outcome = dispatcher(store, provider).dispatch(CREATED).await;
        assert!(matches!(outcome, EventOutcome::Duplicate { ref key } if key.starts_with(DEFAULT_KEY_PREFIX)));
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_closed() {
        let mut store = MockDedupStore::new();
        store
            .expect_insert_if_absent()
            .returning(|_| Err(DedupError::Lookup("connection refused".to_string())));

        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();

        let outcome = dispatcher(store, provider).dispatch(CREATED).await;
        match outcome {
            EventOutcome::Failed(err) => {
                assert_eq!(err.stage(), Stage::DedupCheck);
                assert!(matches!(err, DispatchError::DedupLookupFailure(_)));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_persist_failure_aborts_send() {
        let mut store = MockDedupStore::new();
        store
            .expect_insert_if_absent()
            .returning(|_| Err(DedupError::Persist("READONLY".to_string())));

        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();

        let outcome = dispatcher(store, provider).dispatch(CREATED).await;
        assert_eq!(
            outcome,
            EventOutcome::Failed(DispatchError::PersistFailure("READONLY".to_string()))
        );
    }

    #[tokio::test]
    async fn test_provider_errors_surface_their_kind() {
        let errors = [
            DeliveryError::Rejected("bad recipient".to_string()),
            DeliveryError::SenderNotVerified("unverified".to_string()),
            DeliveryError::ConfigurationError("no config set".to_string()),
            DeliveryError::Transient("throttled".to_string()),
        ];

        for error in errors {
            let mut store = MockDedupStore::new();
            store.expect_insert_if_absent().returning(|_| Ok(true));

            let mut provider = MockEmailProvider::new();
            let returned = error.clone();
            provider.expect_send().times(1).returning(move |_| Err(returned.clone()));

            let outcome = dispatcher(store, provider).dispatch(CREATED).await;
            assert_eq!(outcome, EventOutcome::Failed(DispatchError::Delivery(error)));
        }
    }

    #[tokio::test]
    async fn test_malformed_event_touches_nothing() {
        let mut store = MockDedupStore::new();
        store.expect_insert_if_absent().never();
        store.expect_exists().never();
        store.expect_insert().never();

        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();

        let dispatcher = dispatcher(store, provider);

        let nine_fields = "delete answer,1,meaning of cat,Jane,Jenny,jane@x.com,1,lovely,http://x";
        let outcome = dispatcher.dispatch(nine_fields).await;
        assert!(matches!(
            outcome,
            EventOutcome::Failed(DispatchError::Parse(ParseError::MalformedEvent(_)))
        ));

        let outcome = dispatcher.dispatch("answer deleted,1").await;
        assert!(matches!(
            outcome,
            EventOutcome::Failed(DispatchError::Parse(ParseError::UnrecognizedEventKind(_)))
        ));
    }

    struct StalledStore;

    #[async_trait]
    impl DedupStore for StalledStore {
        async fn exists(&self, _key: &str) -> Result<bool, DedupError> {
            std::future::pending().await
        }

        async fn insert(&self, _record: &DedupRecord) -> Result<(), DedupError> {
            std::future::pending().await
        }

        async fn insert_if_absent(&self, _record: &DedupRecord) -> Result<bool, DedupError> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_store_timeout_fails_closed() {
        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();

        let mut dispatcher = dispatcher(StalledStore, provider);
        dispatcher.config.call_timeout = Duration::from_millis(20);

        let outcome = dispatcher.dispatch(CREATED).await;
        assert!(matches!(
            outcome,
            EventOutcome::Failed(DispatchError::DedupLookupFailure(ref msg)) if msg.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let mut store = MockDedupStore::new();
        store.expect_insert_if_absent().times(2).returning(|_| Ok(true));

        let mut provider = MockEmailProvider::new();
        provider.expect_send().times(2).returning(|_| Ok(handle()));

        let records = [
            CREATED,
            "garbage",
            "delete answer,1,meaning of cat,Jane,Jenny,jane@x.com,1,lovely",
        ];
        let report = dispatcher(store, provider).dispatch_batch(&records).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.duplicates, 0);
        assert!(report.outcomes[0].is_sent());
        assert!(matches!(report.outcomes[1], EventOutcome::Failed(_)));
        assert!(report.outcomes[2].is_sent());
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [("DEDUP_KEY_PREFIX", Some("qa:sent:")), ("EXTERNAL_CALL_TIMEOUT_MS", Some("250"))],
            || {
                let config = DispatcherConfig::from_env().unwrap();
                assert_eq!(config.dedup_key_prefix, "qa:sent:");
                assert_eq!(config.call_timeout, Duration::from_millis(250));
            },
        );

        temp_env::with_vars_unset(["DEDUP_KEY_PREFIX", "EXTERNAL_CALL_TIMEOUT_MS"], || {
            assert_eq!(DispatcherConfig::from_env().unwrap(), DispatcherConfig::default());
        });
    }
}
