//! Dispatch metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder every
//! call is a no-op, so library users and tests need no setup.

use crate::error::Stage;
use metrics::{counter, histogram};
use std::time::Duration;

const EVENTS_TOTAL: &str = "answer_notifier_events_total";
const BATCHES_TOTAL: &str = "answer_notifier_batches_total";
const BATCH_DURATION: &str = "answer_notifier_batch_duration_seconds";

/// An email was handed to the provider.
pub fn event_sent() {
    counter!(EVENTS_TOTAL, "outcome" => "sent", "stage" => "done").increment(1);
}

/// The dedup record already existed.
pub fn event_duplicate() {
    counter!(EVENTS_TOTAL, "outcome" => "duplicate", "stage" => Stage::DedupCheck.label()).increment(1);
}

/// The event stopped at `stage`.
pub fn event_failed(stage: Stage) {
    counter!(EVENTS_TOTAL, "outcome" => "failed", "stage" => stage.label()).increment(1);
}

pub fn batch_completed(elapsed: Duration) {
    counter!(BATCHES_TOTAL).increment(1);
    histogram!(BATCH_DURATION).record(elapsed.as_secs_f64());
}
