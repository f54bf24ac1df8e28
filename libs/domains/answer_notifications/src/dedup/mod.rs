//! At-most-once bookkeeping for sent emails.
//!
//! A record for key `K` means the email behind `K` was sent or is being sent.
//! Records are written before the send and never updated or deleted.

mod memory;
mod redis;

pub use self::memory::InMemoryDedupStore;
pub use self::redis::RedisDedupStore;

use crate::error::DedupError;
use crate::models::{EmailMessage, EventKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default namespace for dedup keys.
pub const DEFAULT_KEY_PREFIX: &str = "notifier:sent:";

/// Derive the dedup key for a rendered email: `prefix` followed by the
/// lowercase hex SHA-256 of the text body.
pub fn dedup_key(prefix: &str, email: &EmailMessage) -> String {
    let digest = Sha256::digest(email.text_body.as_bytes());
    let mut key = String::with_capacity(prefix.len() + digest.len() * 2);
    key.push_str(prefix);
    for byte in digest {
        key.push_str(&format!("{:02x}", byte));
    }
    key
}

/// What gets stored under a dedup key, for operators inspecting the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub key: String,
    pub recipient: String,
    pub subject: String,
    pub kind: EventKind,
    pub recorded_at: DateTime<Utc>,
}

impl DedupRecord {
    pub fn new(key: impl Into<String>, kind: EventKind, email: &EmailMessage) -> Self {
        Self {
            key: key.into(),
            recipient: email.recipient.clone(),
            subject: email.subject.clone(),
            kind,
            recorded_at: Utc::now(),
        }
    }
}

/// Key-value existence store with strong read-after-write consistency.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// `true` only if a prior insert of `key` completed. Lookup failures are
    /// `DedupError::Lookup`, never `Ok(false)`.
    async fn exists(&self, key: &str) -> Result<bool, DedupError>;

    /// Insert the record; inserting an existing key is not an error.
    async fn insert(&self, record: &DedupRecord) -> Result<(), DedupError>;

    /// Atomically insert the record if its key is absent.
    ///
    /// Returns `true` when this call created the record, `false` when it was
    /// already present.
    async fn insert_if_absent(&self, record: &DedupRecord) -> Result<bool, DedupError>;

    /// Store name for logs.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(text: &str) -> EmailMessage {
        EmailMessage {
            recipient: "jane@x.com".to_string(),
            subject: "subject".to_string(),
            html_body: "<p>html</p>".to_string(),
            text_body: text.to_string(),
        }
    }

    #[test]
    fn test_dedup_key_format() {
        let key = dedup_key(DEFAULT_KEY_PREFIX, &email("hello"));

        assert_eq!(
            key,
            "notifier:sent:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_dedup_key_depends_only_on_text_body() {
        let a = email("Hi Jane, lovely");
        let mut b = a.clone();
        b.html_body = "<p>different</p>".to_string();
        b.subject = "different".to_string();

        assert_eq!(dedup_key("p:", &a), dedup_key("p:", &b));
        assert_ne!(dedup_key("p:", &a), dedup_key("p:", &email("Hi Jane, lovelier")));
        assert_ne!(dedup_key("p:", &a), dedup_key("q:", &a));
    }

    #[test]
    fn test_record_serializes_for_operators() {
        let record = DedupRecord::new("k", EventKind::Updated, &email("x"));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["recipient"], "jane@x.com");
        assert_eq!(json["kind"], "updated");
        assert!(json["recorded_at"].is_string());
    }
}
