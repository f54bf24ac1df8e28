//! Provider that records messages instead of delivering them.

use super::EmailProvider;
use crate::error::DeliveryError;
use crate::models::{EmailMessage, MessageHandle};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Captures every accepted message; can be scripted to fail.
///
/// Used by tests and as a dry-run provider.
#[derive(Clone, Default)]
pub struct RecordingProvider {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failure: Option<DeliveryError>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose every send fails with `error`.
    pub fn failing(error: DeliveryError) -> Self {
        Self {
            sent: Arc::default(),
            failure: Some(error),
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn was_sent_to(&self, recipient: &str) -> bool {
        self.sent.lock().await.iter().any(|e| e.recipient == recipient)
    }
}

#[async_trait]
impl EmailProvider for RecordingProvider {
    async fn send(&self, email: &EmailMessage) -> Result<MessageHandle, DeliveryError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let mut sent = self.sent.lock().await;
        sent.push(email.clone());

        Ok(MessageHandle {
            provider: self.name().to_string(),
            message_id: format!("recorded-{}", sent.len()),
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> EmailMessage {
        EmailMessage {
            recipient: "jane@x.com".to_string(),
            subject: "s".to_string(),
            html_body: "h".to_string(),
            text_body: "t".to_string(),
        }
    }

    #[tokio::test]
    async fn test_records_sent_messages() {
        let provider = RecordingProvider::new();

        let handle = provider.send(&email()).await.unwrap();

        assert_eq!(handle.message_id, "recorded-1");
        assert_eq!(provider.sent_count().await, 1);
        assert!(provider.was_sent_to("jane@x.com").await);
        assert!(provider.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_provider_records_nothing() {
        let provider = RecordingProvider::failing(DeliveryError::SenderNotVerified("nope".into()));

        let err = provider.send(&email()).await.unwrap_err();

        assert_eq!(err.kind(), "sender_not_verified");
        assert_eq!(provider.sent_count().await, 0);
        assert!(provider.health_check().await.is_err());
    }
}
