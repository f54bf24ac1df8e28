//! AWS SES (Simple Email Service) provider
//!
//! Sends emails via the SES v2 API with the standard AWS credential chain
//! (environment, web identity, instance profile, shared credentials file).
//!
//! Environment:
//! - `AWS_SES_REGION` or `AWS_REGION` - SES region, `us-east-1` when unset
//! - `SES_CONFIGURATION_SET` - optional configuration set name
//! - `EMAIL_FROM_ADDRESS`, `EMAIL_FROM_NAME` - sender identity

use super::{EmailProvider, Sender};
use crate::error::DeliveryError;
use crate::models::{EmailMessage, MessageHandle};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::Client;
use aws_sdk_sesv2::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use core_config::{ConfigError, FromEnv, env_optional};
use tracing::{debug, error};

const CHARSET: &str = "UTF-8";
const DEFAULT_REGION: &str = "us-east-1";

/// SES settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SesConfig {
    pub region: String,
    pub configuration_set: Option<String>,
    pub sender: Sender,
}

impl FromEnv for SesConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            region: env_optional("AWS_SES_REGION")
                .or_else(|| env_optional("AWS_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            configuration_set: env_optional("SES_CONFIGURATION_SET"),
            sender: Sender::from_env()?,
        })
    }
}

/// AWS SES email provider
pub struct SesProvider {
    client: Client,
    sender: Sender,
    configuration_set: Option<String>,
}

impl SesProvider {
    /// Create a new SesProvider with an existing AWS SES client
    pub fn new(client: Client, sender: Sender, configuration_set: Option<String>) -> Self {
        Self {
            client,
            sender,
            configuration_set,
        }
    }

    /// Load the default AWS SDK config for the configured region.
    pub async fn from_config(config: SesConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region))
            .load()
            .await;

        Self::new(Client::new(&sdk_config), config.sender, config.configuration_set)
    }

    fn content(data: &str) -> Result<Content, DeliveryError> {
        Content::builder()
            .data(data)
            .charset(CHARSET)
            .build()
            .map_err(|e| DeliveryError::ConfigurationError(format!("Invalid SES content: {}", e)))
    }
}

/// Map an SES error code onto a delivery error kind.
///
/// Codes without a specific meaning, and errors with no code at all
/// (timeouts, dispatch failures), are transient.
pub fn classify_ses_error(code: Option<&str>, message: String) -> DeliveryError {
    match code {
        Some("MessageRejected") | Some("BadRequestException") | Some("BadRequest") => {
            DeliveryError::Rejected(message)
        }
        Some("MailFromDomainNotVerifiedException") | Some("MailFromDomainNotVerified") => {
            DeliveryError::SenderNotVerified(message)
        }
        Some("NotFoundException")
        | Some("NotFound")
        | Some("ConfigurationSetDoesNotExist")
        | Some("SendingPausedException")
        | Some("AccountSuspendedException") => DeliveryError::ConfigurationError(message),
        _ => DeliveryError::Transient(message),
    }
}

#[async_trait]
impl EmailProvider for SesProvider {
    async fn send(&self, email: &EmailMessage) -> Result<MessageHandle, DeliveryError> {
        let destination = Destination::builder().to_addresses(&email.recipient).build();

        let body = Body::builder()
            .text(Self::content(&email.text_body)?)
            .html(Self::content(&email.html_body)?)
            .build();

        let message = Message::builder()
            .subject(Self::content(&email.subject)?)
            .body(body)
            .build();

        let from_address = self.sender.mailbox();

        debug!(
            to = %email.recipient,
            subject = %email.subject,
            from = %from_address,
            "Sending email via AWS SES"
        );

        let response = self
            .client
            .send_email()
            .from_email_address(&from_address)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .set_configuration_set_name(self.configuration_set.clone())
            .send()
            .await
            .map_err(|e| {
                let delivery = classify_ses_error(e.code(), DisplayErrorContext(&e).to_string());
                error!(to = %email.recipient, kind = delivery.kind(), error = %delivery, "AWS SES send failed");
                delivery
            })?;

        let message_id = response.message_id().unwrap_or_default().to_string();

        debug!(message_id = %message_id, "Email sent successfully via AWS SES");

        Ok(MessageHandle {
            provider: self.name().to_string(),
            message_id,
        })
    }

    fn name(&self) -> &'static str {
        "aws-ses"
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        // GetAccount is a lightweight call that confirms credentials and access
        self.client
            .get_account()
            .send()
            .await
            .map_err(|e| classify_ses_error(e.code(), DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ses_error() {
        let cases = [
            (Some("MessageRejected"), "rejected"),
            (Some("BadRequestException"), "rejected"),
            (Some("MailFromDomainNotVerifiedException"), "sender_not_verified"),
            (Some("NotFoundException"), "configuration_error"),
            (Some("ConfigurationSetDoesNotExist"), "configuration_error"),
            (Some("SendingPausedException"), "configuration_error"),
            (Some("TooManyRequestsException"), "transient"),
            (Some("LimitExceededException"), "transient"),
            (None, "transient"),
        ];

        for (code, expected) in cases {
            let err = classify_ses_error(code, "boom".to_string());
            assert_eq!(err.kind(), expected, "code {code:?}");
        }
    }

    #[test]
    fn test_classify_keeps_message() {
        let err = classify_ses_error(Some("MessageRejected"), "Email address is not verified".to_string());
        assert_eq!(err, DeliveryError::Rejected("Email address is not verified".to_string()));
    }

    #[test]
    fn test_ses_config_from_env() {
        temp_env::with_vars(
            [
                ("AWS_SES_REGION", None),
                ("AWS_REGION", Some("eu-west-1")),
                ("SES_CONFIGURATION_SET", Some("answers")),
                ("EMAIL_FROM_ADDRESS", Some("noreply@qa.local")),
                ("EMAIL_FROM_NAME", None),
            ],
            || {
                let config = SesConfig::from_env().unwrap();
                assert_eq!(config.region, "eu-west-1");
                assert_eq!(config.configuration_set.as_deref(), Some("answers"));
                assert_eq!(config.sender, Sender::new("noreply@qa.local"));
            },
        );
    }

    #[test]
    fn test_ses_region_defaults() {
        temp_env::with_vars_unset(["AWS_SES_REGION", "AWS_REGION"], || {
            assert_eq!(SesConfig::from_env().unwrap().region, "us-east-1");
        });
    }
}
