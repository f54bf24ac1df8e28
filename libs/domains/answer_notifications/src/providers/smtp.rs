//! SMTP email provider implementation using lettre.
//!
//! Primarily intended for local development against Mailpit/MailHog, where
//! SES is not available.

use super::{EmailProvider, Sender};
use crate::error::DeliveryError;
use crate::models::{EmailMessage, MessageHandle};
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_flag, env_optional, env_or_default, env_parse_or};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, error, info};

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Optional for dev servers like Mailpit.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Whether to use TLS (false for local dev servers).
    pub use_tls: bool,
    pub sender: Sender,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16, sender: Sender) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            use_tls: false,
            sender,
        }
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl FromEnv for SmtpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("SMTP_HOST", "localhost"),
            port: env_parse_or("SMTP_PORT", 1025)?,
            username: env_optional("SMTP_USERNAME"),
            password: env_optional("SMTP_PASSWORD"),
            use_tls: env_flag("SMTP_USE_TLS"),
            sender: Sender::from_env()?,
        })
    }
}

/// Map an SMTP reply onto a delivery error kind.
///
/// `code` is the three-digit reply code when the server answered at all.
/// Authentication and sender-policy replies mean the sending identity is not
/// accepted; other permanent (5xx) replies are a rejection of the message or
/// recipient. Everything else, including 4xx replies and connection
/// failures, is transient.
pub fn classify_smtp_reply(code: Option<&str>, permanent: bool, message: String) -> DeliveryError {
    match code {
        Some("530") | Some("535") | Some("553") => DeliveryError::SenderNotVerified(message),
        _ if permanent => DeliveryError::Rejected(message),
        _ => DeliveryError::Transient(message),
    }
}

/// SMTP email provider.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> Result<Self, DeliveryError> {
        let transport = Self::build_transport(&config)?;
        Ok(Self { transport, config })
    }

    fn build_transport(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| DeliveryError::ConfigurationError(format!("Failed to create SMTP relay: {}", e)))?
        } else {
            // Plain connection for local dev servers like Mailpit
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let mut builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    fn build_message(&self, email: &EmailMessage) -> Result<Message, DeliveryError> {
        let from: Mailbox = self
            .config
            .sender
            .mailbox()
            .parse()
            .map_err(|e| DeliveryError::ConfigurationError(format!("Invalid from address: {}", e)))?;

        let to: Mailbox = email
            .recipient
            .parse()
            .map_err(|e| DeliveryError::Rejected(format!("Invalid recipient '{}': {}", email.recipient, e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| DeliveryError::ConfigurationError(format!("Failed to build email message: {}", e)))
    }
}

fn classify(err: &lettre::transport::smtp::Error) -> DeliveryError {
    let code = err.status().map(|c| c.to_string());
    classify_smtp_reply(code.as_deref(), err.is_permanent(), err.to_string())
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailMessage) -> Result<MessageHandle, DeliveryError> {
        debug!(
            to = %email.recipient,
            subject = %email.subject,
            host = %self.config.host,
            port = %self.config.port,
            "Sending email via SMTP"
        );

        let message = self.build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            let delivery = classify(&e);
            error!(to = %email.recipient, kind = delivery.kind(), error = %e, "Failed to send email via SMTP");
            delivery
        })?;

        let message_id = response.message().next().unwrap_or_default().to_string();

        info!(to = %email.recipient, message_id = %message_id, "Email sent successfully via SMTP");

        Ok(MessageHandle {
            provider: self.name().to_string(),
            message_id,
        })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeliveryError::Transient("SMTP server did not accept NOOP".to_string())),
            Err(e) => Err(classify(&e)),
        }
    }
}
