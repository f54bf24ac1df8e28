//! Email template rendering engine.
//!
//! One Handlebars template pair (HTML and plain text) per event kind. HTML
//! bodies escape interpolated values; text bodies are registered in a second
//! registry with escaping disabled. Both registries run in strict mode, so a
//! missing variable is a render error rather than an empty string.

use crate::error::TemplateError;
use crate::models::{ChangeEvent, EmailMessage, EventKind};
use core_config::{ConfigError, FromEnv, env_or_default};
use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Site and footer details that appear in every email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branding {
    pub site_name: String,
    pub footer_provider_name: String,
    pub footer_provider_url: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            site_name: "bh7cw.me".to_string(),
            footer_provider_name: "Amazon SES".to_string(),
            footer_provider_url: "https://aws.amazon.com/ses/".to_string(),
        }
    }
}

impl FromEnv for Branding {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            site_name: env_or_default("SITE_NAME", &defaults.site_name),
            footer_provider_name: env_or_default("FOOTER_PROVIDER_NAME", &defaults.footer_provider_name),
            footer_provider_url: env_or_default("FOOTER_PROVIDER_URL", &defaults.footer_provider_url),
        })
    }
}

/// Values handed to the templates.
#[derive(Serialize)]
struct TemplateData<'a> {
    first_name: &'a str,
    question_id: &'a str,
    question_text: &'a str,
    answer_id: &'a str,
    answer_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail_link: Option<&'a str>,
    #[serde(flatten)]
    branding: &'a Branding,
}

/// Template engine for answer notification emails.
pub struct TemplateEngine {
    html: Arc<Handlebars<'static>>,
    text: Arc<Handlebars<'static>>,
    branding: Branding,
}

impl TemplateEngine {
    /// Create a template engine with all templates registered.
    pub fn new(branding: Branding) -> Result<Self, TemplateError> {
        let mut html = Handlebars::new();
        html.set_strict_mode(true);

        let mut text = Handlebars::new();
        text.set_strict_mode(true);
        text.register_escape_fn(handlebars::no_escape);

        for kind in [EventKind::Created, EventKind::Updated, EventKind::Deleted] {
            let (html_source, text_source) = sources(kind);
            register(&mut html, kind, html_source)?;
            register(&mut text, kind, text_source)?;
        }

        Ok(Self {
            html: Arc::new(html),
            text: Arc::new(text),
            branding,
        })
    }

    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    /// Render the email for one event.
    ///
    /// Deterministic: the same event always yields a byte-identical message.
    pub fn render(&self, event: &ChangeEvent) -> Result<EmailMessage, TemplateError> {
        debug!(kind = event.kind.label(), question_id = %event.question_id, answer_id = %event.answer_id, "Rendering answer notification");

        if event.kind.has_detail_link() && event.detail_link.is_none() {
            return Err(TemplateError(format!("'{}' event has no detail link", event.kind)));
        }

        let data = TemplateData {
            first_name: &event.user_first_name,
            question_id: &event.question_id,
            question_text: &event.question_text,
            answer_id: &event.answer_id,
            answer_text: &event.answer_text,
            detail_link: event.detail_link.as_deref().filter(|_| event.kind.has_detail_link()),
            branding: &self.branding,
        };

        let name = event.kind.label();
        let html_body = self.html.render(name, &data)?;
        let text_body = self.text.render(name, &data)?;

        Ok(EmailMessage {
            recipient: event.user_email.clone(),
            subject: self.subject(event),
            html_body,
            text_body,
        })
    }

    fn subject(&self, event: &ChangeEvent) -> String {
        let site = &self.branding.site_name;
        match event.kind {
            EventKind::Created => {
                format!("Your question '{}' on {} has been answered", event.question_text, site)
            }
            EventKind::Updated => format!(
                "The answer '{}' to your question '{}' on {} has been updated",
                event.answer_text, event.question_text, site
            ),
            EventKind::Deleted => format!(
                "The answer '{}' to your question '{}' on {} has been deleted",
                event.answer_text, event.question_text, site
            ),
        }
    }
}

fn register(
    registry: &mut Handlebars<'static>,
    kind: EventKind,
    source: &str,
) -> Result<(), TemplateError> {
    registry
        .register_template_string(kind.label(), source)
        .map_err(|e| TemplateError(format!("Failed to register {}: {}", kind.label(), e)))
}

fn sources(kind: EventKind) -> (&'static str, &'static str) {
    match kind {
        EventKind::Created => (CREATED_HTML_TEMPLATE, CREATED_TEXT_TEMPLATE),
        EventKind::Updated => (UPDATED_HTML_TEMPLATE, UPDATED_TEXT_TEMPLATE),
        EventKind::Deleted => (DELETED_HTML_TEMPLATE, DELETED_TEXT_TEMPLATE),
    }
}

const CREATED_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Notification from {{site_name}}</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; color: #18181b;">
  <h1>Notification from {{site_name}}</h1>
  <p>Hi {{first_name}},</p>
  <p>Your question ({{question_id}}) "{{question_text}}" on {{site_name}} has been answered.</p>
  <blockquote>{{answer_text}}</blockquote>
  <p>Answer {{answer_id}} is available at {{detail_link}}.</p>
  <p><a href="{{detail_link}}" style="color: #2563eb;">View the answer</a></p>
  <p style="color: #a1a1aa; font-size: 11px;">This email was sent with <a href="{{footer_provider_url}}">{{footer_provider_name}}</a>.</p>
</body>
</html>"#;

const CREATED_TEXT_TEMPLATE: &str = r#"Hi {{first_name}},

Your question ({{question_id}}) "{{question_text}}" on {{site_name}} has been answered.

Answer {{answer_id}}:
{{answer_text}}

View the answer: {{detail_link}}

This email was sent with {{footer_provider_name}} ({{footer_provider_url}}).
"#;

const UPDATED_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Notification from {{site_name}}</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; color: #18181b;">
  <h1>Notification from {{site_name}}</h1>
  <p>Hi {{first_name}},</p>
  <p>An answer to your question ({{question_id}}) "{{question_text}}" on {{site_name}} has been updated.</p>
  <p>It now reads:</p>
  <blockquote>{{answer_text}}</blockquote>
  <p>Answer {{answer_id}} is available at {{detail_link}}.</p>
  <p><a href="{{detail_link}}" style="color: #2563eb;">View the updated answer</a></p>
  <p style="color: #a1a1aa; font-size: 11px;">This email was sent with <a href="{{footer_provider_url}}">{{footer_provider_name}}</a>.</p>
</body>
</html>"#;

const UPDATED_TEXT_TEMPLATE: &str = r#"Hi {{first_name}},

An answer to your question ({{question_id}}) "{{question_text}}" on {{site_name}} has been updated.

Answer {{answer_id}} now reads:
{{answer_text}}

View the updated answer: {{detail_link}}

This email was sent with {{footer_provider_name}} ({{footer_provider_url}}).
"#;

const DELETED_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Notification from {{site_name}}</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; color: #18181b;">
  <h1>Notification from {{site_name}}</h1>
  <p>Hi {{first_name}},</p>
  <p>The answer {{answer_id}} to your question ({{question_id}}) "{{question_text}}" on {{site_name}} has been deleted.</p>
  <p>The deleted answer read:</p>
  <blockquote>{{answer_text}}</blockquote>
  <p style="color: #a1a1aa; font-size: 11px;">This email was sent with <a href="{{footer_provider_url}}">{{footer_provider_name}}</a>.</p>
</body>
</html>"#;

const DELETED_TEXT_TEMPLATE: &str = r#"Hi {{first_name}},

The answer {{answer_id}} to your question ({{question_id}}) "{{question_text}}" on {{site_name}} has been deleted.

The deleted answer read:
{{answer_text}}

This email was sent with {{footer_provider_name}} ({{footer_provider_url}}).
"#;
