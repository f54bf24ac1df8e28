//! Data models for answer notifications.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// The kind of change that happened to an answer.
///
/// The strum serialisations are the exact, case-sensitive phrases the
/// upstream producer writes in field 0 of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[strum(serialize = "create answer")]
    Created,
    #[strum(serialize = "update answer")]
    Updated,
    #[strum(serialize = "delete answer")]
    Deleted,
}

impl EventKind {
    /// Number of fields that follow the kind phrase in a raw record with the
    /// name split into first and last. A merged name is one field fewer.
    pub fn payload_fields(&self) -> usize {
        if self.has_detail_link() { 8 } else { 7 }
    }

    /// Created and updated answers still exist, so they link to details.
    pub fn has_detail_link(&self) -> bool {
        !matches!(self, EventKind::Deleted)
    }

    /// Label used in logs, metrics and template names.
    ///
    /// Matches the serde name. Not derived with `IntoStaticStr`: the strum
    /// strings of this enum are the wire phrases.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
        }
    }
}

/// A structured answer change, parsed from one raw record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: EventKind,
    pub question_id: String,
    pub question_text: String,
    pub user_first_name: String,
    pub user_last_name: String,
    pub user_email: String,
    pub answer_id: String,
    pub answer_text: String,
    /// Present for `Created` and `Updated`, `None` for `Deleted`.
    pub detail_link: Option<String>,
}

/// A fully rendered email, ready for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailMessage {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Provider-side identifier of an accepted email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    /// Provider name, e.g. `aws-ses`.
    pub provider: String,
    /// Provider-specific message ID.
    pub message_id: String,
}

impl std::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.message_id)
    }
}
