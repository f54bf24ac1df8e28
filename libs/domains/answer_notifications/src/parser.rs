//! Raw notification record parsing.
//!
//! The upstream producer publishes one comma-delimited string per change:
//!
//! ```text
//! <kind>,<QuestionID>,<QuestionText>,<UserFirstName>,<UserLastName>,<UserEmail>,<AnswerID>,<AnswerText>[,<DetailLink>]
//! ```
//!
//! `kind` is `create answer`, `update answer` or `delete answer`. Deletions
//! carry no detail link. Any payload field may be prefixed with a label
//! (`QuestionID: 1`), which is stripped.
//!
//! Producers may also merge the name into one field, one field shorter:
//!
//! ```text
//! create answer, QuestionID: 1, QuestionText: ..., UserName: Jane Jenny, UserEmail: ..., AnswerID: 1, AnswerText: ..., link: ...
//! ```

use crate::error::ParseError;
use crate::models::{ChangeEvent, EventKind};
use std::str::FromStr;

const DELIMITER: char = ',';

// Labels a producer may prefix each value with, per position.
const QUESTION_ID: &[&str] = &["QuestionID"];
const QUESTION_TEXT: &[&str] = &["QuestionText"];
const FIRST_NAME: &[&str] = &["UserFirstName", "FirstName", "UserName"];
const LAST_NAME: &[&str] = &["UserLastName", "LastName"];
const FULL_NAME: &[&str] = &["UserName", "FullName"];
const USER_EMAIL: &[&str] = &["UserEmail", "Email"];
const ANSWER_ID: &[&str] = &["AnswerID"];
const ANSWER_TEXT: &[&str] = &["AnswerText"];
const DETAIL_LINK: &[&str] = &["DetailLink", "Link"];

/// How the author's name is laid out in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameLayout {
    /// `<UserFirstName>,<UserLastName>`
    Split,
    /// `UserName: <First> <Last>` in a single field, one field fewer.
    Merged,
}

impl NameLayout {
    fn detect(kind: EventKind, payload_len: usize) -> Result<Self, ParseError> {
        let split = kind.payload_fields();
        if payload_len == split {
            Ok(NameLayout::Split)
        } else if payload_len + 1 == split {
            Ok(NameLayout::Merged)
        } else {
            Err(ParseError::MalformedEvent(format!(
                "'{}' expects {} fields after the kind ({} with a merged UserName), found {}",
                kind,
                split,
                split - 1,
                payload_len
            )))
        }
    }
}

/// Turns one raw record into a `ChangeEvent`.
///
/// Implementations either return a complete event or an error, never a
/// partially populated one.
pub trait EventParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<ChangeEvent, ParseError>;
}

/// Parser for the positional, label-tolerant wire format.
///
/// The author's name is either two fields (first, last) or one merged
/// `UserName` field holding both; the field count tells them apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalEventParser;

impl PositionalEventParser {
    pub fn new() -> Self {
        Self
    }
}

impl EventParser for PositionalEventParser {
    fn parse(&self, raw: &str) -> Result<ChangeEvent, ParseError> {
        let mut fields = raw.split(DELIMITER);

        let phrase = fields.next().unwrap_or_default();
        let kind = EventKind::from_str(phrase)
            .map_err(|_| ParseError::UnrecognizedEventKind(phrase.to_string()))?;

        let payload: Vec<&str> = fields.collect();
        let layout = NameLayout::detect(kind, payload.len())?;

        let mut payload = payload.into_iter();
        let mut take = |name: &str, labels: &[&str]| -> Result<String, ParseError> {
            let field = payload.next().ok_or_else(missing)?;
            required(name, strip_label(field, labels))
        };

        let question_id = take("QuestionID", QUESTION_ID)?;
        let question_text = take("QuestionText", QUESTION_TEXT)?;
        let (user_first_name, user_last_name) = match layout {
            NameLayout::Split => (
                take("UserFirstName", FIRST_NAME)?,
                take("UserLastName", LAST_NAME)?,
            ),
            NameLayout::Merged => split_name(&take("UserName", FULL_NAME)?)?,
        };
        let user_email = take("UserEmail", USER_EMAIL)?;
        let answer_id = take("AnswerID", ANSWER_ID)?;
        let answer_text = take("AnswerText", ANSWER_TEXT)?;
        let detail_link = if kind.has_detail_link() {
            Some(take("DetailLink", DETAIL_LINK)?)
        } else {
            None
        };

        Ok(ChangeEvent {
            kind,
            question_id,
            question_text,
            user_first_name,
            user_last_name,
            user_email,
            answer_id,
            answer_text,
            detail_link,
        })
    }
}

fn missing() -> ParseError {
    ParseError::MalformedEvent("record ended early".to_string())
}

/// Split a merged name on its first whitespace. Both parts are required.
fn split_name(full: &str) -> Result<(String, String), ParseError> {
    match full.split_once(char::is_whitespace) {
        Some((first, last)) if !last.trim().is_empty() => {
            Ok((first.to_string(), last.trim().to_string()))
        }
        _ => Err(ParseError::MalformedEvent(format!(
            "UserName '{}' needs a first and a last name",
            full
        ))),
    }
}

fn required(name: &str, value: &str) -> Result<String, ParseError> {
    if value.is_empty() {
        Err(ParseError::MalformedEvent(format!("{} is empty", name)))
    } else {
        Ok(value.to_string())
    }
}

/// Trim the field and drop a leading `<label>:` if it names this position.
fn strip_label<'a>(field: &'a str, labels: &[&str]) -> &'a str {
    let trimmed = field.trim();

    for label in labels {
        let Some(head) = trimmed.get(..label.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(label) {
            continue;
        }
        if let Some(rest) = trimmed[label.len()..].trim_start().strip_prefix(':') {
            return rest.trim();
        }
    }

    trimmed
}
