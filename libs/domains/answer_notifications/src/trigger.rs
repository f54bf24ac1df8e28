//! Decoding of the SNS-shaped trigger document.
//!
//! ```json
//! {"Records": [{"Sns": {"Message": "create answer,1,..."}}]}
//! ```
//!
//! Only the message strings are used; every other attribute of the document
//! is ignored.

use crate::error::TriggerError;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct SnsEvent {
    #[serde(rename = "Records", default)]
    records: Option<Vec<SnsEventRecord>>,
}

#[derive(Debug, Deserialize)]
struct SnsEventRecord {
    #[serde(rename = "Sns")]
    sns: SnsEntity,
}

#[derive(Debug, Deserialize)]
struct SnsEntity {
    #[serde(rename = "Message")]
    message: String,
}

/// Extract the raw notification records, in order.
///
/// A missing or null `Records` array is an empty batch. Anything that is not
/// an object of this shape is `TriggerError::MalformedBatch`.
pub fn decode_sns_event(document: &str) -> Result<Vec<String>, TriggerError> {
    // serde would also build the struct from a JSON array
    let value: Value = serde_json::from_str(document)?;
    if !value.is_object() {
        return Err(TriggerError::MalformedBatch(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }

    let event: SnsEvent = serde_json::from_value(value)?;

    Ok(event
        .records
        .unwrap_or_default()
        .into_iter()
        .map(|record| record.sns.message)
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
