use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::{deserialize_pairs_from_map, serialize_pairs_as_map, FieldMap, FieldValue};
use crate::level::Level;

/// Structured descriptor for one extracted error-valued field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventError {
    /// Variant tag (`"error"` or `"errno"`), or the free-form label
    /// supplied at field insertion time.
    #[serde(rename = "type")]
    pub kind: String,

    /// The error message.
    pub error: String,

    /// Best-effort structured form of the underlying value. System-level
    /// errors carry their numeric code here; generic errors fall back to
    /// an empty object.
    #[serde(rename = "origError")]
    pub orig_error: Value,

    /// Numeric code, present only for system-level errors.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub errno: Option<i32>,
}

impl EventError {
    /// Convert an error-valued field into its descriptor. Plain values
    /// yield `None`.
    pub fn from_field(value: &FieldValue) -> Option<EventError> {
        match value {
            FieldValue::Plain(_) => None,
            FieldValue::Error { label, message } => Some(EventError {
                kind: label.clone().unwrap_or_else(|| "error".to_string()),
                error: message.clone(),
                orig_error: Value::Object(Default::default()),
                errno: None,
            }),
            FieldValue::SystemError {
                label,
                message,
                code,
            } => Some(EventError {
                kind: label.clone().unwrap_or_else(|| "errno".to_string()),
                error: message.clone(),
                orig_error: Value::from(*code),
                errno: Some(*code),
            }),
        }
    }
}

/// Event metadata: source location and extracted errors. Empty
/// sub-fields are omitted from the wire but the object itself is always
/// present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub source: String,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<EventError>,
}

/// One structured log record. Struct field order matches the wire key
/// order: `level, time, info, data, message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub level: Level,

    /// Serialized as an RFC3339 instant.
    pub time: DateTime<Utc>,

    pub info: EventInfo,

    /// Field data, kept as insertion-ordered pairs and encoded as a JSON
    /// object.
    #[serde(
        serialize_with = "serialize_pairs_as_map",
        deserialize_with = "deserialize_pairs_from_map"
    )]
    pub data: Vec<(String, Value)>,

    pub message: String,
}

impl Event {
    /// Build an event from a log call.
    ///
    /// Error-valued fields are extracted into `info.errors` in field
    /// insertion order. When `max_field_len` is set, the message and
    /// string fields truncate to that many bytes, scalar fields pass
    /// unchanged, and any other field either fits whole in its encoded
    /// form or is dropped entirely. Encoding an event built here never
    /// fails.
    pub fn build(
        level: Level,
        time: DateTime<Utc>,
        message: impl Into<String>,
        fields: FieldMap,
        max_field_len: Option<usize>,
        source: Option<String>,
    ) -> Event {
        let mut info = EventInfo {
            source: source.unwrap_or_default(),
            errors: Vec::new(),
        };
        let mut data = Vec::new();

        for (key, value) in fields {
            match value {
                FieldValue::Plain(value) => {
                    if let Some(value) = apply_field_limit(&key, value, max_field_len) {
                        data.push((key, value));
                    }
                }
                error => {
                    if let Some(error) = EventError::from_field(&error) {
                        info.errors.push(error);
                    }
                }
            }
        }

        let mut message = message.into();
        if let Some(max) = max_field_len {
            truncate_bytes(&mut message, max);
        }

        Event {
            level,
            time,
            info,
            data,
            message,
        }
    }
}

/// The single-line JSON wire encoding.
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

/// Per-field length policy: strings truncate, booleans and numbers pass
/// unchanged, anything else either fits whole or disappears.
fn apply_field_limit(key: &str, value: Value, max: Option<usize>) -> Option<Value> {
    let Some(max) = max else { return Some(value) };

    match value {
        Value::String(mut s) => {
            truncate_bytes(&mut s, max);
            Some(Value::String(s))
        }
        Value::Bool(_) | Value::Number(_) => Some(value),
        other => match serde_json::to_vec(&other) {
            Ok(encoded) if encoded.len() <= max => Some(other),
            Ok(encoded) => {
                tracing::debug!(field = key, size = encoded.len(), max, "dropping oversized field");
                None
            }
            Err(error) => {
                tracing::debug!(field = key, %error, "dropping unserializable field");
                None
            }
        },
    }
}

/// Byte-oriented truncation. The policy counts bytes, not characters;
/// when the cut would split a multi-byte character it backs off to the
/// previous character boundary.
fn truncate_bytes(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
