//! JSON payload conventions shared by validation, signing and writes.
//!
//! # Invariants
//! - Keys starting with `@` are reserved and never name a feature.
//! - `decode_value` and `encode_value` agree on textual formats: RFC 3339
//!   timestamps with milliseconds, `YYYY-MM-DD` dates, standard base64
//!   bytes, decimals as strings.

use crate::model::schema::{AttributeDescriptor, RuntimeType};
use crate::model::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value as Json};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

pub const ID_KEY: &str = "@id";
pub const TYPE_KEY: &str = "@type";
pub const VERSION_KEY: &str = "@version";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// JSON object carried in and out of the write path.
pub type Payload = Map<String, Json>;

/// A JSON value that does not fit the attribute's runtime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadError {
    pub expected: RuntimeType,
    pub found: String,
}

impl Display for PayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.found)
    }
}

impl Error for PayloadError {}

pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with('@')
}

/// Short JSON kind name used in diagnostics.
pub fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Converts one JSON value into the attribute's typed value.
pub fn decode_value(attribute: &AttributeDescriptor, json: &Json) -> Result<Value, PayloadError> {
    let expected = attribute.runtime_type();
    let mismatch = || PayloadError {
        expected,
        found: json_kind(json).to_string(),
    };
    let malformed = |detail: String| PayloadError {
        expected,
        found: detail,
    };
    if json.is_null() {
        return Ok(Value::Null);
    }

    let value = match expected {
        RuntimeType::String => Value::String(json.as_str().ok_or_else(mismatch)?.to_string()),
        RuntimeType::Integer => {
            let wide = json.as_i64().ok_or_else(mismatch)?;
            let narrow = i32::try_from(wide)
                .map_err(|_| malformed(format!("out-of-range integer {wide}")))?;
            Value::Integer(narrow)
        }
        RuntimeType::Long => Value::Long(json.as_i64().ok_or_else(mismatch)?),
        RuntimeType::Double => Value::Double(json.as_f64().ok_or_else(mismatch)?),
        RuntimeType::Decimal => {
            let text = match json {
                Json::Number(number) => number.to_string(),
                Json::String(text) => text.clone(),
                _ => return Err(mismatch()),
            };
            let decimal = Decimal::from_str(&text)
                .map_err(|_| malformed(format!("malformed decimal `{text}`")))?;
            Value::Decimal(decimal)
        }
        RuntimeType::Boolean => Value::Boolean(json.as_bool().ok_or_else(mismatch)?),
        RuntimeType::Timestamp => {
            let text = json.as_str().ok_or_else(mismatch)?;
            let parsed = DateTime::parse_from_rfc3339(text)
                .map_err(|_| malformed(format!("malformed timestamp `{text}`")))?;
            Value::Timestamp(parsed.with_timezone(&Utc))
        }
        RuntimeType::Date => {
            let text = json.as_str().ok_or_else(mismatch)?;
            let parsed = NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map_err(|_| malformed(format!("malformed date `{text}`")))?;
            Value::Date(parsed)
        }
        RuntimeType::Uuid => {
            let text = json.as_str().ok_or_else(mismatch)?;
            let parsed =
                Uuid::parse_str(text).map_err(|_| malformed(format!("malformed uuid `{text}`")))?;
            Value::Uuid(parsed)
        }
        RuntimeType::Bytes => {
            let text = json.as_str().ok_or_else(mismatch)?;
            let bytes = STANDARD
                .decode(text)
                .map_err(|_| malformed("malformed base64".to_string()))?;
            Value::Bytes(bytes)
        }
        RuntimeType::Json => Value::Json(json.clone()),
    };
    Ok(value)
}

/// Converts a typed value back into its JSON form.
pub fn encode_value(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::String(text) => Json::String(text.clone()),
        Value::Integer(number) => Json::from(*number),
        Value::Long(number) => Json::from(*number),
        Value::Double(number) => Json::from(*number),
        Value::Decimal(decimal) => Json::String(decimal.to_string()),
        Value::Boolean(flag) => Json::Bool(*flag),
        Value::Timestamp(at) => Json::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        Value::Date(date) => Json::String(date.format(DATE_FORMAT).to_string()),
        Value::Uuid(uuid) => Json::String(uuid.to_string()),
        Value::Bytes(bytes) => Json::String(STANDARD.encode(bytes)),
        Value::Json(json) => json.clone(),
    }
}
