//! Payload Codec
//!
//! Converts between raw message payloads and [`DecodedFields`]. Every payload
//! on the relay's topics is a flat UTF-8 JSON object, for example:
//!
//! ```json
//! {"command":"get_status","device_id":"device1"}
//! {"sensor_id":"temp-01","temperature":85.2}
//! ```
//!
//! # Decoding
//!
//! Anything that is not a JSON object is rejected with a [`DecodeError`].
//! Scalar values (string, number, boolean, null) are kept in payload order.
//! Nested arrays and objects are dropped with a debug log.
//!
//! # Encoding
//!
//! Fields are written as compact JSON in insertion order. Floats are parsed
//! back bit-exactly, so `decode(encode(f)) == f` for any scalar-leaf `f`.

use crate::core::error::{DecodeError, RelayError};
use crate::core::message::DecodedFields;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::Value;

/// Decodes a payload into a flat field map.
///
/// Only scalar leaves are kept. Nested arrays and objects are skipped since
/// no consumer in the relay reads them.
pub fn decode(payload: &[u8]) -> Result<DecodedFields, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;

    let object = match value {
        Value::Object(object) => object,
        other => return Err(DecodeError::NotAnObject(json_type(&other))),
    };

    let mut fields = DecodedFields::new();
    for (key, value) in object {
        if value.is_array() || value.is_object() {
            tracing::debug!("Skipping nested field '{}' ({})", key, json_type(&value));
            continue;
        }
        fields.insert(key, value);
    }

    Ok(fields)
}

/// Encodes fields as a compact JSON object, preserving insertion order.
pub fn encode(fields: &DecodedFields) -> Result<Vec<u8>, RelayError> {
    serde_json::to_vec(fields).map_err(RelayError::Encode)
}

/// Renders a payload for logging, truncated to `max_chars` characters.
/// Payloads that are not UTF-8 are shown base64 encoded.
pub fn preview(payload: &[u8], max_chars: usize) -> String {
    let text = match std::str::from_utf8(payload) {
        Ok(s) => s.to_owned(),
        Err(_) => BASE64.encode(payload),
    };

    if text.chars().count() <= max_chars {
        return text;
    }

    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
