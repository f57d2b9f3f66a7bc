use super::time::now_secs;

use serde_json::{Map, Value};

/// Flat, insertion-ordered mapping of field name to scalar JSON value.
pub type DecodedFields = Map<String, Value>;

/// Delivery guarantee requested for a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityOfService {
    AtMostOnce,
    #[default]
    AtLeastOnce,
}

/// A message as delivered by the message client.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: f64,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: now_secs(),
        }
    }
}

/// A derived event waiting to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub fields: DecodedFields,
    pub qos: QualityOfService,
    /// Name of the field that carries the device or sensor identity.
    pub identity_field: String,
}

impl OutboundMessage {
    pub fn new(
        topic: impl Into<String>,
        identity_field: impl Into<String>,
        fields: DecodedFields,
        qos: QualityOfService,
    ) -> Self {
        Self {
            topic: topic.into(),
            fields,
            qos,
            identity_field: identity_field.into(),
        }
    }

    /// The identity value, if present and non-null.
    pub fn identity(&self) -> Option<&Value> {
        self.fields
            .get(&self.identity_field)
            .filter(|value| !value.is_null())
    }
}

/// Reads an identity field, falling back to `default` when it is absent.
///
/// Strings are taken as-is and numbers by their textual form. Any other
/// value (null, bool) counts as absent.
pub fn identity_or_default(fields: &DecodedFields, field: &str, default: &str) -> String {
    match fields.get(field) {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => default.to_string(),
    }
}
