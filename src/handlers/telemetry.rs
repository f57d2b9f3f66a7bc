use super::threshold::ThresholdRule;
use crate::codec::json_type;
use crate::core::error::DecodeError;
use crate::core::message::{DecodedFields, OutboundMessage, QualityOfService, identity_or_default};

use serde_json::{Value, json};

/// Applies a [`ThresholdRule`] to sensor readings and raises alerts.
pub struct TelemetryEvaluator {
    rule: ThresholdRule,
    alert_topic: String,
    identity_field: String,
    default_identity: String,
}

impl TelemetryEvaluator {
    pub fn new(
        rule: ThresholdRule,
        alert_topic: impl Into<String>,
        identity_field: impl Into<String>,
        default_identity: impl Into<String>,
    ) -> Self {
        Self {
            rule,
            alert_topic: alert_topic.into(),
            identity_field: identity_field.into(),
            default_identity: default_identity.into(),
        }
    }

    pub fn evaluate(&self, fields: &DecodedFields) -> Result<Option<OutboundMessage>, DecodeError> {
        let field = &self.rule.field_name;

        let raw = fields
            .get(field)
            .ok_or_else(|| DecodeError::MissingField(field.clone()))?;
        let reading = raw.as_f64().ok_or_else(|| DecodeError::NonNumericField {
            field: field.clone(),
            found: json_type(raw).to_string(),
        })?;

        let sensor_id = identity_or_default(fields, &self.identity_field, &self.default_identity);

        tracing::info!(sensor_id = %sensor_id, reading, "Received {} reading", field);

        if !self.rule.matches(reading) {
            return Ok(None);
        }

        tracing::info!(
            sensor_id = %sensor_id,
            reading,
            limit = self.rule.limit,
            operator = self.rule.operator.as_str(),
            "Threshold crossed, raising {}",
            self.rule.alert_label
        );

        let mut alert = DecodedFields::new();
        alert.insert(self.identity_field.clone(), json!(sensor_id));
        alert.insert(field.clone(), raw.clone());
        alert.insert("alert".to_string(), Value::String(self.rule.alert_label.clone()));

        Ok(Some(OutboundMessage::new(
            self.alert_topic.clone(),
            self.identity_field.clone(),
            alert,
            QualityOfService::AtLeastOnce,
        )))
    }
}
