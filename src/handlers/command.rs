use super::status::StatusProvider;
use crate::core::message::{DecodedFields, OutboundMessage, QualityOfService, identity_or_default};
use crate::core::time::now_secs;

use serde_json::{Value, json};
use std::sync::Arc;

pub const COMMAND_FIELD: &str = "command";
pub const DEVICE_ID_FIELD: &str = "device_id";
pub const TELEMETRY_TOPIC_PREFIX: &str = "telemetry/";

/// Commands the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetStatus,
}

impl Command {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "get_status" => Some(Self::GetStatus),
            _ => None,
        }
    }
}

/// Turns command messages into telemetry replies.
pub struct CommandDispatcher {
    status_provider: Arc<dyn StatusProvider>,
    default_identity: String,
}

impl CommandDispatcher {
    pub fn new(status_provider: Arc<dyn StatusProvider>, default_identity: impl Into<String>) -> Self {
        Self {
            status_provider,
            default_identity: default_identity.into(),
        }
    }

    /// Returns the reply to publish, if any. Unknown or missing commands
    /// produce nothing.
    pub fn dispatch(&self, fields: &DecodedFields) -> Option<OutboundMessage> {
        let device_id = identity_or_default(fields, DEVICE_ID_FIELD, &self.default_identity);

        let command = match fields.get(COMMAND_FIELD) {
            Some(Value::String(name)) => name.as_str(),
            Some(other) => {
                tracing::debug!(device_id = %device_id, "Ignoring non-string command: {other}");
                return None;
            }
            None => {
                tracing::debug!(device_id = %device_id, "Ignoring message without a command");
                return None;
            }
        };

        tracing::info!(device_id = %device_id, command, "Received command");

        match Command::from_str(command) {
            Some(Command::GetStatus) => Some(self.status_reply(device_id)),
            None => {
                tracing::debug!(device_id = %device_id, command, error_kind = "unsupported_command", "Ignoring command");
                None
            }
        }
    }

    fn status_reply(&self, device_id: String) -> OutboundMessage {
        let status = self.status_provider.current_status(&device_id);

        let mut fields = DecodedFields::new();
        fields.insert(DEVICE_ID_FIELD.to_string(), json!(device_id));
        fields.insert("status".to_string(), json!(status));
        fields.insert("timestamp".to_string(), json!(now_secs()));

        OutboundMessage::new(
            format!("{TELEMETRY_TOPIC_PREFIX}{device_id}"),
            DEVICE_ID_FIELD,
            fields,
            QualityOfService::AtLeastOnce,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::status::StaticStatusProvider;

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new(Arc::new(StaticStatusProvider::new("online")), "device1")
    }

    fn fields(value: Value) -> DecodedFields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_get_status_replies_on_device_topic() {
        let before = now_secs();
        let reply = dispatcher()
            .dispatch(&fields(json!({"command": "get_status", "device_id": "pump-3"})))
            .expect("status reply");

        assert_eq!(reply.topic, "telemetry/pump-3");
        assert_eq!(reply.qos, QualityOfService::AtLeastOnce);
        assert_eq!(reply.fields["device_id"], "pump-3");
        assert_eq!(reply.fields["status"], "online");
        assert!(reply.fields["timestamp"].as_f64().unwrap() >= before);
        assert_eq!(
            reply.fields.keys().collect::<Vec<_>>(),
            vec!["device_id", "status", "timestamp"]
        );
        assert!(reply.identity().is_some());
    }

    #[test]
    fn test_missing_device_id_uses_default() {
        let reply = dispatcher()
            .dispatch(&fields(json!({"command": "get_status"})))
            .unwrap();
        assert_eq!(reply.topic, "telemetry/device1");
        assert_eq!(reply.fields["device_id"], "device1");

        let custom = CommandDispatcher::new(Arc::new(StaticStatusProvider::new("online")), "gateway-a");
        let reply = custom.dispatch(&fields(json!({"command": "get_status"}))).unwrap();
        assert_eq!(reply.topic, "telemetry/gateway-a");
    }

    #[test]
    fn test_other_commands_are_ignored() {
        let d = dispatcher();
        assert!(d.dispatch(&fields(json!({"command": "reboot", "device_id": "device1"}))).is_none());
        assert!(d.dispatch(&fields(json!({"command": "GET_STATUS"}))).is_none());
        assert!(d.dispatch(&fields(json!({"device_id": "device1"}))).is_none());
        assert!(d.dispatch(&fields(json!({"command": 7}))).is_none());
        assert!(d.dispatch(&DecodedFields::new()).is_none());
    }

    #[test]
    fn test_status_provider_sees_device_id() {
        struct EchoProvider;
        impl StatusProvider for EchoProvider {
            fn current_status(&self, device_id: &str) -> String {
                format!("{device_id}:ok")
            }
        }

        let d = CommandDispatcher::new(Arc::new(EchoProvider), "device1");
        let reply = d
            .dispatch(&fields(json!({"command": "get_status", "device_id": "fan"})))
            .unwrap();
        assert_eq!(reply.fields["status"], "fan:ok");
    }
}
