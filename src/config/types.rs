//! Configuration Type Definitions
//!
//! These types are deserialised from the relay's TOML configuration file.
//! Every section has serde defaults so a minimal file only needs the
//! subscriptions and the sections those subscriptions depend on.

use crate::handlers::threshold::{ThresholdOperator, ThresholdRule};

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration for the relay.
///
/// # Example Structure
///
/// ```toml
/// [mqtt]
/// broker_url = "mqtt://localhost:1883"
///
/// [[subscriptions]]
/// topic = "commands/device1"
/// handler = "command"
///
/// [[subscriptions]]
/// topic = "sensors/temperature"
/// handler = "telemetry"
///
/// [status]
/// type = "static"
///
/// [telemetry]
/// field_name = "temperature"
/// limit = 80.0
/// ```
#[derive(Clone, Debug, Deserialize, Default)]
pub struct Config {
    /// Broker connection used by the MQTT message client
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Relay-wide behaviour
    #[serde(default)]
    pub relay: RelaySettings,

    /// Topic filters to subscribe to and the handler each one routes to
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,

    /// Status provider answering `get_status`, required by command routes
    pub status: Option<StatusConfig>,

    /// Threshold rule, required by telemetry routes
    pub telemetry: Option<TelemetryConfig>,
}

impl Config {
    pub fn has_handler(&self, handler: HandlerKind) -> bool {
        self.subscriptions.iter().any(|s| s.handler == handler)
    }
}

/// Which component an inbound topic is routed to.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Command,
    Telemetry,
}

impl HandlerKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "command" => Some(Self::Command),
            "telemetry" => Some(Self::Telemetry),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Telemetry => "telemetry",
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub handler: HandlerKind,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, handler: HandlerKind) -> Self {
        Self {
            topic: topic.into(),
            handler,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MqttConfig {
    #[serde(default = "default_broker_url")]
    pub broker_url: String,

    /// Generated as `edge_relay_<uuid>` when absent
    pub client_id: Option<String>,

    /// QoS used for subscriptions (0-2)
    #[serde(default = "default_qos")]
    pub qos: u8,

    #[serde(default = "default_true")]
    pub clean_session: bool,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Capacity of the client's outgoing request queue
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,

    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            client_id: None,
            qos: default_qos(),
            clean_session: true,
            keep_alive_secs: default_keep_alive_secs(),
            request_capacity: default_request_capacity(),
            username: None,
            password: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RelaySettings {
    /// Identity used when an inbound message carries none
    #[serde(default = "default_identity")]
    pub default_identity: String,

    /// How long shutdown waits for in-flight messages
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Maximum payload characters included in log records
    #[serde(default = "default_payload_preview_len")]
    pub payload_preview_len: usize,
}

impl RelaySettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            default_identity: default_identity(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            payload_preview_len: default_payload_preview_len(),
        }
    }
}

/// Status provider selection, in the same `type` + `parameters` shape used
/// for pluggable components elsewhere.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StatusConfig {
    #[serde(rename = "type", default = "default_status_type")]
    pub r#type: String,

    /// Provider-specific parameters
    pub parameters: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// Field carrying the sensor identity (`sensor_id` or `device_id`)
    #[serde(default = "default_identity_field")]
    pub identity_field: String,

    /// Numeric reading the rule is applied to
    #[serde(default = "default_reading_field")]
    pub field_name: String,

    #[serde(default = "default_operator")]
    pub operator: ThresholdOperator,

    #[serde(default = "default_limit")]
    pub limit: f64,

    #[serde(default = "default_alert_label")]
    pub alert_label: String,

    #[serde(default = "default_alert_topic")]
    pub alert_topic: String,
}

impl TelemetryConfig {
    pub fn rule(&self) -> ThresholdRule {
        ThresholdRule::new(
            self.field_name.clone(),
            self.operator,
            self.limit,
            self.alert_label.clone(),
        )
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            identity_field: default_identity_field(),
            field_name: default_reading_field(),
            operator: default_operator(),
            limit: default_limit(),
            alert_label: default_alert_label(),
            alert_topic: default_alert_topic(),
        }
    }
}

fn default_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

const fn default_qos() -> u8 {
    1
}

const fn default_true() -> bool {
    true
}

const fn default_keep_alive_secs() -> u64 {
    30
}

const fn default_request_capacity() -> usize {
    10
}

fn default_identity() -> String {
    "device1".to_string()
}

const fn default_shutdown_grace_ms() -> u64 {
    5000
}

const fn default_payload_preview_len() -> usize {
    128
}

fn default_status_type() -> String {
    "static".to_string()
}

fn default_identity_field() -> String {
    "sensor_id".to_string()
}

fn default_reading_field() -> String {
    "temperature".to_string()
}

fn default_operator() -> ThresholdOperator {
    ThresholdOperator::GreaterThan
}

const fn default_limit() -> f64 {
    80.0
}

fn default_alert_label() -> String {
    "HIGH_TEMPERATURE".to_string()
}

fn default_alert_topic() -> String {
    "component/alerts".to_string()
}
