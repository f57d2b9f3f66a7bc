//! Configuration Module

pub mod loader;
pub mod params;
pub mod types;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, load_config_from_string};
pub use params::extract_param;
pub use types::{
    Config, HandlerKind, MqttConfig, RelaySettings, StatusConfig, Subscription, TelemetryConfig,
};
pub use validation::validate_config;
