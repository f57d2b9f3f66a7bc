//! Edge message relay.
//!
//! Subscribes to local command and sensor topics, answers `get_status`
//! commands with device telemetry and raises alerts when a sensor reading
//! crosses a configured threshold.

pub mod client;
pub mod codec;
pub mod config;
pub mod core;
pub mod handlers;
pub mod logging;
pub mod relay;
