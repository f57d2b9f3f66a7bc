//! Message client capability.
//!
//! The relay core talks to the bus only through [`MessageClient`]. Whether a
//! topic lives on a local broker or crosses into the cloud is decided by the
//! client's configuration, never by the core.

pub mod connection;
pub mod memory;
pub mod mqtt;

pub use memory::{MemoryClient, PublishedMessage};
pub use mqtt::MqttMessageClient;

use crate::core::error::ClientError;
use crate::core::message::{InboundMessage, QualityOfService};

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Callback invoked once per inbound delivery. Each invocation runs as its
/// own task, so handlers must not rely on ordering between messages.
pub type DeliveryHandler = Arc<dyn Fn(InboundMessage) -> BoxFuture<'static, ()> + Send + Sync>;

#[async_trait]
pub trait MessageClient: Send + Sync {
    /// Registers `handler` for every delivery whose topic matches `topic`
    /// (MQTT filter syntax, `+` and `#` allowed).
    async fn subscribe(&self, topic: &str, handler: DeliveryHandler) -> Result<(), ClientError>;

    /// Stops deliveries for a filter previously passed to `subscribe`.
    async fn unsubscribe(&self, topic: &str) -> Result<(), ClientError>;

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QualityOfService,
    ) -> Result<(), ClientError>;

    async fn disconnect(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Returns true when `topic` matches the MQTT topic `filter`.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    // Wildcards never match system topics at the first level.
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
