use super::{DeliveryHandler, MessageClient, topic_matches};
use crate::codec;
use crate::core::error::{ClientError, DecodeError};
use crate::core::message::{DecodedFields, InboundMessage, QualityOfService};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// A publish recorded by [`MemoryClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QualityOfService,
}

impl PublishedMessage {
    pub fn fields(&self) -> Result<DecodedFields, DecodeError> {
        codec::decode(&self.payload)
    }
}

/// In-process message client.
///
/// Deliveries are injected with [`MemoryClient::deliver`]; every publish is
/// recorded rather than sent anywhere.
#[derive(Default)]
pub struct MemoryClient {
    subscriptions: Mutex<Vec<(String, DeliveryHandler)>>,
    published: Mutex<Vec<PublishedMessage>>,
    fail_publishes: AtomicBool,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail with `ClientError::Rejected`.
    pub fn set_fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Delivers a message to every matching subscription, each on its own
    /// task, and waits for all of them. Returns the number of handlers run.
    pub async fn deliver(&self, topic: &str, payload: impl Into<Vec<u8>>) -> usize {
        let message = InboundMessage::new(topic, payload);

        let handlers: Vec<DeliveryHandler> = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(filter, _)| topic_matches(filter, topic))
            .map(|(_, handler)| handler.clone())
            .collect();

        let tasks: Vec<_> = handlers
            .iter()
            .map(|handler| tokio::spawn(handler(message.clone())))
            .collect();

        let count = tasks.len();
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::error!("Memory client delivery task failed: {e}");
            }
        }

        count
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(filter, _)| filter.clone())
            .collect()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take_published(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut *self.published.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl MessageClient for MemoryClient {
    async fn subscribe(&self, topic: &str, handler: DeliveryHandler) -> Result<(), ClientError> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), handler));
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), ClientError> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(filter, _)| filter != topic);
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QualityOfService,
    ) -> Result<(), ClientError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(ClientError::Rejected {
                topic: topic.to_string(),
                reason: "publishing disabled".to_string(),
            });
        }

        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedMessage {
                topic: topic.to_string(),
                payload,
                qos,
            });
        Ok(())
    }
}
