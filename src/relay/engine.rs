//! Relay Engine
//!
//! The composition root of the relay. The engine owns the subscriptions and
//! routes each delivery by its [`HandlerKind`]:
//!
//! - `Command` routes go to the [`CommandDispatcher`], which answers
//!   `get_status` on `telemetry/<device_id>`.
//! - `Telemetry` routes go to the [`TelemetryEvaluator`], which publishes an
//!   alert when the reading crosses the threshold.
//!
//! Every delivery runs on its own task as decode, route, then encode and
//! publish. A failure is counted in [`RelayStats`], logged with `topic`,
//! `error_kind` and a payload preview, and never affects another message.
//!
//! # Lifecycle
//!
//! ```text
//! builder()/from_config() -> start(subscriptions) -> run(control) -> shutdown()
//! ```
//!
//! Shutdown unsubscribes, stops accepting deliveries and waits for in-flight
//! handlers, all within one grace period.

use super::stats::{RelayStats, StatsSnapshot};
use crate::client::{DeliveryHandler, MessageClient};
use crate::codec;
use crate::config::{Config, HandlerKind, Subscription};
use crate::core::ControlMessage;
use crate::core::error::{RelayError, RelayResult};
use crate::core::message::{InboundMessage, OutboundMessage};
use crate::handlers::{
    CommandDispatcher, StatusProvider, TelemetryEvaluator, ThresholdRule, create_status_provider,
};

use futures::FutureExt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

/// Everything a delivery handler needs, shared read-only across tasks.
struct RelayCore {
    client: Arc<dyn MessageClient>,
    dispatcher: Option<CommandDispatcher>,
    evaluator: Option<TelemetryEvaluator>,
    preview_len: usize,
    stats: RelayStats,
}

impl RelayCore {
    async fn handle(&self, handler: HandlerKind, message: InboundMessage) {
        self.stats.record_received();

        match self.process(handler, &message).await {
            Ok(Some(topic)) => {
                self.stats.record_published();
                tracing::debug!(topic = %message.topic, published_to = %topic, "Message relayed");
            }
            Ok(None) => {
                self.stats.record_ignored();
                tracing::debug!(topic = %message.topic, "Message produced no output");
            }
            Err(e) => {
                self.stats.record_error(&e);
                let payload = codec::preview(&message.payload, self.preview_len);
                match &e {
                    RelayError::Publish { .. } => tracing::error!(
                        topic = %message.topic,
                        error_kind = e.kind(),
                        payload = %payload,
                        "Failed to relay message: {e}"
                    ),
                    _ => tracing::warn!(
                        topic = %message.topic,
                        error_kind = e.kind(),
                        payload = %payload,
                        "Dropping message: {e}"
                    ),
                }
            }
        }
    }

    /// Decode, route and publish one message. Returns the topic published
    /// to, or `None` when the message produced nothing.
    async fn process(
        &self,
        handler: HandlerKind,
        message: &InboundMessage,
    ) -> RelayResult<Option<String>> {
        let fields = codec::decode(&message.payload)?;

        let outbound = match handler {
            HandlerKind::Command => self.dispatcher()?.dispatch(&fields),
            HandlerKind::Telemetry => self.evaluator()?.evaluate(&fields)?,
        };

        match outbound {
            Some(outbound) => self.publish(outbound).await.map(Some),
            None => Ok(None),
        }
    }

    async fn publish(&self, outbound: OutboundMessage) -> RelayResult<String> {
        if outbound.identity().is_none() {
            return Err(RelayError::MissingIdentity {
                topic: outbound.topic,
                field: outbound.identity_field,
            });
        }

        let payload = codec::encode(&outbound.fields)?;

        self.client
            .publish(&outbound.topic, payload, outbound.qos)
            .await
            .map_err(|source| RelayError::Publish {
                topic: outbound.topic.clone(),
                source,
            })?;

        tracing::info!(topic = %outbound.topic, qos = ?outbound.qos, "Published message");
        Ok(outbound.topic)
    }

    fn dispatcher(&self) -> RelayResult<&CommandDispatcher> {
        self.dispatcher
            .as_ref()
            .ok_or_else(|| RelayError::configuration("no status provider bound for command routes"))
    }

    fn evaluator(&self) -> RelayResult<&TelemetryEvaluator> {
        self.evaluator
            .as_ref()
            .ok_or_else(|| RelayError::configuration("no threshold rule bound for telemetry routes"))
    }

    fn supports(&self, handler: HandlerKind) -> RelayResult<()> {
        match handler {
            HandlerKind::Command => self.dispatcher().map(|_| ()),
            HandlerKind::Telemetry => self.evaluator().map(|_| ()),
        }
    }
}

/// Owns the subscriptions and routes each delivery to the command
/// dispatcher or the telemetry evaluator.
pub struct RelayEngine {
    core: Arc<RelayCore>,
    shutdown_grace: Duration,
    active: tokio::sync::Mutex<Vec<Subscription>>,
    // Every running handler holds a clone of this sender. Shutdown drops the
    // original and waits for the receiver to observe the channel closing.
    in_flight: Arc<Mutex<Option<mpsc::Sender<()>>>>,
    drained: tokio::sync::Mutex<mpsc::Receiver<()>>,
}

impl RelayEngine {
    pub fn builder() -> RelayEngineBuilder {
        RelayEngineBuilder::default()
    }

    /// Builds an engine from a validated configuration.
    pub fn from_config(config: &Config, client: Arc<dyn MessageClient>) -> RelayResult<Self> {
        let mut builder = Self::builder()
            .client(client)
            .default_identity(config.relay.default_identity.clone())
            .shutdown_grace(config.relay.shutdown_grace())
            .payload_preview_len(config.relay.payload_preview_len);

        if let Some(status) = &config.status {
            builder = builder.status_provider(Arc::from(create_status_provider(status)?));
        }

        if let Some(telemetry) = &config.telemetry {
            builder = builder.threshold(
                telemetry.rule(),
                telemetry.alert_topic.clone(),
                telemetry.identity_field.clone(),
            );
        }

        builder.build()
    }

    /// Subscribes every entry. All routes are checked before the first
    /// subscription is made, so a missing collaborator subscribes nothing.
    pub async fn start(&self, subscriptions: &[Subscription]) -> RelayResult<()> {
        for subscription in subscriptions {
            self.core.supports(subscription.handler)?;
        }

        if self.is_shutting_down() {
            return Err(RelayError::configuration("relay engine has already been shut down"));
        }

        let mut active = self.active.lock().await;
        for subscription in subscriptions {
            self.core
                .client
                .subscribe(&subscription.topic, self.handler_for(subscription.handler))
                .await
                .map_err(|source| RelayError::Subscribe {
                    topic: subscription.topic.clone(),
                    source,
                })?;

            tracing::info!(
                topic = %subscription.topic,
                handler = subscription.handler.as_str(),
                "Relay subscribed"
            );
            active.push(subscription.clone());
        }

        Ok(())
    }

    /// Runs until a terminate signal arrives (or every sender is gone), then
    /// shuts down. Returns whether all in-flight messages drained in time.
    pub async fn run(&self, mut control: broadcast::Receiver<ControlMessage>) -> bool {
        tracing::info!("Relay engine is running");

        match control.recv().await {
            Ok(ControlMessage::Terminate) => {
                tracing::info!("Relay engine received terminate signal");
            }
            Err(e) => {
                tracing::warn!("Relay control channel closed ({e}), shutting down");
            }
        }

        self.shutdown().await
    }

    /// Unsubscribes everything, stops accepting deliveries and waits for
    /// in-flight handlers. The whole sequence shares one grace period, so a
    /// client that never answers an unsubscribe cannot hold up shutdown.
    pub async fn shutdown(&self) -> bool {
        let deadline = Instant::now() + self.shutdown_grace;

        let subscriptions = std::mem::take(&mut *self.active.lock().await);
        for subscription in &subscriptions {
            match tokio::time::timeout_at(deadline, self.core.client.unsubscribe(&subscription.topic)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(topic = %subscription.topic, "Failed to unsubscribe: {e}");
                }
                Err(_) => {
                    tracing::warn!(topic = %subscription.topic, "Unsubscribe timed out");
                }
            }
        }

        drop(
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let mut drained = self.drained.lock().await;
        let completed = tokio::time::timeout_at(deadline, drained.recv())
            .await
            .is_ok();

        let stats = self.stats();
        if completed {
            tracing::info!(?stats, "Relay engine stopped");
        } else {
            tracing::error!(
                ?stats,
                grace_ms = self.shutdown_grace.as_millis() as u64,
                "In-flight messages did not finish within the shutdown grace period"
            );
        }

        completed
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn handler_for(&self, handler: HandlerKind) -> DeliveryHandler {
        let core = self.core.clone();
        let in_flight = self.in_flight.clone();

        Arc::new(move |message: InboundMessage| {
            let core = core.clone();
            let guard = in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();

            async move {
                let Some(_guard) = guard else {
                    tracing::debug!(topic = %message.topic, "Relay is shutting down, dropping message");
                    return;
                };
                core.handle(handler, message).await;
            }
            .boxed()
        })
    }
}

pub struct RelayEngineBuilder {
    client: Option<Arc<dyn MessageClient>>,
    status_provider: Option<Arc<dyn StatusProvider>>,
    threshold: Option<(ThresholdRule, String, String)>,
    default_identity: String,
    shutdown_grace: Duration,
    preview_len: usize,
}

impl Default for RelayEngineBuilder {
    fn default() -> Self {
        Self {
            client: None,
            status_provider: None,
            threshold: None,
            default_identity: "device1".to_string(),
            shutdown_grace: Duration::from_secs(5),
            preview_len: 128,
        }
    }
}

impl RelayEngineBuilder {
    pub fn client(mut self, client: Arc<dyn MessageClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn status_provider(mut self, provider: Arc<dyn StatusProvider>) -> Self {
        self.status_provider = Some(provider);
        self
    }

    pub fn threshold(
        mut self,
        rule: ThresholdRule,
        alert_topic: impl Into<String>,
        identity_field: impl Into<String>,
    ) -> Self {
        self.threshold = Some((rule, alert_topic.into(), identity_field.into()));
        self
    }

    pub fn default_identity(mut self, identity: impl Into<String>) -> Self {
        self.default_identity = identity.into();
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn payload_preview_len(mut self, len: usize) -> Self {
        self.preview_len = len;
        self
    }

    pub fn build(self) -> RelayResult<RelayEngine> {
        let client = self
            .client
            .ok_or_else(|| RelayError::configuration("no message client bound"))?;

        if self.status_provider.is_none() && self.threshold.is_none() {
            return Err(RelayError::configuration(
                "relay needs a status provider, a threshold rule, or both",
            ));
        }

        let dispatcher = self
            .status_provider
            .map(|provider| CommandDispatcher::new(provider, self.default_identity.clone()));

        let evaluator = self.threshold.map(|(rule, alert_topic, identity_field)| {
            TelemetryEvaluator::new(rule, alert_topic, identity_field, self.default_identity.clone())
        });

        let (sender, receiver) = mpsc::channel(1);

        Ok(RelayEngine {
            core: Arc::new(RelayCore {
                client,
                dispatcher,
                evaluator,
                preview_len: self.preview_len,
                stats: RelayStats::default(),
            }),
            shutdown_grace: self.shutdown_grace,
            active: tokio::sync::Mutex::new(Vec::new()),
            in_flight: Arc::new(Mutex::new(Some(sender))),
            drained: tokio::sync::Mutex::new(receiver),
        })
    }
}
