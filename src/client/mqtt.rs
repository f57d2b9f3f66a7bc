use super::connection::to_mqtt_qos;
use super::{DeliveryHandler, MessageClient, topic_matches};
use crate::config::MqttConfig;
use crate::core::ControlMessage;
use crate::core::error::ClientError;
use crate::core::message::{InboundMessage, QualityOfService};

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Duration;

type Subscriptions = Arc<RwLock<Vec<(String, DeliveryHandler)>>>;

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Message client backed by an MQTT broker.
///
/// The event loop runs on its own task. Each inbound publish is matched
/// against the registered filters and every matching handler is spawned as
/// an independent task.
pub struct MqttMessageClient {
    client: AsyncClient,
    subscribe_qos: QoS,
    subscriptions: Subscriptions,
    control: broadcast::Sender<ControlMessage>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttMessageClient {
    /// Creates the client and starts its event loop. The connection itself is
    /// established in the background and retried on failure.
    pub fn connect(config: &MqttConfig) -> anyhow::Result<Self> {
        let mqttoptions = config.create_mqtt_options("edge_relay")?;
        let (client, eventloop) = AsyncClient::new(mqttoptions, config.request_capacity);

        let subscriptions: Subscriptions = Arc::new(RwLock::new(Vec::new()));
        let (control, control_rx) = broadcast::channel(1);

        let event_task = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            config.subscribe_qos(),
            subscriptions.clone(),
            control_rx,
        ));

        tracing::info!(
            "MQTT client initialised (broker: {}, QoS: {}, clean_session: {})",
            config.broker_url,
            config.qos,
            config.clean_session
        );

        Ok(Self {
            client,
            subscribe_qos: config.subscribe_qos(),
            subscriptions,
            control,
            event_task: Mutex::new(Some(event_task)),
        })
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    qos: QoS,
    subscriptions: Subscriptions,
    mut control: broadcast::Receiver<ControlMessage>,
) {
    let mut connected_once = false;

    loop {
        tokio::select! {
            message = control.recv() => {
                match message {
                    Ok(ControlMessage::Terminate) | Err(_) => {
                        tracing::info!("MQTT event loop received terminate signal");
                        break;
                    }
                }
            }

            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = InboundMessage::new(publish.topic.clone(), publish.payload.to_vec());
                        deliver(&subscriptions, message);
                    }
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        tracing::info!(session_present = ack.session_present, "Connected to MQTT broker");
                        // A fresh session after a reconnect has lost our subscriptions.
                        if connected_once && !ack.session_present {
                            resubscribe(&client, qos, &subscriptions);
                        }
                        connected_once = true;
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        tracing::info!("MQTT disconnect sent, stopping event loop");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("MQTT connection error: {}", e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        }
    }
}

fn deliver(subscriptions: &Subscriptions, message: InboundMessage) {
    let handlers: Vec<DeliveryHandler> = subscriptions
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|(filter, _)| topic_matches(filter, &message.topic))
        .map(|(_, handler)| handler.clone())
        .collect();

    if handlers.is_empty() {
        tracing::debug!("No handler for MQTT topic '{}'", message.topic);
        return;
    }

    for handler in handlers {
        tokio::spawn(handler(message.clone()));
    }
}

fn resubscribe(client: &AsyncClient, qos: QoS, subscriptions: &Subscriptions) {
    let filters: Vec<String> = subscriptions
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|(filter, _)| filter.clone())
        .collect();

    for filter in filters {
        // The event loop must not block on its own request queue.
        if let Err(e) = client.try_subscribe(filter.as_str(), qos) {
            tracing::error!("Failed to resubscribe to '{}': {}", filter, e);
        } else {
            tracing::info!("Resubscribed to MQTT topic: {}", filter);
        }
    }
}

#[async_trait]
impl MessageClient for MqttMessageClient {
    async fn subscribe(&self, topic: &str, handler: DeliveryHandler) -> Result<(), ClientError> {
        self.client
            .subscribe(topic, self.subscribe_qos)
            .await
            .map_err(|e| ClientError::Rejected {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        // Only filters the broker was actually asked for are resubscribed
        // after a reconnect.
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), handler));

        tracing::info!("Subscribed to MQTT topic: {} (QoS: {:?})", topic, self.subscribe_qos);
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), ClientError> {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(filter, _)| filter != topic);

        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| ClientError::Rejected {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QualityOfService,
    ) -> Result<(), ClientError> {
        self.client
            .publish(topic, to_mqtt_qos(qos), false, payload)
            .await
            .map_err(|e| ClientError::Rejected {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        let task = self
            .event_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(mut task) = task else {
            return Err(ClientError::Disconnected);
        };

        if let Err(e) = self.client.disconnect().await {
            tracing::warn!("Failed to queue MQTT disconnect: {}", e);
        }

        if tokio::time::timeout(DISCONNECT_TIMEOUT, &mut task).await.is_err() {
            tracing::warn!("MQTT event loop did not stop in time, terminating it");
            let _ = self.control.send(ControlMessage::Terminate);
            if tokio::time::timeout(DISCONNECT_TIMEOUT, &mut task).await.is_err() {
                task.abort();
            }
        }

        tracing::info!("MQTT client disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use rumqttc::MqttOptions;

    #[tokio::test]
    async fn test_failed_subscribe_is_not_kept_for_resubscription() {
        // With the event loop gone every request is refused
        let (client, eventloop) = AsyncClient::new(MqttOptions::new("edge_relay_test", "localhost", 1883), 10);
        drop(eventloop);

        let (control, _) = broadcast::channel(1);
        let mqtt = MqttMessageClient {
            client,
            subscribe_qos: QoS::AtLeastOnce,
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            control,
            event_task: Mutex::new(None),
        };

        let handler: DeliveryHandler = Arc::new(|_message: InboundMessage| async {}.boxed());
        let result = mqtt.subscribe("commands/+", handler).await;

        assert!(matches!(result, Err(ClientError::Rejected { .. })));
        assert!(mqtt.subscriptions.read().unwrap().is_empty());
    }
}
