//! MQTT client built on rumqttc.
//!
//! The event loop reconnects by itself on the next poll after an error; this
//! module only paces those attempts with exponential backoff (1s up to 60s)
//! and restores subscriptions on every `ConnAck`.
//!
//! Topics are subscribed in batches of [`SUBSCRIBE_BATCH_SIZE`] filters per
//! SUBSCRIBE packet, and the request channel is sized to hold every batch.

use std::time::Duration;

use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter, Transport,
};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::TopicUpdate;
use crate::config::MqttSettings;
use crate::engine::EngineEvent;
use crate::error::TransportError;
use crate::notify::backoff_delay;

/// Base delay for reconnection backoff.
pub const RECONNECT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Maximum delay for reconnection backoff.
pub const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Minimum capacity of the rumqttc request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Topic filters carried by one SUBSCRIBE packet.
pub const SUBSCRIBE_BATCH_SIZE: usize = 32;

/// Request channel capacity for `topic_count` topics: one slot per batch,
/// plus room for the disconnect request.
fn request_channel_capacity(topic_count: usize) -> usize {
    REQUEST_CHANNEL_CAPACITY.max(topic_count.div_ceil(SUBSCRIBE_BATCH_SIZE) + 1)
}

/// Build client options from resolved settings.
pub fn build_options(settings: &MqttSettings) -> MqttOptions {
    let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    options.set_keep_alive(settings.keep_alive);

    if let Some(ref username) = settings.username {
        let password = settings
            .password
            .as_ref()
            .map(|p| p.expose().to_string())
            .unwrap_or_default();
        options.set_credentials(username, password);
    }

    if settings.tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    options
}

/// Broker connection feeding the update engine.
pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    topics: Vec<String>,
    broker: String,
    connected_tx: Option<oneshot::Sender<()>>,
}

impl MqttTransport {
    /// Create the client. No network activity happens until [`run`](Self::run).
    pub fn new(settings: &MqttSettings, topics: Vec<String>) -> Self {
        let (client, eventloop) = AsyncClient::new(
            build_options(settings),
            request_channel_capacity(topics.len()),
        );
        Self {
            client,
            eventloop,
            topics,
            broker: format!("{}:{}", settings.host, settings.port),
            connected_tx: None,
        }
    }

    /// Signal `tx` once the first `ConnAck` arrives and subscriptions are
    /// requested. Later reconnections do not signal.
    pub fn with_connected_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.connected_tx = Some(tx);
        self
    }

    /// Topics subscribed on every connection.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Queue subscription requests covering every topic.
    ///
    /// Requests are queued without awaiting, since the event loop that
    /// drains them is polled by the same task.
    fn subscribe_all(&self) -> Result<(), TransportError> {
        for batch in self.topics.chunks(SUBSCRIBE_BATCH_SIZE) {
            let filters = batch
                .iter()
                .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtMostOnce));
            self.client
                .try_subscribe_many(filters)
                .map_err(|e| TransportError::SubscribeFailed {
                    topic: batch[0].clone(),
                    message: e.to_string(),
                })?;
            debug!(first = %batch[0], count = batch.len(), "Subscriptions requested");
        }
        Ok(())
    }

    /// Poll the broker until cancelled or until the engine stops listening.
    pub async fn run(mut self, tx: mpsc::Sender<EngineEvent>, cancel: CancellationToken) {
        info!(broker = %self.broker, topics = self.topics.len(), "Connecting to MQTT broker");

        let mut attempt: u32 = 0;

        loop {
            let event = tokio::select! {
                event = self.eventloop.poll() => event,
                _ = cancel.cancelled() => {
                    debug!("MQTT transport shutting down");
                    let _ = self.client.try_disconnect();
                    return;
                }
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    if attempt > 0 {
                        info!(broker = %self.broker, "Connection to broker restored");
                    } else {
                        info!(broker = %self.broker, "Connected to broker");
                    }
                    attempt = 0;
                    metrics::gauge!("topicwatch_mqtt_up").set(1.0);

                    if let Err(e) = self.subscribe_all() {
                        warn!(error = %e, "Failed to restore subscriptions");
                    }
                    if let Some(connected) = self.connected_tx.take() {
                        let _ = connected.send(());
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let update = TopicUpdate::from_payload(publish.topic, &publish.payload);
                    debug!(topic = %update.topic, "Received publication");

                    if tx.send(EngineEvent::Update(update)).await.is_err() {
                        debug!("Engine stopped, closing MQTT transport");
                        let _ = self.client.try_disconnect();
                        return;
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!(pkid = ack.pkid, "Subscription acknowledged");
                }
                Ok(_) => {}
                Err(e) => {
                    metrics::gauge!("topicwatch_mqtt_up").set(0.0);
                    metrics::counter!("topicwatch_mqtt_reconnections_total").increment(1);

                    let delay =
                        backoff_delay(attempt, RECONNECT_BACKOFF_BASE, RECONNECT_BACKOFF_MAX);
                    warn!(
                        broker = %self.broker,
                        error = %e,
                        attempt = attempt,
                        delay_secs = delay.as_secs(),
                        "Connection failed, retrying"
                    );
                    attempt = attempt.saturating_add(1);

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            debug!("MQTT transport shutting down");
                            return;
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("broker", &self.broker)
            .field("topics", &self.topics)
            .finish()
    }
}
