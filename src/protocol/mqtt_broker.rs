// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker connection.
//!
//! [`MqttBroker`] is the [`Transport`] implementation backed by `rumqttc`.
//! It keeps a persistent connection, reconnects after errors, and
//! re-subscribes every known topic after each reconnect.
//!
//! # Examples
//!
//! ```no_run
//! use nestor_lib::protocol::{MqttBroker, Transport};
//!
//! # async fn example() -> nestor_lib::Result<()> {
//! let broker = MqttBroker::builder()
//!     .host("192.168.1.50")
//!     .port(1883)
//!     .credentials("user", "password")
//!     .build()
//!     .await?;
//!
//! let mut messages = broker.take_message_receiver().unwrap();
//! broker.subscribe("nest/02AA01AB/device/current_temperature").await?;
//!
//! while let Some(message) = messages.recv().await {
//!     println!("{}: {:?}", message.topic, message.payload);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{DeliveryHint, InboundMessage, Transport};
use crate::error::ProtocolError;

/// Capacity of the queue between the event loop and the message consumer.
const INBOUND_CAPACITY: usize = 256;

/// Capacity of the client request channel.
const REQUEST_CAPACITY: usize = 64;

/// Configuration for an MQTT broker connection.
#[derive(Debug, Clone)]
pub struct MqttBrokerConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    connection_timeout: Duration,
    reconnect_delay: Duration,
    client_id: Option<String>,
}

impl Default for MqttBrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            client_id: None,
        }
    }
}

/// A persistent MQTT broker connection.
///
/// `MqttBroker` is cheaply cloneable (via `Arc`); clones share the
/// connection.
#[derive(Clone)]
pub struct MqttBroker {
    inner: Arc<MqttBrokerInner>,
}

struct MqttBrokerInner {
    client: AsyncClient,
    config: MqttBrokerConfig,
    client_id: String,
    connected: AtomicBool,
    shutting_down: AtomicBool,
    /// Topics to restore after a reconnect.
    subscriptions: Mutex<BTreeSet<String>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
}

impl MqttBroker {
    /// Creates a new builder for configuring an MQTT broker connection.
    #[must_use]
    pub fn builder() -> MqttBrokerBuilder {
        MqttBrokerBuilder::default()
    }

    /// Creates the client side and its event loop; nothing touches the
    /// network until the event loop is polled.
    fn unconnected(config: MqttBrokerConfig, inbound_capacity: usize) -> (Self, EventLoop) {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("nestor-{}", uuid::Uuid::new_v4().simple()));

        let mut mqtt_options = MqttOptions::new(&client_id, &config.host, config.port);
        mqtt_options.set_keep_alive(config.keep_alive);
        mqtt_options.set_clean_session(true);
        if let Some((username, password)) = &config.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_capacity);

        let broker = Self {
            inner: Arc::new(MqttBrokerInner {
                client,
                config,
                client_id,
                connected: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                subscriptions: Mutex::new(BTreeSet::new()),
                inbound_tx,
                inbound_rx: Mutex::new(Some(inbound_rx)),
            }),
        };
        (broker, event_loop)
    }

    /// Returns whether the broker is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the host address of the broker.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    /// Returns the port of the broker.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    /// Returns the MQTT client id used for this connection.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Returns whether authentication is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.inner.config.credentials.is_some()
    }

    /// Returns the topics currently subscribed.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.inner.subscriptions.lock().iter().cloned().collect()
    }

    /// Takes the receiver of inbound messages.
    ///
    /// There is a single inbound path per connection: the first call
    /// returns the receiver, later calls return `None`. Messages arriving
    /// while the queue is full are dropped with a warning.
    #[must_use]
    pub fn take_message_receiver(&self) -> Option<mpsc::Receiver<InboundMessage>> {
        self.inner.inbound_rx.lock().take()
    }

    /// Disconnects from the broker and stops the event loop.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be sent.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!(
            host = %self.inner.config.host,
            port = %self.inner.config.port,
            "Disconnecting from MQTT broker"
        );

        self.inner.shutting_down.store(true, Ordering::Release);
        self.inner.subscriptions.lock().clear();
        self.inner.connected.store(false, Ordering::Release);
        self.inner.client.disconnect().await?;
        Ok(())
    }

    /// Queues a message from the event loop for the consumer.
    fn forward(&self, message: InboundMessage) {
        match self.inner.inbound_tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                tracing::warn!(topic = %message.topic, "Inbound queue full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                tracing::trace!(topic = %message.topic, "No consumer for inbound message");
            }
        }
    }

    /// Re-issues every known subscription after a reconnect.
    fn restore_subscriptions(&self) -> Option<JoinHandle<()>> {
        let topics = self.subscribed_topics();
        if topics.is_empty() {
            return None;
        }

        // Requests go through the client channel that the event loop drains,
        // so they must not be awaited from the event loop task itself.
        let client = self.inner.client.clone();
        Some(tokio::spawn(async move {
            for topic in &topics {
                if let Err(e) = client.subscribe(topic.as_str(), QoS::AtLeastOnce).await {
                    tracing::error!(topic = %topic, error = %e, "Failed to restore subscription");
                }
            }
            tracing::debug!(count = topics.len(), "Restored subscriptions");
        }))
    }
}

impl Transport for MqttBroker {
    async fn subscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.inner
            .client
            .subscribe(topic, QoS::AtLeastOnce)
            .await?;
        // Only topics the client accepted are restored after a reconnect
        self.inner.subscriptions.lock().insert(topic.to_string());
        tracing::debug!(topic = %topic, "Subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.inner.subscriptions.lock().remove(topic);
        self.inner.client.unsubscribe(topic).await?;
        tracing::debug!(topic = %topic, "Unsubscribed");
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: String,
        delivery: DeliveryHint,
    ) -> Result<(), ProtocolError> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(ProtocolError::NotConnected);
        }
        self.inner
            .client
            .publish(topic, qos(delivery), false, payload.into_bytes())
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ProtocolError> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Ok(());
        }
        self.disconnect().await
    }
}

fn qos(delivery: DeliveryHint) -> QoS {
    match delivery {
        DeliveryHint::AtMostOnce => QoS::AtMostOnce,
        DeliveryHint::AtLeastOnce => QoS::AtLeastOnce,
        DeliveryHint::ExactlyOnce => QoS::ExactlyOnce,
    }
}

impl std::fmt::Debug for MqttBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBroker")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("client_id", &self.inner.client_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Builder for creating an MQTT broker connection.
///
/// # Examples
///
/// ```no_run
/// use nestor_lib::protocol::MqttBroker;
/// use std::time::Duration;
///
/// # async fn example() -> nestor_lib::Result<()> {
/// let broker = MqttBroker::builder()
///     .host("192.168.1.50")
///     .port(1883)
///     .credentials("user", "password")
///     .keep_alive(Duration::from_secs(60))
///     .connection_timeout(Duration::from_secs(5))
///     .reconnect_delay(Duration::from_secs(2))
///     .client_id("nestor-living-room")
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MqttBrokerBuilder {
    config: MqttBrokerConfig,
}

impl MqttBrokerBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the connection timeout (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Sets the pause between reconnect attempts (default: 5 seconds).
    #[must_use]
    pub fn reconnect_delay(mut self, duration: Duration) -> Self {
        self.config.reconnect_delay = duration;
        self
    }

    /// Sets the MQTT client id (default: `nestor-` followed by a random UUID).
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = Some(client_id.into());
        self
    }

    /// Builds and connects to the MQTT broker.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Host is not set
    /// - Connection fails
    /// - Connection times out
    pub async fn build(self) -> Result<MqttBroker, ProtocolError> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let (broker, event_loop) = MqttBroker::unconnected(self.config.clone(), INBOUND_CAPACITY);
        let (connack_tx, connack_rx) = oneshot::channel();

        tokio::spawn(handle_broker_events(event_loop, broker.clone(), connack_tx));

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %self.config.host,
                    port = %self.config.port,
                    client_id = %broker.client_id(),
                    "Connected to MQTT broker"
                );
                Ok(broker)
            }
            Ok(Err(_)) => Err(ProtocolError::ConnectionFailed(format!(
                "could not connect to {}:{}",
                self.config.host, self.config.port
            ))),
            Err(_) => {
                broker.inner.shutting_down.store(true, Ordering::Release);
                Err(ProtocolError::ConnectionFailed(format!(
                    "MQTT connection timeout after {}s",
                    timeout.as_secs()
                )))
            }
        }
    }
}

/// Drives the connection until the broker is disconnected.
///
/// Errors before the first `ConnAck` end the loop, which fails the build.
/// Errors after it are logged and the loop keeps polling, which makes
/// `rumqttc` reconnect.
async fn handle_broker_events(
    mut event_loop: EventLoop,
    broker: MqttBroker,
    connack_tx: oneshot::Sender<()>,
) {
    use rumqttc::{Event, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                broker.inner.connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                } else {
                    tracing::info!("Reconnected to MQTT broker");
                    broker.restore_subscriptions();
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    "MQTT message received"
                );
                broker.forward(InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                });
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker disconnected");
                broker.inner.connected.store(false, Ordering::Release);
                if broker.inner.shutting_down.load(Ordering::Acquire) {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                broker.inner.connected.store(false, Ordering::Release);
                if broker.inner.shutting_down.load(Ordering::Acquire) {
                    tracing::debug!(error = %e, "MQTT event loop stopped");
                    break;
                }
                if connack_tx.is_some() {
                    tracing::error!(error = %e, "MQTT connection failed");
                    break;
                }
                tracing::error!(
                    error = %e,
                    retry_in_ms = broker.inner.config.reconnect_delay.as_millis(),
                    "MQTT broker event loop error"
                );
                tokio::time::sleep(broker.inner.config.reconnect_delay).await;
            }
        }
    }
}
