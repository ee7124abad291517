// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message relay between the transport and registered observers.

use std::sync::Arc;

use super::{DeliveryHint, Payload, Transport};
use crate::error::ProtocolError;
use crate::subscription::SubscriptionRegistry;

/// The single point of contact with the transport.
///
/// Inbound, the relay decodes raw payloads and dispatches them through the
/// [`SubscriptionRegistry`]. Outbound, it encodes values to their wire form
/// and publishes them with at-least-once delivery.
///
/// The relay knows nothing about devices. One relay is shared, behind an
/// `Arc`, by every thermostat on the same connection.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use nestor_lib::protocol::{MessageRelay, MqttBroker};
/// use nestor_lib::subscription::SubscriptionRegistry;
///
/// # async fn example() -> nestor_lib::Result<()> {
/// let broker = MqttBroker::builder().host("192.168.1.50").build().await?;
/// let relay = MessageRelay::new(broker, Arc::new(SubscriptionRegistry::new()));
///
/// relay.publish("nest/02AA01AB/shared/target_temperature/set", 21.5).await?;
/// # Ok(())
/// # }
/// ```
pub struct MessageRelay<T> {
    transport: T,
    registry: Arc<SubscriptionRegistry>,
}

impl<T> MessageRelay<T> {
    /// Returns the registry messages are dispatched through.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> MessageRelay<T> {
    /// Creates a relay over a transport and a registry.
    #[must_use]
    pub fn new(transport: T, registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            transport,
            registry,
        }
    }

    /// Handles one message delivered by the transport.
    ///
    /// Malformed payloads are logged and dropped without reaching any
    /// observer. Returns the number of observers that handled the message.
    pub fn on_message(&self, topic: &str, raw: &[u8]) -> usize {
        let payload = match Payload::decode(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    topic = %topic,
                    payload = %String::from_utf8_lossy(raw),
                    error = %e,
                    "Dropping undecodable message"
                );
                return 0;
            }
        };

        tracing::trace!(topic = %topic, payload = %payload, "Relaying message");
        self.registry.dispatch(topic, &payload)
    }

    /// Encodes a value and publishes it on `topic`.
    ///
    /// Failures are logged and returned; the relay never retries.
    ///
    /// # Errors
    ///
    /// Returns the transport's `ProtocolError` if the publish fails.
    pub async fn publish(
        &self,
        topic: &str,
        value: impl Into<Payload>,
    ) -> Result<(), ProtocolError> {
        let wire = value.into().to_wire();
        tracing::debug!(topic = %topic, payload = %wire, "Publishing");

        self.transport
            .publish(topic, wire, DeliveryHint::AtLeastOnce)
            .await
            .inspect_err(|e| {
                tracing::error!(topic = %topic, error = %e, "Publish failed");
            })
    }

    /// Subscribes the transport to `topic`.
    ///
    /// # Errors
    ///
    /// Returns the transport's `ProtocolError` if the subscription fails.
    pub async fn subscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.transport.subscribe(topic).await.inspect_err(|e| {
            tracing::error!(topic = %topic, error = %e, "Subscribe failed");
        })
    }

    /// Unsubscribes the transport from `topic`.
    ///
    /// # Errors
    ///
    /// Returns the transport's `ProtocolError` if the request fails.
    pub async fn unsubscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.transport.unsubscribe(topic).await.inspect_err(|e| {
            tracing::warn!(topic = %topic, error = %e, "Unsubscribe failed");
        })
    }
}

impl<T> std::fmt::Debug for MessageRelay<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRelay")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::protocol::testing::RecordingTransport;
    use crate::subscription::Observer;

    fn relay() -> MessageRelay<RecordingTransport> {
        MessageRelay::new(
            RecordingTransport::default(),
            Arc::new(SubscriptionRegistry::new()),
        )
    }

    fn counting_observer(counter: &Arc<AtomicU32>) -> Arc<dyn Observer> {
        let counter = Arc::clone(counter);
        Arc::new(move |_: &str, _: &Payload| -> crate::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn publish_encodes_and_uses_at_least_once() {
        let relay = relay();

        relay.publish("a/set", 21.5).await.unwrap();
        relay.publish("b/set", true).await.unwrap();
        relay.publish("c/set", "range").await.unwrap();

        let published = relay.transport().published();
        assert_eq!(
            published,
            vec![
                ("a/set".to_string(), "21.5".to_string()),
                ("b/set".to_string(), "true".to_string()),
                ("c/set".to_string(), "range".to_string()),
            ]
        );
        assert!(
            relay
                .transport()
                .deliveries()
                .iter()
                .all(|d| *d == DeliveryHint::AtLeastOnce)
        );
    }

    #[tokio::test]
    async fn publish_failure_is_returned_not_retried() {
        let relay = relay();
        relay.transport().fail_publishes(true);

        let result = relay.publish("a/set", 1.0).await;

        assert!(matches!(result, Err(ProtocolError::NotConnected)));
        assert_eq!(relay.transport().publish_attempts(), 1);
    }

    #[test]
    fn on_message_dispatches_decoded_payload() {
        let relay = relay();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let s = Arc::clone(&seen);
        relay
            .registry()
            .register(
                "nest/A/device/away",
                Arc::new(move |_: &str, payload: &Payload| -> crate::Result<()> {
                    *s.lock() = Some(payload.clone());
                    Ok(())
                }),
            )
            .unwrap();

        assert_eq!(relay.on_message("nest/A/device/away", b"true"), 1);
        assert_eq!(*seen.lock(), Some(Payload::Text("true".to_string())));
    }

    #[test]
    fn malformed_payload_never_reaches_observers() {
        let relay = relay();
        let counter = Arc::new(AtomicU32::new(0));
        relay
            .registry()
            .register("t", counting_observer(&counter))
            .unwrap();

        assert_eq!(relay.on_message("t", b"{\"broken\""), 0);
        assert_eq!(relay.on_message("t", &[0xc3, 0x28]), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert_eq!(relay.on_message("t", b"{\"ok\": 1}"), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_topic_is_ignored() {
        let relay = relay();
        assert_eq!(relay.on_message("foreign/topic", b"1"), 0);
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unrouted_messages_are_logged() {
        let relay = relay();
        let counter = Arc::new(AtomicU32::new(0));
        relay
            .registry()
            .register("nest/02AA01AB/device/away", counting_observer(&counter))
            .unwrap();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let delivered = tracing::subscriber::with_default(subscriber, || {
            relay.on_message("nest/ZZZZZZZZ/device/away", b"true")
                + relay.on_message("other/thing", b"1")
        });

        assert_eq!(delivered, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        let output = String::from_utf8_lossy(&logs.0.lock()).into_owned();
        assert_eq!(output.matches("No observer for topic").count(), 2);
        assert!(output.contains("nest/ZZZZZZZZ/device/away"));
        assert!(output.contains("other/thing"));
    }

    #[tokio::test]
    async fn subscribe_passthrough() {
        let relay = relay();
        relay.subscribe("nest/A/availability").await.unwrap();
        relay.unsubscribe("nest/A/availability").await.unwrap();
        assert!(relay.transport().subscriptions().is_empty());
    }
}
