// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker-facing side of the library.
//!
//! - [`Transport`]: the primitives required from a broker connection
//! - [`MqttBroker`]: the `rumqttc` implementation (feature `mqtt`)
//! - [`TopicRouter`]: field to topic mapping and back
//! - [`Payload`]: decoded message payloads and their wire form
//! - [`MessageRelay`]: the single point of contact between thermostats and
//!   the transport
//!
//! # Message flow
//!
//! ```text
//! transport ──(topic, bytes)──▶ MessageRelay::on_message
//!                                     │ Payload::decode
//!                                     ▼
//!                     SubscriptionRegistry::dispatch
//!                                     │
//!                                     ▼
//!                          Thermostat (observer)
//! ```

#[cfg(feature = "mqtt")]
mod mqtt_broker;
mod payload;
mod relay;
#[cfg(test)]
pub(crate) mod testing;
mod topic_router;

use std::future::Future;

#[cfg(feature = "mqtt")]
pub use mqtt_broker::{MqttBroker, MqttBrokerBuilder};
pub use payload::Payload;
pub use relay::MessageRelay;
pub use topic_router::{DEFAULT_TOPIC_PREFIX, Field, FieldAddress, ObjectType, TopicRouter};

use crate::error::ProtocolError;

/// Delivery guarantee requested for an outbound message.
///
/// The transport maps this onto whatever its protocol offers; for MQTT it is
/// the QoS level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeliveryHint {
    /// Fire and forget (QoS 0).
    AtMostOnce,
    /// Delivered at least once (QoS 1).
    #[default]
    AtLeastOnce,
    /// Delivered exactly once (QoS 2).
    ExactlyOnce,
}

/// A raw message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// The topic the message was published on.
    pub topic: String,
    /// The undecoded payload bytes.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Creates a new inbound message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Primitives the library needs from a broker connection.
///
/// Connection management, reconnects and authentication belong to the
/// implementation. Inbound messages are not part of this trait: the
/// implementation hands them to [`MessageRelay::on_message`] through
/// whatever delivery path it has (see [`MqttBroker::take_message_receiver`]).
///
/// [`MqttBroker::take_message_receiver`]: crate::protocol::MqttBroker::take_message_receiver
pub trait Transport: Send + Sync + 'static {
    /// Subscribes to a topic.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the subscription request cannot be sent.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Unsubscribes from a topic.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request cannot be sent.
    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Publishes a payload on a topic.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the message cannot be handed to the broker.
    fn publish(
        &self,
        topic: &str,
        payload: String,
        delivery: DeliveryHint,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Releases the connection. Called once when the manager shuts down.
    ///
    /// The default does nothing.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the connection cannot be closed cleanly.
    fn close(&self) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delivery_is_at_least_once() {
        assert_eq!(DeliveryHint::default(), DeliveryHint::AtLeastOnce);
    }

    #[test]
    fn inbound_message_new() {
        let msg = InboundMessage::new("nest/A/availability", "true");
        assert_eq!(msg.topic, "nest/A/availability");
        assert_eq!(msg.payload, b"true");
    }
}
