// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast channel shared by the manager and its thermostats.

use tokio::sync::broadcast;

use super::DeviceEvent;

/// Events buffered per receiver before a slow receiver starts lagging.
const EVENT_BUFFER: usize = 256;

/// Fan-out of [`DeviceEvent`]s to the host.
///
/// Clones share one channel: the manager hands a clone to every thermostat
/// it attaches. Sending never waits, so thermostats publish straight from
/// the message delivery path. A receiver more than 256 events behind gets
/// `RecvError::Lagged` and skips ahead.
///
/// # Examples
///
/// ```
/// use nestor_lib::event::{DeviceEvent, EventBus};
/// use nestor_lib::types::DeviceSerial;
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(DeviceEvent::device_added(DeviceSerial::new("02AA01AB").unwrap()));
/// assert!(rx.try_recv().unwrap().is_lifecycle());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(EVENT_BUFFER).0,
        }
    }

    /// Returns a receiver for every event sent from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Sends `event` to every live receiver; without receivers it is dropped.
    pub fn publish(&self, event: DeviceEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            tracing::trace!(
                serial = %event.serial(),
                state_change = event.is_state_change(),
                "Device event has no receivers"
            );
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
