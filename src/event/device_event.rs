// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use serde::{Deserialize, Serialize};

use crate::state::{DeviceState, StateChange};
use crate::types::DeviceSerial;

/// Events emitted for managed thermostats.
///
/// `StateChanged` is emitted after every successfully applied update, even
/// when the value did not change, so the host can refresh what it exposes.
///
/// # Examples
///
/// ```
/// use nestor_lib::event::DeviceEvent;
/// use nestor_lib::types::DeviceSerial;
///
/// let serial = DeviceSerial::new("02AA01AB").unwrap();
/// let added = DeviceEvent::device_added(serial.clone());
///
/// assert!(added.is_lifecycle());
/// assert_eq!(added.serial(), &serial);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// A thermostat was added to the manager.
    DeviceAdded {
        /// The serial of the added thermostat.
        serial: DeviceSerial,
    },

    /// A thermostat was removed from the manager.
    DeviceRemoved {
        /// The serial of the removed thermostat.
        serial: DeviceSerial,
    },

    /// A field update was applied.
    StateChanged {
        /// The serial of the thermostat.
        serial: DeviceSerial,
        /// The update that was applied.
        change: StateChange,
        /// The complete state after the update.
        new_state: DeviceState,
    },
}

impl DeviceEvent {
    /// Returns the serial of the thermostat this event is about.
    #[must_use]
    pub fn serial(&self) -> &DeviceSerial {
        match self {
            Self::DeviceAdded { serial }
            | Self::DeviceRemoved { serial }
            | Self::StateChanged { serial, .. } => serial,
        }
    }

    /// Returns `true` if this is a device lifecycle event (added/removed).
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::DeviceAdded { .. } | Self::DeviceRemoved { .. })
    }

    /// Returns `true` if this is a state change event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Creates a device added event.
    #[must_use]
    pub fn device_added(serial: DeviceSerial) -> Self {
        Self::DeviceAdded { serial }
    }

    /// Creates a device removed event.
    #[must_use]
    pub fn device_removed(serial: DeviceSerial) -> Self {
        Self::DeviceRemoved { serial }
    }

    /// Creates a state changed event.
    #[must_use]
    pub fn state_changed(serial: DeviceSerial, change: StateChange, new_state: DeviceState) -> Self {
        Self::StateChanged {
            serial,
            change,
            new_state,
        }
    }
}
