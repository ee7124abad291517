// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host notifications.
//!
//! Thermostats publish a [`DeviceEvent::StateChanged`] on the [`EventBus`]
//! after every applied update; the manager adds lifecycle events. Hosts that
//! only care about one thermostat's latest state can use its `watch`
//! channel instead, see [`Thermostat::watch`](crate::device::Thermostat::watch).

mod device_event;
mod event_bus;

pub use device_event::DeviceEvent;
pub use event_bus::EventBus;
