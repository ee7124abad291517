// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thermostats.
//!
//! A [`Thermostat`] mirrors one physical thermostat: it observes the
//! thermostat's field topics through the [`MessageRelay`], keeps a
//! [`DeviceState`] up to date, and turns control requests into command
//! publishes.
//!
//! # Commands are fire-and-forget
//!
//! Setting a value publishes to the field's `/set` topic and returns as soon
//! as the transport accepted the message. The local state is left alone
//! until the thermostat reports the applied value back:
//!
//! ```text
//! set_target_temperature(21.5)
//!     └─▶ publish nest/02AA01AB/shared/target_temperature/set "21.5"
//!
//! ... later ...
//!
//! nest/02AA01AB/shared/target_temperature "21.5"
//!     └─▶ DeviceState::target_temperature() == Some(21.5)
//! ```
//!
//! Use [`DeviceManager`](crate::manager::DeviceManager) to run several
//! thermostats on one connection.
//!
//! [`MessageRelay`]: crate::protocol::MessageRelay
//! [`DeviceState`]: crate::state::DeviceState

mod info;
mod thermostat;

pub use info::{DeviceInfo, MANUFACTURER, MODEL, TemperatureRequest};
pub use thermostat::{Thermostat, ThermostatBuilder};
