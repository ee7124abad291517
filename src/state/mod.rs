// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thermostat state types.
//!
//! [`DeviceState`] holds the canonical state of one thermostat,
//! [`StateChange`] is a single decoded field update, and [`derive_action`]
//! computes the HVAC action from the mode and temperatures.
//!
//! # Examples
//!
//! ```
//! use nestor_lib::state::{DeviceState, StateChange};
//! use nestor_lib::types::{HvacAction, HvacMode};
//!
//! let mut state = DeviceState::new();
//! state.apply(&StateChange::HvacMode(HvacMode::Cool));
//! state.apply(&StateChange::TargetTemperature(22.0));
//! state.apply(&StateChange::CurrentTemperature(25.0));
//! state.refresh_action();
//!
//! assert_eq!(state.hvac_action(), HvacAction::Cooling);
//! ```

mod action;
mod device_state;
mod state_change;

pub use action::{TEMPERATURE_THRESHOLD, derive_action};
pub use device_state::DeviceState;
pub use state_change::{StateChange, parse_bool};
