// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thermostat state snapshot.

use serde::{Deserialize, Serialize};

use super::{StateChange, derive_action};
use crate::types::{HvacAction, HvacMode};

/// The canonical state of one thermostat.
///
/// Temperatures are `None` until the first update for them arrives. The
/// HVAC action is never set directly; it is derived from the mode and the
/// temperatures.
///
/// # Examples
///
/// ```
/// use nestor_lib::state::{DeviceState, StateChange};
///
/// let mut state = DeviceState::new();
/// assert!(state.is_occupied());
///
/// state.apply(&StateChange::Away(true));
/// assert!(!state.is_occupied());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    current_temperature: Option<f64>,
    target_temperature: Option<f64>,
    target_temperature_low: Option<f64>,
    target_temperature_high: Option<f64>,
    hvac_mode: HvacMode,
    hvac_action: HvacAction,
    fan_active: bool,
    occupied: bool,
    available: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            current_temperature: None,
            target_temperature: None,
            target_temperature_low: None,
            target_temperature_high: None,
            hvac_mode: HvacMode::Off,
            hvac_action: HvacAction::Off,
            fan_active: false,
            occupied: true,
            available: true,
        }
    }
}

impl DeviceState {
    /// Creates the initial state of a newly added thermostat.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the measured temperature.
    #[must_use]
    pub fn current_temperature(&self) -> Option<f64> {
        self.current_temperature
    }

    /// Returns the single setpoint.
    #[must_use]
    pub fn target_temperature(&self) -> Option<f64> {
        self.target_temperature
    }

    /// Returns the lower setpoint used in heat-cool mode.
    #[must_use]
    pub fn target_temperature_low(&self) -> Option<f64> {
        self.target_temperature_low
    }

    /// Returns the upper setpoint used in heat-cool mode.
    #[must_use]
    pub fn target_temperature_high(&self) -> Option<f64> {
        self.target_temperature_high
    }

    /// Returns the operating mode.
    #[must_use]
    pub fn hvac_mode(&self) -> HvacMode {
        self.hvac_mode
    }

    /// Returns the derived action.
    #[must_use]
    pub fn hvac_action(&self) -> HvacAction {
        self.hvac_action
    }

    /// Returns whether the fan timer is running.
    #[must_use]
    pub fn is_fan_active(&self) -> bool {
        self.fan_active
    }

    /// Returns whether someone is home (not in away mode).
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    /// Returns whether the thermostat is reachable.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Applies one field update.
    ///
    /// The HVAC action is not recomputed here; see
    /// [`refresh_action`](Self::refresh_action). Returns `true` if the
    /// state changed.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        match *change {
            StateChange::CurrentTemperature(t) => {
                replace(&mut self.current_temperature, Some(t))
            }
            StateChange::TargetTemperature(t) => replace(&mut self.target_temperature, Some(t)),
            StateChange::TargetTemperatureLow(t) => {
                replace(&mut self.target_temperature_low, Some(t))
            }
            StateChange::TargetTemperatureHigh(t) => {
                replace(&mut self.target_temperature_high, Some(t))
            }
            StateChange::HvacMode(mode) => replace(&mut self.hvac_mode, mode),
            StateChange::FanActive(active) => replace(&mut self.fan_active, active),
            StateChange::Away(away) => replace(&mut self.occupied, !away),
            StateChange::Availability(available) => replace(&mut self.available, available),
        }
    }

    /// Derives the HVAC action from the current mode and temperatures.
    ///
    /// Returns `true` if the action changed.
    pub fn refresh_action(&mut self) -> bool {
        let action = derive_action(
            self.hvac_mode,
            self.current_temperature,
            self.target_temperature,
        );
        replace(&mut self.hvac_action, action)
    }
}

fn replace<V: PartialEq>(slot: &mut V, value: V) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
