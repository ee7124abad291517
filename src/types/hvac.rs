// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HVAC mode and action types.
//!
//! The thermostat firmware names its modes `off`, `heat`, `cool` and
//! `range`. The library exposes them as [`HvacMode`], with `range` mapped to
//! [`HvacMode::HeatCool`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating mode selected by the user.
///
/// # Examples
///
/// ```
/// use nestor_lib::types::HvacMode;
///
/// assert_eq!(HvacMode::HeatCool.as_wire(), "range");
/// assert_eq!(HvacMode::from_wire("cool"), HvacMode::Cool);
///
/// // Unknown inbound modes fall back to off
/// assert_eq!(HvacMode::from_wire("eco"), HvacMode::Off);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    /// The system is off.
    #[default]
    Off,
    /// Heating only.
    Heat,
    /// Cooling only.
    Cool,
    /// Heating or cooling to stay within a range.
    HeatCool,
}

impl HvacMode {
    /// All modes supported by the thermostat, in display order.
    pub const ALL: [Self; 4] = [Self::Off, Self::Heat, Self::Cool, Self::HeatCool];

    /// Returns the string the thermostat uses for this mode.
    #[must_use]
    pub const fn as_wire(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::HeatCool => "range",
        }
    }

    /// Maps a thermostat mode string to a mode.
    ///
    /// Matching is exact. Anything unrecognized maps to [`HvacMode::Off`].
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "heat" => Self::Heat,
            "cool" => Self::Cool,
            "range" => Self::HeatCool,
            _ => Self::Off,
        }
    }

    /// Returns `true` if this mode allows heating.
    #[must_use]
    pub const fn can_heat(&self) -> bool {
        matches!(self, Self::Heat | Self::HeatCool)
    }

    /// Returns `true` if this mode allows cooling.
    #[must_use]
    pub const fn can_cool(&self) -> bool {
        matches!(self, Self::Cool | Self::HeatCool)
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::HeatCool => "heat_cool",
        };
        f.write_str(name)
    }
}

/// What the system is currently doing.
///
/// This is never reported by the thermostat. It is derived from the mode and
/// the temperatures, see [`derive_action`](crate::state::derive_action).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacAction {
    /// The system is off.
    #[default]
    Off,
    /// On, but neither heating nor cooling.
    Idle,
    /// Actively heating.
    Heating,
    /// Actively cooling.
    Cooling,
}

impl fmt::Display for HvacAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Idle => "idle",
            Self::Heating => "heating",
            Self::Cooling => "cooling",
        };
        f.write_str(name)
    }
}
