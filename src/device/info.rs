// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device metadata and command batches.

use serde::{Deserialize, Serialize};

use crate::types::{DeviceSerial, TemperatureUnit};

/// Manufacturer reported for every thermostat.
pub const MANUFACTURER: &str = "Google Nest";

/// Model reported for every thermostat.
pub const MODEL: &str = "Nest Thermostat";

/// Static description of a thermostat, for host registries.
///
/// A thermostat is exposed to hosts as three entities: the climate control,
/// the fan, and an occupancy sensor. Each has a stable unique id derived
/// from the serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Display name from the configuration.
    pub name: String,
    /// Serial number.
    pub serial: DeviceSerial,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name.
    pub model: String,
    /// Configured temperature unit.
    pub temperature_unit: TemperatureUnit,
}

impl DeviceInfo {
    pub(crate) fn new(name: String, serial: DeviceSerial, unit: TemperatureUnit) -> Self {
        Self {
            name,
            serial,
            manufacturer: MANUFACTURER.to_string(),
            model: MODEL.to_string(),
            temperature_unit: unit,
        }
    }

    /// Unique id of the climate entity.
    #[must_use]
    pub fn climate_id(&self) -> String {
        format!("{}_climate", self.serial)
    }

    /// Unique id of the fan entity.
    #[must_use]
    pub fn fan_id(&self) -> String {
        format!("{}_fan", self.serial)
    }

    /// Unique id of the occupancy sensor.
    #[must_use]
    pub fn occupancy_id(&self) -> String {
        format!("{}_occupancy", self.serial)
    }
}

/// A batch of setpoint changes.
///
/// Fields left as `None` are not sent. Use this to set the single target and
/// the heat-cool range in one call.
///
/// # Examples
///
/// ```
/// use nestor_lib::device::TemperatureRequest;
///
/// let request = TemperatureRequest::range(19.0, 23.5);
/// assert_eq!(request.target, None);
/// assert_eq!(request.low, Some(19.0));
/// assert!(!request.is_empty());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRequest {
    /// Single setpoint.
    pub target: Option<f64>,
    /// Lower setpoint of the heat-cool range.
    pub low: Option<f64>,
    /// Upper setpoint of the heat-cool range.
    pub high: Option<f64>,
}

impl TemperatureRequest {
    /// Requests only a single setpoint.
    #[must_use]
    pub fn target(value: f64) -> Self {
        Self {
            target: Some(value),
            ..Self::default()
        }
    }

    /// Requests only a heat-cool range.
    #[must_use]
    pub fn range(low: f64, high: f64) -> Self {
        Self {
            target: None,
            low: Some(low),
            high: Some(high),
        }
    }

    /// Returns `true` if nothing is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.low.is_none() && self.high.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_ids() {
        let info = DeviceInfo::new(
            "Hallway".to_string(),
            DeviceSerial::new("02AA01AB").unwrap(),
            TemperatureUnit::Celsius,
        );

        assert_eq!(info.climate_id(), "02AA01AB_climate");
        assert_eq!(info.fan_id(), "02AA01AB_fan");
        assert_eq!(info.occupancy_id(), "02AA01AB_occupancy");
        assert_eq!(info.manufacturer, "Google Nest");
        assert_eq!(info.model, "Nest Thermostat");
    }

    #[test]
    fn temperature_request_constructors() {
        assert!(TemperatureRequest::default().is_empty());
        assert_eq!(TemperatureRequest::target(21.0).target, Some(21.0));
        assert_eq!(TemperatureRequest::range(18.0, 24.0).high, Some(24.0));
    }
}
