// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.
//!
//! A [`StateChange`] is one decoded field update. Changes are produced from
//! inbound payloads with [`StateChange::decode`] and applied to a
//! [`DeviceState`](super::DeviceState).
//!
//! # Decoding rules
//!
//! - Temperatures: a number, or text that parses as a finite number after
//!   trimming. Anything else is an error.
//! - HVAC mode: text mapped with [`HvacMode::from_wire`]; structured payloads
//!   map to off.
//! - Booleans (fan, away, availability): `true` iff the lower-cased text is
//!   `true`, `1` or `on`; other payloads use generic truthiness.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::protocol::{Field, Payload};
use crate::types::HvacMode;

/// One decoded field update.
///
/// # Examples
///
/// ```
/// use nestor_lib::protocol::{Field, Payload};
/// use nestor_lib::state::StateChange;
///
/// let change = StateChange::decode(Field::Away, &Payload::Text("On".into())).unwrap();
/// assert_eq!(change, StateChange::Away(true));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum StateChange {
    /// Measured temperature.
    CurrentTemperature(f64),
    /// Single setpoint.
    TargetTemperature(f64),
    /// Lower setpoint in heat-cool mode.
    TargetTemperatureLow(f64),
    /// Upper setpoint in heat-cool mode.
    TargetTemperatureHigh(f64),
    /// Operating mode.
    HvacMode(HvacMode),
    /// Fan timer running.
    FanActive(bool),
    /// Away mode; occupancy is its inverse.
    Away(bool),
    /// Whether the thermostat is reachable.
    Availability(bool),
}

impl StateChange {
    /// Interprets a decoded payload received for `field`.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidValue` if a temperature payload is not a
    /// finite number.
    pub fn decode(field: Field, payload: &Payload) -> Result<Self, ParseError> {
        let change = match field {
            Field::CurrentTemperature => Self::CurrentTemperature(temperature(field, payload)?),
            Field::TargetTemperature => Self::TargetTemperature(temperature(field, payload)?),
            Field::TargetTemperatureLow => {
                Self::TargetTemperatureLow(temperature(field, payload)?)
            }
            Field::TargetTemperatureHigh => {
                Self::TargetTemperatureHigh(temperature(field, payload)?)
            }
            Field::HvacMode => Self::HvacMode(hvac_mode(payload)),
            Field::FanTimerActive => Self::FanActive(parse_bool(payload)),
            Field::Away => Self::Away(parse_bool(payload)),
            Field::Availability => Self::Availability(parse_bool(payload)),
        };
        Ok(change)
    }

    /// Returns the field this change updates.
    #[must_use]
    pub const fn field(&self) -> Field {
        match self {
            Self::CurrentTemperature(_) => Field::CurrentTemperature,
            Self::TargetTemperature(_) => Field::TargetTemperature,
            Self::TargetTemperatureLow(_) => Field::TargetTemperatureLow,
            Self::TargetTemperatureHigh(_) => Field::TargetTemperatureHigh,
            Self::HvacMode(_) => Field::HvacMode,
            Self::FanActive(_) => Field::FanTimerActive,
            Self::Away(_) => Field::Away,
            Self::Availability(_) => Field::Availability,
        }
    }

    /// Returns `true` if the HVAC action must be derived again after this
    /// change.
    ///
    /// Only measured temperature and mode updates trigger a recompute. With
    /// `include_target`, target temperature updates do as well.
    #[must_use]
    pub const fn affects_action(&self, include_target: bool) -> bool {
        match self {
            Self::CurrentTemperature(_) | Self::HvacMode(_) => true,
            Self::TargetTemperature(_) => include_target,
            _ => false,
        }
    }
}

fn temperature(field: Field, payload: &Payload) -> Result<f64, ParseError> {
    let invalid = |message: String| ParseError::InvalidValue {
        field: field.name().to_string(),
        message,
    };

    let value = match payload {
        Payload::Number(n) => *n,
        Payload::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| invalid(format!("{s:?} is not a number: {e}")))?,
        Payload::Bool(_) | Payload::Structured(_) => {
            return Err(invalid(format!("expected a number, got {payload}")));
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(format!("{value} is not a finite temperature")))
    }
}

fn hvac_mode(payload: &Payload) -> HvacMode {
    match payload {
        Payload::Text(s) => HvacMode::from_wire(s),
        _ => HvacMode::Off,
    }
}

/// Interprets a payload as a boolean.
///
/// # Examples
///
/// ```
/// use nestor_lib::protocol::Payload;
/// use nestor_lib::state::parse_bool;
///
/// assert!(parse_bool(&Payload::Text("On".into())));
/// assert!(!parse_bool(&Payload::Text("0".into())));
/// assert!(parse_bool(&Payload::Bool(true)));
/// assert!(!parse_bool(&Payload::Text(String::new())));
/// ```
#[must_use]
pub fn parse_bool(payload: &Payload) -> bool {
    match payload {
        Payload::Bool(b) => *b,
        Payload::Text(s) => matches!(s.to_lowercase().as_str(), "true" | "1" | "on"),
        other => other.is_truthy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> Payload {
        Payload::Text(s.to_string())
    }

    #[test]
    fn boolean_rule() {
        assert!(parse_bool(&text("On")));
        assert!(parse_bool(&text("TRUE")));
        assert!(parse_bool(&text("1")));
        assert!(!parse_bool(&text("0")));
        assert!(!parse_bool(&text("")));
        assert!(!parse_bool(&text("yes")));
        assert!(!parse_bool(&text("off")));
        assert!(parse_bool(&Payload::Bool(true)));
        assert!(!parse_bool(&Payload::Bool(false)));
        assert!(parse_bool(&Payload::Number(2.0)));
        assert!(!parse_bool(&Payload::Structured(json!([]))));
        assert!(parse_bool(&Payload::Structured(json!({"on": false}))));
    }

    #[test]
    fn decode_temperatures() {
        assert_eq!(
            StateChange::decode(Field::CurrentTemperature, &text("21.5")).unwrap(),
            StateChange::CurrentTemperature(21.5)
        );
        assert_eq!(
            StateChange::decode(Field::TargetTemperatureLow, &text(" 18 ")).unwrap(),
            StateChange::TargetTemperatureLow(18.0)
        );
        assert_eq!(
            StateChange::decode(Field::TargetTemperatureHigh, &Payload::Number(24.0)).unwrap(),
            StateChange::TargetTemperatureHigh(24.0)
        );
    }

    #[test]
    fn decode_temperature_failures() {
        for payload in [
            text("warm"),
            text(""),
            text("NaN"),
            text("inf"),
            Payload::Structured(json!({"value": 21})),
            Payload::Structured(json!([21])),
            Payload::Bool(true),
        ] {
            let result = StateChange::decode(Field::TargetTemperature, &payload);
            assert!(
                matches!(result, Err(ParseError::InvalidValue { ref field, .. }) if field == "target_temperature"),
                "{payload:?} should be rejected"
            );
        }
    }

    #[test]
    fn decode_hvac_mode() {
        assert_eq!(
            StateChange::decode(Field::HvacMode, &text("range")).unwrap(),
            StateChange::HvacMode(HvacMode::HeatCool)
        );
        assert_eq!(
            StateChange::decode(Field::HvacMode, &text("eco")).unwrap(),
            StateChange::HvacMode(HvacMode::Off)
        );
        assert_eq!(
            StateChange::decode(Field::HvacMode, &Payload::Structured(json!({"mode": "heat"})))
                .unwrap(),
            StateChange::HvacMode(HvacMode::Off)
        );
    }

    #[test]
    fn decode_booleans() {
        assert_eq!(
            StateChange::decode(Field::FanTimerActive, &text("on")).unwrap(),
            StateChange::FanActive(true)
        );
        assert_eq!(
            StateChange::decode(Field::Away, &text("false")).unwrap(),
            StateChange::Away(false)
        );
        assert_eq!(
            StateChange::decode(Field::Availability, &text("1")).unwrap(),
            StateChange::Availability(true)
        );
    }

    #[test]
    fn field_matches_decoded_field() {
        for field in Field::ALL {
            let payload = if field.name().contains("temperature") && field != Field::HvacMode {
                text("20")
            } else {
                text("true")
            };
            let change = StateChange::decode(field, &payload).unwrap();
            assert_eq!(change.field(), field);
        }
    }

    #[test]
    fn action_triggers() {
        assert!(StateChange::CurrentTemperature(20.0).affects_action(false));
        assert!(StateChange::HvacMode(HvacMode::Heat).affects_action(false));
        assert!(!StateChange::TargetTemperature(20.0).affects_action(false));
        assert!(StateChange::TargetTemperature(20.0).affects_action(true));
        assert!(!StateChange::TargetTemperatureLow(20.0).affects_action(true));
        assert!(!StateChange::Away(true).affects_action(true));
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_value(StateChange::HvacMode(HvacMode::HeatCool)).unwrap();
        assert_eq!(json, json!({"field": "hvac_mode", "value": "heat_cool"}));
    }
}
