// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HVAC action derivation.

use crate::types::{HvacAction, HvacMode};

/// Temperature difference, in degrees, below which the system is idle.
pub const TEMPERATURE_THRESHOLD: f64 = 0.5;

/// Derives what the system is doing from its mode and temperatures.
///
/// Only the primary target temperature is considered, also in
/// [`HvacMode::HeatCool`]. A difference of exactly the threshold is idle.
///
/// # Examples
///
/// ```
/// use nestor_lib::state::derive_action;
/// use nestor_lib::types::{HvacAction, HvacMode};
///
/// assert_eq!(derive_action(HvacMode::Heat, Some(20.0), Some(20.3)), HvacAction::Idle);
/// assert_eq!(derive_action(HvacMode::Heat, Some(20.0), Some(20.6)), HvacAction::Heating);
/// assert_eq!(derive_action(HvacMode::Cool, Some(20.6), Some(20.0)), HvacAction::Cooling);
/// assert_eq!(derive_action(HvacMode::Off, Some(10.0), Some(30.0)), HvacAction::Off);
/// ```
#[must_use]
pub fn derive_action(mode: HvacMode, current: Option<f64>, target: Option<f64>) -> HvacAction {
    if mode == HvacMode::Off {
        return HvacAction::Off;
    }
    let (Some(current), Some(target)) = (current, target) else {
        return HvacAction::Idle;
    };

    let diff = target - current;
    if diff.abs() < TEMPERATURE_THRESHOLD {
        HvacAction::Idle
    } else if diff > TEMPERATURE_THRESHOLD && mode.can_heat() {
        HvacAction::Heating
    } else if diff < -TEMPERATURE_THRESHOLD && mode.can_cool() {
        HvacAction::Cooling
    } else {
        HvacAction::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_is_always_off() {
        for (current, target) in [
            (None, None),
            (Some(20.0), None),
            (Some(10.0), Some(30.0)),
            (Some(30.0), Some(10.0)),
        ] {
            assert_eq!(derive_action(HvacMode::Off, current, target), HvacAction::Off);
        }
    }

    #[test]
    fn missing_temperature_is_idle() {
        assert_eq!(derive_action(HvacMode::Heat, None, Some(20.0)), HvacAction::Idle);
        assert_eq!(derive_action(HvacMode::Cool, Some(20.0), None), HvacAction::Idle);
        assert_eq!(derive_action(HvacMode::HeatCool, None, None), HvacAction::Idle);
    }

    #[test]
    fn within_threshold_is_idle() {
        assert_eq!(
            derive_action(HvacMode::Heat, Some(20.0), Some(20.3)),
            HvacAction::Idle
        );
        assert_eq!(
            derive_action(HvacMode::Cool, Some(20.3), Some(20.0)),
            HvacAction::Idle
        );
    }

    #[test]
    fn exact_threshold_is_idle() {
        assert_eq!(
            derive_action(HvacMode::Heat, Some(20.0), Some(20.5)),
            HvacAction::Idle
        );
        assert_eq!(
            derive_action(HvacMode::Cool, Some(20.5), Some(20.0)),
            HvacAction::Idle
        );
        assert_eq!(
            derive_action(HvacMode::HeatCool, Some(21.0), Some(20.5)),
            HvacAction::Idle
        );
    }

    #[test]
    fn heating_and_cooling() {
        assert_eq!(
            derive_action(HvacMode::Heat, Some(20.0), Some(20.6)),
            HvacAction::Heating
        );
        assert_eq!(
            derive_action(HvacMode::Cool, Some(20.6), Some(20.0)),
            HvacAction::Cooling
        );
    }

    #[test]
    fn wrong_direction_for_mode_is_idle() {
        assert_eq!(
            derive_action(HvacMode::Heat, Some(25.0), Some(20.0)),
            HvacAction::Idle
        );
        assert_eq!(
            derive_action(HvacMode::Cool, Some(18.0), Some(22.0)),
            HvacAction::Idle
        );
    }

    #[test]
    fn heat_cool_uses_primary_target() {
        // Well below the target: heating, whatever low/high would say
        assert_eq!(
            derive_action(HvacMode::HeatCool, Some(18.0), Some(22.0)),
            HvacAction::Heating
        );
        assert_eq!(
            derive_action(HvacMode::HeatCool, Some(26.0), Some(22.0)),
            HvacAction::Cooling
        );
    }
}
