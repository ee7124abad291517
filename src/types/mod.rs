// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the library.

mod hvac;
mod serial;
mod temperature;

pub use hvac::{HvacAction, HvacMode};
pub(crate) use serial::is_topic_level;
pub use serial::DeviceSerial;
pub use temperature::TemperatureUnit;
