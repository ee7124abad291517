// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device serial type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Serial number identifying a managed thermostat.
///
/// The serial is opaque to the library. It only has to be usable as a
/// single MQTT topic level: non-empty, without `/`, and without the `+`
/// and `#` wildcards.
///
/// # Examples
///
/// ```
/// use nestor_lib::types::DeviceSerial;
///
/// let serial = DeviceSerial::new("02AA01AB").unwrap();
/// assert_eq!(serial.as_str(), "02AA01AB");
///
/// assert!(DeviceSerial::new("").is_err());
/// assert!(DeviceSerial::new("a/b").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceSerial(String);

impl DeviceSerial {
    /// Creates a serial after checking it is a valid topic level.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidSerial` if the serial is empty or
    /// contains `/`, `+`, `#` or control characters.
    pub fn new(serial: impl Into<String>) -> Result<Self, ValueError> {
        let serial = serial.into();
        if is_topic_level(&serial) {
            Ok(Self(serial))
        } else {
            Err(ValueError::InvalidSerial(serial))
        }
    }

    /// Returns the serial as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns `true` if `s` can be used as one MQTT topic level.
pub(crate) fn is_topic_level(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| matches!(c, '/' | '+' | '#') || c.is_control())
}

impl fmt::Debug for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceSerial({})", self.0)
    }
}

impl fmt::Display for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceSerial {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceSerial {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceSerial> for String {
    fn from(serial: DeviceSerial) -> Self {
        serial.0
    }
}

impl AsRef<str> for DeviceSerial {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_serial() {
        let serial = DeviceSerial::new("02AA01AB").unwrap();
        assert_eq!(serial.to_string(), "02AA01AB");
    }

    #[test]
    fn rejects_topic_separators_and_wildcards() {
        for bad in ["", "a/b", "+", "ab#", "tab\there"] {
            assert!(DeviceSerial::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn debug_format() {
        let serial = DeviceSerial::new("X1").unwrap();
        assert_eq!(format!("{serial:?}"), "DeviceSerial(X1)");
    }

    #[test]
    fn deserialize_validates() {
        let ok: DeviceSerial = serde_json::from_str("\"02AA01AB\"").unwrap();
        assert_eq!(ok.as_str(), "02AA01AB");

        let bad: Result<DeviceSerial, _> = serde_json::from_str("\"a/b\"");
        assert!(bad.is_err());
    }

    #[test]
    fn hashable() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(DeviceSerial::new("A").unwrap());
        assert!(set.contains(&DeviceSerial::new("A").unwrap()));
    }
}
