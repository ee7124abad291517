// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT topic construction and parsing for thermostat fields.
//!
//! The [`TopicRouter`] maps each logical field of a thermostat to its topic
//! and back. It owns no state besides the topic prefix.
//!
//! # Topic layout
//!
//! ```text
//! {prefix}/{serial}/{object_type}/{field}        subscribe form
//! {prefix}/{serial}/{object_type}/{field}/set    command form
//! {prefix}/{serial}/availability                 availability
//! ```
//!
//! For example, with the default prefix:
//!
//! ```text
//! nest/02AA01AB/device/current_temperature
//!                     ↓
//!             TopicRouter.parse()
//!                     ↓
//!   FieldAddress { serial: 02AA01AB, field: CurrentTemperature }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::types::{DeviceSerial, is_topic_level};

/// Topic prefix used when none is configured.
pub const DEFAULT_TOPIC_PREFIX: &str = "nest";

/// Broker-side namespace grouping related fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// Values measured or owned by the thermostat itself.
    Device,
    /// Values shared between the thermostat and the cloud service.
    Shared,
}

impl ObjectType {
    /// Returns the topic segment for this object type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Shared => "shared",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A thermostat field exchanged over MQTT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// `device/current_temperature`
    CurrentTemperature,
    /// `shared/target_temperature`
    TargetTemperature,
    /// `shared/target_temperature_low`
    TargetTemperatureLow,
    /// `shared/target_temperature_high`
    TargetTemperatureHigh,
    /// `shared/target_temperature_type`, the HVAC mode.
    HvacMode,
    /// `device/fan_timer_active`
    FanTimerActive,
    /// `device/away`
    Away,
    /// `availability`, published by the bridge without an object type.
    Availability,
}

impl Field {
    /// Every field a thermostat subscribes to.
    pub const ALL: [Self; 8] = [
        Self::CurrentTemperature,
        Self::TargetTemperature,
        Self::TargetTemperatureLow,
        Self::TargetTemperatureHigh,
        Self::HvacMode,
        Self::FanTimerActive,
        Self::Away,
        Self::Availability,
    ];

    /// Returns the object type of this field, if it has one.
    #[must_use]
    pub const fn object_type(&self) -> Option<ObjectType> {
        match self {
            Self::CurrentTemperature | Self::FanTimerActive | Self::Away => {
                Some(ObjectType::Device)
            }
            Self::TargetTemperature
            | Self::TargetTemperatureLow
            | Self::TargetTemperatureHigh
            | Self::HvacMode => Some(ObjectType::Shared),
            Self::Availability => None,
        }
    }

    /// Returns the field name as it appears in the topic.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CurrentTemperature => "current_temperature",
            Self::TargetTemperature => "target_temperature",
            Self::TargetTemperatureLow => "target_temperature_low",
            Self::TargetTemperatureHigh => "target_temperature_high",
            Self::HvacMode => "target_temperature_type",
            Self::FanTimerActive => "fan_timer_active",
            Self::Away => "away",
            Self::Availability => "availability",
        }
    }

    /// Returns the topic suffix after the serial, e.g. `device/away`.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::CurrentTemperature => "device/current_temperature",
            Self::TargetTemperature => "shared/target_temperature",
            Self::TargetTemperatureLow => "shared/target_temperature_low",
            Self::TargetTemperatureHigh => "shared/target_temperature_high",
            Self::HvacMode => "shared/target_temperature_type",
            Self::FanTimerActive => "device/fan_timer_active",
            Self::Away => "device/away",
            Self::Availability => "availability",
        }
    }

    /// Looks up a field by its topic suffix.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.path() == path)
    }

    /// Returns `true` if the thermostat accepts commands for this field.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        !matches!(self, Self::CurrentTemperature | Self::Availability)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Identifies one piece of state of one thermostat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldAddress {
    /// The thermostat serial.
    pub serial: DeviceSerial,
    /// The field.
    pub field: Field,
}

impl FieldAddress {
    /// Creates a new field address.
    #[must_use]
    pub fn new(serial: DeviceSerial, field: Field) -> Self {
        Self { serial, field }
    }

    /// Returns the object type of the addressed field.
    #[must_use]
    pub fn object_type(&self) -> Option<ObjectType> {
        self.field.object_type()
    }
}

/// Builds and parses thermostat topics under a fixed prefix.
///
/// # Examples
///
/// ```
/// use nestor_lib::protocol::{Field, TopicRouter};
/// use nestor_lib::types::DeviceSerial;
///
/// let router = TopicRouter::default();
/// let serial = DeviceSerial::new("02AA01AB").unwrap();
///
/// let topic = router.subscribe_topic(&serial, Field::TargetTemperature);
/// assert_eq!(topic, "nest/02AA01AB/shared/target_temperature");
///
/// let address = router.parse(&topic).unwrap();
/// assert_eq!(address.serial, serial);
/// assert_eq!(address.field, Field::TargetTemperature);
///
/// assert!(router.parse("other/02AA01AB/device/away").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRouter {
    prefix: String,
}

impl TopicRouter {
    /// Creates a router for the given prefix.
    ///
    /// The prefix may span several topic levels (`home/nest`), but no level
    /// may be empty or contain a wildcard.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidTopicPrefix` if the prefix is not usable.
    pub fn new(prefix: impl Into<String>) -> Result<Self, ValueError> {
        let prefix = prefix.into();
        if prefix.split('/').all(is_topic_level) {
            Ok(Self { prefix })
        } else {
            Err(ValueError::InvalidTopicPrefix(prefix))
        }
    }

    /// Returns the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the topic on which updates for `field` are published.
    #[must_use]
    pub fn subscribe_topic(&self, serial: &DeviceSerial, field: Field) -> String {
        format!("{}/{}/{}", self.prefix, serial, field.path())
    }

    /// Returns the topic on which commands for `field` are accepted.
    ///
    /// This is the subscribe topic with a `/set` suffix.
    #[must_use]
    pub fn command_topic(&self, serial: &DeviceSerial, field: Field) -> String {
        format!("{}/set", self.subscribe_topic(serial, field))
    }

    /// Returns the subscribe topics of every field of a thermostat.
    #[must_use]
    pub fn device_topics(&self, serial: &DeviceSerial) -> Vec<String> {
        Field::ALL
            .iter()
            .map(|field| self.subscribe_topic(serial, *field))
            .collect()
    }

    /// Maps a subscribe topic back to the field it carries.
    ///
    /// Returns `None` for topics outside the prefix, command topics, and
    /// anything not matching a known field. Callers treat this as a message
    /// to ignore, not as an error.
    #[must_use]
    pub fn parse(&self, topic: &str) -> Option<FieldAddress> {
        let rest = topic.strip_prefix(&self.prefix)?.strip_prefix('/')?;
        let (serial, path) = rest.split_once('/')?;
        let field = Field::from_path(path)?;
        let serial = DeviceSerial::new(serial).ok()?;
        Some(FieldAddress { serial, field })
    }
}

impl Default for TopicRouter {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_TOPIC_PREFIX.to_string(),
        }
    }
}
