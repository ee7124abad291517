// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge and device configuration.
//!
//! Configuration is plain JSON:
//!
//! ```json
//! {
//!   "mqtt_broker": "192.168.1.50",
//!   "mqtt_port": 1883,
//!   "mqtt_username": "bridge",
//!   "mqtt_password": "secret",
//!   "topic_prefix": "nest",
//!   "devices": [
//!     { "name": "Hallway", "serial": "02aa01ab", "temperature_unit": "celsius" }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol::{DEFAULT_TOPIC_PREFIX, TopicRouter};
use crate::types::{DeviceSerial, TemperatureUnit};

/// Required length of a thermostat serial.
pub const SERIAL_LENGTH: usize = 8;

/// Default MQTT port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Configuration of one thermostat.
///
/// # Examples
///
/// ```
/// use nestor_lib::manager::DeviceConfig;
/// use nestor_lib::types::TemperatureUnit;
///
/// let config = DeviceConfig::new("Hallway", "02aa01ab")
///     .with_temperature_unit(TemperatureUnit::Fahrenheit);
///
/// let serial = config.validate().unwrap();
/// assert_eq!(serial.as_str(), "02AA01AB");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Display name.
    pub name: String,
    /// Serial number, exactly eight characters. Normalized to upper case.
    pub serial: String,
    /// Unit the host should present temperatures in.
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
}

impl DeviceConfig {
    /// Creates a configuration with the default temperature unit.
    #[must_use]
    pub fn new(name: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serial: serial.into(),
            temperature_unit: TemperatureUnit::default(),
        }
    }

    /// Sets the temperature unit.
    #[must_use]
    pub fn with_temperature_unit(mut self, unit: TemperatureUnit) -> Self {
        self.temperature_unit = unit;
        self
    }

    /// Checks the configuration and returns the normalized serial.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the name is empty or the serial is not
    /// eight characters usable in a topic.
    pub fn validate(&self) -> Result<DeviceSerial, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField("name"));
        }
        let serial = self.serial.trim();
        if serial.is_empty() {
            return Err(ConfigError::MissingField("serial"));
        }
        if serial.chars().count() != SERIAL_LENGTH {
            return Err(ConfigError::InvalidSerial {
                serial: self.serial.clone(),
                reason: "must be 8 characters",
            });
        }
        DeviceSerial::new(serial.to_uppercase()).map_err(|_| ConfigError::InvalidSerial {
            serial: self.serial.clone(),
            reason: "must not contain '/', '+', '#' or control characters",
        })
    }
}

/// Configuration of the bridge: broker connection, topic layout and the
/// managed thermostats.
///
/// # Examples
///
/// ```
/// use nestor_lib::manager::BridgeConfig;
///
/// let config = BridgeConfig::from_json_str(r#"{
///     "mqtt_broker": "192.168.1.50",
///     "devices": [{ "name": "Hallway", "serial": "02AA01AB" }]
/// }"#).unwrap();
///
/// assert_eq!(config.mqtt_port, 1883);
/// assert_eq!(config.topic_prefix, "nest");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Broker host name or address.
    pub mqtt_broker: String,
    /// Broker port.
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
    /// Broker user name; used only together with a password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_username: Option<String>,
    /// Broker password; used only together with a user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_password: Option<String>,
    /// Prefix of every thermostat topic.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Managed thermostats.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// Also derive the HVAC action again when only the target temperature
    /// changes. Off by default: the action then follows the next measured
    /// temperature or mode update.
    #[serde(default)]
    pub recompute_action_on_target: bool,
}

fn default_mqtt_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.to_string()
}

impl BridgeConfig {
    /// Creates a configuration for a broker with defaults everywhere else.
    #[must_use]
    pub fn new(mqtt_broker: impl Into<String>) -> Self {
        Self {
            mqtt_broker: mqtt_broker.into(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_username: None,
            mqtt_password: None,
            topic_prefix: default_topic_prefix(),
            devices: Vec::new(),
            recompute_action_on_target: false,
        }
    }

    /// Sets the broker port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.mqtt_port = port;
        self
    }

    /// Sets broker credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.mqtt_username = Some(username.into());
        self.mqtt_password = Some(password.into());
        self
    }

    /// Sets the topic prefix.
    #[must_use]
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    /// Adds a thermostat.
    #[must_use]
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.devices.push(device);
        self
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` for malformed JSON and the errors of
    /// [`validate`](Self::validate) otherwise.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, and the errors
    /// of [`from_json_str`](Self::from_json_str) otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading bridge configuration");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serializes the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` if serialization fails.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the broker is missing, the prefix is not
    /// usable, a device is invalid, or two devices share a serial.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt_broker.trim().is_empty() {
            return Err(ConfigError::MissingField("mqtt_broker"));
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::Invalid("mqtt_port must not be 0".to_string()));
        }
        self.router()?;

        let mut seen = HashSet::new();
        for device in &self.devices {
            let serial = device.validate()?;
            if !seen.insert(serial.clone()) {
                return Err(ConfigError::DuplicateSerial(serial.to_string()));
            }
        }
        Ok(())
    }

    /// Returns the broker credentials if both parts are configured.
    ///
    /// An empty user name or password counts as not configured.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let user = self.mqtt_username.as_deref().filter(|u| !u.is_empty())?;
        let pass = self.mqtt_password.as_deref().filter(|p| !p.is_empty())?;
        Some((user, pass))
    }

    /// Builds the topic router for the configured prefix.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the prefix is not usable.
    pub fn router(&self) -> Result<TopicRouter, ConfigError> {
        TopicRouter::new(self.topic_prefix.clone())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Returns a broker builder preconfigured with host, port and
    /// credentials.
    #[cfg(feature = "mqtt")]
    #[must_use]
    pub fn broker_builder(&self) -> crate::protocol::MqttBrokerBuilder {
        let builder = crate::protocol::MqttBroker::builder()
            .host(self.mqtt_broker.trim())
            .port(self.mqtt_port);
        match self.credentials() {
            Some((user, pass)) => builder.credentials(user, pass),
            None => builder,
        }
    }
}
