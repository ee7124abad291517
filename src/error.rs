// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `NestoR` library.
//!
//! This module provides the error hierarchy used across the library: value
//! validation, transport communication, payload decoding, and configuration.
//!
//! None of these errors is fatal. The worst outcome of a bad inbound message
//! is a stale field value; the worst outcome of a failed command is an
//! `Err` returned to the caller that issued it.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred while talking to the broker.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while decoding a payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The bridge configuration is invalid or could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No managed device has the given serial.
    #[error("device {0} not found")]
    DeviceNotFound(String),

    /// A device with the same serial is already managed.
    #[error("device {0} is already managed")]
    DuplicateDevice(String),

    /// The manager has been shut down.
    #[error("device manager has been shut down")]
    ShutDown,
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// A device serial is empty or contains topic separators or wildcards.
    #[error("invalid device serial: {0:?}")]
    InvalidSerial(String),

    /// A topic prefix is empty or contains wildcards.
    #[error("invalid topic prefix: {0:?}")]
    InvalidTopicPrefix(String),

    /// A temperature is NaN or infinite.
    #[error("temperature must be a finite number, got {0}")]
    NonFiniteTemperature(f64),

    /// A temperature unit string is not recognized.
    #[error("unknown temperature unit: {0}")]
    UnknownTemperatureUnit(String),
}

/// Errors related to the transport (MQTT broker).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT client request failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The transport is not connected.
    #[error("not connected to broker")]
    NotConnected,
}

/// Errors related to decoding inbound payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Structured (JSON) payload could not be parsed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload bytes are not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A decoded payload cannot be interpreted for a field.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// Errors related to loading and validating the bridge configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid JSON for the expected shape.
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A device serial does not have the expected shape.
    #[error("invalid serial {serial:?}: {reason}")]
    InvalidSerial {
        /// The offending serial.
        serial: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The same serial appears more than once.
    #[error("duplicate device serial: {0}")]
    DuplicateSerial(String),

    /// Any other invalid setting.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::InvalidSerial("a/b".to_string());
        assert_eq!(err.to_string(), "invalid device serial: \"a/b\"");
    }

    #[test]
    fn error_from_value_error() {
        let err: Error = ValueError::NonFiniteTemperature(f64::NAN).into();
        assert!(matches!(
            err,
            Error::Value(ValueError::NonFiniteTemperature(_))
        ));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::InvalidValue {
            field: "current_temperature".to_string(),
            message: "not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to parse current_temperature: not a number"
        );
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidSerial {
            serial: "ABC".to_string(),
            reason: "must be 8 characters",
        };
        assert_eq!(
            err.to_string(),
            "invalid serial \"ABC\": must be 8 characters"
        );
    }

    #[test]
    fn device_not_found_display() {
        let err = Error::DeviceNotFound("02AA01AB".to_string());
        assert_eq!(err.to_string(), "device 02AA01AB not found");
    }
}
