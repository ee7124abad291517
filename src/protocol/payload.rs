// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload codec for thermostat messages.
//!
//! Publishers on the broker mix plain scalars (`21.5`, `heat`, `true`) with
//! JSON documents. Inbound payloads are decoded with a leading-character
//! heuristic: only payloads starting with `{` or `[` are parsed as JSON;
//! everything else is kept as text for the field handler to interpret.

use std::fmt;

use serde_json::Value;

use crate::error::ParseError;
use crate::types::HvacMode;

/// A decoded message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A scalar payload kept as text.
    Text(String),
    /// A JSON object or array.
    Structured(Value),
}

impl Payload {
    /// Decodes raw inbound bytes.
    ///
    /// Inbound decoding only ever produces [`Payload::Text`] or
    /// [`Payload::Structured`]; scalars are interpreted later, per field.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidUtf8` if the bytes are not UTF-8, and
    /// `ParseError::Json` if a payload that looks structured is malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use nestor_lib::protocol::Payload;
    ///
    /// assert_eq!(Payload::decode(b"21.5").unwrap(), Payload::Text("21.5".into()));
    /// assert!(matches!(Payload::decode(br#"{"a":1}"#).unwrap(), Payload::Structured(_)));
    /// assert!(Payload::decode(b"{broken").is_err());
    /// ```
    pub fn decode(raw: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(raw)?;
        if text.starts_with('{') || text.starts_with('[') {
            Ok(Self::Structured(serde_json::from_str(text)?))
        } else {
            Ok(Self::Text(text.to_string()))
        }
    }

    /// Returns the string sent on the wire for this payload.
    ///
    /// Booleans render as `true`/`false`. Integral numbers keep one decimal
    /// place (`21.0`), which is what thermostat firmware expects for
    /// setpoints.
    #[must_use]
    pub fn to_wire(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
            Self::Structured(v) => v.to_string(),
        }
    }

    /// Generic truthiness: `false`, zero, empty text and empty or null
    /// structured values are false, everything else is true.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => !s.is_empty(),
            Self::Structured(v) => json_truthy(v),
        }
    }

    /// Returns the text content if this is a text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.1}")
    } else {
        n.to_string()
    }
}

fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<HvacMode> for Payload {
    fn from(mode: HvacMode) -> Self {
        Self::Text(mode.as_wire().to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_scalar_as_text() {
        assert_eq!(
            Payload::decode(b"heat").unwrap(),
            Payload::Text("heat".to_string())
        );
        assert_eq!(Payload::decode(b"").unwrap(), Payload::Text(String::new()));
        // Leading whitespace disables the structured path
        assert_eq!(
            Payload::decode(b" {}").unwrap(),
            Payload::Text(" {}".to_string())
        );
    }

    #[test]
    fn decode_structured() {
        assert_eq!(
            Payload::decode(br#"{"value": 21.5}"#).unwrap(),
            Payload::Structured(json!({"value": 21.5}))
        );
        assert_eq!(
            Payload::decode(b"[1, 2]").unwrap(),
            Payload::Structured(json!([1, 2]))
        );
    }

    #[test]
    fn decode_failures() {
        assert!(matches!(
            Payload::decode(b"{not json"),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            Payload::decode(&[0xff, 0xfe]),
            Err(ParseError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn wire_format() {
        assert_eq!(Payload::from(21.5).to_wire(), "21.5");
        assert_eq!(Payload::from(21.0).to_wire(), "21.0");
        assert_eq!(Payload::from(-3.0).to_wire(), "-3.0");
        assert_eq!(Payload::from(true).to_wire(), "true");
        assert_eq!(Payload::from(false).to_wire(), "false");
        assert_eq!(Payload::from("range").to_wire(), "range");
        assert_eq!(Payload::from(HvacMode::HeatCool).to_wire(), "range");
        assert_eq!(Payload::from(json!({"a": 1})).to_wire(), r#"{"a":1}"#);
    }

    #[test]
    fn truthiness() {
        assert!(Payload::Number(1.0).is_truthy());
        assert!(!Payload::Number(0.0).is_truthy());
        assert!(!Payload::Structured(json!({})).is_truthy());
        assert!(Payload::Structured(json!([0])).is_truthy());
        assert!(!Payload::Structured(Value::Null).is_truthy());
        assert!(Payload::Text("x".to_string()).is_truthy());
    }
}
