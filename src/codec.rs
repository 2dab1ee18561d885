//! String codec for stored values.
//!
//! Every value is written as two strings:
//! - the payload, a string rendering of the value
//! - the type tag, naming the run-time type the value had when it was encoded
//!
//! Decoding is a dispatch on the tag alone; the payload shape is never inspected.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::value::Value;

/// Type tag stored in a shadow slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// JSON structures, including `null`.
    Object,
    Number,
    Boolean,
    Undefined,
    /// Default branch: the payload is returned verbatim.
    String,
}

impl TypeTag {
    /// The tag as written to storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Undefined => "undefined",
            Self::String => "string",
        }
    }

    /// Parses a stored tag. Unknown tags fall back to `String`.
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        match tag {
            "object" => Self::Object,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "undefined" => Self::Undefined,
            _ => Self::String,
        }
    }

    /// The tag for a value's run-time type.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Undefined => Self::Undefined,
            Value::Null | Value::Json(_) => Self::Object,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An encoded value: the payload string and its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub payload: String,
    pub tag: TypeTag,
}

/// Encodes a value into its payload and type tag.
#[must_use]
pub fn encode(value: &Value) -> Encoded {
    // A JSON scalar is stored under its own type so it reads back as that type.
    if let Value::Json(v) = value {
        if !(v.is_array() || v.is_object()) {
            return encode(&Value::from(v.clone()));
        }
    }
    let tag = TypeTag::of(value);
    let payload = match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => format_number(*v),
        Value::String(v) => v.clone(),
        Value::Json(v) => v.to_string(),
    };
    Encoded { payload, tag }
}

/// Decodes a payload using its stored type tag.
///
/// A missing tag selects the default branch. A missing payload always decodes
/// to `Value::Undefined`.
///
/// # Errors
/// Returns `CodecError::InvalidObject` when an `object`-tagged payload is not valid JSON.
pub fn decode(payload: Option<&str>, tag: Option<&str>) -> Result<Value, CodecError> {
    let Some(payload) = payload else {
        return Ok(Value::Undefined);
    };

    let value = match tag.map_or(TypeTag::String, TypeTag::parse) {
        TypeTag::Object => serde_json::from_str::<serde_json::Value>(payload)
            .map(Value::from)
            .map_err(CodecError::InvalidObject)?,
        TypeTag::Number => Value::Number(parse_float(payload)),
        TypeTag::Boolean => Value::Bool(payload == "true"),
        TypeTag::Undefined => Value::Undefined,
        TypeTag::String => Value::String(payload.to_string()),
    };
    Ok(value)
}

/// Renders a number the way a browser's `String(number)` does.
#[must_use]
pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    // Covers -0 as well.
    if v == 0.0 {
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&v.abs()) {
        return format!("{v}");
    }

    let exp = format!("{v:e}");
    match exp.split_once('e') {
        Some((mantissa, e)) if !e.starts_with('-') => format!("{mantissa}e+{e}"),
        _ => exp,
    }
}

/// Permissive float parser.
///
/// Skips leading whitespace, then reads the longest prefix that forms a decimal
/// number (or `Infinity`). Trailing garbage is ignored; input without any
/// numeric prefix yields `NaN`.
#[must_use]
pub fn parse_float(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return if bytes.first() == Some(&b'-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}
