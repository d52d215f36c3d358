//! Built-in data types
//!
//! Each constructor returns a fresh [`DataType`]. Settings structs follow the
//! `..Default::default()` pattern:
//!
//! ```
//! use configraph::core::types::builtins::{self, NumberSettings};
//! use serde_json::json;
//!
//! let percentage = builtins::number(NumberSettings {
//!     min: Some(0.0),
//!     max: Some(100.0),
//!     ..Default::default()
//! });
//! assert!(percentage.apply(json!("42")).validation_errors.is_empty());
//! assert_eq!(percentage.apply(json!("101")).validation_errors.len(), 1);
//! ```

use super::{value_type_name, DataType, TypeKind, ValidationIssue};
use crate::core::node::ItemDef;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::{Number, Value};
use std::net::IpAddr;
use std::sync::Arc;

/// Accepts any value unchanged
pub fn any() -> Arc<DataType> {
    DataType::builder("any").build()
}

/// Settings for [`string`]
#[derive(Debug, Clone, Default)]
pub struct StringSettings {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
    /// Regular expression the whole value must match
    pub matches: Option<String>,
    pub allowed_values: Option<Vec<String>>,
    pub to_upper_case: bool,
    pub to_lower_case: bool,
}

/// String type; numbers and booleans are converted to their text form
pub fn string(settings: StringSettings) -> Arc<DataType> {
    let StringSettings {
        min_length,
        max_length,
        starts_with,
        ends_with,
        matches,
        allowed_values,
        to_upper_case,
        to_lower_case,
    } = settings;

    let mut builder = DataType::builder("string").coerce(move |value| {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(format!(
                    "Cannot convert {} to string",
                    value_type_name(&other)
                ))
            }
        };
        let text = if to_upper_case {
            text.to_uppercase()
        } else if to_lower_case {
            text.to_lowercase()
        } else {
            text
        };
        Ok(Value::String(text))
    });

    if let Some(min) = min_length {
        builder = builder.validate(move |v| {
            let len = v.as_str().map(|s| s.chars().count()).unwrap_or(0);
            if len < min {
                return Err(ValidationIssue::error(format!(
                    "Length must be at least {min}, got {len}"
                )));
            }
            Ok(())
        });
    }
    if let Some(max) = max_length {
        builder = builder.validate(move |v| {
            let len = v.as_str().map(|s| s.chars().count()).unwrap_or(0);
            if len > max {
                return Err(ValidationIssue::error(format!(
                    "Length must be at most {max}, got {len}"
                )));
            }
            Ok(())
        });
    }
    if let Some(prefix) = starts_with {
        builder = builder.validate(move |v| match v.as_str() {
            Some(s) if s.starts_with(&prefix) => Ok(()),
            _ => Err(ValidationIssue::error(format!(
                "Value must start with '{prefix}'"
            ))),
        });
    }
    if let Some(suffix) = ends_with {
        builder = builder.validate(move |v| match v.as_str() {
            Some(s) if s.ends_with(&suffix) => Ok(()),
            _ => Err(ValidationIssue::error(format!(
                "Value must end with '{suffix}'"
            ))),
        });
    }
    if let Some(pattern) = matches {
        let compiled = Regex::new(&format!("^(?:{pattern})$"));
        builder = builder.validate(move |v| match &compiled {
            Ok(re) if v.as_str().map(|s| re.is_match(s)).unwrap_or(false) => Ok(()),
            Ok(_) => Err(ValidationIssue::error(format!(
                "Value must match pattern '{pattern}'"
            ))),
            Err(e) => Err(ValidationIssue::error(format!(
                "Invalid pattern '{pattern}': {e}"
            ))),
        });
    }
    if let Some(allowed) = allowed_values {
        builder = builder.validate(move |v| match v.as_str() {
            Some(s) if allowed.iter().any(|a| a == s) => Ok(()),
            _ => Err(ValidationIssue::error(format!(
                "Value must be one of: {}",
                allowed.join(", ")
            ))),
        });
    }

    builder.build()
}

/// Settings for [`number`]
#[derive(Debug, Clone, Default)]
pub struct NumberSettings {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub is_int: bool,
    /// Number of decimal places kept after coercion
    pub precision: Option<u32>,
    pub is_divisible_by: Option<f64>,
}

/// Number type; numeric strings and booleans are converted
pub fn number(settings: NumberSettings) -> Arc<DataType> {
    let NumberSettings {
        min,
        max,
        is_int,
        precision,
        is_divisible_by,
    } = settings;

    let mut builder = DataType::builder("number").coerce(move |value| {
        let n = match &value {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| format!("Number {n} is out of range"))?,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("Unable to coerce string '{s}' to number"))?,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => {
                return Err(format!(
                    "Cannot convert {} to number",
                    value_type_name(other)
                ))
            }
        };
        let n = match precision {
            Some(p) => {
                let factor = 10f64.powi(p as i32);
                (n * factor).round() / factor
            }
            None => n,
        };
        number_value(n)
    });

    if let Some(min) = min {
        builder = builder.validate(move |v| match v.as_f64() {
            Some(n) if n >= min => Ok(()),
            _ => Err(ValidationIssue::error(format!("Value must be >= {min}"))),
        });
    }
    if let Some(max) = max {
        builder = builder.validate(move |v| match v.as_f64() {
            Some(n) if n <= max => Ok(()),
            _ => Err(ValidationIssue::error(format!("Value must be <= {max}"))),
        });
    }
    if is_int {
        builder = builder.validate(|v| match v.as_f64() {
            Some(n) if n.fract() == 0.0 => Ok(()),
            _ => Err(ValidationIssue::error("Value must be an integer")),
        });
    }
    if let Some(divisor) = is_divisible_by {
        builder = builder.validate(move |v| match v.as_f64() {
            Some(n) if divisor != 0.0 && (n % divisor) == 0.0 => Ok(()),
            _ => Err(ValidationIssue::error(format!(
                "Value must be divisible by {divisor}"
            ))),
        });
    }

    builder.build()
}

/// Integral floats become JSON integers so `"1"` coerces to `1`, not `1.0`
fn number_value(n: f64) -> Result<Value, String> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Ok(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| format!("{n} is not a finite number"))
}

/// Boolean type; accepts common textual and numeric spellings
pub fn boolean() -> Arc<DataType> {
    DataType::builder("boolean")
        .coerce(|value| match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "y" | "on" => Ok(Value::Bool(true)),
                "false" | "f" | "0" | "no" | "n" | "off" => Ok(Value::Bool(false)),
                _ => Err(format!("Unable to coerce string '{s}' to boolean")),
            },
            Value::Number(n) => match n.as_f64() {
                Some(x) if x == 1.0 => Ok(Value::Bool(true)),
                Some(x) if x == 0.0 => Ok(Value::Bool(false)),
                _ => Err(format!("Unable to coerce number {n} to boolean")),
            },
            other => Err(format!(
                "Cannot convert {} to boolean",
                value_type_name(other)
            )),
        })
        .build()
}

/// Value restricted to a fixed set of options
pub fn enumeration(options: Vec<Value>) -> Arc<DataType> {
    DataType::builder("enum")
        .validate(move |v| {
            if options.contains(v) {
                Ok(())
            } else {
                let listed: Vec<String> = options.iter().map(Value::to_string).collect();
                Err(ValidationIssue::error(format!(
                    "Value must be one of: {}",
                    listed.join(", ")
                )))
            }
        })
        .build()
}

/// Email address, normalized to lower case
pub fn email() -> Arc<DataType> {
    let base = string(StringSettings {
        to_lower_case: true,
        ..Default::default()
    });
    let pattern = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$");
    DataType::builder("email")
        .extends(&base)
        .validate(move |v| match (&pattern, v.as_str()) {
            (Ok(re), Some(s)) if re.is_match(s) => Ok(()),
            _ => Err(ValidationIssue::error("Value must be a valid email address")),
        })
        .build()
}

/// Settings for [`url`]
#[derive(Debug, Clone, Default)]
pub struct UrlSettings {
    pub require_https: bool,
}

/// Absolute URL
pub fn url(settings: UrlSettings) -> Arc<DataType> {
    DataType::builder("url")
        .extends(&string(StringSettings::default()))
        .validate(move |v| {
            let parsed = v
                .as_str()
                .map(::url::Url::parse)
                .ok_or_else(|| ValidationIssue::error("URL must be a string"))?
                .map_err(|e| ValidationIssue::error(format!("Invalid URL: {e}")))?;
            if settings.require_https && parsed.scheme() != "https" {
                return Err(ValidationIssue::error("URL must use https"));
            }
            Ok(())
        })
        .build()
}

/// IP address version restriction for [`ip_address`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

/// IPv4 or IPv6 address
pub fn ip_address(version: Option<IpVersion>) -> Arc<DataType> {
    DataType::builder("ip_address")
        .extends(&string(StringSettings::default()))
        .validate(move |v| {
            let addr: IpAddr = v
                .as_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ValidationIssue::error("Value must be a valid IP address"))?;
            match (version, addr) {
                (Some(IpVersion::V4), IpAddr::V6(_)) => {
                    Err(ValidationIssue::error("Value must be an IPv4 address"))
                }
                (Some(IpVersion::V6), IpAddr::V4(_)) => {
                    Err(ValidationIssue::error("Value must be an IPv6 address"))
                }
                _ => Ok(()),
            }
        })
        .build()
}

/// TCP/UDP port number
pub fn port() -> Arc<DataType> {
    let base = number(NumberSettings {
        min: Some(0.0),
        max: Some(65535.0),
        is_int: true,
        ..Default::default()
    });
    DataType::builder("port").extends(&base).build()
}

/// UUID in canonical text form
pub fn uuid() -> Arc<DataType> {
    DataType::builder("uuid")
        .extends(&string(StringSettings {
            to_lower_case: true,
            ..Default::default()
        }))
        .validate(|v| match v.as_str().map(::uuid::Uuid::parse_str) {
            Some(Ok(_)) => Ok(()),
            _ => Err(ValidationIssue::error("Value must be a valid UUID")),
        })
        .build()
}

/// ISO 8601 date (`YYYY-MM-DD`) or RFC 3339 timestamp
pub fn iso_date() -> Arc<DataType> {
    DataType::builder("iso_date")
        .extends(&string(StringSettings::default()))
        .validate(|v| {
            let s = v.as_str().unwrap_or_default();
            if DateTime::parse_from_rfc3339(s).is_ok()
                || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            {
                Ok(())
            } else {
                Err(ValidationIssue::error("Value must be an ISO 8601 date"))
            }
        })
        .build()
}

/// Object with declared children
///
/// A JSON string is parsed into an object before the children are visited.
pub fn object(children: Vec<(String, ItemDef)>) -> Arc<DataType> {
    DataType::builder("object")
        .kind(TypeKind::Object(children))
        .coerce(coerce_object)
        .build()
}

/// Settings for [`array`]
#[derive(Debug, Clone, Default)]
pub struct ArraySettings {
    pub item_type: Option<Arc<DataType>>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Splits a string value into elements on this delimiter instead of parsing JSON
    pub split_on: Option<String>,
}

/// Array whose elements share one type
pub fn array(settings: ArraySettings) -> Arc<DataType> {
    let ArraySettings {
        item_type,
        min_length,
        max_length,
        split_on,
    } = settings;

    let mut builder = DataType::builder("array")
        .kind(TypeKind::Array(item_type))
        .coerce(move |value| match value {
            Value::Array(_) => Ok(value),
            Value::String(s) => match &split_on {
                Some(delimiter) => Ok(Value::Array(
                    s.split(delimiter.as_str())
                        .map(|part| Value::String(part.trim().to_string()))
                        .collect(),
                )),
                None => match serde_json::from_str::<Value>(&s) {
                    Ok(parsed @ Value::Array(_)) => Ok(parsed),
                    _ => Err(format!("Unable to parse string '{s}' as an array")),
                },
            },
            other => Err(format!(
                "Cannot convert {} to array",
                value_type_name(&other)
            )),
        });

    if let Some(min) = min_length {
        builder = builder.validate(move |v| {
            let len = v.as_array().map(Vec::len).unwrap_or(0);
            if len < min {
                return Err(ValidationIssue::error(format!(
                    "Array must have at least {min} items, got {len}"
                )));
            }
            Ok(())
        });
    }
    if let Some(max) = max_length {
        builder = builder.validate(move |v| {
            let len = v.as_array().map(Vec::len).unwrap_or(0);
            if len > max {
                return Err(ValidationIssue::error(format!(
                    "Array must have at most {max} items, got {len}"
                )));
            }
            Ok(())
        });
    }

    builder.build()
}

/// Object with arbitrary keys whose values share one type
pub fn dictionary(value_type: Option<Arc<DataType>>) -> Arc<DataType> {
    DataType::builder("dictionary")
        .kind(TypeKind::Dictionary(value_type))
        .coerce(coerce_object)
        .build()
}

fn coerce_object(value: Value) -> Result<Value, String> {
    match value {
        Value::Object(_) => Ok(value),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed @ Value::Object(_)) => Ok(parsed),
            _ => Err(format!("Unable to parse string '{s}' as an object")),
        },
        other => Err(format!(
            "Cannot convert {} to object",
            value_type_name(&other)
        )),
    }
}
