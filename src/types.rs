//! Core data types for the preprocessing engine
//!
//! This module contains the value model that flows through every pipeline,
//! the item value types that steer numeric conversions, and the timestamp
//! type used by stateful steps.
//!
//! # Main Types
//!
//! - [`Value`] - Tagged value: none, error, string, double, unsigned, binary
//! - [`ValueKind`] - The tag of a [`Value`] without its payload
//! - [`ItemValueType`] - The declared type of the monitored item
//! - [`Timestamp`] - Seconds + nanoseconds collection time
//!
//! # Conversions
//!
//! [`Value::convert`] never truncates silently: a string that does not parse,
//! a double outside the unsigned range, or any conversion out of `Error`,
//! `None` or `Binary` is reported as a [`ConversionError`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Tolerance used when comparing two doubles for equality
pub const DOUBLE_EPSILON: f64 = 1e-9;

/// The tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    None,
    Error,
    String,
    Double,
    UnsignedInt,
    Binary,
}

impl ValueKind {
    /// Short type name used inside error messages
    pub fn description(&self) -> &'static str {
        match self {
            ValueKind::None => "none",
            ValueKind::Error => "error",
            ValueKind::String => "str",
            ValueKind::Double => "double",
            ValueKind::UnsignedInt => "uint64",
            ValueKind::Binary => "binary",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A failed [`Value::convert`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot convert value to {to}")]
pub struct ConversionError {
    pub from: ValueKind,
    pub to: ValueKind,
}

/// Declared value type of a monitored item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ItemValueType {
    /// Floating point numbers
    Float,
    /// Short character strings
    #[default]
    String,
    /// Log lines
    Log,
    /// Unsigned 64-bit integers
    Unsigned,
    /// Long text
    Text,
    /// Opaque binary payloads
    Binary,
}

impl ItemValueType {
    /// Preferred numeric kind for results of generic "convert to numeric" helpers
    pub fn numeric_type_hint(&self) -> Option<ValueKind> {
        match self {
            ItemValueType::Float => Some(ValueKind::Double),
            ItemValueType::Unsigned => Some(ValueKind::UnsignedInt),
            _ => None,
        }
    }
}

/// A value flowing through a preprocessing pipeline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum Value {
    /// No value (discarded or throttled)
    #[default]
    None,
    /// Error message; carries nothing else
    Error(String),
    /// Text
    String(String),
    /// Floating point number
    Double(f64),
    /// Unsigned 64-bit integer
    UnsignedInt(u64),
    /// Opaque binary payload
    Binary(Vec<u8>),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create an error value
    pub fn error(msg: impl Into<String>) -> Self {
        Value::Error(msg.into())
    }

    /// The tag of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::None => ValueKind::None,
            Value::Error(_) => ValueKind::Error,
            Value::String(_) => ValueKind::String,
            Value::Double(_) => ValueKind::Double,
            Value::UnsignedInt(_) => ValueKind::UnsignedInt,
            Value::Binary(_) => ValueKind::Binary,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Type description used in error messages
    pub fn type_desc(&self) -> &'static str {
        self.kind().description()
    }

    /// The string payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The error message, if this is an error value
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Convert into `target`, consuming the value
    pub fn convert(self, target: ValueKind) -> Result<Value, ConversionError> {
        let from = self.kind();
        let fail = || ConversionError { from, to: target };

        if from == target && from != ValueKind::Error {
            return Ok(self);
        }

        match (target, self) {
            (ValueKind::String, Value::Double(d)) => Ok(Value::String(format_double(d))),
            (ValueKind::String, Value::UnsignedInt(u)) => Ok(Value::String(u.to_string())),
            (ValueKind::Double, Value::UnsignedInt(u)) => Ok(Value::Double(u as f64)),
            (ValueKind::Double, Value::String(s)) => parse_double(&s).map(Value::Double).ok_or_else(fail),
            (ValueKind::UnsignedInt, Value::Double(d)) => double_to_u64(d).map(Value::UnsignedInt).ok_or_else(fail),
            (ValueKind::UnsignedInt, Value::String(s)) => parse_unsigned(&s).map(Value::UnsignedInt).ok_or_else(fail),
            _ => Err(fail()),
        }
    }

    /// Convert to a numeric value honoring the item's numeric type hint.
    ///
    /// Doubles and unsigned integers are taken as-is, strings are parsed as
    /// unsigned first and double second. The hint is then applied on a
    /// best-effort basis: a double that does not fit an unsigned stays a double.
    pub fn to_numeric(&self, value_type: ItemValueType) -> Result<Value, String> {
        let num = match self {
            Value::Double(_) | Value::UnsignedInt(_) => self.clone(),
            Value::String(s) => parse_numeric(s).ok_or_else(|| "cannot convert value to numeric type".to_string())?,
            _ => return Err("cannot convert value to numeric type".to_string()),
        };

        match value_type.numeric_type_hint() {
            Some(hint) => Ok(num.clone().convert(hint).unwrap_or(num)),
            None => Ok(num),
        }
    }

    /// Convert to a string value, reporting failures in step error style
    pub fn into_string(self) -> Result<String, String> {
        match self.convert(ValueKind::String) {
            Ok(Value::String(s)) => Ok(s),
            Ok(_) => Err("cannot convert value to str".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Value description truncated to at most `limit` characters
    pub fn preview(&self, limit: usize) -> String {
        truncate_chars(&self.to_string(), limit)
    }

    /// Three-way comparison across kinds.
    ///
    /// None sorts below everything, binary above everything, errors below
    /// strings and numbers. A string compared with a number compares textually;
    /// two numbers compare numerically (as doubles when either is a double).
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::None, Value::None) => Ordering::Equal,
            (Value::None, _) => Ordering::Less,
            (_, Value::None) => Ordering::Greater,
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::Binary(_), _) => Ordering::Greater,
            (_, Value::Binary(_)) => Ordering::Less,
            (Value::Error(a), Value::Error(b)) => a.cmp(b),
            (Value::Error(_), _) => Ordering::Less,
            (_, Value::Error(_)) => Ordering::Greater,
            (Value::String(a), b) => a.as_str().cmp(b.to_string().as_str()),
            (a, Value::String(b)) => a.to_string().as_str().cmp(b.as_str()),
            (Value::UnsignedInt(a), Value::UnsignedInt(b)) => a.cmp(b),
            (a, b) => compare_doubles(a.as_f64(), b.as_f64()),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Value::Double(d) => *d,
            Value::UnsignedInt(u) => *u as f64,
            _ => f64::NAN,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => Ok(()),
            Value::Error(e) => f.write_str(e),
            Value::String(s) => f.write_str(s),
            Value::Double(d) => f.write_str(&format_double(*d)),
            Value::UnsignedInt(u) => write!(f, "{}", u),
            Value::Binary(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UnsignedInt(u)
    }
}

fn compare_doubles(a: f64, b: f64) -> Ordering {
    if (a - b).abs() <= DOUBLE_EPSILON {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Shortest round-trip text form of a double
pub fn format_double(d: f64) -> String {
    format!("{}", d)
}

/// Parse a strictly decimal floating point number (no `inf`/`nan`)
pub fn parse_double(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty()
        || !s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        || !s.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }
    s.parse::<f64>().ok().filter(|d| d.is_finite())
}

/// Parse an unsigned integer, tolerating surrounding whitespace and a zero fraction (`"5.000"`)
pub fn parse_unsigned(s: &str) -> Option<u64> {
    let s = s.trim();
    let s = match s.split_once('.') {
        Some((int, frac)) if frac.chars().all(|c| c == '0') => int,
        Some(_) => return None,
        None => s,
    };
    let s = s.strip_prefix('+').unwrap_or(s);
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok()
}

/// Parse text as the narrowest numeric value: unsigned first, double second
pub fn parse_numeric(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if !trimmed.contains('.') {
        if let Some(u) = parse_unsigned(trimmed) {
            return Some(Value::UnsignedInt(u));
        }
    }
    parse_double(trimmed).map(Value::Double)
}

fn double_to_u64(d: f64) -> Option<u64> {
    if !d.is_finite() || d < 0.0 || d > u64::MAX as f64 {
        return None;
    }
    Some(d as u64)
}

/// Truncate to at most `limit` characters on a char boundary
pub fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// A collection timestamp with nanosecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub sec: i64,
    pub ns: u32,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { sec: 0, ns: 0 };

    pub fn new(sec: i64, ns: u32) -> Self {
        Self { sec, ns }
    }

    pub fn from_secs(sec: i64) -> Self {
        Self { sec, ns: 0 }
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            sec: now.timestamp(),
            ns: now.timestamp_subsec_nanos(),
        }
    }

    /// True for the "never recorded" timestamp
    pub fn is_zero(&self) -> bool {
        self.sec == 0
    }

    /// Fractional seconds elapsed since `earlier` (negative if `earlier` is later)
    pub fn seconds_since(&self, earlier: &Timestamp) -> f64 {
        (self.sec - earlier.sec) as f64 + (self.ns as f64 - earlier.ns as f64) / 1_000_000_000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.ns)
    }
}
