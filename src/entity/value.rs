//! Typed property values

use std::cmp::Ordering;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use serde::{Deserialize, Serialize};

/// A single typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    /// Milliseconds since the unix epoch (UTC)
    DateTime(i64),
    /// Canonical string form of a GUID
    Guid(String),
    Binary(Vec<u8>),
}

impl PropertyValue {
    /// EDM type name as used by the table service
    pub fn edm_type(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "Edm.String",
            PropertyValue::Boolean(_) => "Edm.Boolean",
            PropertyValue::Int32(_) => "Edm.Int32",
            PropertyValue::Int64(_) => "Edm.Int64",
            PropertyValue::Double(_) => "Edm.Double",
            PropertyValue::DateTime(_) => "Edm.DateTime",
            PropertyValue::Guid(_) => "Edm.Guid",
            PropertyValue::Binary(_) => "Edm.Binary",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) | PropertyValue::Guid(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int32(v) => Some(i64::from(*v)),
            PropertyValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Compare two values the way filter evaluation does
    ///
    /// Values of different types are incomparable, except Int32/Int64 which
    /// compare numerically.
    pub fn compare(&self, other: &PropertyValue) -> Option<Ordering> {
        use PropertyValue::*;
        match (self, other) {
            (String(a), String(b)) | (Guid(a), Guid(b)) => Some(a.cmp(b)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Int32(_) | Int64(_), Int32(_) | Int64(_)) => {
                Some(self.as_i64()?.cmp(&other.as_i64()?))
            }
            (Double(a), Double(b)) => a.partial_cmp(b),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (Binary(a), Binary(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Render as an OData literal
    pub fn to_odata_literal(&self) -> String {
        match self {
            PropertyValue::String(s) => format!("'{}'", s.replace('\'', "''")),
            PropertyValue::Boolean(b) => b.to_string(),
            PropertyValue::Int32(v) => v.to_string(),
            PropertyValue::Int64(v) => format!("{}L", v),
            PropertyValue::Double(v) => format!("{:?}", v),
            PropertyValue::DateTime(ms) => format!("datetime'{}'", format_rfc3339_millis(*ms)),
            PropertyValue::Guid(g) => format!("guid'{}'", g),
            PropertyValue::Binary(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2 + 3);
                hex.push_str("X'");
                for b in bytes {
                    let _ = write!(hex, "{:02x}", b);
                }
                hex.push('\'');
                hex
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Boolean(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int32(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int64(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(v: Vec<u8>) -> Self {
        PropertyValue::Binary(v)
    }
}

/// Format unix milliseconds as `YYYY-MM-DDTHH:MM:SS.mmmZ`
///
/// Instants chrono cannot represent fall back to the raw millisecond count;
/// `validate_properties` keeps those out of the store.
pub(crate) fn format_rfc3339_millis(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(instant) => instant.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ms.to_string(),
    }
}
