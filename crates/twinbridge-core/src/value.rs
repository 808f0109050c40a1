//! Typed values with a canonical textual form
//!
//! Every value exchanged between the model, the persistence layer and the
//! asset connections is a `TypedValue`. The canonical string form is the
//! round-trip format used by the default converter and the wire boundary.

use crate::error::{Error, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of model datatypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datatype {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    DateTime,
    Base64Binary,
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "Boolean",
            Self::Int => "Int",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Base64Binary => "Base64Binary",
        };
        write!(f, "{name}")
    }
}

/// A datatype paired with a value of that type, replaced (never mutated)
/// on update
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum TypedValue {
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    String(String),
    DateTime(DateTime<Utc>),
    Base64Binary(Vec<u8>),
}

impl TypedValue {
    /// The datatype backing this value
    pub fn datatype(&self) -> Datatype {
        match self {
            Self::Boolean(_) => Datatype::Boolean,
            Self::Int(_) => Datatype::Int,
            Self::Long(_) => Datatype::Long,
            Self::Float(_) => Datatype::Float,
            Self::Double(_) => Datatype::Double,
            Self::String(_) => Datatype::String,
            Self::DateTime(_) => Datatype::DateTime,
            Self::Base64Binary(_) => Datatype::Base64Binary,
        }
    }

    /// Canonical textual form, round-trippable through `from_string`
    pub fn as_string(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Long(l) => l.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Double(d) => d.to_string(),
            Self::String(s) => s.clone(),
            Self::DateTime(dt) => dt.to_rfc3339(),
            Self::Base64Binary(b) => base64::engine::general_purpose::STANDARD.encode(b),
        }
    }

    /// Parse the canonical textual form of the given datatype
    pub fn from_string(datatype: Datatype, raw: &str) -> Result<Self> {
        let parse_err = |reason: String| Error::conversion(raw, datatype, reason);
        match datatype {
            Datatype::Boolean => match raw {
                "true" | "1" => Ok(Self::Boolean(true)),
                "false" | "0" => Ok(Self::Boolean(false)),
                _ => Err(parse_err("not a boolean".into())),
            },
            Datatype::Int => raw
                .parse::<i32>()
                .map(Self::Int)
                .map_err(|e| parse_err(e.to_string())),
            Datatype::Long => raw
                .parse::<i64>()
                .map(Self::Long)
                .map_err(|e| parse_err(e.to_string())),
            Datatype::Float => raw
                .parse::<f32>()
                .map(|f| Self::Float(OrderedFloat(f)))
                .map_err(|e| parse_err(e.to_string())),
            Datatype::Double => raw
                .parse::<f64>()
                .map(|d| Self::Double(OrderedFloat(d)))
                .map_err(|e| parse_err(e.to_string())),
            Datatype::String => Ok(Self::String(raw.to_string())),
            Datatype::DateTime => DateTime::parse_from_rfc3339(raw)
                .map(|dt| Self::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| parse_err(e.to_string())),
            Datatype::Base64Binary => base64::engine::general_purpose::STANDARD
                .decode(raw)
                .map(Self::Base64Binary)
                .map_err(|e| parse_err(e.to_string())),
        }
    }

    /// Convert to i64 if this is an integer-family value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i64::from(*i)),
            Self::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Convert to f64 if this is a numeric value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(f64::from(*i)),
            Self::Long(l) => Some(*l as f64),
            Self::Float(f) => Some(f64::from(f.into_inner())),
            Self::Double(d) => Some(d.into_inner()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

// Conversions from Rust types
impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i32> for TypedValue {
    fn from(i: i32) -> Self {
        Self::Int(i)
    }
}

impl From<i64> for TypedValue {
    fn from(l: i64) -> Self {
        Self::Long(l)
    }
}

impl From<f32> for TypedValue {
    fn from(f: f32) -> Self {
        Self::Float(OrderedFloat(f))
    }
}

impl From<f64> for TypedValue {
    fn from(d: f64) -> Self {
        Self::Double(OrderedFloat(d))
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<DateTime<Utc>> for TypedValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}
