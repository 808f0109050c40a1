//! Bidirectional value conversion between model and protocol datatypes
//!
//! Converters are keyed by (model datatype, protocol datatype) pairs and
//! registered per direction, since conversions are not generally symmetric.
//! When no explicit converter is registered, a default structural converter
//! applies: pass-through on matching representations, instant normalization
//! for date-times, implicit numeric widening where lossless, and an error
//! for everything else.

use crate::error::{Error, Result};
use crate::value::{Datatype, TypedValue};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Protocol-native type identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProtocolDatatype {
    Boolean,
    Int32,
    Int64,
    Float,
    Double,
    String,
    DateTime,
    Bytes,
    /// Protocol-specific type only a registered converter can handle
    Other(String),
}

impl fmt::Display for ProtocolDatatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "Boolean"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::Float => write!(f, "Float"),
            Self::Double => write!(f, "Double"),
            Self::String => write!(f, "String"),
            Self::DateTime => write!(f, "DateTime"),
            Self::Bytes => write!(f, "Bytes"),
            Self::Other(id) => write!(f, "Other({id})"),
        }
    }
}

/// Protocol-native value as handed to and received from a connection
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolValue {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Bytes(Vec<u8>),
    /// Payload of a protocol-specific type, carried as JSON
    Opaque {
        type_id: String,
        data: serde_json::Value,
    },
}

impl ProtocolValue {
    /// The protocol datatype backing this value
    pub fn datatype(&self) -> ProtocolDatatype {
        match self {
            Self::Boolean(_) => ProtocolDatatype::Boolean,
            Self::Int32(_) => ProtocolDatatype::Int32,
            Self::Int64(_) => ProtocolDatatype::Int64,
            Self::Float(_) => ProtocolDatatype::Float,
            Self::Double(_) => ProtocolDatatype::Double,
            Self::String(_) => ProtocolDatatype::String,
            Self::DateTime(_) => ProtocolDatatype::DateTime,
            Self::Bytes(_) => ProtocolDatatype::Bytes,
            Self::Opaque { type_id, .. } => ProtocolDatatype::Other(type_id.clone()),
        }
    }

    /// Textual form used by the default reverse converter
    pub fn as_text(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Int32(i) => i.to_string(),
            Self::Int64(l) => l.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Double(d) => d.to_string(),
            Self::String(s) => s.clone(),
            Self::DateTime(dt) => dt.to_rfc3339(),
            Self::Bytes(b) => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD.encode(b)
            }
            Self::Opaque { data, .. } => data.to_string(),
        }
    }

    /// JSON form for JSON-carrying protocols
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Int32(i) => serde_json::Value::from(*i),
            Self::Int64(l) => serde_json::Value::from(*l),
            Self::Float(f) => serde_json::Value::from(f64::from(*f)),
            Self::Double(d) => serde_json::Value::from(*d),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Self::Bytes(b) => {
                use base64::Engine;
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            Self::Opaque { data, .. } => data.clone(),
        }
    }

    /// Interpret a JSON value as the given protocol datatype
    pub fn from_json(target: &ProtocolDatatype, json: &serde_json::Value) -> Result<Self> {
        let err = |reason: &str| Error::conversion(json, target, reason.to_string());
        match target {
            ProtocolDatatype::Boolean => json
                .as_bool()
                .map(Self::Boolean)
                .ok_or_else(|| err("not a JSON boolean")),
            ProtocolDatatype::Int32 => json
                .as_i64()
                .and_then(|l| i32::try_from(l).ok())
                .map(Self::Int32)
                .ok_or_else(|| err("not a 32-bit JSON integer")),
            ProtocolDatatype::Int64 => json
                .as_i64()
                .map(Self::Int64)
                .ok_or_else(|| err("not a JSON integer")),
            ProtocolDatatype::Float => json
                .as_f64()
                .map(|d| Self::Float(d as f32))
                .ok_or_else(|| err("not a JSON number")),
            ProtocolDatatype::Double => json
                .as_f64()
                .map(Self::Double)
                .ok_or_else(|| err("not a JSON number")),
            ProtocolDatatype::String => json
                .as_str()
                .map(|s| Self::String(s.to_string()))
                .ok_or_else(|| err("not a JSON string")),
            ProtocolDatatype::DateTime => json
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| Self::DateTime(dt.with_timezone(&Utc)))
                .ok_or_else(|| err("not an RFC 3339 timestamp")),
            ProtocolDatatype::Bytes => {
                use base64::Engine;
                json.as_str()
                    .and_then(|s| base64::engine::general_purpose::STANDARD.decode(s).ok())
                    .map(Self::Bytes)
                    .ok_or_else(|| err("not a base64 JSON string"))
            }
            ProtocolDatatype::Other(type_id) => Ok(Self::Opaque {
                type_id: type_id.clone(),
                data: json.clone(),
            }),
        }
    }
}

/// Lookup key for one conversion direction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionKey {
    pub datatype: Datatype,
    pub protocol: ProtocolDatatype,
}

impl ConversionKey {
    pub fn new(datatype: Datatype, protocol: ProtocolDatatype) -> Self {
        Self { datatype, protocol }
    }
}

/// Converter from a model value to a protocol-native value
pub type ToProtocolFn = Arc<dyn Fn(&TypedValue) -> Result<ProtocolValue> + Send + Sync>;

/// Converter from a protocol-native value to a model value
pub type FromProtocolFn = Arc<dyn Fn(&ProtocolValue) -> Result<TypedValue> + Send + Sync>;

/// Registry of value converters, one entry per key per direction;
/// re-registration overwrites
#[derive(Default)]
pub struct ValueConverter {
    to_protocol: DashMap<ConversionKey, ToProtocolFn>,
    from_protocol: DashMap<ConversionKey, FromProtocolFn>,
}

impl ValueConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model-to-protocol converter for (datatype, protocol)
    pub fn register_to_protocol<F>(
        &self,
        datatype: Datatype,
        protocol: ProtocolDatatype,
        converter: F,
    ) where
        F: Fn(&TypedValue) -> Result<ProtocolValue> + Send + Sync + 'static,
    {
        self.to_protocol
            .insert(ConversionKey::new(datatype, protocol), Arc::new(converter));
    }

    /// Register a protocol-to-model converter for (datatype, protocol)
    pub fn register_from_protocol<F>(
        &self,
        datatype: Datatype,
        protocol: ProtocolDatatype,
        converter: F,
    ) where
        F: Fn(&ProtocolValue) -> Result<TypedValue> + Send + Sync + 'static,
    {
        self.from_protocol
            .insert(ConversionKey::new(datatype, protocol), Arc::new(converter));
    }

    /// Convert a model value to the given protocol datatype
    pub fn to_protocol(&self, value: &TypedValue, target: &ProtocolDatatype) -> Result<ProtocolValue> {
        let key = ConversionKey::new(value.datatype(), target.clone());
        let registered = self.to_protocol.get(&key).map(|c| c.clone());
        match registered {
            Some(converter) => converter(value),
            None => default_to_protocol(value, target),
        }
    }

    /// Convert a protocol-native value to the given model datatype
    pub fn from_protocol(&self, value: &ProtocolValue, target: Datatype) -> Result<TypedValue> {
        let key = ConversionKey::new(target, value.datatype());
        let registered = self.from_protocol.get(&key).map(|c| c.clone());
        match registered {
            Some(converter) => converter(value),
            None => default_from_protocol(value, target),
        }
    }
}

/// Default structural conversion toward the protocol.
///
/// Date-time values are always normalized to the protocol's native time
/// representation, never passed through as strings.
fn default_to_protocol(value: &TypedValue, target: &ProtocolDatatype) -> Result<ProtocolValue> {
    let unsupported =
        || Error::conversion(value, target, format!("no conversion from {}", value.datatype()));
    match target {
        ProtocolDatatype::Boolean => match value {
            TypedValue::Boolean(b) => Ok(ProtocolValue::Boolean(*b)),
            _ => Err(unsupported()),
        },
        ProtocolDatatype::Int32 => match value.as_i64() {
            Some(l) => i32::try_from(l)
                .map(ProtocolValue::Int32)
                .map_err(|_| Error::conversion(value, target, "out of range for Int32")),
            None => Err(unsupported()),
        },
        ProtocolDatatype::Int64 => match value.as_i64() {
            Some(l) => Ok(ProtocolValue::Int64(l)),
            None => Err(unsupported()),
        },
        ProtocolDatatype::Float => match value {
            TypedValue::Float(f) => Ok(ProtocolValue::Float(f.into_inner())),
            TypedValue::Int(i) => Ok(ProtocolValue::Float(*i as f32)),
            _ => Err(unsupported()),
        },
        ProtocolDatatype::Double => match value {
            TypedValue::Double(d) => Ok(ProtocolValue::Double(d.into_inner())),
            TypedValue::Float(f) => Ok(ProtocolValue::Double(f64::from(f.into_inner()))),
            _ => match value.as_i64() {
                Some(l) => Ok(ProtocolValue::Double(l as f64)),
                None => Err(unsupported()),
            },
        },
        ProtocolDatatype::String => Ok(ProtocolValue::String(value.as_string())),
        ProtocolDatatype::DateTime => match value {
            TypedValue::DateTime(dt) => Ok(ProtocolValue::DateTime(*dt)),
            _ => Err(unsupported()),
        },
        ProtocolDatatype::Bytes => match value {
            TypedValue::Base64Binary(b) => Ok(ProtocolValue::Bytes(b.clone())),
            _ => Err(unsupported()),
        },
        ProtocolDatatype::Other(_) => Err(Error::conversion(
            value,
            target,
            "non-builtin protocol type requires a registered converter",
        )),
    }
}

/// Default reverse conversion: textual round-trip through the model
/// datatype's canonical form, with direct instant mapping for date-times.
fn default_from_protocol(value: &ProtocolValue, target: Datatype) -> Result<TypedValue> {
    if let ProtocolValue::DateTime(dt) = value {
        if target == Datatype::DateTime {
            return Ok(TypedValue::DateTime(*dt));
        }
    }
    TypedValue::from_string(target, &value.as_text()).map_err(|e| {
        Error::conversion(
            value.as_text(),
            target,
            format!("protocol value of type {} not parseable: {e}", value.datatype()),
        )
    })
}
