//! serde bridge between typed records and property bags
//!
//! A record is serialized to a JSON object; each top-level field becomes a
//! property. Fields serialized as `PartitionKey` / `RowKey` (and the other
//! reserved names) are dropped on the way out and filled from the entity key
//! on the way back in, so
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tablekv::entity::{document, EntityKey, EntityMetadata, Properties, TableEntity};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Customer {
//!     #[serde(rename = "PartitionKey")]
//!     region: String,
//!     #[serde(rename = "RowKey")]
//!     id: String,
//!     name: String,
//! }
//!
//! impl TableEntity for Customer {
//!     fn partition_key(&self) -> &str { &self.region }
//!     fn row_key(&self) -> &str { &self.id }
//!     fn to_properties(&self) -> tablekv::Result<Properties> {
//!         document::to_properties(self)
//!     }
//!     fn from_parts(key: EntityKey, props: Properties, _: EntityMetadata) -> tablekv::Result<Self> {
//!         document::from_properties(&key, &props)
//!     }
//! }
//! ```

use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde::ser::{self, Serialize};
use serde_json::{Map, Number, Value};

use super::{DynamicEntity, EntityKey, Properties, PropertyValue, RESERVED_PROPERTY_NAMES};
use crate::error::{Result, TableError};

/// Field carrying the ETag in the flat JSON form
pub const ETAG_FIELD: &str = "odata.etag";

/// Serialize a record into a property bag
///
/// Fails on values a property cannot hold exactly: NaN or infinite floats,
/// and unsigned integers above `i64::MAX`.
pub fn to_properties<T: Serialize>(record: &T) -> Result<Properties> {
    if let Err(FloatCheckError::NonFinite { field, value }) = record.serialize(FloatCheck) {
        return Err(TableError::Serialization(format!(
            "property {:?}: {} cannot be stored",
            field.unwrap_or_default(),
            value
        )));
    }

    let fields = match serde_json::to_value(record)? {
        Value::Object(fields) => fields,
        other => {
            return Err(TableError::Serialization(format!(
                "entity must serialize to an object, got {}",
                json_type_name(&other)
            )))
        }
    };

    let mut properties = Properties::new();
    for (name, value) in fields {
        if RESERVED_PROPERTY_NAMES.contains(&name.as_str()) {
            continue;
        }
        if let Some(value) = json_to_property(&name, value)? {
            properties.insert(name, value);
        }
    }
    Ok(properties)
}

/// Deserialize a record from its key and property bag
pub fn from_properties<T: DeserializeOwned>(key: &EntityKey, properties: &Properties) -> Result<T> {
    let mut fields = Map::with_capacity(properties.len() + 2);
    fields.insert(
        "PartitionKey".to_string(),
        Value::String(key.partition_key.clone()),
    );
    fields.insert("RowKey".to_string(), Value::String(key.row_key.clone()));

    for (name, value) in properties {
        fields.insert(name.clone(), property_to_json(value));
    }

    Ok(serde_json::from_value(Value::Object(fields))?)
}

fn json_to_property(name: &str, value: Value) -> Result<Option<PropertyValue>> {
    let property = match value {
        Value::Null => return Ok(None),
        Value::Bool(b) => PropertyValue::Boolean(b),
        Value::String(s) => PropertyValue::String(s),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                PropertyValue::Int64(i)
            } else if n.is_u64() {
                return Err(TableError::Serialization(format!(
                    "property {:?}: integer {} does not fit in Int64",
                    name, n
                )));
            } else if let Some(f) = n.as_f64() {
                PropertyValue::Double(f)
            } else {
                return Err(TableError::Serialization(format!(
                    "property {:?}: number {} is out of range",
                    name, n
                )));
            }
        }
        other => {
            return Err(TableError::Serialization(format!(
                "property {:?}: nested {} values are not supported",
                name,
                json_type_name(&other)
            )))
        }
    };
    Ok(Some(property))
}

fn property_to_json(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::String(s) | PropertyValue::Guid(s) => Value::String(s.clone()),
        PropertyValue::Boolean(b) => Value::Bool(*b),
        PropertyValue::Int32(v) => Value::Number(Number::from(*v)),
        PropertyValue::Int64(v) | PropertyValue::DateTime(v) => Value::Number(Number::from(*v)),
        PropertyValue::Double(v) => Number::from_f64(*v).map(Value::Number).unwrap_or(Value::Null),
        PropertyValue::Binary(bytes) => {
            Value::Array(bytes.iter().map(|b| Value::Number(Number::from(*b))).collect())
        }
    }
}

/// Parse a flat JSON object (`PartitionKey`, `RowKey`, properties) into an
/// entity; an `odata.etag` field is taken as metadata
pub fn dynamic_from_json(text: &str) -> Result<DynamicEntity> {
    let mut value: Value = serde_json::from_str(text)?;
    let fields = value.as_object_mut().ok_or_else(|| {
        TableError::Serialization("entity must be a JSON object".to_string())
    })?;

    let etag = match fields.remove(ETAG_FIELD) {
        Some(Value::String(etag)) => Some(etag),
        Some(other) => {
            return Err(TableError::Serialization(format!(
                "{} must be a string, got {}",
                ETAG_FIELD,
                json_type_name(&other)
            )))
        }
        None => None,
    };

    let key_field = |name: &str| {
        fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TableError::InvalidKey(format!("missing string field {}", name)))
    };
    let key = EntityKey::new(key_field("PartitionKey")?, key_field("RowKey")?);

    let mut entity = DynamicEntity {
        key,
        properties: to_properties(&value)?,
        metadata: Default::default(),
    };
    entity.metadata.etag = etag;
    Ok(entity)
}

/// Render an entity as a flat JSON object, with its ETag (if any) under
/// `odata.etag`
pub fn dynamic_to_json(entity: &DynamicEntity) -> Result<String> {
    let mut value: Value = from_properties(&entity.key, &entity.properties)?;
    if let (Some(fields), Some(etag)) = (value.as_object_mut(), &entity.metadata.etag) {
        fields.insert(ETAG_FIELD.to_string(), Value::String(etag.clone()));
    }
    Ok(value.to_string())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Float check
// =============================================================================

// serde_json turns NaN and infinities into null, which would silently drop
// the property, so records are walked for them before conversion.

#[derive(Debug, thiserror::Error)]
enum FloatCheckError {
    #[error("non-finite float {value} in {field:?}")]
    NonFinite { field: Option<String>, value: f64 },

    /// Raised by the record's own `Serialize` impl; `serde_json` reports it
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for FloatCheckError {
    fn custom<T: Display>(msg: T) -> Self {
        FloatCheckError::Custom(msg.to_string())
    }
}

impl FloatCheckError {
    fn in_field(self, name: &str) -> Self {
        match self {
            FloatCheckError::NonFinite { field: None, value } => FloatCheckError::NonFinite {
                field: Some(name.to_string()),
                value,
            },
            other => other,
        }
    }
}

/// Serializer that only looks at floats
struct FloatCheck;

type Checked = std::result::Result<(), FloatCheckError>;

fn check_float(value: f64) -> Checked {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FloatCheckError::NonFinite { field: None, value })
    }
}

macro_rules! accept {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(fn $method(self, _: $ty) -> Checked { Ok(()) })*
    };
}

impl ser::Serializer for FloatCheck {
    type Ok = ();
    type Error = FloatCheckError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
        serialize_unit_struct(&'static str),
    );

    fn serialize_f32(self, v: f32) -> Checked {
        check_float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Checked {
        check_float(v)
    }

    fn serialize_none(self) -> Checked {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Checked {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Checked {
        Ok(())
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Checked {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> std::result::Result<Self, FloatCheckError> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> std::result::Result<Self, FloatCheckError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, FloatCheckError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, FloatCheckError> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> std::result::Result<Self, FloatCheckError> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, FloatCheckError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, FloatCheckError> {
        Ok(self)
    }
}

macro_rules! check_elements {
    ($($trait:ident::$method:ident),* $(,)?) => {
        $(impl ser::$trait for FloatCheck {
            type Ok = ();
            type Error = FloatCheckError;

            fn $method<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
                value.serialize(FloatCheck)
            }

            fn end(self) -> Checked {
                Ok(())
            }
        })*
    };
}

check_elements!(
    SerializeSeq::serialize_element,
    SerializeTuple::serialize_element,
    SerializeTupleStruct::serialize_field,
    SerializeTupleVariant::serialize_field,
);

impl ser::SerializeMap for FloatCheck {
    type Ok = ();
    type Error = FloatCheckError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Checked {
        key.serialize(FloatCheck)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FloatCheck)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStruct for FloatCheck {
    type Ok = ();
    type Error = FloatCheckError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Checked {
        value.serialize(FloatCheck).map_err(|e| e.in_field(key))
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FloatCheck {
    type Ok = ();
    type Error = FloatCheckError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Checked {
        value.serialize(FloatCheck).map_err(|e| e.in_field(key))
    }

    fn end(self) -> Checked {
        Ok(())
    }
}
