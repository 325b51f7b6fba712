//! Schema-less entity

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{EntityKey, PropertyValue, TableEntity};
use crate::error::{Result, TableError};

/// Property bag of an entity, ordered by property name
pub type Properties = BTreeMap<String, PropertyValue>;

/// Names managed by the store; never stored as regular properties
pub const RESERVED_PROPERTY_NAMES: [&str; 4] = ["PartitionKey", "RowKey", "Timestamp", "ETag"];

/// Maximum length of a property name
pub const MAX_PROPERTY_NAME_LEN: usize = 255;

/// Store-assigned metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Last write time, unix milliseconds
    pub timestamp: Option<i64>,

    /// Opaque version tag, changes on every write
    pub etag: Option<String>,
}

/// An entity with an arbitrary set of typed properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicEntity {
    pub key: EntityKey,
    pub properties: Properties,
    pub metadata: EntityMetadata,
}

impl DynamicEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            key: EntityKey::new(partition_key, row_key),
            properties: Properties::new(),
            metadata: EntityMetadata::default(),
        }
    }

    /// Builder-style property setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Look up a property, treating PartitionKey and RowKey as string properties
    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "PartitionKey" => Some(PropertyValue::String(self.key.partition_key.clone())),
            "RowKey" => Some(PropertyValue::String(self.key.row_key.clone())),
            "Timestamp" => self.metadata.timestamp.map(PropertyValue::DateTime),
            _ => self.properties.get(name).cloned(),
        }
    }

    /// Merge incoming properties: same-named ones are overwritten, the rest kept
    pub fn merge(&mut self, incoming: Properties) {
        self.properties.extend(incoming);
    }

    /// Keep only the named properties (keys and metadata are always kept)
    pub fn project(&mut self, names: &[String]) {
        self.properties.retain(|name, _| names.iter().any(|n| n == name));
    }
}

impl TableEntity for DynamicEntity {
    fn partition_key(&self) -> &str {
        &self.key.partition_key
    }

    fn row_key(&self) -> &str {
        &self.key.row_key
    }

    fn to_properties(&self) -> Result<Properties> {
        Ok(self.properties.clone())
    }

    fn from_parts(key: EntityKey, properties: Properties, metadata: EntityMetadata) -> Result<Self> {
        Ok(Self {
            key,
            properties,
            metadata,
        })
    }
}

/// Check property names and values against the table service rules
pub fn validate_properties(properties: &Properties) -> Result<()> {
    for (name, value) in properties {
        if name.is_empty() {
            return Err(TableError::InvalidProperty("empty property name".to_string()));
        }
        if name.chars().count() > MAX_PROPERTY_NAME_LEN {
            return Err(TableError::InvalidProperty(format!(
                "property name {:?} is longer than {} characters",
                name, MAX_PROPERTY_NAME_LEN
            )));
        }
        if RESERVED_PROPERTY_NAMES.contains(&name.as_str()) {
            return Err(TableError::InvalidProperty(format!(
                "{:?} is a reserved property name",
                name
            )));
        }
        if let PropertyValue::DateTime(ms) = value {
            if chrono::DateTime::from_timestamp_millis(*ms).is_none() {
                return Err(TableError::InvalidProperty(format!(
                    "property {:?}: datetime {}ms is out of range",
                    name, ms
                )));
            }
        }
    }
    Ok(())
}
