//! Entity Module
//!
//! Records stored in a table.
//!
//! ## Model
//! - [`EntityKey`]: (PartitionKey, RowKey); the partition is the unit of
//!   atomic batches, the row key is unique within it
//! - [`PropertyValue`] / [`Properties`]: schema-less typed fields
//! - [`DynamicEntity`]: key + properties + store metadata
//! - [`TableEntity`]: what a type must provide to be stored, implemented by
//!   `DynamicEntity` and, through [`document`], by any serde record

pub mod document;
mod dynamic;
mod key;
mod value;

pub use dynamic::{
    validate_properties, DynamicEntity, EntityMetadata, Properties, MAX_PROPERTY_NAME_LEN,
    RESERVED_PROPERTY_NAMES,
};
pub use key::{EntityKey, MAX_KEY_BYTES};
pub use value::PropertyValue;

use crate::error::Result;

/// A record that can be written to and read from a table
pub trait TableEntity: Sized {
    fn partition_key(&self) -> &str;

    fn row_key(&self) -> &str;

    /// Properties to store (without the key or metadata)
    fn to_properties(&self) -> Result<Properties>;

    /// Rebuild the record from what the store returned
    fn from_parts(key: EntityKey, properties: Properties, metadata: EntityMetadata) -> Result<Self>;

    fn key(&self) -> EntityKey {
        EntityKey::new(self.partition_key(), self.row_key())
    }

    fn to_dynamic(&self) -> Result<DynamicEntity> {
        Ok(DynamicEntity {
            key: self.key(),
            properties: self.to_properties()?,
            metadata: EntityMetadata::default(),
        })
    }

    fn from_dynamic(entity: DynamicEntity) -> Result<Self> {
        Self::from_parts(entity.key, entity.properties, entity.metadata)
    }
}
