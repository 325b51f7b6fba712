//! In-memory table
//!
//! BTreeMap keyed by (PartitionKey, RowKey), so each partition is a
//! contiguous key range and scans come out in key order.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::entity::{DynamicEntity, EntityKey};
use crate::error::{Result, TableError};

/// Minimum / maximum table name length
pub const MIN_TABLE_NAME_LEN: usize = 3;
pub const MAX_TABLE_NAME_LEN: usize = 63;

/// Entities of one table
#[derive(Debug, Clone)]
pub struct Table {
    /// Name as given at creation (lookups are case-insensitive)
    name: String,
    entities: BTreeMap<EntityKey, DynamicEntity>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &EntityKey) -> Option<&DynamicEntity> {
        self.entities.get(key)
    }

    /// Insert or overwrite an entity
    pub fn put(&mut self, entity: DynamicEntity) {
        self.entities.insert(entity.key.clone(), entity);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities in key order
    pub fn iter(&self) -> impl Iterator<Item = &DynamicEntity> {
        self.entities.values()
    }

    /// Entities from `start` onwards, optionally restricted to one partition
    pub fn scan<'a>(
        &'a self,
        start: Option<&EntityKey>,
        partition: Option<&'a str>,
    ) -> impl Iterator<Item = &'a DynamicEntity> + 'a {
        let partition_start = partition.map(|pk| EntityKey::new(pk, ""));
        let lower = match (start, partition_start) {
            (Some(a), Some(b)) => Some(if *a > b { a.clone() } else { b }),
            (Some(a), None) => Some(a.clone()),
            (None, b) => b,
        };

        let range = match lower {
            Some(lower) => self.entities.range((Bound::Included(lower), Bound::Unbounded)),
            None => self.entities.range::<EntityKey, _>(..),
        };

        range
            .take_while(move |(key, _)| partition.map_or(true, |pk| key.partition_key == pk))
            .map(|(_, entity)| entity)
    }
}

/// Normalized lookup key of a table name
pub fn table_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Check a table name: 3-63 ASCII alphanumerics, starting with a letter
pub fn validate_table_name(name: &str) -> Result<()> {
    let valid_len = (MIN_TABLE_NAME_LEN..=MAX_TABLE_NAME_LEN).contains(&name.len());
    let starts_with_letter = name.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
    let alphanumeric = name.chars().all(|c| c.is_ascii_alphanumeric());

    if valid_len && starts_with_letter && alphanumeric {
        Ok(())
    } else {
        Err(TableError::InvalidTableName(name.to_string()))
    }
}
