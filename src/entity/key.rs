//! Composite entity key
//!
//! Entities are addressed by (PartitionKey, RowKey). Keys order
//! lexicographically by partition first, so a sorted map of keys keeps each
//! partition contiguous.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};

/// Maximum size of a PartitionKey or RowKey in bytes
pub const MAX_KEY_BYTES: usize = 1024;

/// Composite key of an entity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub partition_key: String,
    pub row_key: String,
}

impl EntityKey {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }

    /// Check both key parts against the table service rules
    ///
    /// Empty keys are allowed. Keys may not exceed [`MAX_KEY_BYTES`] and may
    /// not contain `/`, `\`, `#`, `?` or control characters.
    pub fn validate(&self) -> Result<()> {
        validate_key_part("PartitionKey", &self.partition_key)?;
        validate_key_part("RowKey", &self.row_key)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.partition_key, self.row_key)
    }
}

fn validate_key_part(which: &str, value: &str) -> Result<()> {
    if value.len() > MAX_KEY_BYTES {
        return Err(TableError::InvalidKey(format!(
            "{} is {} bytes (max {})",
            which,
            value.len(),
            MAX_KEY_BYTES
        )));
    }

    if let Some(c) = value.chars().find(|&c| is_forbidden_key_char(c)) {
        return Err(TableError::InvalidKey(format!(
            "{} {:?} contains forbidden character {:?}",
            which, value, c
        )));
    }

    Ok(())
}

fn is_forbidden_key_char(c: char) -> bool {
    matches!(c, '/' | '\\' | '#' | '?')
        || ('\u{0000}'..='\u{001F}').contains(&c)
        || ('\u{007F}'..='\u{009F}').contains(&c)
}
