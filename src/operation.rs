//! Table operations and their results
//!
//! Status codes follow the managed table service:
//! - 200 OK: Retrieve
//! - 201 Created: Insert
//! - 204 No Content: InsertOrMerge / InsertOrReplace
//! - 404 Not Found: Retrieve of a missing entity

use crate::entity::{DynamicEntity, EntityKey};
use crate::error::{Result, TableError};

/// Maximum number of operations in one batch
pub const MAX_BATCH_SIZE: usize = 100;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_NO_CONTENT: u16 = 204;
pub const STATUS_NOT_FOUND: u16 = 404;

/// A single-entity operation
#[derive(Debug, Clone, PartialEq)]
pub enum TableOperation {
    /// Insert; fails if the key exists
    Insert(DynamicEntity),

    /// Insert, or merge properties into the existing entity
    InsertOrMerge(DynamicEntity),

    /// Insert, or replace the existing entity's properties
    InsertOrReplace(DynamicEntity),

    /// Read one entity
    Retrieve(EntityKey),
}

impl TableOperation {
    /// Key the operation addresses
    pub fn key(&self) -> &EntityKey {
        match self {
            TableOperation::Insert(e)
            | TableOperation::InsertOrMerge(e)
            | TableOperation::InsertOrReplace(e) => &e.key,
            TableOperation::Retrieve(key) => key,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TableOperation::Insert(_) => "insert",
            TableOperation::InsertOrMerge(_) => "insert_or_merge",
            TableOperation::InsertOrReplace(_) => "insert_or_replace",
            TableOperation::Retrieve(_) => "retrieve",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, TableOperation::Retrieve(_))
    }
}

/// Result of one operation
#[derive(Debug, Clone, PartialEq)]
pub struct TableResult {
    pub status: u16,

    /// ETag of the entity after the operation
    pub etag: Option<String>,

    /// Entity returned by Retrieve
    pub entity: Option<DynamicEntity>,
}

impl TableResult {
    pub fn no_content(etag: Option<String>) -> Self {
        Self {
            status: STATUS_NO_CONTENT,
            etag,
            entity: None,
        }
    }
}

/// Operations submitted together, all-or-nothing, against one partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableBatchOperation {
    operations: Vec<TableOperation>,
}

impl TableBatchOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: TableOperation) {
        self.operations.push(operation);
    }

    pub fn insert_or_merge(&mut self, entity: DynamicEntity) {
        self.push(TableOperation::InsertOrMerge(entity));
    }

    pub fn operations(&self) -> &[TableOperation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<TableOperation> {
        self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Partition key shared by every operation
    ///
    /// Errors if the batch is empty, too large, or mixes partitions.
    pub fn partition_key(&self) -> Result<&str> {
        let first = self.operations.first().ok_or(TableError::EmptyBatch)?;

        if self.operations.len() > MAX_BATCH_SIZE {
            return Err(TableError::BatchTooLarge(self.operations.len()));
        }

        let expected = first.key().partition_key.as_str();
        match self
            .operations
            .iter()
            .find(|op| op.key().partition_key != expected)
        {
            Some(op) => Err(TableError::PartitionMismatch {
                expected: expected.to_string(),
                found: op.key().partition_key.clone(),
            }),
            None => Ok(expected),
        }
    }
}

impl FromIterator<TableOperation> for TableBatchOperation {
    fn from_iter<I: IntoIterator<Item = TableOperation>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}
