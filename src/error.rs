//! Error types for tablekv
//!
//! Provides a unified error type for all operations, plus a coarse
//! [`FailureKind`] classification for callers that only need to branch on
//! the class of failure.

use thiserror::Error;

/// Result type alias using TableError
pub type Result<T> = std::result::Result<T, TableError>;

/// Unified error type for tablekv operations
#[derive(Debug, Error)]
pub enum TableError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    // -------------------------------------------------------------------------
    // Table / Entity Errors
    // -------------------------------------------------------------------------
    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid property: {0}")]
    InvalidProperty(String),

    #[error("Entity already exists: ({partition_key}, {row_key})")]
    EntityAlreadyExists {
        partition_key: String,
        row_key: String,
    },

    #[error("Unexpected status code {0}")]
    UnexpectedStatus(u16),

    // -------------------------------------------------------------------------
    // Batch Errors
    // -------------------------------------------------------------------------
    #[error("Batch is empty")]
    EmptyBatch,

    #[error("Batch has {0} operations (max 100)")]
    BatchTooLarge(usize),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Batch mixes partition keys: expected {expected:?}, found {found:?}")]
    PartitionMismatch { expected: String, found: String },

    #[error("Batch operation {index} failed: {source}")]
    BatchOperationFailed {
        index: usize,
        #[source]
        source: Box<TableError>,
    },

    // -------------------------------------------------------------------------
    // WAL / Storage Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("Snapshot corruption detected: {0}")]
    SnapshotCorruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Coarse classification of a [`TableError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The store could not be reached (bad endpoint, I/O failure)
    Connectivity,

    /// A batch mixed partition keys
    PartitionMismatch,

    /// The store rejected one operation of a batch, so nothing was applied
    PartialBatch,

    /// The table does not exist
    NotFound,

    /// The entity already exists (strict insert)
    Conflict,

    /// The caller supplied an invalid name, key, property, or batch shape
    InvalidInput,

    /// The store answered with an unexpected status or its data is damaged
    Storage,
}

impl TableError {
    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            TableError::Io(_) | TableError::Unreachable(_) => FailureKind::Connectivity,
            TableError::PartitionMismatch { .. } => FailureKind::PartitionMismatch,
            TableError::BatchOperationFailed { .. } => FailureKind::PartialBatch,
            TableError::TableNotFound(_) => FailureKind::NotFound,
            TableError::EntityAlreadyExists { .. } => FailureKind::Conflict,
            TableError::InvalidConnectionString(_)
            | TableError::InvalidTableName(_)
            | TableError::InvalidKey(_)
            | TableError::InvalidProperty(_)
            | TableError::EmptyBatch
            | TableError::BatchTooLarge(_)
            | TableError::InvalidBatch(_)
            | TableError::Serialization(_) => FailureKind::InvalidInput,
            TableError::UnexpectedStatus(_)
            | TableError::WalCorruption(_)
            | TableError::SnapshotCorruption(_)
            | TableError::Storage(_)
            | TableError::LockPoisoned(_) => FailureKind::Storage,
        }
    }

    /// Status code the managed table service would answer with for this error
    pub fn status(&self) -> u16 {
        match self {
            TableError::TableNotFound(_) => 404,
            TableError::EntityAlreadyExists { .. } => 409,
            TableError::UnexpectedStatus(code) => *code,
            TableError::BatchOperationFailed { source, .. } => source.status(),
            e => match e.kind() {
                FailureKind::InvalidInput | FailureKind::PartitionMismatch => 400,
                FailureKind::Connectivity => 503,
                _ => 500,
            },
        }
    }
}

impl From<bincode::Error> for TableError {
    fn from(e: bincode::Error) -> Self {
        TableError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for TableError {
    fn from(e: serde_json::Error) -> Self {
        TableError::Serialization(e.to_string())
    }
}
