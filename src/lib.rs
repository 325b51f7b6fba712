//! # TableKV
//!
//! A typed accessor over a partition/row addressed table store:
//! - Point lookups by (PartitionKey, RowKey)
//! - Insert-or-merge upserts, one entity or an atomic single-partition batch
//! - Explicit failure kinds instead of boolean outcomes
//! - Embedded store backends (in-memory, or WAL + snapshot on disk)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TableAccessor                           │
//! │        (lookup_by_key / upsert_one / upsert_batch)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  connection string → StorageAccount
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 dyn TableStoreClient                        │
//! │        (queries, operations, batches, table admin)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  memory://  │          │   file://   │
//!   │ TableStore  │          │ TableStore  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                          ┌────────┴────────┐
//!                          ▼                 ▼
//!                   ┌─────────────┐   ┌─────────────┐
//!                   │     WAL     │   │  Snapshot   │
//!                   │  (Append)   │   │ (Checkpoint)│
//!                   └─────────────┘   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod account;
pub mod entity;
pub mod query;
pub mod operation;
pub mod client;
pub mod store;
pub mod wal;
pub mod accessor;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FailureKind, Result, TableError};
pub use config::{Config, WalSyncStrategy};
pub use accessor::TableAccessor;
pub use account::StorageAccount;
pub use client::{LocalTableClient, TableRef, TableStoreClient};
pub use entity::{DynamicEntity, EntityKey, EntityMetadata, Properties, PropertyValue, TableEntity};
pub use operation::{TableBatchOperation, TableOperation, TableResult};
pub use query::{Filter, TableQuery};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TableKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
