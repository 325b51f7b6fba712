//! Client Module
//!
//! The [`TableStoreClient`] trait is the seam between the accessor and
//! whatever actually stores the tables. [`connect`] picks an implementation
//! from the account endpoint:
//!
//! ```text
//!   memory://name  ──► LocalTableClient over a shared in-memory TableStore
//!   file://path    ──► LocalTableClient over a WAL-backed TableStore
//!   http(s)://...  ──► Unreachable (inject a client with TableAccessor::with_client)
//! ```

mod local;

pub use local::LocalTableClient;

use std::fmt::Debug;
use std::sync::Arc;

use crate::account::{Endpoint, StorageAccount};
use crate::config::Config;
use crate::error::{Result, TableError};
use crate::operation::{TableBatchOperation, TableOperation, TableResult};
use crate::query::{ContinuationToken, QuerySegment, TableQuery};
use crate::store::registry;

/// Handle to a table, as returned by [`TableStoreClient::get_table_reference`]
///
/// Holding a reference says nothing about whether the table exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Operations a table store must provide
///
/// Implementations must be usable from several threads at once.
pub trait TableStoreClient: Send + Sync + Debug {
    /// Get a handle to a table
    fn get_table_reference(&self, name: &str) -> Result<TableRef>;

    /// Create the table if missing; returns true if it was created
    fn create_table_if_not_exists(&self, table: &TableRef) -> Result<bool>;

    fn table_exists(&self, table: &TableRef) -> Result<bool>;

    /// Names of all tables, sorted
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Run one segment of a query, resuming at `token` if given
    fn execute_query_segmented(
        &self,
        table: &TableRef,
        query: &TableQuery,
        token: Option<&ContinuationToken>,
    ) -> Result<QuerySegment>;

    /// Run a single operation
    fn execute(&self, table: &TableRef, operation: TableOperation) -> Result<TableResult>;

    /// Run a batch atomically; one result per operation, in order
    fn execute_batch(&self, table: &TableRef, batch: TableBatchOperation)
        -> Result<Vec<TableResult>>;
}

/// Connect to the store serving an account's endpoint
pub fn connect(account: &StorageAccount, config: &Config) -> Result<Arc<dyn TableStoreClient>> {
    let store = match account.endpoint() {
        Endpoint::Memory { name } => registry::memory(name),
        Endpoint::File { path } => registry::file(path, config)?,
        Endpoint::Remote { url } => {
            return Err(TableError::Unreachable(format!(
                "{}: no transport available for remote endpoints",
                url
            )))
        }
    };

    tracing::debug!(
        "Connected account {:?} to {} store at {}",
        account.name(),
        account.endpoint().scheme(),
        account.endpoint()
    );

    Ok(Arc::new(LocalTableClient::new(store)))
}
