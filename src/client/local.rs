//! Client for the embedded table store

use std::sync::Arc;

use super::{TableRef, TableStoreClient};
use crate::error::{Result, TableError};
use crate::operation::{TableBatchOperation, TableOperation, TableResult};
use crate::query::{ContinuationToken, QuerySegment, TableQuery};
use crate::store::TableStore;

/// [`TableStoreClient`] backed by a [`TableStore`] in this process
#[derive(Debug, Clone)]
pub struct LocalTableClient {
    store: Arc<TableStore>,
}

impl LocalTableClient {
    pub fn new(store: Arc<TableStore>) -> Self {
        Self { store }
    }

    /// Client over a fresh private in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(TableStore::in_memory("private")))
    }

    pub fn store(&self) -> &Arc<TableStore> {
        &self.store
    }
}

impl TableStoreClient for LocalTableClient {
    fn get_table_reference(&self, name: &str) -> Result<TableRef> {
        if name.is_empty() {
            return Err(TableError::InvalidTableName(String::new()));
        }
        Ok(TableRef::new(name))
    }

    fn create_table_if_not_exists(&self, table: &TableRef) -> Result<bool> {
        self.store.create_table(table.name())
    }

    fn table_exists(&self, table: &TableRef) -> Result<bool> {
        Ok(self.store.table_exists(table.name()))
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.store.list_tables())
    }

    fn execute_query_segmented(
        &self,
        table: &TableRef,
        query: &TableQuery,
        token: Option<&ContinuationToken>,
    ) -> Result<QuerySegment> {
        if let Some(filter) = &query.filter {
            tracing::trace!("query {} $filter={}", table.name(), filter);
        }
        self.store.query(table.name(), query, token)
    }

    fn execute(&self, table: &TableRef, operation: TableOperation) -> Result<TableResult> {
        tracing::trace!("{} {} {}", operation.name(), table.name(), operation.key());
        self.store.execute(table.name(), operation)
    }

    fn execute_batch(
        &self,
        table: &TableRef,
        batch: TableBatchOperation,
    ) -> Result<Vec<TableResult>> {
        tracing::trace!("batch of {} on {}", batch.len(), table.name());
        self.store.execute_batch(table.name(), batch)
    }
}
