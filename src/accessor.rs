//! Table Accessor
//!
//! The public entry point: point lookups, single upserts and single-partition
//! batch upserts against a table named per call.
//!
//! ## Connection
//! The connection string is parsed up front; the store client is connected
//! on first use and cached. A failed connect is not cached, so the next call
//! tries again.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::account::StorageAccount;
use crate::client::{self, TableRef, TableStoreClient};
use crate::config::Config;
use crate::entity::TableEntity;
use crate::error::{Result, TableError};
use crate::operation::{TableBatchOperation, TableOperation, STATUS_NO_CONTENT};
use crate::query::{Filter, QuerySegment, TableQuery};

/// CRUD-style access to partition/row addressed tables
#[derive(Debug)]
pub struct TableAccessor {
    config: Config,

    /// `None` when the client was injected
    account: Option<StorageAccount>,

    /// Connected client, cached after the first successful connect
    client: Mutex<Option<Arc<dyn TableStoreClient>>>,

    /// Lowercased names of tables known to exist (auto-create only)
    known_tables: Mutex<HashSet<String>>,
}

impl TableAccessor {
    /// Create an accessor for a connection string with default settings
    pub fn new(connection_string: &str) -> Result<Self> {
        Self::with_config(
            Config::builder()
                .connection_string(connection_string)
                .build(),
        )
    }

    /// Create an accessor from a full config
    ///
    /// Fails only if the connection string is malformed; the endpoint is not
    /// contacted until the first operation.
    ///
    /// Accessors on the same `file://` directory share one store, and that
    /// store keeps the `wal_sync_strategy` and `checkpoint_threshold` of the
    /// first accessor that connected. Later accessors' WAL settings are
    /// ignored (and logged) while it stays open.
    pub fn with_config(config: Config) -> Result<Self> {
        let account = StorageAccount::parse(&config.connection_string)?;
        tracing::debug!(
            "Table accessor for account {:?} at {}",
            account.name(),
            account.endpoint()
        );

        Ok(Self {
            config,
            account: Some(account),
            client: Mutex::new(None),
            known_tables: Mutex::new(HashSet::new()),
        })
    }

    /// Create an accessor over an existing client (the connection string in
    /// `config` is ignored)
    pub fn with_client(client: Arc<dyn TableStoreClient>, config: Config) -> Self {
        Self {
            config,
            account: None,
            client: Mutex::new(Some(client)),
            known_tables: Mutex::new(HashSet::new()),
        }
    }

    // =========================================================================
    // Core Operations
    // =========================================================================

    /// Get a handle to a table
    ///
    /// Only an empty name is rejected here; the store validates the rest.
    /// With `auto_create_tables`, the table is created on first reference.
    pub fn get_table(&self, table_name: &str) -> Result<TableRef> {
        self.resolve(table_name).map(|(_, table)| table)
    }

    /// Look up one entity by its composite key
    ///
    /// Returns `Ok(None)` when no entity has that key. Store failures are
    /// returned as errors.
    pub fn lookup_by_key<T: TableEntity>(
        &self,
        table_name: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<T>> {
        let (client, table) = self.resolve(table_name)?;
        let query = TableQuery::new().filter(Filter::key_equals(partition_key, row_key));

        let segment = logged(
            "lookup",
            table_name,
            client.execute_query_segmented(&table, &query, None),
        )?;

        segment
            .entities
            .into_iter()
            .next()
            .map(T::from_dynamic)
            .transpose()
    }

    /// Insert an entity, or merge its properties into the existing one
    ///
    /// Succeeds only if the store answers 204 No Content.
    pub fn upsert_one<T: TableEntity>(&self, table_name: &str, entity: &T) -> Result<()> {
        let (client, table) = self.resolve(table_name)?;
        let entity = entity.to_dynamic()?;
        let key = entity.key.clone();

        let result = logged(
            "upsert",
            table_name,
            client.execute(&table, TableOperation::InsertOrMerge(entity)),
        )?;

        if result.status != STATUS_NO_CONTENT {
            tracing::warn!(
                "upsert {} {}: unexpected status {}",
                table_name,
                key,
                result.status
            );
            return Err(TableError::UnexpectedStatus(result.status));
        }

        tracing::debug!("upsert {} {}", table_name, key);
        Ok(())
    }

    /// Insert-or-merge several entities of one partition as a single atomic
    /// batch
    ///
    /// The batch shape (non-empty, at most 100 entities, one PartitionKey) is
    /// checked before anything is sent. Failures keep their kind:
    /// connectivity errors, `PartitionMismatch`, or `BatchOperationFailed`
    /// naming the rejected entity. The local store applies nothing when a
    /// batch fails.
    pub fn upsert_batch<T: TableEntity>(&self, table_name: &str, entities: &[T]) -> Result<()> {
        let batch = entities
            .iter()
            .map(|e| e.to_dynamic().map(TableOperation::InsertOrMerge))
            .collect::<Result<TableBatchOperation>>()?;

        let partition_key = logged("batch", table_name, batch.partition_key())?.to_string();
        let count = batch.len();

        let (client, table) = self.resolve(table_name)?;
        let results = logged("batch", table_name, client.execute_batch(&table, batch))?;

        if results.len() != count {
            return Err(TableError::Storage(format!(
                "batch of {} operations answered with {} results",
                count,
                results.len()
            )));
        }

        if let Some((index, result)) = results
            .iter()
            .enumerate()
            .find(|(_, r)| r.status != STATUS_NO_CONTENT)
        {
            tracing::warn!(
                "batch {} [{}]: operation {} answered {}",
                table_name,
                partition_key,
                index,
                result.status
            );
            return Err(TableError::BatchOperationFailed {
                index,
                source: Box::new(TableError::UnexpectedStatus(result.status)),
            });
        }

        tracing::debug!("batch {} [{}]: {} entities", table_name, partition_key, count);
        Ok(())
    }

    // =========================================================================
    // Table Management and Queries
    // =========================================================================

    /// Create a table if it does not exist; returns true if it was created
    pub fn create_table_if_not_exists(&self, table_name: &str) -> Result<bool> {
        let client = self.client()?;
        let table = client.get_table_reference(table_name)?;
        let created = logged(
            "create table",
            table_name,
            client.create_table_if_not_exists(&table),
        )?;
        self.known_tables.lock().insert(table_name.to_ascii_lowercase());
        Ok(created)
    }

    /// Names of all tables in the account
    pub fn list_tables(&self) -> Result<Vec<String>> {
        logged("list tables", "*", self.client()?.list_tables())
    }

    /// Run one query segment
    pub fn query_segment(
        &self,
        table_name: &str,
        query: &TableQuery,
        token: Option<&crate::query::ContinuationToken>,
    ) -> Result<QuerySegment> {
        let (client, table) = self.resolve(table_name)?;
        logged(
            "query",
            table_name,
            client.execute_query_segmented(&table, query, token),
        )
    }

    /// Run a query to completion, following continuation tokens
    ///
    /// `query.take` bounds the total number of entities returned.
    pub fn query<T: TableEntity>(&self, table_name: &str, query: &TableQuery) -> Result<Vec<T>> {
        let (client, table) = self.resolve(table_name)?;
        let limit = query.take.unwrap_or(usize::MAX);

        let mut found = Vec::new();
        let mut token = None;
        loop {
            let segment = logged(
                "query",
                table_name,
                client.execute_query_segmented(&table, query, token.as_ref()),
            )?;

            for entity in segment.entities {
                if found.len() == limit {
                    return Ok(found);
                }
                found.push(T::from_dynamic(entity)?);
            }

            match segment.continuation {
                Some(next) if found.len() < limit => token = Some(next),
                _ => return Ok(found),
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Account parsed from the connection string (`None` for injected clients)
    pub fn account(&self) -> Option<&StorageAccount> {
        self.account.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Connected client, connecting on first use
    fn client(&self) -> Result<Arc<dyn TableStoreClient>> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let account = self.account.as_ref().ok_or_else(|| {
            TableError::Unreachable("accessor has neither a client nor an account".to_string())
        })?;

        let client = client::connect(account, &self.config).map_err(|e| {
            tracing::warn!("Failed to connect to {}: {}", account.endpoint(), e);
            e
        })?;

        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    fn resolve(&self, table_name: &str) -> Result<(Arc<dyn TableStoreClient>, TableRef)> {
        if table_name.is_empty() {
            return Err(TableError::InvalidTableName(String::new()));
        }

        let client = self.client()?;
        let table = client.get_table_reference(table_name)?;

        if self.config.auto_create_tables {
            let key = table_name.to_ascii_lowercase();
            if !self.known_tables.lock().contains(&key) {
                logged(
                    "create table",
                    table_name,
                    client.create_table_if_not_exists(&table),
                )?;
                self.known_tables.lock().insert(key);
            }
        }

        Ok((client, table))
    }
}

/// Log a failed store call at warn level and pass the result through
fn logged<T>(operation: &str, table_name: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        tracing::warn!("{} {} failed: {}", operation, table_name, e);
    }
    result
}
