//! Store Module
//!
//! The embedded table store behind `memory://` and `file://` endpoints.
//!
//! ## Responsibilities
//! - Hold tables in memory, keyed case-insensitively by name
//! - Apply single writes and atomic single-partition batches
//! - Log every mutation to the WAL before applying it (file stores)
//! - Checkpoint: snapshot all tables and truncate the WAL
//! - Recover snapshot + WAL on open
//!
//! ## On-disk layout (file stores)
//! ```text
//! {dir}/
//!   ├── wal.log        (write-ahead log)
//!   └── snapshot.tkv   (last checkpoint)
//! ```

pub mod registry;
mod snapshot;
mod table;

pub use snapshot::{Snapshot, TableImage};
pub use table::{table_key, validate_table_name, Table, MAX_TABLE_NAME_LEN, MIN_TABLE_NAME_LEN};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use parking_lot::RwLock;

use crate::config::Config;
use crate::entity::{validate_properties, DynamicEntity, EntityKey, EntityMetadata};
use crate::error::{Result, TableError};
use crate::operation::{
    TableBatchOperation, TableOperation, TableResult, STATUS_CREATED, STATUS_NOT_FOUND,
    STATUS_NO_CONTENT, STATUS_OK,
};
use crate::query::{ContinuationToken, Filter, QuerySegment, TableQuery};
use crate::wal::{now_millis, Operation, WalRecovery, WalWriter};

/// Where a store keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory { name: String },
    File { dir: PathBuf },
}

/// The table store
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (create table, upsert, batch): serialized by `write_lock`
///   - Must acquire: write_lock → WAL → tables (write)
///   - Entities are prepared against a read view first, so a rejected
///     batch never touches the tables or the WAL
///
/// - **Reads** (get, query): take the `tables` read lock only
pub struct TableStore {
    location: StoreLocation,

    /// lowercased table name -> table
    tables: RwLock<HashMap<String, Table>>,

    /// Write-ahead log; `None` for memory stores
    wal: Option<Mutex<WalWriter>>,

    /// Serializes write operations
    write_lock: Mutex<()>,

    /// Last entity version handed out (drives ETags)
    version: AtomicU64,

    /// WAL size that triggers a checkpoint
    checkpoint_threshold: u64,
}

impl std::fmt::Debug for TableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableStore")
            .field("location", &self.location)
            .field("tables", &self.tables.read().len())
            .field("version", &self.version.load(Ordering::SeqCst))
            .finish()
    }
}

impl TableStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SNAPSHOT_FILENAME: &'static str = "snapshot.tkv";

    /// Create an empty, non-persistent store
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            location: StoreLocation::Memory { name: name.into() },
            tables: RwLock::new(HashMap::new()),
            wal: None,
            write_lock: Mutex::new(()),
            version: AtomicU64::new(0),
            checkpoint_threshold: u64::MAX,
        }
    }

    /// Open or create a persistent store in `dir`
    ///
    /// On startup:
    /// 1. Create the directory if needed
    /// 2. Load the snapshot, if any
    /// 3. Replay WAL entries newer than the snapshot
    /// 4. Fold replayed entries into a fresh snapshot
    pub fn open(dir: &Path, config: &Config) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let wal_path = dir.join(Self::WAL_FILENAME);
        let snapshot_path = dir.join(Self::SNAPSHOT_FILENAME);

        let snapshot = if snapshot_path.exists() {
            snapshot::read(&snapshot_path)?
        } else {
            Snapshot::default()
        };

        let snapshot_lsn = snapshot.last_lsn;
        let mut version = snapshot.version;
        let mut last_lsn = snapshot.last_lsn;

        let mut tables = HashMap::new();
        for image in snapshot.tables {
            let mut table = Table::new(image.name.clone());
            for entity in image.entities {
                table.put(entity);
            }
            tables.insert(table_key(&image.name), table);
        }

        let mut replayed = 0u64;
        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;

            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery in {}: {} entries recovered, {} corrupted, last_lsn={}",
                    dir.display(),
                    result.entries_recovered,
                    result.entries_corrupted,
                    result.last_lsn
                );
            }

            for entry in entries {
                if entry.lsn <= snapshot_lsn {
                    continue;
                }
                if let Operation::Write { version: v, .. } = &entry.operation {
                    version = version.max(*v);
                }
                Self::apply(&mut tables, entry.operation);
                replayed += 1;
            }
            last_lsn = last_lsn.max(result.last_lsn);
        }

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy, last_lsn + 1)?;

        let store = Self {
            location: StoreLocation::File {
                dir: dir.to_path_buf(),
            },
            tables: RwLock::new(tables),
            wal: Some(Mutex::new(wal)),
            write_lock: Mutex::new(()),
            version: AtomicU64::new(version),
            checkpoint_threshold: config.checkpoint_threshold,
        };

        // Make recovered data durable in the snapshot before taking new writes
        if replayed > 0 {
            tracing::info!("Folding {} replayed WAL entries into a snapshot", replayed);
            store.checkpoint_locked()?;
        }

        tracing::info!(
            "Opened table store at {} ({} tables)",
            dir.display(),
            store.tables.read().len()
        );

        Ok(store)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config
    pub fn open_path(dir: &Path) -> Result<Self> {
        Self::open(dir, &Config::default())
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Create a table; returns false if it already exists
    pub fn create_table(&self, name: &str) -> Result<bool> {
        validate_table_name(name)?;
        let key = table_key(name);

        if self.tables.read().contains_key(&key) {
            return Ok(false);
        }

        let _write_guard = self.lock_writes()?;
        if self.tables.read().contains_key(&key) {
            return Ok(false);
        }

        let operation = Operation::CreateTable {
            table: name.to_string(),
        };
        self.log(&operation)?;
        Self::apply(&mut self.tables.write(), operation);

        tracing::info!("Created table {}", name);
        self.maybe_checkpoint();
        Ok(true)
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.read().contains_key(&table_key(name))
    }

    /// Table names as created, sorted
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .values()
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn entity_count(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read();
        Ok(Self::find(&tables, table)?.len())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Point lookup
    pub fn get(&self, table: &str, key: &EntityKey) -> Result<Option<DynamicEntity>> {
        let tables = self.tables.read();
        Ok(Self::find(&tables, table)?.get(key).cloned())
    }

    /// Run one segment of a query
    ///
    /// A filter pinning PartitionKey narrows the scan to that partition; one
    /// pinning both keys becomes a point lookup.
    pub fn query(
        &self,
        table: &str,
        query: &TableQuery,
        token: Option<&ContinuationToken>,
    ) -> Result<QuerySegment> {
        let tables = self.tables.read();
        let table = Self::find(&tables, table)?;

        let filter = query.filter.as_ref();
        let accepts = |entity: &DynamicEntity| filter.map_or(true, |f| f.matches(entity));
        let start = token.map(ContinuationToken::key);
        let partition = filter.and_then(Filter::partition_hint);

        let mut segment = match (partition, filter.and_then(Filter::row_hint)) {
            (Some(pk), Some(rk)) => {
                let key = EntityKey::new(pk, rk);
                let resumed_past = start.as_ref().map_or(false, |s| key < *s);
                QuerySegment {
                    entities: table
                        .get(&key)
                        .filter(|e| !resumed_past && accepts(*e))
                        .cloned()
                        .into_iter()
                        .collect(),
                    continuation: None,
                }
            }
            _ => {
                let mut matching = table.scan(start.as_ref(), partition).filter(|e| accepts(*e));
                let entities: Vec<DynamicEntity> =
                    matching.by_ref().take(query.segment_size()).cloned().collect();
                let continuation = matching.next().map(|e| ContinuationToken::from(&e.key));
                QuerySegment {
                    entities,
                    continuation,
                }
            }
        };

        if let Some(names) = &query.select {
            for entity in &mut segment.entities {
                entity.project(names);
            }
        }

        Ok(segment)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Run a single operation
    pub fn execute(&self, table: &str, operation: TableOperation) -> Result<TableResult> {
        if let TableOperation::Retrieve(key) = &operation {
            return Ok(match self.get(table, key)? {
                Some(entity) => TableResult {
                    status: STATUS_OK,
                    etag: entity.metadata.etag.clone(),
                    entity: Some(entity),
                },
                None => TableResult {
                    status: STATUS_NOT_FOUND,
                    etag: None,
                    entity: None,
                },
            });
        }

        let _write_guard = self.lock_writes()?;
        let now = now_millis() as i64;

        let (entity, status) = {
            let tables = self.tables.read();
            self.prepare(Self::find(&tables, table)?, operation, now)?
        };

        let etag = entity.metadata.etag.clone();
        self.commit(table, vec![entity])?;

        Ok(TableResult {
            status,
            etag,
            entity: None,
        })
    }

    /// Run a batch atomically
    ///
    /// Either every operation is applied (one WAL frame) or none is. Shape
    /// errors (empty, too large, mixed partitions) are reported as such; an
    /// operation the store rejects is reported as `BatchOperationFailed`
    /// with its index.
    pub fn execute_batch(
        &self,
        table: &str,
        batch: TableBatchOperation,
    ) -> Result<Vec<TableResult>> {
        batch.partition_key()?;

        let _write_guard = self.lock_writes()?;
        let now = now_millis() as i64;

        let mut prepared = Vec::with_capacity(batch.len());
        let mut results = Vec::with_capacity(batch.len());
        {
            let tables = self.tables.read();
            let target = Self::find(&tables, table)?;
            let mut row_keys = HashSet::with_capacity(batch.len());

            for (index, operation) in batch.into_operations().into_iter().enumerate() {
                let fail = |source: TableError| TableError::BatchOperationFailed {
                    index,
                    source: Box::new(source),
                };

                if !operation.is_write() {
                    return Err(fail(TableError::InvalidBatch(
                        "retrieve is not allowed in a batch".to_string(),
                    )));
                }

                let row_key = operation.key().row_key.clone();
                if !row_keys.insert(row_key.clone()) {
                    return Err(fail(TableError::InvalidBatch(format!(
                        "row key {:?} appears more than once",
                        row_key
                    ))));
                }

                let (entity, status) = self.prepare(target, operation, now).map_err(fail)?;
                results.push(TableResult {
                    status,
                    etag: entity.metadata.etag.clone(),
                    entity: None,
                });
                prepared.push(entity);
            }
        }

        self.commit(table, prepared)?;
        Ok(results)
    }

    /// Snapshot all tables and truncate the WAL (no-op for memory stores)
    pub fn checkpoint(&self) -> Result<()> {
        let _write_guard = self.lock_writes()?;
        self.checkpoint_locked()
    }

    /// Checkpoint so the next open starts from the snapshot alone
    pub fn close(&self) -> Result<()> {
        self.checkpoint()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Current WAL size in bytes (0 for memory stores)
    pub fn wal_size(&self) -> u64 {
        self.wal
            .as_ref()
            .and_then(|wal| wal.lock().ok().map(|w| w.size()))
            .unwrap_or(0)
    }

    /// Last entity version handed out
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn find<'a>(tables: &'a HashMap<String, Table>, name: &str) -> Result<&'a Table> {
        tables
            .get(&table_key(name))
            .ok_or_else(|| TableError::TableNotFound(name.to_string()))
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| TableError::LockPoisoned(format!("Write lock poisoned: {}", e)))
    }

    /// Compute the post-write state of one entity (write lock held)
    fn prepare(
        &self,
        table: &Table,
        operation: TableOperation,
        now: i64,
    ) -> Result<(DynamicEntity, u16)> {
        let (mut entity, status) = match operation {
            TableOperation::Insert(incoming) => {
                Self::validate(&incoming)?;
                if table.get(&incoming.key).is_some() {
                    return Err(TableError::EntityAlreadyExists {
                        partition_key: incoming.key.partition_key,
                        row_key: incoming.key.row_key,
                    });
                }
                (incoming, STATUS_CREATED)
            }
            TableOperation::InsertOrMerge(incoming) => {
                Self::validate(&incoming)?;
                match table.get(&incoming.key) {
                    Some(current) => {
                        let mut merged = current.clone();
                        merged.merge(incoming.properties);
                        (merged, STATUS_NO_CONTENT)
                    }
                    None => (incoming, STATUS_NO_CONTENT),
                }
            }
            TableOperation::InsertOrReplace(incoming) => {
                Self::validate(&incoming)?;
                (incoming, STATUS_NO_CONTENT)
            }
            TableOperation::Retrieve(_) => {
                return Err(TableError::InvalidBatch(
                    "retrieve is not a write".to_string(),
                ))
            }
        };

        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        entity.metadata = EntityMetadata {
            timestamp: Some(now),
            etag: Some(format!("W/\"{}\"", version)),
        };

        Ok((entity, status))
    }

    fn validate(entity: &DynamicEntity) -> Result<()> {
        entity.key.validate()?;
        validate_properties(&entity.properties)
    }

    /// Log and apply prepared entities (write lock held)
    fn commit(&self, table: &str, entities: Vec<DynamicEntity>) -> Result<()> {
        let count = entities.len();
        let operation = Operation::Write {
            table: table.to_string(),
            entities,
            version: self.version.load(Ordering::SeqCst),
        };

        self.log(&operation)?;
        Self::apply(&mut self.tables.write(), operation);

        tracing::debug!("Committed {} entities to {}", count, table);
        self.maybe_checkpoint();
        Ok(())
    }

    fn log(&self, operation: &Operation) -> Result<()> {
        if let Some(wal) = &self.wal {
            let mut wal = wal
                .lock()
                .map_err(|e| TableError::LockPoisoned(format!("WAL lock poisoned: {}", e)))?;
            wal.append(operation)?;
        }
        Ok(())
    }

    fn apply(tables: &mut HashMap<String, Table>, operation: Operation) {
        match operation {
            Operation::CreateTable { table } => {
                tables
                    .entry(table_key(&table))
                    .or_insert_with(|| Table::new(table));
            }
            Operation::Write {
                table, entities, ..
            } => {
                let target = tables
                    .entry(table_key(&table))
                    .or_insert_with(|| Table::new(table));
                for entity in entities {
                    target.put(entity);
                }
            }
        }
    }

    /// Checkpoint once the WAL passes the threshold (write lock held)
    ///
    /// Runs after a commit is already durable in the WAL, so a failure is
    /// logged and left for the next write to retry.
    fn maybe_checkpoint(&self) {
        if self.wal_size() < self.checkpoint_threshold {
            return;
        }
        if let Err(e) = self.checkpoint_locked() {
            tracing::warn!(
                "Checkpoint at {} WAL bytes failed, retrying on next write: {}",
                self.wal_size(),
                e
            );
        }
    }

    /// Checkpoint implementation (called with write lock held, or during open)
    fn checkpoint_locked(&self) -> Result<()> {
        let (Some(wal), StoreLocation::File { dir }) = (&self.wal, &self.location) else {
            return Ok(());
        };

        let mut wal = wal
            .lock()
            .map_err(|e| TableError::LockPoisoned(format!("WAL lock poisoned: {}", e)))?;

        let snapshot = Snapshot {
            version: self.version.load(Ordering::SeqCst),
            last_lsn: wal.last_lsn(),
            tables: self
                .tables
                .read()
                .values()
                .map(|t| TableImage {
                    name: t.name().to_string(),
                    entities: t.iter().cloned().collect(),
                })
                .collect(),
        };

        snapshot::write(&dir.join(Self::SNAPSHOT_FILENAME), &snapshot)?;
        wal.truncate()?;

        tracing::info!(
            "Checkpointed {} tables at LSN {}",
            snapshot.tables.len(),
            snapshot.last_lsn
        );
        Ok(())
    }
}

impl Drop for TableStore {
    fn drop(&mut self) {
        if let Some(wal) = &self.wal {
            if let Ok(mut wal) = wal.lock() {
                if let Err(e) = wal.sync() {
                    tracing::warn!("Failed to sync WAL on drop: {}", e);
                }
            }
        }
    }
}
