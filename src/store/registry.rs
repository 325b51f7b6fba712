//! Process-wide store registry
//!
//! Every client connecting to the same `memory://name` or `file://dir`
//! endpoint shares one [`TableStore`]. Memory stores live for the whole
//! process (like a local emulator); file stores are held weakly and close
//! once the last client drops them.
//!
//! A file store keeps the WAL settings of whoever opened it first. Later
//! clients with a different `wal_sync_strategy` or `checkpoint_threshold`
//! share the open store as is; the mismatch is logged at warn level.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use super::TableStore;
use crate::config::{Config, WalSyncStrategy};
use crate::error::Result;

type MemoryStores = Mutex<HashMap<String, Arc<TableStore>>>;
type FileStores = Mutex<HashMap<PathBuf, OpenFileStore>>;

/// A file store and the settings it was opened with
struct OpenFileStore {
    store: Weak<TableStore>,
    wal_sync_strategy: WalSyncStrategy,
    checkpoint_threshold: u64,
}

impl OpenFileStore {
    fn matches(&self, config: &Config) -> bool {
        self.wal_sync_strategy == config.wal_sync_strategy
            && self.checkpoint_threshold == config.checkpoint_threshold
    }
}

fn memory_stores() -> &'static MemoryStores {
    static STORES: OnceLock<MemoryStores> = OnceLock::new();
    STORES.get_or_init(Default::default)
}

fn file_stores() -> &'static FileStores {
    static STORES: OnceLock<FileStores> = OnceLock::new();
    STORES.get_or_init(Default::default)
}

/// Get (or create) the in-memory store called `name`
pub fn memory(name: &str) -> Arc<TableStore> {
    memory_stores()
        .lock()
        .entry(name.to_string())
        .or_insert_with(|| {
            tracing::debug!("Creating in-memory store {:?}", name);
            Arc::new(TableStore::in_memory(name))
        })
        .clone()
}

/// Forget the in-memory store called `name`; returns true if it existed
///
/// Clients still holding it keep working on the detached store.
pub fn remove_memory(name: &str) -> bool {
    memory_stores().lock().remove(name).is_some()
}

/// Get (or open) the file store in `dir`
///
/// `config` only takes effect when this call opens the store; an already
/// open store is returned with the settings it was opened with.
pub fn file(dir: &Path, config: &Config) -> Result<Arc<TableStore>> {
    std::fs::create_dir_all(dir)?;
    let dir = dir.canonicalize()?;

    let mut stores = file_stores().lock();
    if let Some(open) = stores.get(&dir) {
        if let Some(store) = open.store.upgrade() {
            if !open.matches(config) {
                tracing::warn!(
                    "File store {} is already open with {:?} / checkpoint at {} bytes; \
                     ignoring requested {:?} / {} bytes",
                    dir.display(),
                    open.wal_sync_strategy,
                    open.checkpoint_threshold,
                    config.wal_sync_strategy,
                    config.checkpoint_threshold
                );
            }
            return Ok(store);
        }
    }

    let store = Arc::new(TableStore::open(&dir, config)?);
    stores.retain(|_, open| open.store.strong_count() > 0);
    stores.insert(
        dir,
        OpenFileStore {
            store: Arc::downgrade(&store),
            wal_sync_strategy: config.wal_sync_strategy,
            checkpoint_threshold: config.checkpoint_threshold,
        },
    );
    Ok(store)
}

/// Settings of the open file store in `dir`, if one is open
pub fn file_settings(dir: &Path) -> Option<(WalSyncStrategy, u64)> {
    let dir = dir.canonicalize().ok()?;
    let stores = file_stores().lock();
    let open = stores.get(&dir)?;
    (open.store.strong_count() > 0).then_some((open.wal_sync_strategy, open.checkpoint_threshold))
}
