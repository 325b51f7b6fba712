//! Tests for file-backed TableStore durability
//!
//! These tests verify:
//! - Data survives close/reopen through WAL replay
//! - Checkpoints fold the WAL into a snapshot
//! - A failed checkpoint leaves committed writes acknowledged and durable
//! - A torn WAL tail loses only the torn write
//! - Snapshot corruption is reported, not ignored
//! - Entity versions (ETags) keep increasing across restarts

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tablekv::config::{Config, WalSyncStrategy};
use tablekv::store::TableStore;
use tablekv::{
    DynamicEntity, EntityKey, FailureKind, PropertyValue, TableBatchOperation, TableError,
    TableOperation,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config() -> Config {
    Config::builder()
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build()
}

fn open(dir: &Path) -> TableStore {
    TableStore::open(dir, &test_config()).unwrap()
}

fn upsert(store: &TableStore, pk: &str, rk: &str, n: i64) {
    store
        .execute(
            "Orders",
            TableOperation::InsertOrMerge(DynamicEntity::new(pk, rk).with("N", n)),
        )
        .unwrap();
}

fn n_of(store: &TableStore, pk: &str, rk: &str) -> Option<i64> {
    store
        .get("Orders", &EntityKey::new(pk, rk))
        .unwrap()
        .and_then(|e| e.get("N").and_then(PropertyValue::as_i64))
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_open_creates_directory_and_wal() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("tables");

    let _store = open(&dir);

    assert!(dir.is_dir());
    assert!(dir.join("wal.log").exists());
}

#[test]
fn test_reopen_replays_wal() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = open(temp_dir.path());
        store.create_table("Orders").unwrap();
        upsert(&store, "p", "1", 10);
        upsert(&store, "p", "2", 20);
    }

    let store = open(temp_dir.path());

    assert!(store.table_exists("Orders"));
    assert_eq!(n_of(&store, "p", "1"), Some(10));
    assert_eq!(n_of(&store, "p", "2"), Some(20));
}

#[test]
fn test_reopen_folds_replay_into_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = open(temp_dir.path());
        store.create_table("Orders").unwrap();
        upsert(&store, "p", "1", 1);
    }

    let store = open(temp_dir.path());

    assert!(temp_dir.path().join("snapshot.tkv").exists());
    assert_eq!(store.wal_size(), 0);
    assert_eq!(n_of(&store, "p", "1"), Some(1));
}

#[test]
fn test_writes_after_checkpoint_survive() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = open(temp_dir.path());
        store.create_table("Orders").unwrap();
        upsert(&store, "p", "1", 1);
        store.checkpoint().unwrap();
        upsert(&store, "p", "1", 2);
        upsert(&store, "p", "2", 3);
    }

    let store = open(temp_dir.path());

    assert_eq!(n_of(&store, "p", "1"), Some(2));
    assert_eq!(n_of(&store, "p", "2"), Some(3));
}

#[test]
fn test_small_threshold_checkpoints_automatically() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .checkpoint_threshold(256)
        .build();

    {
        let store = TableStore::open(temp_dir.path(), &config).unwrap();
        store.create_table("Orders").unwrap();
        for i in 0..20 {
            upsert(&store, "p", &i.to_string(), i);
        }
        assert!(store.wal_size() < 1024);
        assert!(temp_dir.path().join("snapshot.tkv").exists());
    }

    let store = TableStore::open(temp_dir.path(), &config).unwrap();
    assert_eq!(store.entity_count("Orders").unwrap(), 20);
}

#[test]
fn test_failed_checkpoint_does_not_fail_committed_write() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .checkpoint_threshold(1)
        .build();

    // A directory where the snapshot temp file goes makes every checkpoint fail
    let blocker = temp_dir.path().join("snapshot.tmp");
    {
        let store = TableStore::open(temp_dir.path(), &config).unwrap();
        std::fs::create_dir(&blocker).unwrap();

        assert!(store.create_table("Orders").unwrap());
        upsert(&store, "p", "1", 1);
        upsert(&store, "p", "2", 2);

        assert_eq!(n_of(&store, "p", "2"), Some(2));
        assert!(store.wal_size() > 0);
        assert!(store.checkpoint().is_err());
    }

    std::fs::remove_dir(&blocker).unwrap();

    let store = TableStore::open(temp_dir.path(), &config).unwrap();
    assert_eq!(n_of(&store, "p", "1"), Some(1));
    assert_eq!(n_of(&store, "p", "2"), Some(2));
}

#[test]
fn test_batch_is_one_durable_unit() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = open(temp_dir.path());
        store.create_table("Orders").unwrap();
        let batch: TableBatchOperation = (0..5)
            .map(|i| TableOperation::InsertOrMerge(DynamicEntity::new("p", i.to_string())))
            .collect();
        store.execute_batch("Orders", batch).unwrap();
    }

    let store = open(temp_dir.path());
    assert_eq!(store.entity_count("Orders").unwrap(), 5);
}

#[test]
fn test_versions_keep_increasing_after_restart() {
    let temp_dir = TempDir::new().unwrap();
    let before = {
        let store = open(temp_dir.path());
        store.create_table("Orders").unwrap();
        upsert(&store, "p", "1", 1);
        upsert(&store, "p", "1", 2);
        store.version()
    };

    let store = open(temp_dir.path());
    assert_eq!(store.version(), before);

    upsert(&store, "p", "1", 3);
    assert_eq!(store.version(), before + 1);
}

// =============================================================================
// Damage Tests
// =============================================================================

#[test]
fn test_torn_wal_tail_loses_only_last_write() {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("wal.log");
    {
        let store = open(temp_dir.path());
        store.create_table("Orders").unwrap();
        upsert(&store, "p", "1", 1);
        upsert(&store, "p", "2", 2);
    }

    // Chop a few bytes off the final frame
    let len = std::fs::metadata(&wal_path).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(&wal_path)
        .unwrap()
        .set_len(len - 3)
        .unwrap();

    let store = open(temp_dir.path());

    assert_eq!(n_of(&store, "p", "1"), Some(1));
    assert_eq!(n_of(&store, "p", "2"), None);

    // The store keeps working after recovery
    upsert(&store, "p", "2", 5);
    drop(store);
    let store = open(temp_dir.path());
    assert_eq!(n_of(&store, "p", "2"), Some(5));
}

#[test]
fn test_corrupt_snapshot_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = open(temp_dir.path());
        store.create_table("Orders").unwrap();
        upsert(&store, "p", "1", 1);
        store.checkpoint().unwrap();
    }

    let mut file = OpenOptions::new()
        .append(true)
        .open(temp_dir.path().join("snapshot.tkv"))
        .unwrap();
    file.write_all(b"junk").unwrap();
    drop(file);

    let err = TableStore::open(temp_dir.path(), &test_config()).unwrap_err();
    assert!(matches!(err, TableError::SnapshotCorruption(_)));
    assert_eq!(err.kind(), FailureKind::Storage);
}
