//! Tests for TableAccessor
//!
//! These tests verify:
//! - Upsert/lookup round trips for dynamic and serde-typed entities
//! - Lookup of a missing key yields None
//! - Insert-or-merge keeps properties the update does not mention
//! - Batches are single-partition and all-or-nothing
//! - Failures keep their kind (connectivity, partition mismatch, status)
//! - Values a property cannot hold exactly are rejected before anything is written
//! - Table auto-creation and sharing of local stores
//!
//! Memory stores are shared per name for the whole test process, so every
//! test uses its own endpoint name.

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tablekv::entity::document;
use tablekv::operation::{TableBatchOperation, STATUS_CREATED, STATUS_NO_CONTENT, STATUS_OK};
use tablekv::config::WalSyncStrategy;
use tablekv::query::{Comparison, ContinuationToken, QuerySegment};
use tablekv::store::registry;
use tablekv::{
    Config, DynamicEntity, EntityKey, EntityMetadata, FailureKind, Filter, Properties,
    PropertyValue, Result, TableAccessor, TableEntity, TableError, TableOperation, TableQuery,
    TableRef, TableResult, TableStoreClient,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn memory_accessor(name: &str) -> TableAccessor {
    TableAccessor::new(&format!("TableEndpoint=memory://{}", name)).unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Customer {
    #[serde(rename = "PartitionKey")]
    region: String,
    #[serde(rename = "RowKey")]
    id: String,
    name: String,
    visits: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl TableEntity for Customer {
    fn partition_key(&self) -> &str {
        &self.region
    }

    fn row_key(&self) -> &str {
        &self.id
    }

    fn to_properties(&self) -> Result<Properties> {
        document::to_properties(self)
    }

    fn from_parts(key: EntityKey, properties: Properties, _: EntityMetadata) -> Result<Self> {
        document::from_properties(&key, &properties)
    }
}

fn customer(region: &str, id: &str, name: &str) -> Customer {
    Customer {
        region: region.to_string(),
        id: id.to_string(),
        name: name.to_string(),
        visits: 1,
        email: None,
    }
}

/// Client that answers every write with a fixed status
#[derive(Debug)]
struct FixedStatusClient {
    status: u16,
}

impl TableStoreClient for FixedStatusClient {
    fn get_table_reference(&self, name: &str) -> Result<TableRef> {
        Ok(TableRef::new(name))
    }

    fn create_table_if_not_exists(&self, _: &TableRef) -> Result<bool> {
        Ok(false)
    }

    fn table_exists(&self, _: &TableRef) -> Result<bool> {
        Ok(true)
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn execute_query_segmented(
        &self,
        _: &TableRef,
        _: &TableQuery,
        _: Option<&ContinuationToken>,
    ) -> Result<QuerySegment> {
        Ok(QuerySegment::default())
    }

    fn execute(&self, _: &TableRef, _: TableOperation) -> Result<TableResult> {
        Ok(TableResult {
            status: self.status,
            etag: None,
            entity: None,
        })
    }

    fn execute_batch(&self, _: &TableRef, batch: TableBatchOperation) -> Result<Vec<TableResult>> {
        Ok((0..batch.len())
            .map(|i| TableResult {
                status: if i == 0 { STATUS_NO_CONTENT } else { self.status },
                etag: None,
                entity: None,
            })
            .collect())
    }
}

// =============================================================================
// Lookup / Upsert Tests
// =============================================================================

#[test]
fn test_upsert_then_lookup_round_trip() {
    let accessor = memory_accessor("round-trip");
    let alice = customer("eu", "alice", "Alice");

    accessor.upsert_one("Customers", &alice).unwrap();

    let found: Option<Customer> = accessor.lookup_by_key("Customers", "eu", "alice").unwrap();
    assert_eq!(found, Some(alice));
}

#[test]
fn test_lookup_missing_key_is_none() {
    let accessor = memory_accessor("lookup-missing");
    accessor
        .upsert_one("Customers", &customer("eu", "alice", "Alice"))
        .unwrap();

    let wrong_row: Option<Customer> = accessor.lookup_by_key("Customers", "eu", "bob").unwrap();
    let wrong_partition: Option<Customer> =
        accessor.lookup_by_key("Customers", "us", "alice").unwrap();

    assert!(wrong_row.is_none());
    assert!(wrong_partition.is_none());
}

#[test]
fn test_lookup_on_fresh_table_is_none() {
    let accessor = memory_accessor("lookup-fresh");
    let found: Option<DynamicEntity> = accessor.lookup_by_key("Empty", "p", "r").unwrap();
    assert!(found.is_none());
}

#[test]
fn test_merge_keeps_untouched_properties() {
    let accessor = memory_accessor("merge");

    accessor
        .upsert_one(
            "Profiles",
            &DynamicEntity::new("p", "r").with("A", 1).with("B", "x"),
        )
        .unwrap();
    accessor
        .upsert_one("Profiles", &DynamicEntity::new("p", "r").with("B", "y"))
        .unwrap();

    let found: DynamicEntity = accessor.lookup_by_key("Profiles", "p", "r").unwrap().unwrap();
    assert_eq!(found.get("A"), Some(&PropertyValue::Int32(1)));
    assert_eq!(found.get("B"), Some(&PropertyValue::String("y".to_string())));
    assert!(found.metadata.etag.is_some());
}

#[test]
fn test_typed_merge_keeps_omitted_field() {
    let accessor = memory_accessor("typed-merge");
    let mut bob = customer("us", "bob", "Bob");
    bob.email = Some("bob@example.com".to_string());
    accessor.upsert_one("Customers", &bob).unwrap();

    let renamed = customer("us", "bob", "Robert");
    accessor.upsert_one("Customers", &renamed).unwrap();

    let found: Customer = accessor.lookup_by_key("Customers", "us", "bob").unwrap().unwrap();
    assert_eq!(found.name, "Robert");
    assert_eq!(found.email.as_deref(), Some("bob@example.com"));
}

#[test]
fn test_invalid_entity_is_rejected() {
    let accessor = memory_accessor("invalid-entity");

    let err = accessor
        .upsert_one("Customers", &DynamicEntity::new("a#b", "r"))
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::InvalidInput);

    let err = accessor
        .lookup_by_key::<DynamicEntity>("", "p", "r")
        .unwrap_err();
    assert!(matches!(err, TableError::InvalidTableName(_)));
}

#[derive(Debug, Serialize, Deserialize)]
struct Reading {
    #[serde(rename = "PartitionKey")]
    sensor: String,
    #[serde(rename = "RowKey")]
    at: String,
    value: f64,
    count: u64,
}

impl TableEntity for Reading {
    fn partition_key(&self) -> &str {
        &self.sensor
    }

    fn row_key(&self) -> &str {
        &self.at
    }

    fn to_properties(&self) -> Result<Properties> {
        document::to_properties(self)
    }

    fn from_parts(key: EntityKey, properties: Properties, _: EntityMetadata) -> Result<Self> {
        document::from_properties(&key, &properties)
    }
}

fn reading(at: &str, value: f64, count: u64) -> Reading {
    Reading {
        sensor: "s1".to_string(),
        at: at.to_string(),
        value,
        count,
    }
}

#[test]
fn test_unrepresentable_values_are_rejected_and_not_stored() {
    let accessor = memory_accessor("unrepresentable");

    for bad in [
        reading("nan", f64::NAN, 1),
        reading("inf", f64::INFINITY, 1),
        reading("big", 1.0, u64::MAX),
    ] {
        let err = accessor.upsert_one("Readings", &bad).unwrap_err();
        assert!(matches!(err, TableError::Serialization(_)), "{:?}", err);
        assert_eq!(err.kind(), FailureKind::InvalidInput);

        assert!(accessor
            .lookup_by_key::<Reading>("Readings", "s1", &bad.at)
            .unwrap()
            .is_none());
    }

    let err = accessor
        .upsert_batch(
            "Readings",
            &[reading("ok", 1.0, 1), reading("nan", f64::NAN, 1)],
        )
        .unwrap_err();
    assert!(matches!(err, TableError::Serialization(_)));
    assert!(accessor
        .lookup_by_key::<Reading>("Readings", "s1", "ok")
        .unwrap()
        .is_none());

    accessor
        .upsert_one("Readings", &reading("max", f64::MAX, i64::MAX as u64))
        .unwrap();
    let found: Reading = accessor
        .lookup_by_key("Readings", "s1", "max")
        .unwrap()
        .unwrap();
    assert_eq!(found.value, f64::MAX);
    assert_eq!(found.count, i64::MAX as u64);
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_batch_writes_every_entity() {
    let accessor = memory_accessor("batch-ok");
    let batch: Vec<Customer> = (0..10)
        .map(|i| customer("eu", &format!("c{}", i), "Name"))
        .collect();

    accessor.upsert_batch("Customers", &batch).unwrap();

    for c in &batch {
        let found: Option<Customer> = accessor.lookup_by_key("Customers", "eu", &c.id).unwrap();
        assert_eq!(found.as_ref(), Some(c));
    }
}

#[test]
fn test_batch_merges_into_existing() {
    let accessor = memory_accessor("batch-merge");
    accessor
        .upsert_one("Items", &DynamicEntity::new("p", "1").with("Keep", true))
        .unwrap();

    accessor
        .upsert_batch(
            "Items",
            &[
                DynamicEntity::new("p", "1").with("N", 1),
                DynamicEntity::new("p", "2").with("N", 2),
            ],
        )
        .unwrap();

    let first: DynamicEntity = accessor.lookup_by_key("Items", "p", "1").unwrap().unwrap();
    assert_eq!(first.get("Keep"), Some(&PropertyValue::Boolean(true)));
    assert_eq!(first.get("N"), Some(&PropertyValue::Int32(1)));
}

#[test]
fn test_mixed_partition_batch_fails_and_writes_nothing() {
    let accessor = memory_accessor("batch-mixed");
    let batch = vec![
        customer("eu", "a", "A"),
        customer("eu", "b", "B"),
        customer("us", "c", "C"),
    ];

    let err = accessor.upsert_batch("Customers", &batch).unwrap_err();

    match &err {
        TableError::PartitionMismatch { expected, found } => {
            assert_eq!(expected, "eu");
            assert_eq!(found, "us");
        }
        other => panic!("Expected PartitionMismatch, got {:?}", other),
    }
    assert_eq!(err.kind(), FailureKind::PartitionMismatch);

    for c in &batch {
        let found: Option<Customer> = accessor
            .lookup_by_key("Customers", &c.region, &c.id)
            .unwrap();
        assert!(found.is_none());
    }
}

#[test]
fn test_batch_shape_limits() {
    let accessor = memory_accessor("batch-shape");

    let err = accessor
        .upsert_batch::<DynamicEntity>("Items", &[])
        .unwrap_err();
    assert!(matches!(err, TableError::EmptyBatch));

    let too_many: Vec<DynamicEntity> = (0..101)
        .map(|i| DynamicEntity::new("p", i.to_string()))
        .collect();
    let err = accessor.upsert_batch("Items", &too_many).unwrap_err();
    assert!(matches!(err, TableError::BatchTooLarge(101)));

    let exactly: Vec<DynamicEntity> = too_many.into_iter().take(100).collect();
    accessor.upsert_batch("Items", &exactly).unwrap();
}

#[test]
fn test_batch_with_rejected_entity_is_atomic() {
    let accessor = memory_accessor("batch-atomic");
    let batch = vec![
        DynamicEntity::new("p", "1").with("N", 1),
        DynamicEntity::new("p", "2").with("ETag", "reserved"),
    ];

    let err = accessor.upsert_batch("Items", &batch).unwrap_err();

    match err {
        TableError::BatchOperationFailed { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(*source, TableError::InvalidProperty(_)));
        }
        other => panic!("Expected BatchOperationFailed, got {:?}", other),
    }

    let first: Option<DynamicEntity> = accessor.lookup_by_key("Items", "p", "1").unwrap();
    assert!(first.is_none());
}

// =============================================================================
// Failure Kind Tests
// =============================================================================

#[test]
fn test_unreachable_account_fails_without_panicking() {
    let accessor =
        TableAccessor::new("DefaultEndpointsProtocol=https;AccountName=nowhere;AccountKey=a2V5")
            .unwrap();

    let err = accessor
        .upsert_one("Customers", &customer("eu", "a", "A"))
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Connectivity);

    let err = accessor
        .lookup_by_key::<Customer>("Customers", "eu", "a")
        .unwrap_err();
    assert!(matches!(err, TableError::Unreachable(_)));

    let err = accessor
        .upsert_batch("Customers", &[customer("eu", "a", "A")])
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Connectivity);
}

#[test]
fn test_malformed_connection_string_fails_construction() {
    let err = TableAccessor::new("not a connection string").unwrap_err();
    assert!(matches!(err, TableError::InvalidConnectionString(_)));
}

#[test]
fn test_non_204_upsert_is_unexpected_status() {
    let accessor = TableAccessor::with_client(
        Arc::new(FixedStatusClient {
            status: STATUS_CREATED,
        }),
        Config::default(),
    );

    let err = accessor
        .upsert_one("Customers", &customer("eu", "a", "A"))
        .unwrap_err();
    assert!(matches!(err, TableError::UnexpectedStatus(201)));
    assert_eq!(err.kind(), FailureKind::Storage);
}

#[test]
fn test_non_204_batch_result_names_operation() {
    let accessor = TableAccessor::with_client(
        Arc::new(FixedStatusClient { status: STATUS_OK }),
        Config::default(),
    );
    let batch = vec![customer("eu", "a", "A"), customer("eu", "b", "B")];

    match accessor.upsert_batch("Customers", &batch).unwrap_err() {
        TableError::BatchOperationFailed { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(*source, TableError::UnexpectedStatus(200)));
        }
        other => panic!("Expected BatchOperationFailed, got {:?}", other),
    }
}

// =============================================================================
// Table and Store Tests
// =============================================================================

#[test]
fn test_without_auto_create_missing_table_is_not_found() {
    let config = Config::builder()
        .connection_string("TableEndpoint=memory://no-auto-create")
        .auto_create_tables(false)
        .build();
    let accessor = TableAccessor::with_config(config).unwrap();

    let err = accessor
        .upsert_one("Customers", &customer("eu", "a", "A"))
        .unwrap_err();
    assert!(matches!(err, TableError::TableNotFound(_)));
    assert_eq!(err.kind(), FailureKind::NotFound);

    assert!(accessor.create_table_if_not_exists("Customers").unwrap());
    assert!(!accessor.create_table_if_not_exists("customers").unwrap());
    accessor
        .upsert_one("Customers", &customer("eu", "a", "A"))
        .unwrap();
}

#[test]
fn test_accessors_share_named_memory_store() {
    let writer = memory_accessor("shared");
    let reader = memory_accessor("shared");
    let other = memory_accessor("not-shared");

    writer
        .upsert_one("Customers", &customer("eu", "a", "A"))
        .unwrap();

    assert!(reader
        .lookup_by_key::<Customer>("Customers", "eu", "a")
        .unwrap()
        .is_some());
    assert!(other
        .lookup_by_key::<Customer>("Customers", "eu", "a")
        .unwrap()
        .is_none());
    assert_eq!(reader.list_tables().unwrap(), vec!["Customers".to_string()]);
}

#[test]
fn test_file_store_persists_between_accessors() {
    let temp_dir = TempDir::new().unwrap();
    let connection_string = format!("TableEndpoint=file://{}", temp_dir.path().display());

    {
        let accessor = TableAccessor::new(&connection_string).unwrap();
        accessor
            .upsert_one("Customers", &customer("eu", "a", "Anna"))
            .unwrap();
    }

    let accessor = TableAccessor::new(&connection_string).unwrap();
    let found: Customer = accessor.lookup_by_key("Customers", "eu", "a").unwrap().unwrap();
    assert_eq!(found.name, "Anna");
}

#[test]
fn test_file_store_keeps_first_openers_settings() {
    let temp_dir = TempDir::new().unwrap();
    let connection_string = format!("TableEndpoint=file://{}", temp_dir.path().display());

    let first = TableAccessor::with_config(
        Config::builder()
            .connection_string(&connection_string)
            .wal_sync_strategy(WalSyncStrategy::EveryWrite)
            .checkpoint_threshold(64 * 1024)
            .build(),
    )
    .unwrap();
    let second = TableAccessor::with_config(
        Config::builder()
            .connection_string(&connection_string)
            .wal_sync_strategy(WalSyncStrategy::EveryNEntries { count: 10 })
            .checkpoint_threshold(1024)
            .build(),
    )
    .unwrap();

    first
        .upsert_one("Customers", &customer("eu", "a", "A"))
        .unwrap();
    second
        .upsert_one("Customers", &customer("eu", "b", "B"))
        .unwrap();

    assert!(first
        .lookup_by_key::<Customer>("Customers", "eu", "b")
        .unwrap()
        .is_some());
    assert_eq!(
        registry::file_settings(temp_dir.path()),
        Some((WalSyncStrategy::EveryWrite, 64 * 1024))
    );
}

#[test]
fn test_query_follows_continuation() {
    let accessor = memory_accessor("query-all");
    for pk in ["a", "b", "c"] {
        let batch: Vec<DynamicEntity> = (0..100)
            .map(|i| DynamicEntity::new(pk, format!("{:03}", i)).with("N", i as i64))
            .collect();
        accessor.upsert_batch("Items", &batch).unwrap();
    }

    let all: Vec<DynamicEntity> = accessor.query("Items", &TableQuery::new()).unwrap();
    assert_eq!(all.len(), 300);

    let limited: Vec<DynamicEntity> = accessor
        .query("Items", &TableQuery::new().take(42))
        .unwrap();
    assert_eq!(limited.len(), 42);

    let partition = TableQuery::new().filter(
        Filter::condition("PartitionKey", Comparison::Equal, "b")
            .and(Filter::condition("N", Comparison::LessThan, 10i64)),
    );
    let some: Vec<DynamicEntity> = accessor.query("Items", &partition).unwrap();
    assert_eq!(some.len(), 10);
    assert!(some.iter().all(|e| e.key.partition_key == "b"));
}

#[test]
fn test_concurrent_upserts() {
    let accessor = Arc::new(memory_accessor("concurrent"));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let accessor = Arc::clone(&accessor);
            thread::spawn(move || {
                for i in 0..50 {
                    let entity = DynamicEntity::new(format!("t{}", t), i.to_string()).with("N", i);
                    accessor.upsert_one("Items", &entity).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let all: Vec<DynamicEntity> = accessor.query("Items", &TableQuery::new()).unwrap();
    assert_eq!(all.len(), 400);
}
