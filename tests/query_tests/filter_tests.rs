//! Tests for query filters
//!
//! These tests verify:
//! - OData rendering of conditions and combinations
//! - In-process evaluation against entities
//! - Partition / row hints used for point lookups

use tablekv::query::{combine_filters, generate_filter_condition, Comparison, LogicalOperator};
use tablekv::{DynamicEntity, Filter, PropertyValue, TableQuery};

fn order() -> DynamicEntity {
    DynamicEntity::new("customer1", "order7")
        .with("Amount", 250i64)
        .with("Status", "open")
        .with("Express", true)
}

// =============================================================================
// Rendering Tests
// =============================================================================

#[test]
fn test_key_equals_rendering() {
    let filter = Filter::key_equals("p1", "r1");
    assert_eq!(
        filter.to_string(),
        "(PartitionKey eq 'p1') and (RowKey eq 'r1')"
    );
}

#[test]
fn test_quotes_are_escaped() {
    let condition = generate_filter_condition(
        "Name",
        Comparison::Equal,
        &PropertyValue::from("O'Brien"),
    );
    assert_eq!(condition, "Name eq 'O''Brien'");
}

#[test]
fn test_nested_rendering() {
    let filter = Filter::condition("Amount", Comparison::GreaterThan, 100i64)
        .or(Filter::condition("Express", Comparison::Equal, true))
        .not();

    assert_eq!(
        filter.to_string(),
        "not ((Amount gt 100L) or (Express eq true))"
    );
}

#[test]
fn test_combine_filters() {
    assert_eq!(
        combine_filters("A eq 1", LogicalOperator::And, "B ne 2"),
        "(A eq 1) and (B ne 2)"
    );
}

// =============================================================================
// Evaluation Tests
// =============================================================================

#[test]
fn test_matches_keys_and_properties() {
    let entity = order();

    assert!(Filter::key_equals("customer1", "order7").matches(&entity));
    assert!(!Filter::key_equals("customer1", "order8").matches(&entity));
    assert!(Filter::condition("Amount", Comparison::LessThanOrEqual, 250i64).matches(&entity));
    assert!(Filter::condition("Amount", Comparison::GreaterThan, 100i32).matches(&entity));
    assert!(Filter::condition("Status", Comparison::NotEqual, "closed").matches(&entity));
}

#[test]
fn test_missing_or_mistyped_property_never_matches() {
    let entity = order();

    assert!(!Filter::condition("Missing", Comparison::NotEqual, 1i64).matches(&entity));
    assert!(!Filter::condition("Amount", Comparison::Equal, "250").matches(&entity));
    assert!(Filter::condition("Missing", Comparison::Equal, 1i64)
        .not()
        .matches(&entity));
}

#[test]
fn test_string_comparison_is_ordinal() {
    let entity = order();

    assert!(Filter::condition("RowKey", Comparison::GreaterThan, "order10").matches(&entity));
    assert!(Filter::condition("RowKey", Comparison::LessThan, "order8").matches(&entity));
}

// =============================================================================
// Hint Tests
// =============================================================================

#[test]
fn test_hints_from_conjunction() {
    let filter = Filter::key_equals("p", "r").and(Filter::condition(
        "Amount",
        Comparison::GreaterThan,
        1i64,
    ));

    assert_eq!(filter.partition_hint(), Some("p"));
    assert_eq!(filter.row_hint(), Some("r"));
}

#[test]
fn test_no_hints_through_or_or_range() {
    let either = Filter::condition("PartitionKey", Comparison::Equal, "a")
        .or(Filter::condition("PartitionKey", Comparison::Equal, "b"));
    assert_eq!(either.partition_hint(), None);

    let range = Filter::condition("PartitionKey", Comparison::GreaterThanOrEqual, "a");
    assert_eq!(range.partition_hint(), None);
}

#[test]
fn test_query_builder() {
    let query = TableQuery::new()
        .filter(Filter::key_equals("p", "r"))
        .take(0)
        .select(["Amount", "Status"]);

    assert_eq!(query.segment_size(), 1);
    assert_eq!(
        query.select,
        Some(vec!["Amount".to_string(), "Status".to_string()])
    );
}
