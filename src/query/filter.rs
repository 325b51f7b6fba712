//! Filter expressions
//!
//! Filters are kept as a small AST so the local store can evaluate them, and
//! render to OData text (`(PartitionKey eq 'p') and (RowKey eq 'r')`) for
//! clients that forward them to a remote service.

use std::cmp::Ordering;
use std::fmt;

use crate::entity::{DynamicEntity, PropertyValue};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Equal => "eq",
            Comparison::NotEqual => "ne",
            Comparison::GreaterThan => "gt",
            Comparison::GreaterThanOrEqual => "ge",
            Comparison::LessThan => "lt",
            Comparison::LessThanOrEqual => "le",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Comparison::Equal => ordering == Ordering::Equal,
            Comparison::NotEqual => ordering != Ordering::Equal,
            Comparison::GreaterThan => ordering == Ordering::Greater,
            Comparison::GreaterThanOrEqual => ordering != Ordering::Less,
            Comparison::LessThan => ordering == Ordering::Less,
            Comparison::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// Boolean operators joining two filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "and",
            LogicalOperator::Or => "or",
        }
    }
}

/// A filter over entity properties
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        property: String,
        op: Comparison,
        value: PropertyValue,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// `property op value`
    pub fn condition(
        property: impl Into<String>,
        op: Comparison,
        value: impl Into<PropertyValue>,
    ) -> Self {
        Filter::Compare {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    /// `(PartitionKey eq pk) and (RowKey eq rk)`
    pub fn key_equals(partition_key: &str, row_key: &str) -> Self {
        Filter::condition("PartitionKey", Comparison::Equal, partition_key).and(Filter::condition(
            "RowKey",
            Comparison::Equal,
            row_key,
        ))
    }

    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Evaluate against an entity
    ///
    /// A comparison against a missing property, or between values of
    /// incomparable types, is false (and `ne` is false too).
    pub fn matches(&self, entity: &DynamicEntity) -> bool {
        match self {
            Filter::Compare {
                property,
                op,
                value,
            } => entity
                .property(property)
                .and_then(|actual| actual.compare(value))
                .map_or(false, |ordering| op.accepts(ordering)),
            Filter::And(l, r) => l.matches(entity) && r.matches(entity),
            Filter::Or(l, r) => l.matches(entity) || r.matches(entity),
            Filter::Not(inner) => !inner.matches(entity),
        }
    }

    /// The single partition this filter is restricted to, if any
    ///
    /// Only looks through `and` nodes: `PartitionKey eq 'x'` somewhere in a
    /// conjunction pins the partition.
    pub fn partition_hint(&self) -> Option<&str> {
        self.key_equality("PartitionKey")
    }

    /// The single row this filter is restricted to, if any
    pub fn row_hint(&self) -> Option<&str> {
        self.key_equality("RowKey")
    }

    fn key_equality(&self, name: &str) -> Option<&str> {
        match self {
            Filter::Compare {
                property,
                op: Comparison::Equal,
                value: PropertyValue::String(v),
            } if property == name => Some(v.as_str()),
            Filter::And(l, r) => l.key_equality(name).or_else(|| r.key_equality(name)),
            _ => None,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare {
                property,
                op,
                value,
            } => f.write_str(&generate_filter_condition(property, *op, value)),
            Filter::And(l, r) => f.write_str(&combine_filters(
                &l.to_string(),
                LogicalOperator::And,
                &r.to_string(),
            )),
            Filter::Or(l, r) => f.write_str(&combine_filters(
                &l.to_string(),
                LogicalOperator::Or,
                &r.to_string(),
            )),
            Filter::Not(inner) => write!(f, "not ({})", inner),
        }
    }
}

/// Render a single comparison as OData text
pub fn generate_filter_condition(property: &str, op: Comparison, value: &PropertyValue) -> String {
    format!("{} {} {}", property, op.as_str(), value.to_odata_literal())
}

/// Join two rendered filters
pub fn combine_filters(left: &str, op: LogicalOperator, right: &str) -> String {
    format!("({}) {} ({})", left, op.as_str(), right)
}
