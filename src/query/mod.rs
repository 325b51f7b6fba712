//! Query Module
//!
//! Filters, queries and paged results.

mod filter;
mod segment;

pub use filter::{combine_filters, generate_filter_condition, Comparison, Filter, LogicalOperator};
pub use segment::{ContinuationToken, QuerySegment, TableQuery, MAX_SEGMENT_SIZE};
