//! Queries and result segments

use super::Filter;
use crate::entity::{DynamicEntity, EntityKey};

/// Maximum number of entities returned in one segment
pub const MAX_SEGMENT_SIZE: usize = 1000;

/// A query against one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableQuery {
    pub filter: Option<Filter>,

    /// Upper bound on entities per segment (capped at [`MAX_SEGMENT_SIZE`])
    pub take: Option<usize>,

    /// Property names to return; `None` returns all
    pub select: Option<Vec<String>>,
}

impl TableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn select<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Effective segment size
    pub fn segment_size(&self) -> usize {
        self.take.unwrap_or(MAX_SEGMENT_SIZE).clamp(1, MAX_SEGMENT_SIZE)
    }
}

/// Position to resume a query from: the first key not yet returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub next_partition_key: String,
    pub next_row_key: String,
}

impl ContinuationToken {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.next_partition_key.clone(), self.next_row_key.clone())
    }
}

impl From<&EntityKey> for ContinuationToken {
    fn from(key: &EntityKey) -> Self {
        Self {
            next_partition_key: key.partition_key.clone(),
            next_row_key: key.row_key.clone(),
        }
    }
}

/// One page of query results, in key order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySegment {
    pub entities: Vec<DynamicEntity>,
    pub continuation: Option<ContinuationToken>,
}

impl QuerySegment {
    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }
}
