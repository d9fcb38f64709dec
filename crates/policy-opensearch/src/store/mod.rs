//! Document store contract used by the policy adapter.
//!
//! # Purpose
//! Narrows the remote store to the operations the adapter needs: collection
//! existence/creation, keyed upsert and delete, paginated search with a scroll
//! cursor, and delete-by-query. Mutations take an explicit [`Refresh`] so
//! callers choose whether writes are visible to the next search immediately.
use crate::errors::StoreResult;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

pub mod memory;
pub mod opensearch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Make the mutation visible to searches before returning.
    Immediate,
    /// Leave visibility to the store's own refresh cycle.
    Deferred,
}

impl Refresh {
    pub fn as_param(self) -> &'static str {
        match self {
            Refresh::Immediate => "true",
            Refresh::Deferred => "false",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Exact-match document predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    MatchAll,
    /// Every `(field, value)` pair must match exactly.
    Terms(Vec<(String, String)>),
}

impl Query {
    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "query": { "match_all": {} } }),
            Query::Terms(terms) => {
                let must: Vec<Value> = terms
                    .iter()
                    .map(|(field, value)| json!({ "term": { field.as_str(): value } }))
                    .collect();
                json!({ "query": { "bool": { "must": must } } })
            }
        }
    }

    pub fn matches(&self, source: &Value) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Terms(terms) => terms
                .iter()
                .all(|(field, value)| {
                    source.get(field.as_str()).and_then(Value::as_str) == Some(value.as_str())
                }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub source: Value,
}

/// One page of a scrolled search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub scroll_id: Option<String>,
    pub hits: Vec<Hit>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn index_exists(&self, index: &str) -> StoreResult<bool>;
    /// Create an index; an existing index yields `StoreError::IndexAlreadyExists`.
    async fn create_index(&self, index: &str, body: &Value) -> StoreResult<()>;
    async fn put_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
        refresh: Refresh,
    ) -> StoreResult<()>;
    async fn delete_document(
        &self,
        index: &str,
        id: &str,
        refresh: Refresh,
    ) -> StoreResult<DeleteOutcome>;
    /// Open a scroll over every document in `index`.
    async fn search(&self, index: &str, size: usize, keep_alive: Duration)
    -> StoreResult<SearchPage>;
    async fn scroll(&self, scroll_id: &str, keep_alive: Duration) -> StoreResult<SearchPage>;
    async fn clear_scroll(&self, scroll_id: &str) -> StoreResult<()>;
    /// Delete every matching document and return the number removed.
    async fn delete_by_query(&self, index: &str, query: &Query, refresh: Refresh)
    -> StoreResult<u64>;
    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
