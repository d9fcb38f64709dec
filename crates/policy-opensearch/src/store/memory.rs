//! In-memory implementation of the document store.
//!
//! # Purpose
//! Implements [`DocumentStore`] with `HashMap`s guarded by `tokio::sync::RwLock`.
//! It exists for:
//! - local development without an OpenSearch cluster
//! - adapter, loader, and service tests
//!
//! # Semantics
//! - **Not durable**: all state is lost on process restart.
//! - Every mutation is visible immediately regardless of [`Refresh`].
//! - Scroll contexts capture the matching documents at search time, ordered by
//!   document id, and hand them out page by page. Contexts expire after their
//!   keep-alive and are dropped when cleared.
use super::{DeleteOutcome, DocumentStore, Hit, Query, Refresh, SearchPage};
use crate::errors::{StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryIndex {
    /// Index body supplied at creation time (mappings are not enforced).
    body: Value,
    documents: BTreeMap<String, Value>,
}

#[derive(Debug)]
struct ScrollContext {
    remaining: VecDeque<Hit>,
    page_size: usize,
    expires_at: Instant,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    indices: Arc<RwLock<HashMap<String, MemoryIndex>>>,
    scrolls: Arc<RwLock<HashMap<String, ScrollContext>>>,
    next_scroll: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored in `index`.
    pub async fn document_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .await
            .get(index)
            .map(|idx| idx.documents.len())
            .unwrap_or(0)
    }

    pub async fn get_document(&self, index: &str, id: &str) -> Option<Value> {
        self.indices
            .read()
            .await
            .get(index)
            .and_then(|idx| idx.documents.get(id).cloned())
    }

    /// Settings and mappings `index` was created with.
    pub async fn index_body(&self, index: &str) -> Option<Value> {
        self.indices
            .read()
            .await
            .get(index)
            .map(|idx| idx.body.clone())
    }

    /// Number of scroll contexts still held open.
    pub async fn open_scrolls(&self) -> usize {
        self.scrolls.read().await.len()
    }

    fn missing_index(index: &str) -> StoreError {
        StoreError::Status {
            status: 404,
            body: format!("no such index [{index}]"),
        }
    }

    fn take_page(context: &mut ScrollContext) -> Vec<Hit> {
        let count = context.page_size.min(context.remaining.len());
        context.remaining.drain(..count).collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn index_exists(&self, index: &str) -> StoreResult<bool> {
        Ok(self.indices.read().await.contains_key(index))
    }

    async fn create_index(&self, index: &str, body: &Value) -> StoreResult<()> {
        let mut indices = self.indices.write().await;
        if indices.contains_key(index) {
            return Err(StoreError::IndexAlreadyExists(index.to_string()));
        }
        indices.insert(
            index.to_string(),
            MemoryIndex {
                body: body.clone(),
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn put_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
        _refresh: Refresh,
    ) -> StoreResult<()> {
        // Like OpenSearch, indexing into a missing index creates it.
        let mut indices = self.indices.write().await;
        indices
            .entry(index.to_string())
            .or_default()
            .documents
            .insert(id.to_string(), document.clone());
        Ok(())
    }

    async fn delete_document(
        &self,
        index: &str,
        id: &str,
        _refresh: Refresh,
    ) -> StoreResult<DeleteOutcome> {
        let mut indices = self.indices.write().await;
        let idx = indices
            .get_mut(index)
            .ok_or_else(|| Self::missing_index(index))?;
        Ok(match idx.documents.remove(id) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    async fn search(
        &self,
        index: &str,
        size: usize,
        keep_alive: Duration,
    ) -> StoreResult<SearchPage> {
        let remaining: VecDeque<Hit> = {
            let indices = self.indices.read().await;
            let idx = indices.get(index).ok_or_else(|| Self::missing_index(index))?;
            idx.documents
                .iter()
                .map(|(id, source)| Hit {
                    id: id.clone(),
                    source: source.clone(),
                })
                .collect()
        };
        let mut context = ScrollContext {
            remaining,
            page_size: size.max(1),
            expires_at: Instant::now() + keep_alive,
        };
        let hits = Self::take_page(&mut context);
        let scroll_id = format!("mem-scroll-{}", self.next_scroll.fetch_add(1, Ordering::Relaxed));
        self.scrolls.write().await.insert(scroll_id.clone(), context);
        Ok(SearchPage {
            scroll_id: Some(scroll_id),
            hits,
        })
    }

    async fn scroll(&self, scroll_id: &str, keep_alive: Duration) -> StoreResult<SearchPage> {
        let mut scrolls = self.scrolls.write().await;
        let now = Instant::now();
        scrolls.retain(|_, context| context.expires_at > now);
        let context = scrolls.get_mut(scroll_id).ok_or_else(|| StoreError::Status {
            status: 404,
            body: format!("no search context found for id [{scroll_id}]"),
        })?;
        context.expires_at = now + keep_alive;
        let hits = Self::take_page(context);
        Ok(SearchPage {
            scroll_id: Some(scroll_id.to_string()),
            hits,
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> StoreResult<()> {
        self.scrolls.write().await.remove(scroll_id);
        Ok(())
    }

    async fn delete_by_query(
        &self,
        index: &str,
        query: &Query,
        _refresh: Refresh,
    ) -> StoreResult<u64> {
        let mut indices = self.indices.write().await;
        let idx = indices
            .get_mut(index)
            .ok_or_else(|| Self::missing_index(index))?;
        let before = idx.documents.len();
        idx.documents.retain(|_, source| !query.matches(source));
        Ok((before - idx.documents.len()) as u64)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
