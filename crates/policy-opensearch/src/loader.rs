//! Scroll-based bulk loader.
//!
//! # Purpose
//! Reads every policy document from an index page by page through a scroll
//! cursor and appends the decoded rules to a [`PolicyModel`].
//!
//! # Failure model
//! - A document that fails to decode is logged and skipped; it never aborts
//!   the load.
//! - A failed initial query is `StoreUnavailable`.
//! - A failed page after the first is `PartialLoad`. The sink then holds an
//!   incomplete model and must not be installed by the caller.
use crate::errors::{AdapterError, AdapterResult};
use crate::model::PolicyModel;
use crate::record::{DecodeMode, decode_source};
use crate::store::{DocumentStore, SearchPage};
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_SCROLL_KEEP_ALIVE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub page_size: usize,
    pub scroll_keep_alive: Duration,
    pub decode_mode: DecodeMode,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            scroll_keep_alive: DEFAULT_SCROLL_KEEP_ALIVE,
            decode_mode: DecodeMode::Strict,
        }
    }
}

/// Counts from a completed load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Non-empty pages consumed.
    pub pages: usize,
    pub loaded: usize,
    pub skipped: usize,
}

pub struct ScrollLoader<'a> {
    store: &'a dyn DocumentStore,
    index: &'a str,
    options: LoadOptions,
}

impl<'a> ScrollLoader<'a> {
    pub fn new(store: &'a dyn DocumentStore, index: &'a str, options: LoadOptions) -> Self {
        Self {
            store,
            index,
            options,
        }
    }

    pub async fn load_into(&self, sink: &mut PolicyModel) -> AdapterResult<LoadReport> {
        let keep_alive = self.options.scroll_keep_alive;
        let mut report = LoadReport::default();

        let mut page = self
            .store
            .search(self.index, self.options.page_size.max(1), keep_alive)
            .await
            .map_err(AdapterError::StoreUnavailable)?;
        let mut open_scroll = page.scroll_id.clone();

        let result = loop {
            if page.hits.is_empty() {
                break Ok(());
            }
            report.pages += 1;
            self.apply_page(&page, sink, &mut report);

            let Some(scroll_id) = page.scroll_id.take() else {
                break Ok(());
            };
            match self.store.scroll(&scroll_id, keep_alive).await {
                Ok(next) => {
                    if next.scroll_id.is_some() {
                        open_scroll = next.scroll_id.clone();
                    }
                    page = next;
                }
                Err(source) => {
                    break Err(AdapterError::PartialLoad {
                        pages_loaded: report.pages,
                        source,
                    });
                }
            }
        };

        if let Some(scroll_id) = open_scroll {
            if let Err(err) = self.store.clear_scroll(&scroll_id).await {
                tracing::debug!(index = self.index, error = %err, "failed to clear scroll context");
            }
        }

        result?;
        tracing::debug!(
            index = self.index,
            pages = report.pages,
            loaded = report.loaded,
            skipped = report.skipped,
            "policy documents loaded"
        );
        Ok(report)
    }

    fn apply_page(&self, page: &SearchPage, sink: &mut PolicyModel, report: &mut LoadReport) {
        for hit in &page.hits {
            match decode_source(&hit.source, self.options.decode_mode) {
                Ok(decoded) => {
                    sink.add_rule(&decoded.section, &decoded.ptype, decoded.rule);
                    report.loaded += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        index = self.index,
                        document_id = %hit.id,
                        error = %err,
                        "skipping malformed policy document"
                    );
                    report.skipped += 1;
                }
            }
        }
    }
}
