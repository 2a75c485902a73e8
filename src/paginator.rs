//! Keyset page fetches with a one-row look-ahead.

use std::sync::Arc;

use crate::config::DEFAULT_PAGE_LIMIT;
use crate::error::FetchResult;
use crate::filter::Filter;
use crate::record::{Cursor, Row};
use crate::sources::{PageRequest, RecordSource};

/// One page of rows, newest first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub rows: Vec<Row>,
    /// More rows exist beyond this page
    pub has_more: bool,
    /// Key of the last returned row, if any
    pub next_cursor: Option<Cursor>,
}

impl Page {
    /// Trim a look-ahead read of up to `limit + 1` rows down to a page
    pub fn from_lookahead(mut fetched: Vec<Row>, limit: usize) -> Self {
        let has_more = fetched.len() > limit;
        fetched.truncate(limit);
        let next_cursor = fetched.last().map(Row::key);
        Self {
            rows: fetched,
            has_more,
            next_cursor,
        }
    }
}

/// Issues page fetches against a record source
#[derive(Clone)]
pub struct Paginator {
    source: Arc<dyn RecordSource>,
    limit: usize,
}

impl Paginator {
    pub fn new(source: Arc<dyn RecordSource>, limit: usize) -> Self {
        Self {
            source,
            limit: limit.max(1),
        }
    }

    pub fn with_default_limit(source: Arc<dyn RecordSource>) -> Self {
        Self::new(source, DEFAULT_PAGE_LIMIT)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn source(&self) -> &Arc<dyn RecordSource> {
        &self.source
    }

    /// Fetch the page strictly older than `cursor`, or the head page without one
    pub async fn fetch(&self, filters: &[Filter], cursor: Option<Cursor>) -> FetchResult<Page> {
        let request = PageRequest {
            filters: filters.to_vec(),
            cursor,
            limit: self.limit + 1,
        };
        let fetched = self.source.fetch_rows(&request).await?;
        tracing::debug!(fetched = fetched.len(), ?cursor, "fetched page");
        Ok(Page::from_lookahead(fetched, self.limit))
    }

    /// Total rows matching the filters
    pub async fn total(&self, filters: &[Filter]) -> FetchResult<u64> {
        self.source.count(filters).await
    }
}
