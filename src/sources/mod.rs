//! Record and tick source abstractions and implementations.
//!
//! Provides the `RecordSource` trait the engine fetches through, the
//! `TickSource` trait for change notifications, and implementations for:
//! - SQLite `records` tables (via rusqlite)
//! - An in-process table (tests and `--demo`)
//! - `PRAGMA data_version` polling as a tick transport

pub mod memory;
pub mod poller;
pub mod sqlite;

use tokio::sync::mpsc;

use crate::error::FetchResult;
use crate::filter::Filter;
use crate::live::Tick;
use crate::record::{Cursor, Level, MarkerKind, Row};

/// One raw page request. `limit` is the number of rows to read, already
/// including the paginator's look-ahead row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub filters: Vec<Filter>,
    pub cursor: Option<Cursor>,
    pub limit: usize,
}

/// A record to be written by fixtures and the demo feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRecord {
    pub kind: i64,
    pub timestamp_ms: i64,
    pub level: Option<Level>,
    pub source: Option<String>,
    pub message: String,
    pub fields: String,
    pub span_id: Option<i64>,
}

impl NewRecord {
    pub fn new(timestamp_ms: i64, message: impl Into<String>) -> Self {
        Self {
            kind: 0,
            timestamp_ms,
            level: None,
            source: None,
            message: message.into(),
            fields: String::from("{}"),
            span_id: None,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_kind(mut self, kind: i64) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_span(mut self, span_id: i64) -> Self {
        self.span_id = Some(span_id);
        self
    }

    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    /// Materialize as a fetched row with the given id
    pub fn into_row(self, id: i64) -> Row {
        Row {
            id,
            timestamp_ms: self.timestamp_ms,
            kind: self.kind,
            level: self.level,
            source: self.source,
            message: self.message,
            fields: self.fields,
            span_id: self.span_id,
            marker: None,
            marker_note: None,
            added_at: None,
        }
    }
}

/// Partial update of a row's marker columns. `None` leaves a column untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkerUpdate {
    pub kind: Option<Option<MarkerKind>>,
    pub note: Option<Option<String>>,
}

impl MarkerUpdate {
    pub fn kind(kind: Option<MarkerKind>) -> Self {
        Self {
            kind: Some(kind),
            note: None,
        }
    }

    pub fn note(note: Option<String>) -> Self {
        Self {
            kind: None,
            note: Some(note),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.note.is_none()
    }
}

/// Trait for record sources
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    /// Rows of kind 0 matching the request, ordered by `(timestamp_ms desc, id desc)`
    async fn fetch_rows(&self, request: &PageRequest) -> FetchResult<Vec<Row>>;

    /// Number of rows of kind 0 matching the filters
    async fn count(&self, filters: &[Filter]) -> FetchResult<u64>;

    /// A single row by id, regardless of filters
    async fn fetch_row(&self, id: i64) -> FetchResult<Option<Row>>;

    /// Apply a marker update to one row
    async fn update_marker(&self, id: i64, update: &MarkerUpdate) -> FetchResult<()>;

    /// Get the display name for this source
    fn name(&self) -> String;
}

/// Trait for change-notification transports
#[async_trait::async_trait]
pub trait TickSource: Send + Sync {
    /// Start streaming ticks. The stream ends when the transport shuts down.
    async fn subscribe(&self) -> mpsc::Receiver<Tick>;
}
