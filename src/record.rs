use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Severity stored in the `level` column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Off,
    ];

    pub fn from_i64(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

/// User-applied annotation on a record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Info,
    Warning,
    Error,
    Success,
    Note,
}

impl MarkerKind {
    pub const ALL: [MarkerKind; 5] = [
        MarkerKind::Info,
        MarkerKind::Warning,
        MarkerKind::Error,
        MarkerKind::Success,
        MarkerKind::Note,
    ];

    pub fn from_i64(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn label(self) -> &'static str {
        match self {
            MarkerKind::Info => "Info",
            MarkerKind::Warning => "Warning",
            MarkerKind::Error => "Error",
            MarkerKind::Success => "Success",
            MarkerKind::Note => "Note",
        }
    }

    /// Next marker in the cycle, `None` after the last one
    pub fn cycle(current: Option<MarkerKind>) -> Option<MarkerKind> {
        match current {
            None => Some(MarkerKind::Info),
            Some(kind) => Self::ALL.get(kind as usize + 1).copied(),
        }
    }
}

/// Keyset position in `(timestamp_ms, id)` order.
///
/// Field order matters: the derived `Ord` compares the timestamp first and
/// breaks ties on the id, which is exactly the table's sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    pub timestamp_ms: i64,
    pub id: i64,
}

impl Cursor {
    pub fn new(id: i64, timestamp_ms: i64) -> Self {
        Self { timestamp_ms, id }
    }

    /// Whether `key` sorts strictly before this cursor in descending order,
    /// i.e. belongs to an older page.
    pub fn precedes(&self, key: &Cursor) -> bool {
        key < self
    }
}

/// A single record as fetched from the backing table
#[derive(Clone, Debug)]
pub struct Row {
    pub id: i64,
    pub timestamp_ms: i64,
    pub kind: i64,
    pub level: Option<Level>,
    pub source: Option<String>,
    pub message: String,
    /// Structured fields as an opaque JSON blob
    pub fields: String,
    pub span_id: Option<i64>,
    pub marker: Option<MarkerKind>,
    pub marker_note: Option<String>,
    /// When the live tail first saw this row (epoch ms). Display only.
    pub added_at: Option<i64>,
}

impl Row {
    pub fn new(id: i64, timestamp_ms: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            timestamp_ms,
            kind: 0,
            level: None,
            source: None,
            message: message.into(),
            fields: String::from("{}"),
            span_id: None,
            marker: None,
            marker_note: None,
            added_at: None,
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

    pub fn key(&self) -> Cursor {
        Cursor::new(self.id, self.timestamp_ms)
    }

    /// Descending window order: newer rows first
    pub fn display_order(a: &Row, b: &Row) -> Ordering {
        b.key().cmp(&a.key())
    }
}

// `added_at` is deliberately excluded: it never takes part in identity.
impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.timestamp_ms == other.timestamp_ms
            && self.kind == other.kind
            && self.level == other.level
            && self.source == other.source
            && self.message == other.message
            && self.fields == other.fields
            && self.span_id == other.span_id
            && self.marker == other.marker
            && self.marker_note == other.marker_note
    }
}

impl Eq for Row {}
