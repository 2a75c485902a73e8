use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::record::{Level, MarkerKind, Row};

/// A filterable column of the records table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Level,
    Source,
    SpanId,
    MarkerKind,
}

impl Column {
    /// Column name in the backing table
    pub fn as_sql(self) -> &'static str {
        match self {
            Column::Level => "level",
            Column::Source => "source",
            Column::SpanId => "span_id",
            Column::MarkerKind => "marker_kind",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Column::Level => "Level",
            Column::Source => "Source",
            Column::SpanId => "Span",
            Column::MarkerKind => "Marker",
        }
    }
}

/// Value a column is compared against. `Null` matches rows where the column is unset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Int(i64),
    Text(String),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Null => write!(f, "empty"),
            FilterValue::Int(value) => write!(f, "{}", value),
            FilterValue::Text(value) => write!(f, "{}", value),
        }
    }
}

/// An equality predicate on one column
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub column: Column,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(column: Column, value: FilterValue) -> Self {
        Self { column, value }
    }

    pub fn level(level: Option<Level>) -> Self {
        Self::new(
            Column::Level,
            level.map_or(FilterValue::Null, |l| FilterValue::Int(l.as_i64())),
        )
    }

    pub fn source(source: Option<&str>) -> Self {
        Self::new(
            Column::Source,
            source.map_or(FilterValue::Null, |s| FilterValue::Text(s.to_string())),
        )
    }

    pub fn span(span_id: Option<i64>) -> Self {
        Self::new(Column::SpanId, span_id.map_or(FilterValue::Null, FilterValue::Int))
    }

    pub fn marker(kind: Option<MarkerKind>) -> Self {
        Self::new(
            Column::MarkerKind,
            kind.map_or(FilterValue::Null, |k| FilterValue::Int(k.as_i64())),
        )
    }

    /// Extract the value this filter's column holds for `row`
    pub fn value_of(column: Column, row: &Row) -> FilterValue {
        match column {
            Column::Level => row
                .level
                .map_or(FilterValue::Null, |l| FilterValue::Int(l.as_i64())),
            Column::Source => row
                .source
                .as_ref()
                .map_or(FilterValue::Null, |s| FilterValue::Text(s.clone())),
            Column::SpanId => row.span_id.map_or(FilterValue::Null, FilterValue::Int),
            Column::MarkerKind => row
                .marker
                .map_or(FilterValue::Null, |k| FilterValue::Int(k.as_i64())),
        }
    }

    /// Check if a row satisfies this filter
    pub fn matches(&self, row: &Row) -> bool {
        Self::value_of(self.column, row) == self.value
    }

    /// Short chip label, e.g. `Level: error`
    pub fn label(&self) -> String {
        let value = match (self.column, &self.value) {
            (Column::Level, FilterValue::Int(v)) => Level::from_i64(*v)
                .map(|l| l.name().to_string())
                .unwrap_or_else(|| v.to_string()),
            (Column::MarkerKind, FilterValue::Int(v)) => MarkerKind::from_i64(*v)
                .map(|k| k.label().to_string())
                .unwrap_or_else(|| v.to_string()),
            (_, value) => value.to_string(),
        };
        format!("{}: {}", self.column.label(), value)
    }
}

/// Ordered set of filters keyed by column.
///
/// Adding a filter for a column that is already present replaces its value in
/// place; filters for distinct columns are combined with AND.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the filter for `filter.column`. Returns whether the set changed.
    pub fn add(&mut self, filter: Filter) -> bool {
        match self.filters.iter_mut().find(|f| f.column == filter.column) {
            Some(existing) if *existing == filter => false,
            Some(existing) => {
                existing.value = filter.value;
                true
            }
            None => {
                self.filters.push(filter);
                true
            }
        }
    }

    /// Remove the filter at `index`, returning it if the index was valid
    pub fn remove(&mut self, index: usize) -> Option<Filter> {
        if index < self.filters.len() {
            Some(self.filters.remove(index))
        } else {
            None
        }
    }

    /// Remove all filters. Returns whether anything was removed.
    pub fn clear(&mut self) -> bool {
        let changed = !self.filters.is_empty();
        self.filters.clear();
        changed
    }

    pub fn list(&self) -> &[Filter] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Whether a row satisfies every filter in the set
    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Load a persisted set. A missing file yields an empty set.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut set = Self::default();
        let filters: Vec<Filter> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
        // Re-add one by one so a hand-edited file cannot break column uniqueness
        for filter in filters {
            set.add(filter);
        }
        Ok(set)
    }

    /// Persist the set as JSON, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let persist_err = |details: String| ConfigError::Persist {
            path: path.to_path_buf(),
            details,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| persist_err(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| persist_err(e.to_string()))
    }
}
