//! Parameterized SQL for the records table.
//!
//! Every statement starts from the base predicate `kind = 0` and ANDs the
//! active filters onto it. Column names only ever come from [`Column`], values
//! are always bound.

use rusqlite::types::Value;

use crate::filter::{Filter, FilterValue};
use crate::record::Cursor;

/// Columns selected for a [`crate::record::Row`], in mapping order
pub const ROW_COLUMNS: &str = "id, ts_ms, kind, level, source, message, fields_json, \
                               span_id, marker_kind, marker_note";

/// A compiled statement and its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

struct Predicate {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Predicate {
    fn base(filters: &[Filter]) -> Self {
        let mut predicate = Self {
            clauses: vec!["kind = 0".to_string()],
            params: Vec::new(),
        };

        for filter in filters {
            let column = filter.column.as_sql();
            match &filter.value {
                FilterValue::Null => predicate.clauses.push(format!("{} IS NULL", column)),
                FilterValue::Int(value) => {
                    predicate.clauses.push(format!("{} = ?", column));
                    predicate.params.push(Value::Integer(*value));
                }
                FilterValue::Text(value) => {
                    predicate.clauses.push(format!("{} = ?", column));
                    predicate.params.push(Value::Text(value.clone()));
                }
            }
        }

        predicate
    }

    fn before(&mut self, cursor: &Cursor) {
        self.clauses
            .push("(ts_ms < ? OR (ts_ms = ? AND id < ?))".to_string());
        self.params.push(Value::Integer(cursor.timestamp_ms));
        self.params.push(Value::Integer(cursor.timestamp_ms));
        self.params.push(Value::Integer(cursor.id));
    }

    fn render(&self) -> String {
        self.clauses.join(" AND ")
    }
}

/// Rows strictly older than `cursor` (or the head when `None`), newest first
pub fn page(filters: &[Filter], cursor: Option<&Cursor>, limit: usize) -> Statement {
    let mut predicate = Predicate::base(filters);
    if let Some(cursor) = cursor {
        predicate.before(cursor);
    }

    let sql = format!(
        "SELECT {} FROM records WHERE {} ORDER BY ts_ms DESC, id DESC LIMIT ?",
        ROW_COLUMNS,
        predicate.render()
    );
    let mut params = predicate.params;
    params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

    Statement { sql, params }
}

/// Total number of rows matching the filters
pub fn count(filters: &[Filter]) -> Statement {
    let predicate = Predicate::base(filters);
    Statement {
        sql: format!("SELECT COUNT(*) FROM records WHERE {}", predicate.render()),
        params: predicate.params,
    }
}

/// A single row by id, regardless of filters
pub fn row(id: i64) -> Statement {
    Statement {
        sql: format!("SELECT {} FROM records WHERE id = ? LIMIT 1", ROW_COLUMNS),
        params: vec![Value::Integer(id)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;

    #[test]
    fn test_head_page_without_filters() {
        let stmt = page(&[], None, 101);
        assert_eq!(
            stmt.sql,
            format!(
                "SELECT {} FROM records WHERE kind = 0 ORDER BY ts_ms DESC, id DESC LIMIT ?",
                ROW_COLUMNS
            )
        );
        assert_eq!(stmt.params, vec![Value::Integer(101)]);
    }

    #[test]
    fn test_page_with_filters_and_cursor() {
        let filters = vec![Filter::level(Some(Level::Error)), Filter::source(Some("api"))];
        let stmt = page(&filters, Some(&Cursor::new(42, 1_000)), 11);

        assert!(stmt.sql.contains(
            "WHERE kind = 0 AND level = ? AND source = ? AND (ts_ms < ? OR (ts_ms = ? AND id < ?))"
        ));
        assert_eq!(
            stmt.params,
            vec![
                Value::Integer(4),
                Value::Text("api".to_string()),
                Value::Integer(1_000),
                Value::Integer(1_000),
                Value::Integer(42),
                Value::Integer(11),
            ]
        );
    }

    #[test]
    fn test_null_value_is_not_bound() {
        let stmt = count(&[Filter::marker(None)]);
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(*) FROM records WHERE kind = 0 AND marker_kind IS NULL"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_row_by_id() {
        let stmt = row(9);
        assert!(stmt.sql.ends_with("WHERE id = ? LIMIT 1"));
        assert_eq!(stmt.params, vec![Value::Integer(9)]);
    }
}
