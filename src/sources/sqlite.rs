//! SQLite record source: reads pages, counts and single rows from a `records`
//! table and applies marker updates.
//!
//! rusqlite is synchronous, so every call hops onto the blocking pool while
//! holding the connection lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params, params_from_iter};

use super::{MarkerUpdate, NewRecord, PageRequest, RecordSource};
use crate::error::{FetchError, FetchResult};
use crate::filter::Filter;
use crate::query::{self, Statement};
use crate::record::{Level, MarkerKind, Row};

/// A record source backed by an SQLite database file
pub struct SqliteSource {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteSource {
    /// Open (or create) the database at `path`, applying schema and PRAGMAs.
    pub fn open(path: &Path) -> FetchResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| FetchError::Query {
                    context: "open",
                    details: format!("{}: {}", parent.display(), e),
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        apply_pragmas(&conn)?;
        apply_schema(&conn)?;

        tracing::debug!(path = %path.display(), "opened record store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a record and return its id. Used by fixtures and tests; the
    /// inspector itself never writes records.
    pub fn append_record(&self, record: &NewRecord) -> FetchResult<i64> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO records (
                kind, ts_ms, received_ms, span_id, source, level, message, fields_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?
        .execute(params![
            record.kind,
            record.timestamp_ms,
            chrono::Utc::now().timestamp_millis(),
            record.span_id,
            record.source,
            record.level.map(Level::as_i64),
            record.message,
            record.fields,
        ])?;
        Ok(conn.last_insert_rowid())
    }

    async fn with_conn<T, F>(&self, f: F) -> FetchResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await?;
        Ok(result?)
    }
}

#[async_trait::async_trait]
impl RecordSource for SqliteSource {
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(limit = request.limit, filters = request.filters.len(), cursor = ?request.cursor),
        err
    )]
    async fn fetch_rows(&self, request: &PageRequest) -> FetchResult<Vec<Row>> {
        let statement = query::page(&request.filters, request.cursor.as_ref(), request.limit);
        self.with_conn(move |conn| query_rows(conn, &statement)).await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(filters = filters.len()), err)]
    async fn count(&self, filters: &[Filter]) -> FetchResult<u64> {
        let statement = query::count(filters);
        let count: i64 = self
            .with_conn(move |conn| {
                conn.prepare_cached(&statement.sql)?
                    .query_row(params_from_iter(statement.params.iter()), |row| row.get(0))
            })
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn fetch_row(&self, id: i64) -> FetchResult<Option<Row>> {
        let statement = query::row(id);
        let rows = self.with_conn(move |conn| query_rows(conn, &statement)).await?;
        Ok(rows.into_iter().next())
    }

    #[tracing::instrument(level = "debug", skip(self, update), err)]
    async fn update_marker(&self, id: i64, update: &MarkerUpdate) -> FetchResult<()> {
        let mut sets = Vec::new();
        let mut values = Vec::new();

        if let Some(kind) = update.kind {
            sets.push("marker_kind = ?");
            values.push(kind.map_or(Value::Null, |k| Value::Integer(k.as_i64())));
        }
        if let Some(note) = &update.note {
            sets.push("marker_note = ?");
            values.push(note.clone().map_or(Value::Null, Value::Text));
        }
        if sets.is_empty() {
            return Ok(());
        }
        values.push(Value::Integer(id));

        let sql = format!("UPDATE records SET {} WHERE id = ?", sets.join(", "));
        self.with_conn(move |conn| conn.execute(&sql, params_from_iter(values.iter())))
            .await?;
        Ok(())
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn query_rows(conn: &Connection, statement: &Statement) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare_cached(&statement.sql)?;
    let rows = stmt
        .query_map(params_from_iter(statement.params.iter()), map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let level: Option<i64> = row.get(3)?;
    let fields: Option<String> = row.get(6)?;
    let marker: Option<i64> = row.get(8)?;

    Ok(Row {
        id: row.get(0)?,
        timestamp_ms: row.get(1)?,
        kind: row.get(2)?,
        level: level.and_then(Level::from_i64),
        source: row.get(4)?,
        message: row.get(5)?,
        fields: fields.unwrap_or_else(|| "{}".to_string()),
        span_id: row.get(7)?,
        marker: marker.and_then(MarkerKind::from_i64),
        marker_note: row.get(9)?,
        added_at: None,
    })
}

fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA busy_timeout = 5000;",
    )?;
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(%mode, "requested WAL journal mode but got another");
    }
    Ok(())
}

fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind INTEGER NOT NULL DEFAULT 0,
            ts_ms INTEGER NOT NULL,
            received_ms INTEGER NOT NULL,
            span_id INTEGER,
            parent_id INTEGER,
            source TEXT,
            level INTEGER,
            message TEXT NOT NULL,
            fields_json TEXT NOT NULL DEFAULT '{}',
            marker_kind INTEGER,
            marker_note TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_records_ts_id ON records (ts_ms DESC, id DESC);
        CREATE INDEX IF NOT EXISTS idx_records_kind ON records (kind);",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_schema_in_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("records.db");
        let source = SqliteSource::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(source.name(), "records.db");

        let id = source
            .append_record(&NewRecord::new(1_000, "first").with_level(Level::Info))
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_map_row_tolerates_unknown_enums() {
        let dir = tempfile::tempdir().unwrap();
        let source = SqliteSource::open(&dir.path().join("r.db")).unwrap();
        {
            let conn = source.conn.lock();
            conn.execute(
                "INSERT INTO records (kind, ts_ms, received_ms, level, message, marker_kind)
                 VALUES (0, 5, 5, 99, 'odd', 42)",
                [],
            )
            .unwrap();
        }

        let conn = source.conn.lock();
        let rows = query_rows(&conn, &query::row(1)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level, None);
        assert_eq!(rows[0].marker, None);
        assert_eq!(rows[0].message, "odd");
    }
}
