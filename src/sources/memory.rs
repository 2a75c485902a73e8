//! Manages an in-process records table that doubles as its own tick transport.

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::sync::broadcast::error::RecvError;

use super::{MarkerUpdate, NewRecord, PageRequest, RecordSource, TickSource};
use crate::config::DEFAULT_CHANNEL_BUFFER;
use crate::error::FetchResult;
use crate::filter::Filter;
use crate::live::Tick;
use crate::record::Row;

struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

/// An in-memory record source. Every insert broadcasts a data-changed tick.
pub struct MemorySource {
    table: Mutex<Table>,
    changes: broadcast::Sender<()>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(DEFAULT_CHANNEL_BUFFER);
        Self {
            table: Mutex::new(Table {
                rows: Vec::new(),
                next_id: 1,
            }),
            changes,
        }
    }

    /// Insert a record, assigning the next id
    pub fn insert(&self, record: NewRecord) -> i64 {
        let id = {
            let mut table = self.table.lock();
            let id = table.next_id;
            table.next_id += 1;
            table.rows.push(record.into_row(id));
            id
        };
        // No subscribers is fine
        let _ = self.changes.send(());
        id
    }

    /// Insert many records with a single notification
    pub fn extend<I: IntoIterator<Item = NewRecord>>(&self, records: I) {
        {
            let mut table = self.table.lock();
            for record in records {
                let id = table.next_id;
                table.next_id += 1;
                table.rows.push(record.into_row(id));
            }
        }
        let _ = self.changes.send(());
    }

    pub fn len(&self) -> usize {
        self.table.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live tick subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn visible(row: &Row, filters: &[Filter]) -> bool {
        row.kind == 0 && filters.iter().all(|f| f.matches(row))
    }
}

#[async_trait::async_trait]
impl RecordSource for MemorySource {
    async fn fetch_rows(&self, request: &PageRequest) -> FetchResult<Vec<Row>> {
        let table = self.table.lock();
        let mut rows: Vec<Row> = table
            .rows
            .iter()
            .filter(|row| Self::visible(row, &request.filters))
            .filter(|row| match &request.cursor {
                Some(cursor) => cursor.precedes(&row.key()),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(Row::display_order);
        rows.truncate(request.limit);
        Ok(rows)
    }

    async fn count(&self, filters: &[Filter]) -> FetchResult<u64> {
        let table = self.table.lock();
        Ok(table.rows.iter().filter(|row| Self::visible(row, filters)).count() as u64)
    }

    async fn fetch_row(&self, id: i64) -> FetchResult<Option<Row>> {
        let table = self.table.lock();
        Ok(table.rows.iter().find(|row| row.id == id).cloned())
    }

    async fn update_marker(&self, id: i64, update: &MarkerUpdate) -> FetchResult<()> {
        {
            let mut table = self.table.lock();
            if let Some(row) = table.rows.iter_mut().find(|row| row.id == id) {
                if let Some(kind) = update.kind {
                    row.marker = kind;
                }
                if let Some(note) = &update.note {
                    row.marker_note = note.clone();
                }
            }
        }
        let _ = self.changes.send(());
        Ok(())
    }

    fn name(&self) -> String {
        "memory".to_string()
    }
}

#[async_trait::async_trait]
impl TickSource for MemorySource {
    async fn subscribe(&self) -> mpsc::Receiver<Tick> {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
        let mut changes = self.changes.subscribe();

        tokio::spawn(async move {
            loop {
                let changed = tokio::select! {
                    _ = tx.closed() => break, // Receiver dropped
                    changed = changes.recv() => changed,
                };
                match changed {
                    // A lagged receiver missed some notifications; one tick covers them all
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        if tx.send(Tick::data_changed()).await.is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Cursor, Level};

    fn seeded() -> MemorySource {
        let source = MemorySource::new();
        source.extend((1..=10).map(|i| {
            let level = if i % 2 == 0 { Level::Error } else { Level::Info };
            NewRecord::new(i * 100, format!("record {}", i)).with_level(level)
        }));
        source.insert(NewRecord::new(2_000, "span record").with_kind(1));
        source
    }

    #[tokio::test]
    async fn test_fetch_rows_orders_and_excludes_other_kinds() {
        let source = seeded();
        let rows = source
            .fetch_rows(&PageRequest {
                filters: vec![],
                cursor: None,
                limit: 3,
            })
            .await
            .unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 9, 8]);
    }

    #[tokio::test]
    async fn test_fetch_rows_with_cursor_and_filter() {
        let source = seeded();
        let rows = source
            .fetch_rows(&PageRequest {
                filters: vec![Filter::level(Some(Level::Error))],
                cursor: Some(Cursor::new(6, 600)),
                limit: 10,
            })
            .await
            .unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 2]);
        assert_eq!(source.count(&[]).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_insert_notifies_subscribers() {
        let source = MemorySource::new();
        let mut ticks = source.subscribe().await;
        assert_eq!(source.subscriber_count(), 1);

        source.insert(NewRecord::new(1, "hello"));
        assert_eq!(ticks.recv().await, Some(Tick::data_changed()));
    }

    #[tokio::test]
    async fn test_dropped_receiver_releases_subscription() {
        let source = MemorySource::new();
        let ticks = source.subscribe().await;
        assert_eq!(source.subscriber_count(), 1);

        drop(ticks);
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while source.subscriber_count() > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscription was not released");
    }

    #[tokio::test]
    async fn test_update_marker() {
        let source = seeded();
        source
            .update_marker(3, &MarkerUpdate::note(Some("look here".to_string())))
            .await
            .unwrap();
        let row = source.fetch_row(3).await.unwrap().unwrap();
        assert_eq!(row.marker_note.as_deref(), Some("look here"));
        assert_eq!(row.marker, None);
    }
}
