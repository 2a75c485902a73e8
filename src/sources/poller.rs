//! Tick transport for SQLite stores: polls `PRAGMA data_version` on a
//! dedicated connection. The value changes whenever another connection
//! commits, which is exactly "records may have changed".

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::TickSource;
use crate::config::DEFAULT_CHANNEL_BUFFER;
use crate::error::FetchResult;
use crate::live::Tick;

/// Prevent near-zero intervals from turning into a busy loop
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct DataVersionPoller {
    path: PathBuf,
    interval: Duration,
}

impl DataVersionPoller {
    pub fn new(path: &Path, interval: Duration) -> Self {
        Self {
            path: path.to_path_buf(),
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }

    fn open(&self) -> FetchResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }
}

fn data_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA data_version", [], |row| row.get(0))
}

#[async_trait::async_trait]
impl TickSource for DataVersionPoller {
    async fn subscribe(&self) -> mpsc::Receiver<Tick> {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);

        let conn = match self.open() {
            Ok(conn) => Arc::new(Mutex::new(conn)),
            Err(e) => {
                // Closing the channel right away ends the subscription
                tracing::warn!(path = %self.path.display(), error = %e, "cannot open poll connection");
                return rx;
            }
        };
        let period = self.interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last: Option<i64> = None;

            loop {
                interval.tick().await;
                if tx.is_closed() {
                    break;
                }

                let conn = Arc::clone(&conn);
                let version = tokio::task::spawn_blocking(move || data_version(&conn.lock())).await;

                let version = match version {
                    Ok(Ok(version)) => version,
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "data_version poll failed");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "data_version poll task failed");
                        break;
                    }
                };

                if last.is_some_and(|prev| prev != version) {
                    tracing::trace!(version, "store changed");
                    if tx.send(Tick::data_changed()).await.is_err() {
                        break; // Receiver dropped
                    }
                }
                last = Some(version);
            }
        });

        rx
    }
}
