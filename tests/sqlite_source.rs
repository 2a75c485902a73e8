use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tailview::config::Config;
use tailview::engine::WindowEngine;
use tailview::filter::Filter;
use tailview::live::{Tick, TickDecision};
use tailview::paginator::Paginator;
use tailview::record::{Level, MarkerKind, Row};
use tailview::sources::poller::DataVersionPoller;
use tailview::sources::sqlite::SqliteSource;
use tailview::sources::{MarkerUpdate, NewRecord, RecordSource, TickSource};

fn open(dir: &Path) -> Arc<SqliteSource> {
    Arc::new(SqliteSource::open(&dir.join("records.db")).unwrap())
}

/// 57 records, four per timestamp so pages split ties
fn seed(source: &SqliteSource) {
    for i in 0..57i64 {
        let mut record = NewRecord::new((i / 4) * 100, format!("record {}", i));
        if i % 5 == 0 {
            record = record.with_level(Level::Warn);
        } else {
            record = record.with_level(Level::Info).with_source("worker");
        }
        source.append_record(&record).unwrap();
    }
    // A span record that must never show up
    source
        .append_record(&NewRecord::new(10_000, "span").with_kind(1))
        .unwrap();
}

#[tokio::test]
async fn test_keyset_walk_has_no_gaps_or_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let source = open(dir.path());
    seed(&source);

    let paginator = Paginator::new(source.clone(), 10);
    let mut rows: Vec<Row> = Vec::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let page = paginator.fetch(&[], cursor).await.unwrap();
        pages += 1;
        rows.extend(page.rows);
        if !page.has_more {
            break;
        }
        cursor = page.next_cursor;
    }

    assert_eq!(pages, 6);
    assert_eq!(rows.len(), 57);
    let unique: HashSet<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(unique.len(), 57);
    for pair in rows.windows(2) {
        assert!(pair[0].key() > pair[1].key());
    }
    assert!(rows.iter().all(|r| r.kind == 0));
}

#[tokio::test]
async fn test_filters_and_count() {
    let dir = tempfile::tempdir().unwrap();
    let source = open(dir.path());
    seed(&source);

    let warn = vec![Filter::level(Some(Level::Warn))];
    assert_eq!(source.count(&warn).await.unwrap(), 12);
    assert_eq!(source.count(&[]).await.unwrap(), 57);

    // Warnings were written without a source
    let no_source = vec![Filter::source(None)];
    assert_eq!(source.count(&no_source).await.unwrap(), 12);

    let both = vec![Filter::level(Some(Level::Info)), Filter::source(Some("worker"))];
    let paginator = Paginator::new(source.clone(), 100);
    let page = paginator.fetch(&both, None).await.unwrap();
    assert_eq!(page.rows.len(), 45);
    assert!(!page.has_more);
    assert!(page.rows.iter().all(|r| r.source.as_deref() == Some("worker")));
}

#[tokio::test]
async fn test_marker_update_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let source = open(dir.path());
    seed(&source);

    source
        .update_marker(3, &MarkerUpdate::kind(Some(MarkerKind::Success)))
        .await
        .unwrap();
    source
        .update_marker(3, &MarkerUpdate::note(Some("deploy started".to_string())))
        .await
        .unwrap();

    let row = source.fetch_row(3).await.unwrap().unwrap();
    assert_eq!(row.marker, Some(MarkerKind::Success));
    assert_eq!(row.marker_note.as_deref(), Some("deploy started"));

    let marked = vec![Filter::marker(Some(MarkerKind::Success))];
    assert_eq!(source.count(&marked).await.unwrap(), 1);

    source
        .update_marker(3, &MarkerUpdate::kind(None))
        .await
        .unwrap();
    let row = source.fetch_row(3).await.unwrap().unwrap();
    assert_eq!(row.marker, None);
    assert_eq!(row.marker_note.as_deref(), Some("deploy started"));

    assert_eq!(source.fetch_row(999).await.unwrap(), None);
}

#[tokio::test]
async fn test_poller_ticks_after_commit() {
    let dir = tempfile::tempdir().unwrap();
    let source = open(dir.path());
    seed(&source);

    let poller = DataVersionPoller::new(source.path(), Duration::from_millis(20));
    let mut ticks = poller.subscribe().await;

    // Keep writing until the poller has a baseline and sees a change
    let tick = tokio::time::timeout(Duration::from_secs(5), async {
        let mut i = 0;
        loop {
            source
                .append_record(&NewRecord::new(20_000 + i, "late"))
                .unwrap();
            i += 1;
            tokio::select! {
                tick = ticks.recv() => return tick,
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
        }
    })
    .await
    .expect("no tick after commits");

    assert_eq!(tick, Some(Tick::data_changed()));
}

#[tokio::test]
async fn test_engine_tails_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let source = open(dir.path());
    seed(&source);

    let config = Config {
        page_limit: 20,
        ..Config::default()
    };
    let (mut engine, mut events) = WindowEngine::new(source.clone(), &config);
    engine.refresh();
    while engine.is_busy() {
        let event = events.recv().await.unwrap();
        engine.handle(event);
    }
    assert_eq!(engine.state().rows.len(), 20);
    assert_eq!(engine.state().total, Some(57));

    let id = source
        .append_record(&NewRecord::new(50_000, "fresh").with_level(Level::Error))
        .unwrap();
    assert_eq!(engine.handle_tick(Tick::data_changed()), TickDecision::Merge);
    while engine.is_busy() {
        let event = events.recv().await.unwrap();
        engine.handle(event);
    }

    let head = &engine.state().rows[0];
    assert_eq!(head.id, id);
    assert!(head.added_at.is_some());
    assert_eq!(engine.state().total, Some(58));
}
