#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use tailview::config::Config;
use tailview::engine::{EngineEvent, Handled, WindowEngine};
use tailview::error::{FetchError, FetchResult};
use tailview::filter::Filter;
use tailview::live::Tick;
use tailview::record::{Level, Row};
use tailview::sources::memory::MemorySource;
use tailview::sources::{MarkerUpdate, NewRecord, PageRequest, RecordSource, TickSource};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

struct Gate {
    matches: fn(&PageRequest) -> bool,
    release: oneshot::Receiver<()>,
}

/// A memory source whose page reads can be held back or failed on demand
pub struct GatedSource {
    pub inner: MemorySource,
    gates: Mutex<Vec<Gate>>,
    fail_next: AtomicBool,
    requests: Mutex<Vec<PageRequest>>,
}

impl GatedSource {
    pub fn new() -> Self {
        Self {
            inner: MemorySource::new(),
            gates: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `count` records with ids 1..=count, timestamps `id * 10`. Every third
    /// record is a warning from "api", the rest info from "worker".
    pub fn seeded(count: i64) -> Self {
        let source = Self::new();
        source.inner.extend((1..=count).map(record));
        source
    }

    /// Hold the next page read matching `matches` until the sender fires
    pub fn hold(&self, matches: fn(&PageRequest) -> bool) -> oneshot::Sender<()> {
        let (tx, release) = oneshot::channel();
        self.gates.lock().push(Gate { matches, release });
        tx
    }

    /// Fail the next page read
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().clone()
    }

    /// Page reads from the head of the table
    pub fn head_requests(&self) -> usize {
        self.requests.lock().iter().filter(|r| r.cursor.is_none()).count()
    }

    /// Page reads past a cursor
    pub fn older_requests(&self) -> usize {
        self.requests.lock().iter().filter(|r| r.cursor.is_some()).count()
    }
}

pub fn record(id: i64) -> NewRecord {
    let record = NewRecord::new(id * 10, format!("record {}", id));
    if id % 3 == 0 {
        record.with_level(Level::Warn).with_source("api")
    } else {
        record.with_level(Level::Info).with_source("worker")
    }
}

#[async_trait::async_trait]
impl RecordSource for GatedSource {
    async fn fetch_rows(&self, request: &PageRequest) -> FetchResult<Vec<Row>> {
        self.requests.lock().push(request.clone());

        let gate = {
            let mut gates = self.gates.lock();
            gates
                .iter()
                .position(|gate| (gate.matches)(request))
                .map(|idx| gates.remove(idx))
        };
        if let Some(gate) = gate {
            let _ = gate.release.await;
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(FetchError::transport("injected failure"));
        }
        self.inner.fetch_rows(request).await
    }

    async fn count(&self, filters: &[Filter]) -> FetchResult<u64> {
        self.inner.count(filters).await
    }

    async fn fetch_row(&self, id: i64) -> FetchResult<Option<Row>> {
        self.inner.fetch_row(id).await
    }

    async fn update_marker(&self, id: i64, update: &MarkerUpdate) -> FetchResult<()> {
        self.inner.update_marker(id, update).await
    }

    fn name(&self) -> String {
        "gated".to_string()
    }
}

#[async_trait::async_trait]
impl TickSource for GatedSource {
    async fn subscribe(&self) -> mpsc::Receiver<Tick> {
        self.inner.subscribe().await
    }
}

pub fn config(page_limit: usize) -> Config {
    Config {
        page_limit,
        overscan: 1,
        ..Config::default()
    }
}

pub fn engine(
    source: &Arc<GatedSource>,
    page_limit: usize,
) -> (WindowEngine, mpsc::Receiver<EngineEvent>) {
    WindowEngine::new(source.clone(), &config(page_limit))
}

/// Handle inbox events until nothing is outstanding
pub async fn settle(engine: &mut WindowEngine, events: &mut mpsc::Receiver<EngineEvent>) {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while engine.is_busy() {
            match events.recv().await {
                Some(event) => {
                    engine.handle(event);
                }
                None => break,
            }
        }
    })
    .await
    .expect("engine did not settle");
}

/// Handle the next inbox event
pub async fn next(engine: &mut WindowEngine, events: &mut mpsc::Receiver<EngineEvent>) -> Handled {
    let event = tokio::time::timeout(SETTLE_TIMEOUT, events.recv())
        .await
        .expect("no event arrived")
        .expect("inbox closed");
    engine.handle(event)
}

/// Handle events until a page fetch lands or fails
pub async fn next_page(
    engine: &mut WindowEngine,
    events: &mut mpsc::Receiver<EngineEvent>,
) -> Handled {
    loop {
        match next(engine, events).await {
            handled @ (Handled::Applied(_) | Handled::Failed(_)) => return handled,
            _ => {}
        }
    }
}

/// Wait until the memory transport has `count` live subscriptions
pub async fn wait_for_subscribers(source: &GatedSource, count: usize) {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while source.inner.subscriber_count() != count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription was not released");
}

pub fn ids(engine: &WindowEngine) -> Vec<i64> {
    engine.state().rows.iter().map(|r| r.id).collect()
}
