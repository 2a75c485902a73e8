//! The window engine: owns the window, the filter set and the viewport flags,
//! and turns user actions, viewport reports and ticks into fetches.
//!
//! Fetches run on spawned tasks and come back through the engine's inbox as
//! [`EngineEvent::Fetched`]. The owner drains the inbox and feeds each event to
//! [`WindowEngine::handle`]; all window mutation happens there, on one task.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::error::FetchResult;
use crate::filter::{Filter, FilterSet};
use crate::flash;
use crate::live::{LiveSignalCoordinator, Tick, TickDecision, TickSubscription};
use crate::paginator::{Page, Paginator};
use crate::record::Row;
use crate::sources::{MarkerUpdate, RecordSource, TickSource};
use crate::viewport::{ViewportPosition, ViewportReport, ViewportTracker};
use crate::window::{FetchMode, WindowState};

/// Messages delivered to the engine inbox
#[derive(Debug)]
pub enum EngineEvent {
    Fetched(FetchOutcome),
    Tick(Tick),
}

/// Result of a spawned fetch, tagged with the generation it was issued under
#[derive(Debug)]
pub struct FetchOutcome {
    pub generation: u64,
    pub ticket: u64,
    pub payload: Payload,
}

#[derive(Debug)]
pub enum Payload {
    Page {
        mode: FetchMode,
        result: FetchResult<Page>,
    },
    Total(FetchResult<u64>),
    /// Re-read of a row after a marker write
    Marker {
        id: i64,
        result: FetchResult<Option<Row>>,
    },
}

/// What handling an inbox event did to the engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Handled {
    /// A page landed in the window
    Applied(FetchMode),
    /// A page fetch failed; rows are untouched
    Failed(FetchMode),
    /// Result of a superseded fetch, dropped
    Discarded,
    /// The total aggregate was refreshed (or failed to)
    Total,
    /// A row was re-read after a marker write
    Patched,
    Tick(TickDecision),
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    ticket: u64,
    mode: FetchMode,
}

pub struct WindowEngine {
    paginator: Paginator,
    filters: FilterSet,
    window: WindowState,
    viewport: ViewportTracker,
    live: LiveSignalCoordinator,
    /// Bumped on every replace; older results are discarded on arrival
    generation: u64,
    /// The page fetch of the current generation, if any
    in_flight: Option<InFlight>,
    next_ticket: u64,
    /// Spawned fetches of any kind and generation not yet handled
    outstanding: usize,
    inbox: mpsc::Sender<EngineEvent>,
    changes: watch::Sender<u64>,
    ticks: Option<TickSubscription>,
}

impl WindowEngine {
    /// Create an engine over `source`. The returned receiver is the engine's
    /// inbox; every event read from it must be passed back to [`Self::handle`].
    pub fn new(
        source: Arc<dyn RecordSource>,
        config: &Config,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (inbox, events) = mpsc::channel(config.channel_buffer.max(1));
        let (changes, _) = watch::channel(0);
        tracing::debug!(
            source = %source.name(),
            page_limit = config.page_limit,
            overscan = config.overscan,
            "window engine created"
        );

        let engine = Self {
            paginator: Paginator::new(source, config.page_limit),
            filters: FilterSet::new(),
            window: WindowState::new(),
            viewport: ViewportTracker::new(config.overscan),
            live: LiveSignalCoordinator::new(),
            generation: 0,
            in_flight: None,
            next_ticket: 0,
            outstanding: 0,
            inbox,
            changes,
            ticks: None,
        };
        (engine, events)
    }

    /// Start from a previously saved filter set. Does not fetch.
    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub fn state(&self) -> &WindowState {
        &self.window
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn position(&self) -> ViewportPosition {
        self.viewport.position()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source_name(&self) -> String {
        self.paginator.source().name()
    }

    /// A page fetch is loading or some other fetch has not reported back yet
    pub fn is_busy(&self) -> bool {
        self.window.loading || self.outstanding > 0
    }

    /// Observe state changes. The value is a revision counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    /// Add or replace a filter and reload from the head
    pub fn apply_filter(&mut self, filter: Filter) -> bool {
        let changed = self.filters.add(filter);
        self.filters_changed();
        changed
    }

    /// Remove the filter at `index`. Out of range is a no-op.
    pub fn remove_filter(&mut self, index: usize) -> Option<Filter> {
        let removed = self.filters.remove(index)?;
        self.filters_changed();
        Some(removed)
    }

    pub fn clear_filters(&mut self) -> bool {
        if !self.filters.clear() {
            return false;
        }
        self.filters_changed();
        true
    }

    /// Reload the window from the head, superseding anything in flight
    pub fn refresh(&mut self) {
        self.replace();
    }

    /// Fetch the next older page. No-op while loading or at the end.
    pub fn load_more(&mut self) -> bool {
        if self.window.loading {
            tracing::trace!("load more ignored, fetch outstanding");
            return false;
        }
        if !self.window.can_load_more() {
            return false;
        }
        self.fetch_page(FetchMode::Append);
        true
    }

    /// Feed a visible range from the render layer
    pub fn report_viewport(&mut self, report: ViewportReport) -> bool {
        let changed = self.viewport.update(report);
        let position = self.viewport.position();

        if position.at_bottom && !position.at_top && self.window.has_more {
            self.load_more();
        }

        let decision = self.live.on_viewport(
            position.at_top,
            self.window.pending_new,
            self.window.loading,
        );
        if decision == TickDecision::Merge {
            tracing::debug!(pending_new = self.window.pending_new, "catching up at top");
            self.merge_head();
        }

        if changed {
            self.notify();
        }
        changed
    }

    pub fn handle_tick(&mut self, tick: Tick) -> TickDecision {
        let decision = self
            .live
            .on_tick(&tick, self.window.loading, self.viewport.at_top());
        self.act(decision);
        decision
    }

    /// Write a marker change and patch the row in place once re-read
    pub fn update_marker(&mut self, id: i64, update: MarkerUpdate) {
        if update.is_empty() {
            return;
        }
        let source = Arc::clone(self.paginator.source());
        self.spawn(async move {
            let result = match source.update_marker(id, &update).await {
                Ok(()) => source.fetch_row(id).await,
                Err(e) => Err(e),
            };
            Payload::Marker { id, result }
        });
    }

    /// Forward ticks from `source` into the inbox, replacing any previous transport
    pub async fn attach_ticks(&mut self, source: &dyn TickSource) {
        self.ticks = None;
        let subscription =
            TickSubscription::attach(source, self.inbox.clone(), EngineEvent::Tick).await;
        self.ticks = Some(subscription);
    }

    pub fn detach_ticks(&mut self) {
        self.ticks = None;
    }

    /// A tick transport is attached and still running
    pub fn is_live(&self) -> bool {
        self.ticks.as_ref().is_some_and(TickSubscription::is_active)
    }

    pub fn handle(&mut self, event: EngineEvent) -> Handled {
        match event {
            EngineEvent::Tick(tick) => Handled::Tick(self.handle_tick(tick)),
            EngineEvent::Fetched(outcome) => self.complete(outcome),
        }
    }

    fn complete(&mut self, outcome: FetchOutcome) -> Handled {
        self.outstanding = self.outstanding.saturating_sub(1);

        if outcome.generation != self.generation {
            tracing::trace!(
                generation = outcome.generation,
                current = self.generation,
                ticket = outcome.ticket,
                "discarding stale result"
            );
            return Handled::Discarded;
        }

        match outcome.payload {
            Payload::Page { mode, result } => self.complete_page(outcome.ticket, mode, result),
            Payload::Total(result) => {
                match result {
                    Ok(total) => self.window.total = Some(total),
                    Err(e) => tracing::warn!(error = %e, "total refresh failed"),
                }
                self.notify();
                Handled::Total
            }
            Payload::Marker { id, result } => {
                match result {
                    Ok(Some(row)) => {
                        if !self.window.patch_row(row) {
                            tracing::trace!(id, "marked row not in window");
                        }
                    }
                    Ok(None) => tracing::debug!(id, "marked row vanished"),
                    Err(e) => {
                        tracing::warn!(id, error = %e, "marker update failed");
                        self.window.error = Some(e);
                    }
                }
                self.notify();
                Handled::Patched
            }
        }
    }

    fn complete_page(&mut self, ticket: u64, mode: FetchMode, result: FetchResult<Page>) -> Handled {
        match self.in_flight {
            Some(in_flight) if in_flight.ticket == ticket => {}
            _ => {
                tracing::trace!(ticket, mode = mode.name(), "discarding unmatched page");
                return Handled::Discarded;
            }
        }
        self.in_flight = None;
        self.window.loading = false;

        let handled = match result {
            Ok(page) => {
                tracing::debug!(
                    mode = mode.name(),
                    rows = page.rows.len(),
                    has_more = page.has_more,
                    "applying page"
                );
                match mode {
                    FetchMode::Replace => self.window.replace(page),
                    FetchMode::Append => {
                        self.window.append(page);
                    }
                    FetchMode::Merge => self.window.merge(page, flash::now_ms()),
                }
                Handled::Applied(mode)
            }
            Err(e) => {
                tracing::warn!(mode = mode.name(), error = %e, code = e.code(), "fetch failed");
                self.window.error = Some(e);
                Handled::Failed(mode)
            }
        };

        if let Some(decision) = self.live.on_settled(self.viewport.at_top()) {
            self.act(decision);
        }
        self.notify();
        handled
    }

    fn act(&mut self, decision: TickDecision) {
        match decision {
            TickDecision::Merge => self.merge_head(),
            TickDecision::Backlog => {
                self.window.pending_new = self.window.pending_new.saturating_add(1);
                self.notify();
            }
            TickDecision::Defer | TickDecision::Ignore => {}
        }
    }

    fn filters_changed(&mut self) {
        self.window.total = None;
        self.replace();
    }

    fn replace(&mut self) {
        self.generation += 1;
        self.in_flight = None;
        self.fetch_page(FetchMode::Replace);
        self.refresh_total();
    }

    fn merge_head(&mut self) {
        self.fetch_page(FetchMode::Merge);
        self.refresh_total();
    }

    fn fetch_page(&mut self, mode: FetchMode) {
        let cursor = match mode {
            FetchMode::Append => self.window.cursor,
            FetchMode::Replace | FetchMode::Merge => None,
        };
        let filters = self.filters.list().to_vec();
        let paginator = self.paginator.clone();

        self.window.loading = true;
        let ticket = self.spawn(async move {
            let result = paginator.fetch(&filters, cursor).await;
            Payload::Page { mode, result }
        });
        self.in_flight = Some(InFlight { ticket, mode });
        tracing::debug!(
            mode = mode.name(),
            generation = self.generation,
            ticket,
            ?cursor,
            "fetch issued"
        );
        self.notify();
    }

    fn refresh_total(&mut self) {
        let filters = self.filters.list().to_vec();
        let paginator = self.paginator.clone();
        self.spawn(async move { Payload::Total(paginator.total(&filters).await) });
    }

    fn spawn<F>(&mut self, work: F) -> u64
    where
        F: Future<Output = Payload> + Send + 'static,
    {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.outstanding += 1;

        let generation = self.generation;
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            let payload = work.await;
            let outcome = FetchOutcome {
                generation,
                ticket,
                payload,
            };
            // Send fails only once the engine is gone
            let _ = inbox.send(EngineEvent::Fetched(outcome)).await;
        });
        ticket
    }

    fn notify(&self) {
        self.changes.send_modify(|revision| *revision += 1);
    }
}
