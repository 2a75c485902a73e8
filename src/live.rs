//! Live tail: tick classification, the tick-to-fetch decision logic, and the
//! owned subscription that forwards a tick transport into the engine inbox.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::sources::TickSource;

/// What a transport event reported
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickKind {
    DataChanged,
    PeerConnected,
    PeerDisconnected,
    Unknown(String),
}

/// An opaque "something changed" notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tick {
    pub kind: TickKind,
}

impl Tick {
    pub fn data_changed() -> Self {
        Self {
            kind: TickKind::DataChanged,
        }
    }

    /// Classify a transport event by name
    pub fn classify(event: &str) -> Self {
        let kind = match event.trim() {
            "got_event" | "data.changed" | "records.changed" => TickKind::DataChanged,
            "peer.connected" => TickKind::PeerConnected,
            "peer.disconnected" => TickKind::PeerDisconnected,
            other => TickKind::Unknown(other.to_string()),
        };
        Self { kind }
    }

    /// Only data changes can affect the window
    pub fn is_relevant(&self) -> bool {
        self.kind == TickKind::DataChanged
    }
}

/// What the engine should do about a tick or a viewport change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickDecision {
    /// Not a data change, or nothing to catch up on
    Ignore,
    /// A fetch is outstanding; re-evaluate once it settles
    Defer,
    /// Re-fetch the head page and merge it
    Merge,
    /// Not at the top: count it, leave the window alone
    Backlog,
}

/// Decides how ticks turn into head fetches.
///
/// Any number of ticks arriving while a fetch is outstanding collapse into a
/// single deferred evaluation.
#[derive(Debug, Default)]
pub struct LiveSignalCoordinator {
    deferred: bool,
    coalesced: u64,
}

impl LiveSignalCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self, tick: &Tick, loading: bool, at_top: bool) -> TickDecision {
        if !tick.is_relevant() {
            tracing::debug!(kind = ?tick.kind, "ignoring irrelevant tick");
            return TickDecision::Ignore;
        }
        if loading {
            self.defer();
            return TickDecision::Defer;
        }
        Self::decide(at_top)
    }

    /// Called when the viewport moves. Catches up on backlogged ticks once the
    /// user is back at the top.
    pub fn on_viewport(&mut self, at_top: bool, pending_new: u32, loading: bool) -> TickDecision {
        if !at_top || pending_new == 0 {
            return TickDecision::Ignore;
        }
        if loading {
            self.defer();
            return TickDecision::Defer;
        }
        TickDecision::Merge
    }

    /// Called after a page fetch of the current generation settles. Returns the
    /// follow-up for any deferred ticks.
    pub fn on_settled(&mut self, at_top: bool) -> Option<TickDecision> {
        if !std::mem::take(&mut self.deferred) {
            return None;
        }
        if self.coalesced > 0 {
            tracing::debug!(coalesced = self.coalesced, "collapsed deferred ticks");
            self.coalesced = 0;
        }
        Some(Self::decide(at_top))
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    fn defer(&mut self) {
        if self.deferred {
            self.coalesced += 1;
        }
        self.deferred = true;
    }

    fn decide(at_top: bool) -> TickDecision {
        if at_top {
            TickDecision::Merge
        } else {
            TickDecision::Backlog
        }
    }
}

/// A running tick transport forwarding into an inbox.
///
/// Owns the forwarding task: dropping the subscription aborts it, which in
/// turn drops the transport's receiver and lets it shut down.
pub struct TickSubscription {
    handle: JoinHandle<()>,
}

impl TickSubscription {
    /// Subscribe to `source` and forward every tick into `inbox` through `wrap`.
    ///
    /// Forwarding never waits for inbox capacity: when the inbox is full the
    /// tick is dropped, since a pending tick already implies a refresh.
    pub async fn attach<E, F>(source: &dyn TickSource, inbox: mpsc::Sender<E>, wrap: F) -> Self
    where
        E: Send + 'static,
        F: Fn(Tick) -> E + Send + 'static,
    {
        let mut ticks = source.subscribe().await;

        let handle = tokio::spawn(async move {
            while let Some(tick) = ticks.recv().await {
                match inbox.try_send(wrap(tick)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::trace!("inbox full, dropping tick");
                    }
                    Err(TrySendError::Closed(_)) => break, // Engine dropped
                }
            }
            tracing::debug!("tick stream ended");
        });

        Self { handle }
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for TickSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
