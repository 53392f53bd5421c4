//! `FeedSession` — the connection-independent heart of the feed client.
//!
//! Composes the Interest Set, Reconnection Coordinator and Event Dispatcher
//! behind one lock, so every read-then-write of shared state happens inside a
//! single exclusion domain. The transport drives it:
//!
//! ```text
//! connect ─▶ handshake() ─▶ write init
//! frame   ─▶ receive(text) ─▶ write frame.replay() ─▶ apply(frame)
//! error   ─▶ on_transport_error(reason) ─▶ wait, reconnect
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::build_id::BuildWatcher;
use crate::config::FeedConfig;
use crate::coordinator::{ReconnectionCoordinator, Resume};
use crate::dispatcher::EventDispatcher;
use crate::error::FeedError;
use crate::frame::{classify, FeedEvent};
use crate::interest::InterestSet;
use crate::intent::Intent;
use crate::metrics::FeedMetrics;
use crate::sink::StateSink;
use crate::state::ConnectionState;

/// A received frame, classified but not yet dispatched.
#[derive(Debug)]
pub struct PendingFrame {
    replay: Vec<Intent>,
    events: Vec<FeedEvent>,
    restored: bool,
}

impl PendingFrame {
    /// Intents to send before this frame is applied.
    pub fn replay(&self) -> &[Intent] {
        &self.replay
    }

    pub fn events(&self) -> &[FeedEvent] {
        &self.events
    }

    /// `true` if this frame ended an offline period.
    pub fn is_restore(&self) -> bool {
        self.restored
    }
}

struct SessionInner {
    interests: InterestSet,
    coordinator: ReconnectionCoordinator,
    dispatcher: EventDispatcher,
    metrics: FeedMetrics,
}

/// Shared session state. Cheap to clone; all clones see the same state.
#[derive(Clone)]
pub struct FeedSession {
    inner: Arc<Mutex<SessionInner>>,
    sink: Arc<dyn StateSink>,
}

impl FeedSession {
    pub fn new(config: &FeedConfig, sink: Arc<dyn StateSink>) -> Self {
        let build = BuildWatcher::new(config.reload_min_delay_ms, config.reload_jitter_ms);
        let inner = SessionInner {
            interests: InterestSet::new(),
            coordinator: ReconnectionCoordinator::new(),
            dispatcher: EventDispatcher::new(Arc::clone(&sink), build),
            metrics: FeedMetrics::default(),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The first frame written on every new connection.
    pub fn handshake(&self) -> Intent {
        Intent::Init
    }

    /// Classify an inbound frame and run the reconnect check-and-clear.
    ///
    /// Text that is not a JSON object yields no events but still counts as
    /// proof that the connection is alive.
    pub fn receive(&self, text: &str) -> PendingFrame {
        let events = classify(text).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "ignoring frame that is not a JSON object");
            Vec::new()
        });

        let mut inner = self.lock();
        inner.metrics.frames_received += 1;
        if events.is_empty() {
            inner.metrics.frames_ignored += 1;
        }

        let SessionInner {
            interests,
            coordinator,
            metrics,
            ..
        } = &mut *inner;
        match coordinator.on_frame(interests) {
            Resume::Steady => PendingFrame {
                replay: Vec::new(),
                events,
                restored: false,
            },
            Resume::Opened => {
                tracing::info!("feed open");
                PendingFrame {
                    replay: Vec::new(),
                    events,
                    restored: false,
                }
            }
            Resume::Restored(replay) => {
                metrics.replays += 1;
                tracing::info!(intents = replay.len(), "connection restored, replaying interests");
                PendingFrame {
                    replay,
                    events,
                    restored: true,
                }
            }
        }
    }

    /// Dispatch a received frame. Call after its replay intents were sent.
    pub fn apply(&self, frame: PendingFrame) {
        if frame.restored {
            self.sink.set_offline(false);
        }
        let mut inner = self.lock();
        let SessionInner {
            interests,
            dispatcher,
            metrics,
            ..
        } = &mut *inner;
        for event in frame.events {
            dispatcher.dispatch(event, interests, metrics);
        }
    }

    /// Record a transport failure and tell consumers the feed is offline.
    pub fn on_transport_error(&self, error: &FeedError) {
        let previous = {
            let mut inner = self.lock();
            inner.metrics.transport_failures += 1;
            inner.coordinator.on_transport_error()
        };
        tracing::warn!(error = %error, previous = %previous, "feed offline");
        self.sink.set_offline(true);
    }

    /// Declare the wanted push categories and keep them as the replay baseline.
    pub fn want(&self, categories: Vec<String>) -> Intent {
        self.lock().interests.set_want(categories.clone());
        Intent::Want(categories)
    }

    /// Track a transaction, replacing any previously tracked one.
    pub fn track_transaction(&self, txid: impl Into<String>) -> Intent {
        let txid = txid.into();
        self.lock().interests.track_transaction(txid.clone());
        Intent::TrackTransaction(txid)
    }

    /// Track an address, replacing any previously tracked one.
    pub fn track_address(&self, address: impl Into<String>) -> Intent {
        let address = address.into();
        self.lock().interests.track_address(address.clone());
        Intent::TrackAddress(address)
    }

    /// Fire-and-forget request; nothing is recorded for replay.
    pub fn historical_statistics(&self, date: impl Into<String>) -> Intent {
        Intent::HistoricalStatistics(date.into())
    }

    /// Count an intent that was dropped because no connection was up.
    pub fn note_dropped(&self, intent: &Intent) {
        tracing::debug!(intent = intent.kind(), "offline, dropping intent");
        self.lock().metrics.intents_dropped += 1;
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().coordinator.state()
    }

    /// Snapshot of the current Interest Set.
    pub fn interests(&self) -> InterestSet {
        self.lock().interests.clone()
    }

    pub fn metrics(&self) -> FeedMetrics {
        self.lock().metrics.clone()
    }
}
