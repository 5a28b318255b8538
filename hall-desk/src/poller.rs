//! Active-session poller
//!
//! Sole writer of the active-session snapshot. Fetches `GET /sessions/active`
//! on a fixed period; a manual refresh is folded into the same loop, so at most
//! one fetch is ever outstanding.
//!
//! ```text
//! Idle --(tick | refresh)--> Fetching --(ok: publish | err: keep, log)--> Idle
//! ```
//!
//! A refresh requested while a fetch is in flight is dropped: the in-flight
//! result is treated as fresh enough. A manual fetch also pushes the next
//! scheduled tick one full period out.

use crate::tasks::{ScheduledTask, TaskKind};
use crate::topology::StationRegistry;
use chrono::{DateTime, Utc};
use hall_client::SessionBackend;
use shared::Session;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Last successfully fetched set of active sessions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSnapshot {
    /// Sessions in backend order
    pub sessions: Vec<Session>,
    /// Bumped on every publish; 0 means nothing fetched yet
    pub revision: u64,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ActiveSnapshot {
    pub fn is_loaded(&self) -> bool {
        self.revision > 0
    }
}

/// What happened to a refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRequest {
    /// A fetch will start on the next loop turn
    Queued,
    /// Another request is already queued
    Coalesced,
    /// A fetch is running; its result stands in for this request
    InFlight,
    /// The poller has been torn down
    Stopped,
}

/// Cheap, cloneable view of the poller for readers and refresh callers
#[derive(Debug, Clone)]
pub struct PollerHandle {
    snapshot: watch::Receiver<Arc<ActiveSnapshot>>,
    refresh: mpsc::Sender<()>,
    in_flight: Arc<AtomicBool>,
    failures: Arc<AtomicU32>,
}

impl PollerHandle {
    /// Current snapshot
    pub fn snapshot(&self) -> Arc<ActiveSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<Arc<ActiveSnapshot>> {
        self.snapshot.clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Polls that failed since the last successful one
    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Ask for an out-of-schedule fetch
    pub fn request_refresh(&self) -> RefreshRequest {
        if self.refresh.is_closed() {
            return RefreshRequest::Stopped;
        }
        if self.is_fetching() {
            tracing::debug!("Refresh requested during an in-flight poll, ignoring");
            return RefreshRequest::InFlight;
        }
        match self.refresh.try_send(()) {
            Ok(()) => RefreshRequest::Queued,
            Err(mpsc::error::TrySendError::Full(())) => RefreshRequest::Coalesced,
            Err(mpsc::error::TrySendError::Closed(())) => RefreshRequest::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Scheduled,
    Manual,
}

/// Poll loop state, owned by the spawned task
pub struct Poller {
    backend: Arc<dyn SessionBackend>,
    registry: Arc<StationRegistry>,
    interval: Duration,
    snapshot: watch::Sender<Arc<ActiveSnapshot>>,
    refresh: mpsc::Receiver<()>,
    in_flight: Arc<AtomicBool>,
    failures: Arc<AtomicU32>,
}

impl Poller {
    /// Create the poller and its handle without starting it
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        registry: Arc<StationRegistry>,
        interval: Duration,
    ) -> (Self, PollerHandle) {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(ActiveSnapshot::default()));
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let in_flight = Arc::new(AtomicBool::new(false));
        let failures = Arc::new(AtomicU32::new(0));

        let handle = PollerHandle {
            snapshot: snapshot_rx,
            refresh: refresh_tx,
            in_flight: in_flight.clone(),
            failures: failures.clone(),
        };
        let poller = Self {
            backend,
            registry,
            interval,
            snapshot: snapshot_tx,
            refresh: refresh_rx,
            in_flight,
            failures,
        };
        (poller, handle)
    }

    /// Create and start the poller; the first fetch happens immediately
    pub fn spawn(
        backend: Arc<dyn SessionBackend>,
        registry: Arc<StationRegistry>,
        interval: Duration,
    ) -> (PollerHandle, ScheduledTask) {
        let (poller, handle) = Self::new(backend, registry, interval);
        let task = ScheduledTask::spawn("session_poller", TaskKind::Poller, |token| {
            poller.run(token)
        });
        (handle, task)
    }

    /// Run until `token` is cancelled
    pub async fn run(mut self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let trigger = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => Trigger::Scheduled,
                Some(()) = self.refresh.recv() => Trigger::Manual,
            };

            self.in_flight.store(true, Ordering::SeqCst);
            // Requests queued before this fetch started are answered by it
            while self.refresh.try_recv().is_ok() {}
            if trigger == Trigger::Manual {
                ticker.reset();
            }

            self.fetch_once(&token).await;
            self.in_flight.store(false, Ordering::SeqCst);
        }

        tracing::debug!("Session poller stopped");
    }

    async fn fetch_once(&self, token: &CancellationToken) {
        let result = self.backend.list_active().await;

        if token.is_cancelled() {
            tracing::debug!("Discarding poll result that arrived after teardown");
            return;
        }

        match result {
            Ok(sessions) => {
                for station in self.registry.duplicate_join_keys(&sessions) {
                    tracing::warn!(
                        station = %station,
                        "Snapshot has more than one active session for a station, showing the first"
                    );
                }

                let recovered = self.failures.swap(0, Ordering::SeqCst);
                if recovered > 0 {
                    tracing::info!(failed_polls = recovered, "Active-session poll recovered");
                }

                let revision = self.snapshot.borrow().revision + 1;
                self.snapshot.send_replace(Arc::new(ActiveSnapshot {
                    sessions,
                    revision,
                    fetched_at: Some(Utc::now()),
                }));
            }
            Err(e) => {
                let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::warn!(
                    error = %e,
                    consecutive = failures,
                    "Active-session poll failed, keeping previous snapshot"
                );
            }
        }
    }
}
