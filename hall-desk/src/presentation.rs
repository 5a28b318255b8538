//! Station presentation state
//!
//! A [`Board`] is rebuilt, never patched: every entry is derived from the
//! station, the latest poll snapshot, the local transient flags and the wall
//! clock. The elapsed clock is extrapolated locally between polls.

use crate::poller::{ActiveSnapshot, PollerHandle};
use crate::topology::StationRegistry;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use shared::util::money_with_currency;
use shared::{Placement, Session, Station};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Transient flags
// ============================================================================

/// Action in flight on a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transient {
    Starting,
    Stopping,
    AddingItem,
}

/// Per-station UI-only flags; a station holds at most one at a time
///
/// These flags are the mutual-exclusion mechanism for station actions: a
/// second stop or item-add is refused while one is held.
#[derive(Debug)]
pub struct TransientFlags {
    flags: DashMap<String, Transient>,
    version: watch::Sender<u64>,
}

impl TransientFlags {
    pub fn new() -> Arc<Self> {
        let (version, _) = watch::channel(0);
        Arc::new(Self {
            flags: DashMap::new(),
            version,
        })
    }

    /// Set `state` on `station_id` unless another flag is already set
    ///
    /// The flag is cleared when the returned guard is dropped, whatever path
    /// the caller leaves by.
    pub fn try_acquire(
        self: &Arc<Self>,
        station_id: &str,
        state: Transient,
    ) -> Result<TransientGuard, Transient> {
        match self.flags.entry(station_id.to_string()) {
            Entry::Occupied(held) => Err(*held.get()),
            Entry::Vacant(slot) => {
                slot.insert(state);
                self.bump();
                Ok(TransientGuard {
                    flags: Arc::clone(self),
                    station_id: station_id.to_string(),
                    state,
                })
            }
        }
    }

    pub fn get(&self, station_id: &str) -> Option<Transient> {
        self.flags.get(station_id).map(|flag| *flag)
    }

    /// Receiver notified whenever a flag is set or cleared
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn release(&self, station_id: &str, state: Transient) {
        if self
            .flags
            .remove_if(station_id, |_, held| *held == state)
            .is_some()
        {
            self.bump();
        }
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

/// Clears its flag on drop
#[derive(Debug)]
pub struct TransientGuard {
    flags: Arc<TransientFlags>,
    station_id: String,
    state: Transient,
}

impl TransientGuard {
    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn state(&self) -> Transient {
        self.state
    }
}

impl Drop for TransientGuard {
    fn drop(&mut self) {
        self.flags.release(&self.station_id, self.state);
    }
}

// ============================================================================
// Station entries
// ============================================================================

/// UI-visible station state
///
/// `Idle -> Starting -> Active -> Stopping -> Idle`, with `Active <-> AddingItem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationStatus {
    Idle,
    Starting,
    Active,
    Stopping,
    AddingItem,
}

/// Derived view of one station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationEntry {
    pub station: Station,
    pub session: Option<Session>,
    pub status: StationStatus,
    pub is_stopping: bool,
    /// `HH:MM:SS` since the session started, hours unbounded
    pub elapsed_display: Option<String>,
    pub items_total: Decimal,
}

impl StationEntry {
    pub fn derive(
        registry: &StationRegistry,
        station: &Station,
        snapshot: &ActiveSnapshot,
        flags: &TransientFlags,
        now: DateTime<Utc>,
    ) -> Self {
        let session = registry
            .active_session_for(station, &snapshot.sessions)
            .cloned();
        let flag = flags.get(&station.id);

        let status = match (flag, session.is_some()) {
            (Some(Transient::Stopping), true) => StationStatus::Stopping,
            (Some(Transient::AddingItem), true) => StationStatus::AddingItem,
            (Some(Transient::Starting), false) => StationStatus::Starting,
            (_, true) => StationStatus::Active,
            (_, false) => StationStatus::Idle,
        };

        let elapsed_display = session
            .as_ref()
            .map(|s| format_elapsed(s.elapsed_at(now)));
        let items_total = session
            .as_ref()
            .map(Session::items_total)
            .unwrap_or_default();

        Self {
            station: station.clone(),
            session,
            status,
            is_stopping: flag == Some(Transient::Stopping),
            elapsed_display,
            items_total,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn can_start(&self) -> bool {
        self.status == StationStatus::Idle
    }

    /// Stop and add-item are both disabled while any action is in flight
    pub fn can_stop(&self) -> bool {
        self.status == StationStatus::Active
    }

    pub fn can_add_item(&self) -> bool {
        self.status == StationStatus::Active
    }

    /// Items total, only when there is something to show
    pub fn items_total_display(&self) -> Option<String> {
        (!self.items_total.is_zero()).then(|| money_with_currency(self.items_total))
    }
}

/// Format a duration as `HH:MM:SS`; hours keep counting past 24
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

// ============================================================================
// Board
// ============================================================================

/// Every station's entry at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub entries: Vec<StationEntry>,
    pub rendered_at: DateTime<Utc>,
    pub snapshot_revision: u64,
}

impl Board {
    pub fn build(
        registry: &StationRegistry,
        snapshot: &ActiveSnapshot,
        flags: &TransientFlags,
        now: DateTime<Utc>,
    ) -> Self {
        let entries = registry
            .all_stations()
            .iter()
            .map(|station| StationEntry::derive(registry, station, snapshot, flags, now))
            .collect();

        Self {
            entries,
            rendered_at: now,
            snapshot_revision: snapshot.revision,
        }
    }

    /// Entry by station id; case-insensitive
    pub fn entry(&self, station_id: &str) -> Option<&StationEntry> {
        self.entries
            .iter()
            .find(|e| e.station.id.eq_ignore_ascii_case(station_id))
    }

    pub fn has_active(&self) -> bool {
        self.entries.iter().any(StationEntry::is_active)
    }

    pub fn placement(&self, placement: Placement) -> impl Iterator<Item = &StationEntry> {
        self.entries
            .iter()
            .filter(move |e| e.station.placement == placement)
    }
}

/// Keeps a [`Board`] current: rebuilt on every snapshot or flag change, and
/// once per `tick` while any session is active.
pub struct BoardFeed {
    registry: Arc<StationRegistry>,
    poller: PollerHandle,
    flags: Arc<TransientFlags>,
    tick: Duration,
    board: watch::Sender<Arc<Board>>,
}

impl BoardFeed {
    pub fn new(
        registry: Arc<StationRegistry>,
        poller: PollerHandle,
        flags: Arc<TransientFlags>,
        tick: Duration,
    ) -> (Self, watch::Receiver<Arc<Board>>) {
        let initial = Board::build(&registry, &poller.snapshot(), &flags, Utc::now());
        let (board, board_rx) = watch::channel(Arc::new(initial));
        let feed = Self {
            registry,
            poller,
            flags,
            tick,
            board,
        };
        (feed, board_rx)
    }

    /// Run until `token` is cancelled
    pub async fn run(self, token: CancellationToken) {
        let mut snapshots = self.poller.subscribe();
        let mut flag_changes = self.flags.subscribe();
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = flag_changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if !self.board.borrow().has_active() {
                        continue;
                    }
                }
            }

            let snapshot = snapshots.borrow_and_update().clone();
            self.board.send_replace(Arc::new(Board::build(
                &self.registry,
                &snapshot,
                &self.flags,
                Utc::now(),
            )));
        }

        tracing::debug!("Board feed stopped");
    }
}
