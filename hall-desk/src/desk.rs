//! Desk assembly
//!
//! Wires the registry, poller, board feed, notifier and orchestrator together
//! and owns the background tasks. Started once; shut down once.

use crate::config::DeskConfig;
use crate::notify::{Notification, Notifier};
use crate::orchestrator::Orchestrator;
use crate::poller::{Poller, PollerHandle};
use crate::presentation::{Board, BoardFeed, TransientFlags};
use crate::tasks::{BackgroundTasks, TaskKind};
use crate::topology::StationRegistry;
use hall_client::SessionBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

pub struct Desk {
    registry: Arc<StationRegistry>,
    poller: PollerHandle,
    orchestrator: Orchestrator,
    board: watch::Receiver<Arc<Board>>,
    tasks: BackgroundTasks,
    grace: Duration,
}

impl Desk {
    /// Build every component and start the poller and board feed
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: &DeskConfig, backend: Arc<dyn SessionBackend>) -> Self {
        let registry = Arc::new(StationRegistry::new(&config.topology));
        let flags = TransientFlags::new();
        let notifier = Notifier::new();

        let (poller, poller_handle) =
            Poller::new(backend.clone(), registry.clone(), config.poll_interval);
        let (feed, board) = BoardFeed::new(
            registry.clone(),
            poller_handle.clone(),
            flags.clone(),
            config.tick_interval,
        );

        let mut tasks = BackgroundTasks::new();
        tasks.spawn("session_poller", TaskKind::Poller, |token| poller.run(token));
        tasks.spawn("board_feed", TaskKind::Ticker, |token| feed.run(token));

        let orchestrator = Orchestrator::new(
            backend,
            registry.clone(),
            poller_handle.clone(),
            flags,
            notifier,
        );

        tracing::info!(
            stations = registry.all_stations().len(),
            poll_ms = config.poll_interval.as_millis() as u64,
            "Desk started"
        );

        Self {
            registry,
            poller: poller_handle,
            orchestrator,
            board,
            tasks,
            grace: config.shutdown_grace,
        }
    }

    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }

    pub fn poller(&self) -> &PollerHandle {
        &self.poller
    }

    /// Cloneable; actions may run concurrently from spawned tasks
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Latest board
    pub fn board(&self) -> Arc<Board> {
        self.board.borrow().clone()
    }

    pub fn subscribe_board(&self) -> watch::Receiver<Arc<Board>> {
        self.board.clone()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.orchestrator.notifier().subscribe()
    }

    /// Background tasks that died before shutdown
    pub fn check_health(&self) -> usize {
        self.tasks.check_health()
    }

    /// Stop timers and drop any response still in flight
    pub async fn shutdown(self) {
        self.orchestrator.shutdown();
        self.tasks.shutdown(self.grace).await;
        tracing::info!("Desk stopped");
    }
}
