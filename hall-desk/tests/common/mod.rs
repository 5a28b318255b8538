// hall-desk/tests/common/mod.rs
// In-memory session backend with call counters and hold-open gates

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hall_client::{ClientError, ClientResult, SessionBackend};
use hall_desk::notify::Notification;
use hall_desk::{Orchestrator, Poller, PollerHandle, StationRegistry, TransientFlags, Notifier};
use hall_desk::tasks::ScheduledTask;
use shared::{AddItemRequest, Decimal, Placement, Session, SessionItem, StartSessionRequest};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};

/// Holds a call open until released
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub async fn entered(&self) {
        tokio::time::timeout(Duration::from_secs(2), self.entered.notified())
            .await
            .expect("call never reached the gate");
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[derive(Default)]
pub struct MockBackend {
    pub active: Mutex<Vec<Session>>,
    pub started: Mutex<Vec<StartSessionRequest>>,
    pub added: Mutex<Vec<(String, AddItemRequest)>>,

    pub start_error: Mutex<Option<ClientError>>,
    pub stop_response: Mutex<Option<ClientResult<Session>>>,
    pub add_response: Mutex<Option<ClientResult<Session>>>,
    pub fail_active: AtomicBool,

    pub active_gate: Mutex<Option<Arc<Gate>>>,
    pub stop_gate: Mutex<Option<Arc<Gate>>>,
    pub start_gate: Mutex<Option<Arc<Gate>>>,

    pub start_calls: AtomicU32,
    pub stop_calls: AtomicU32,
    pub add_calls: AtomicU32,
    pub active_calls: AtomicU32,
}

impl MockBackend {
    pub fn with_active(sessions: Vec<Session>) -> Arc<Self> {
        let mock = Self::default();
        *mock.active.lock().unwrap() = sessions;
        Arc::new(mock)
    }

    pub fn gate(slot: &Mutex<Option<Arc<Gate>>>) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *slot.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn set_active(&self, sessions: Vec<Session>) {
        *self.active.lock().unwrap() = sessions;
    }

    pub fn calls(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

fn current_gate(slot: &Mutex<Option<Arc<Gate>>>) -> Option<Arc<Gate>> {
    slot.lock().unwrap().clone()
}

#[async_trait]
impl SessionBackend for MockBackend {
    async fn start(&self, request: StartSessionRequest) -> ClientResult<Session> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().push(request.clone());
        if let Some(gate) = current_gate(&self.start_gate) {
            gate.pass().await;
        }
        if let Some(err) = self.start_error.lock().unwrap().clone() {
            return Err(err);
        }

        let mut created = session(
            "new",
            request.placement,
            &request.station_id,
            request.start_time.unwrap_or_else(Utc::now),
            vec![],
        );
        created.id = format!("s-{}", Self::calls(&self.start_calls));
        self.active.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn stop(&self, session_id: &str) -> ClientResult<Session> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = current_gate(&self.stop_gate) {
            gate.pass().await;
        }
        if let Some(response) = self.stop_response.lock().unwrap().clone() {
            return response;
        }

        let mut active = self.active.lock().unwrap();
        let index = active
            .iter()
            .position(|s| s.id == session_id)
            .ok_or(ClientError::Server {
                status: 404,
                message: Some("Сессия не найдена".into()),
            })?;
        let mut closed = active.remove(index);
        closed.is_active = false;
        closed.end_time = Some(closed.start_time + chrono::Duration::hours(1));
        closed.total_bill = Some(closed.items_total() + Decimal::new(100, 0));
        Ok(closed)
    }

    async fn add_item(&self, session_id: &str, item: AddItemRequest) -> ClientResult<Session> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.added
            .lock()
            .unwrap()
            .push((session_id.to_string(), item));
        self.add_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ClientError::Network("no add response configured".into())))
    }

    async fn list_active(&self) -> ClientResult<Vec<Session>> {
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = current_gate(&self.active_gate) {
            gate.pass().await;
        }
        if self.fail_active.load(Ordering::SeqCst) {
            return Err(ClientError::Network("connection refused".into()));
        }
        Ok(self.active.lock().unwrap().clone())
    }

    async fn list_all(&self) -> ClientResult<Vec<Session>> {
        Ok(self.active.lock().unwrap().clone())
    }
}

pub fn at(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
}

pub fn session(
    id: &str,
    placement: Placement,
    station: &str,
    start: DateTime<Utc>,
    items: Vec<SessionItem>,
) -> Session {
    Session {
        id: id.to_string(),
        placement,
        station_display_name: station.to_string(),
        start_time: start,
        end_time: None,
        items,
        is_active: true,
        play_time_price: None,
        total_bill: None,
    }
}

pub fn item(name: &str, price: i64, quantity: u32) -> SessionItem {
    SessionItem {
        name: name.to_string(),
        price: Decimal::new(price, 0),
        quantity,
    }
}

/// Poll until `cond` holds, failing after two seconds
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub struct Fixture {
    pub orchestrator: Orchestrator,
    pub poller: PollerHandle,
    pub poller_task: ScheduledTask,
    pub flags: Arc<TransientFlags>,
    pub notifications: broadcast::Receiver<Notification>,
}

/// Orchestrator over `backend` with the first snapshot already loaded
///
/// The poll period is long so that only the first fetch and explicit
/// refreshes reach the backend.
pub async fn fixture(backend: Arc<MockBackend>) -> Fixture {
    let registry = Arc::new(StationRegistry::default());
    let (poller, poller_task) =
        Poller::spawn(backend.clone(), registry.clone(), Duration::from_secs(60));
    let snapshot_ready = poller.clone();
    wait_until(move || snapshot_ready.snapshot().is_loaded()).await;

    let flags = TransientFlags::new();
    let notifier = Notifier::new();
    let notifications = notifier.subscribe();
    let orchestrator = Orchestrator::new(backend, registry, poller.clone(), flags.clone(), notifier);

    Fixture {
        orchestrator,
        poller,
        poller_task,
        flags,
        notifications,
    }
}
