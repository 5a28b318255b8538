//! Background task lifecycle
//!
//! Timers (the active-session poll, the elapsed-clock tick) run as owned
//! [`ScheduledTask`]s. Each one is created with its own cancellation token and
//! is torn down through that handle; cancelling only stops future iterations,
//! a request already in flight is left to finish and its result is dropped by
//! the task itself.

use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Kind of background task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Periodic backend fetch
    Poller,
    /// Local clock driving re-renders
    Ticker,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Poller => write!(f, "Poller"),
            TaskKind::Ticker => write!(f, "Ticker"),
        }
    }
}

/// A spawned periodic task and the single handle that cancels it
///
/// Dropping the handle cancels the task as well, so a task can never outlive
/// its owner.
pub struct ScheduledTask {
    name: &'static str,
    kind: TaskKind,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Spawn `body` on the runtime; it receives the token it must watch
    ///
    /// Panics inside the task are caught and logged.
    pub fn spawn<F, Fut>(name: &'static str, kind: TaskKind, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_with_token(name, kind, CancellationToken::new(), body)
    }

    fn spawn_with_token<F, Fut>(
        name: &'static str,
        kind: TaskKind,
        token: CancellationToken,
        body: F,
    ) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let future = body(token.clone());
        let watched = token.clone();
        let wrapped = async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) => {
                    if !watched.is_cancelled() {
                        tracing::warn!(task = %name, kind = %kind, "Background task completed unexpectedly");
                    }
                }
                Err(panic_info) => {
                    let panic_msg: String = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!(task = %name, kind = %kind, panic = %panic_msg, "Background task panicked");
                }
            }
        };

        let handle = tokio::spawn(wrapped);
        tracing::debug!(task = %name, kind = %kind, "Scheduled background task");
        Self {
            name,
            kind,
            token,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Whether the task has exited (cancelled, finished or panicked)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel and wait up to `grace` for the task to exit
    ///
    /// A task still awaiting a response after `grace` is detached rather than
    /// aborted; it discards the late response on its own.
    pub async fn shutdown(mut self, grace: Duration) {
        self.token.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };

        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => tracing::debug!(task = %self.name, "Task stopped"),
            Ok(Err(e)) if e.is_cancelled() => tracing::debug!(task = %self.name, "Task cancelled"),
            Ok(Err(e)) => tracing::error!(task = %self.name, error = ?e, "Task failed"),
            Err(_) => tracing::warn!(
                task = %self.name,
                "Task still waiting on a response after {:?}, detaching",
                grace
            ),
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Group of scheduled tasks sharing one shutdown signal
pub struct BackgroundTasks {
    tasks: Vec<ScheduledTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawn a task whose token is a child of the group's shutdown token
    pub fn spawn<F, Fut>(&mut self, name: &'static str, kind: TaskKind, body: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task =
            ScheduledTask::spawn_with_token(name, kind, self.shutdown.child_token(), body);
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks that exited before shutdown was requested
    pub fn check_health(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.is_finished() && !self.shutdown.is_cancelled())
            .inspect(|task| {
                tracing::error!(task = %task.name, kind = %task.kind, "Background task exited early")
            })
            .count()
    }

    /// Cancel every task once and wait for each within `grace`
    pub async fn shutdown(self, grace: Duration) {
        tracing::info!("Shutting down {} background tasks...", self.tasks.len());
        self.shutdown.cancel();

        for task in self.tasks {
            task.shutdown(grace).await;
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
