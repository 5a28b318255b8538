//! Operator notifications
//!
//! Every user action ends in exactly one notification. Notifications fan out
//! over a broadcast channel; [`Toasts`] keeps the ones still on screen.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Success/error toast with a title and a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Publishes notifications to every subscriber
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) {
        self.publish(NoticeLevel::Success, title.into(), message.into());
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) {
        self.publish(NoticeLevel::Error, title.into(), message.into());
    }

    fn publish(&self, level: NoticeLevel, title: String, message: String) {
        match level {
            NoticeLevel::Success => tracing::info!(title = %title, "{}", message),
            NoticeLevel::Error => tracing::warn!(title = %title, "{}", message),
        }
        let notification = Notification {
            level,
            title,
            message,
            raised_at: Utc::now(),
        };
        // No subscribers is fine: the log line above is the record
        let _ = self.tx.send(notification);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifications still on screen; each expires `ttl` after it was raised
#[derive(Debug)]
pub struct Toasts {
    ttl: chrono::Duration,
    shown: VecDeque<Notification>,
}

impl Toasts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            shown: VecDeque::new(),
        }
    }

    pub fn push(&mut self, notification: Notification) {
        self.shown.push_back(notification);
    }

    /// Drop expired toasts and return the rest, oldest first
    pub fn visible(&mut self, now: DateTime<Utc>) -> impl Iterator<Item = &Notification> {
        let ttl = self.ttl;
        self.shown
            .retain(|n| now.signed_duration_since(n.raised_at) < ttl);
        self.shown.iter()
    }

    pub fn dismiss_all(&mut self) {
        self.shown.clear();
    }
}
