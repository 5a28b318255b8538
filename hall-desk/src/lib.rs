//! Hall Desk - operator dashboard core for a game hall
//!
//! Mirrors the backend's active sessions onto the station board, runs the
//! start/stop/add-item flows and renders closed-session summaries.

pub mod config;
pub mod console;
pub mod desk;
pub mod logger;
pub mod notify;
pub mod orchestrator;
pub mod poller;
pub mod presentation;
pub mod summary;
pub mod tasks;
pub mod topology;

pub use config::{ConfigError, DeskConfig};
pub use desk::Desk;
pub use notify::{NoticeLevel, Notification, Notifier, Toasts};
pub use orchestrator::{
    DurationInput, IgnoreReason, ItemDraft, ItemsDialog, Orchestrator, Outcome, StartForm,
    ValidationError,
};
pub use poller::{ActiveSnapshot, Poller, PollerHandle, RefreshRequest};
pub use presentation::{Board, BoardFeed, StationEntry, StationStatus, Transient, TransientFlags};
pub use summary::{SessionSummary, SummaryError};
pub use topology::{StationRegistry, TopologyConfig, TopologyError};
