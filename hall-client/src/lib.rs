//! Hall Client - HTTP client for the session backend
//!
//! Wraps the four session operations (start, stop, add item, list active)
//! plus the archive listing behind the [`SessionBackend`] trait.

pub mod config;
pub mod error;
pub mod http;
pub mod sessions;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, FailureKind};
pub use http::HallClient;
pub use sessions::SessionBackend;

// Re-export shared types for convenience
pub use shared::{AddItemRequest, Placement, Session, SessionItem, StartSessionRequest};
