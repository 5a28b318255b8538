//! Data models
//!
//! `Station` is built locally from static configuration; `Session` is owned by
//! the backend and only cached here.

pub mod session;
pub mod station;

// Re-exports
pub use session::*;
pub use station::*;
