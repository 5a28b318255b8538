//! Shared types for the game hall desk
//!
//! Wire types exchanged with the session backend, the static station model,
//! and the money/time helpers used by both `hall-client` and `hall-desk`.

pub mod error;
pub mod models;
pub mod request;
pub mod util;

// Re-exports
pub use error::ApiErrorBody;
pub use models::{HardwareGeneration, Placement, Session, SessionItem, Station};
pub use request::{AddItemRequest, StartSessionRequest, StopSessionRequest};
pub use rust_decimal::Decimal;
pub use serde::{Deserialize, Serialize};
