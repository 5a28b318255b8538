//! Session directory operations
//!
//! None of the operations retry. A failure is returned to the caller, which
//! decides how to surface it; `stop` in particular is not idempotent on the
//! backend, so callers must not issue it twice for the same session.

use crate::{ClientError, ClientResult, HallClient};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{AddItemRequest, Session, StartSessionRequest, StopSessionRequest};

/// Remote source of truth for play sessions
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// `POST /sessions/start`
    async fn start(&self, request: StartSessionRequest) -> ClientResult<Session>;

    /// `POST /sessions/stop`; returns the closed session with its bill
    async fn stop(&self, session_id: &str) -> ClientResult<Session>;

    /// `POST /sessions/:id/items`; returns the full updated session
    async fn add_item(&self, session_id: &str, item: AddItemRequest) -> ClientResult<Session>;

    /// `GET /sessions/active`; a complete snapshot, no pagination
    async fn list_active(&self) -> ClientResult<Vec<Session>>;

    /// `GET /sessions`; archive of every session
    async fn list_all(&self) -> ClientResult<Vec<Session>>;
}

/// Shape check for a start request
pub fn validate_start(request: &StartSessionRequest) -> ClientResult<()> {
    if request.station_id.trim().is_empty() {
        return Err(ClientError::Validation("station id must not be empty".into()));
    }
    if request.duration_minutes == Some(0) {
        return Err(ClientError::Validation(
            "duration must be at least one minute".into(),
        ));
    }
    Ok(())
}

/// Shape check for an item: non-empty name, positive price and quantity
pub fn validate_item(item: &AddItemRequest) -> ClientResult<()> {
    if item.name.trim().is_empty() {
        return Err(ClientError::Validation("item name must not be empty".into()));
    }
    if item.price <= Decimal::ZERO {
        return Err(ClientError::Validation(format!(
            "price must be positive, got {}",
            item.price
        )));
    }
    if item.quantity == 0 {
        return Err(ClientError::Validation("quantity must be positive".into()));
    }
    Ok(())
}

fn validate_session_id(session_id: &str) -> ClientResult<()> {
    if session_id.trim().is_empty() {
        return Err(ClientError::Validation("session id must not be empty".into()));
    }
    Ok(())
}

#[async_trait]
impl SessionBackend for HallClient {
    async fn start(&self, request: StartSessionRequest) -> ClientResult<Session> {
        validate_start(&request)?;
        self.post(&["sessions", "start"], &request).await
    }

    async fn stop(&self, session_id: &str) -> ClientResult<Session> {
        validate_session_id(session_id)?;
        let request = StopSessionRequest {
            session_id: session_id.to_string(),
        };
        self.post(&["sessions", "stop"], &request).await
    }

    async fn add_item(&self, session_id: &str, item: AddItemRequest) -> ClientResult<Session> {
        validate_session_id(session_id)?;
        validate_item(&item)?;
        self.post(&["sessions", session_id, "items"], &item).await
    }

    async fn list_active(&self) -> ClientResult<Vec<Session>> {
        self.get(&["sessions", "active"]).await
    }

    async fn list_all(&self) -> ClientResult<Vec<Session>> {
        self.get(&["sessions"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Placement;

    #[test]
    fn test_validate_item() {
        let mut item = AddItemRequest {
            name: "Cola".to_string(),
            price: Decimal::new(50, 0),
            quantity: 2,
        };
        assert!(validate_item(&item).is_ok());

        item.price = Decimal::ZERO;
        assert!(matches!(validate_item(&item), Err(ClientError::Validation(_))));

        item.price = Decimal::new(50, 0);
        item.quantity = 0;
        assert!(matches!(validate_item(&item), Err(ClientError::Validation(_))));

        item.quantity = 1;
        item.name = "   ".to_string();
        assert!(matches!(validate_item(&item), Err(ClientError::Validation(_))));
    }

    #[test]
    fn test_validate_start() {
        let mut request = StartSessionRequest::now(Placement::SharedHall, "Зал 1");
        assert!(validate_start(&request).is_ok());

        request.duration_minutes = Some(0);
        assert!(validate_start(&request).is_err());

        request.duration_minutes = Some(30);
        request.station_id = String::new();
        assert!(validate_start(&request).is_err());
    }
}
