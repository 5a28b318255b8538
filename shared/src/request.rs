//! Request bodies sent to the session backend

use crate::models::Placement;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// `POST /sessions/start`
///
/// `station_id` carries the station's display name, which is what the backend
/// stores and what active sessions are joined on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    #[serde(rename = "type")]
    pub placement: Placement,
    pub station_id: String,
    /// Omitted means "now" on the backend
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::util::iso_millis::serialize"
    )]
    pub start_time: Option<DateTime<Utc>>,
    /// Backend auto-closes the session after this many minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl StartSessionRequest {
    /// Open-ended session starting now
    pub fn now(placement: Placement, station_display_name: impl Into<String>) -> Self {
        Self {
            placement,
            station_id: station_display_name.into(),
            start_time: None,
            duration_minutes: None,
        }
    }
}

/// `POST /sessions/stop`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSessionRequest {
    pub session_id: String,
}

/// `POST /sessions/:id/items`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddItemRequest {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_request_with_time_and_duration() {
        let request = StartSessionRequest {
            placement: Placement::SharedHall,
            station_id: "Зал 1".to_string(),
            start_time: Some("2024-01-01T10:00:00Z".parse().unwrap()),
            duration_minutes: Some(30),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "COMMON_HALL",
                "stationId": "Зал 1",
                "startTime": "2024-01-01T10:00:00.000Z",
                "durationMinutes": 30
            })
        );
    }

    #[test]
    fn test_start_request_now_omits_optional_fields() {
        let request = StartSessionRequest::now(Placement::Booth, "Кабина 3");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "type": "CABIN", "stationId": "Кабина 3" })
        );
    }

    #[test]
    fn test_stop_request_field_name() {
        let value = serde_json::to_value(StopSessionRequest {
            session_id: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({ "sessionId": "abc" }));
    }

    #[test]
    fn test_add_item_price_is_a_json_number() {
        let request = AddItemRequest {
            name: "Cola".to_string(),
            price: Decimal::new(50, 0),
            quantity: 2,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "name": "Cola", "price": 50.0, "quantity": 2 })
        );

        let fractional = AddItemRequest {
            price: Decimal::new(125, 1),
            ..request
        };
        let value = serde_json::to_value(&fractional).unwrap();
        assert_eq!(value["price"].as_f64(), Some(12.5));
    }
}
