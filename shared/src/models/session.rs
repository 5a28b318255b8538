//! Session Model
//!
//! Mirrors the backend's session record. Prices arrive as JSON numbers and are
//! held as `Decimal` so totals never pick up float noise.

use super::station::Placement;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-of-sale item attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
    pub name: String,
    /// Unit price
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
}

impl SessionItem {
    /// `price * quantity`
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Play session as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque server-assigned id
    pub id: String,
    #[serde(rename = "type")]
    pub placement: Placement,
    /// Display name of the station (not its stable id)
    #[serde(rename = "stationId")]
    pub station_display_name: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Insertion order is display order
    #[serde(default)]
    pub items: Vec<SessionItem>,
    pub is_active: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub play_time_price: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub total_bill: Option<Decimal>,
}

impl Session {
    /// Sum of `price * quantity` over all items
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(SessionItem::line_total).sum()
    }

    /// Whether the backend has closed this session
    pub fn is_closed(&self) -> bool {
        !self.is_active && self.end_time.is_some()
    }

    /// Time played as of `now`, never negative
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.start_time).max(chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_backend_json() {
        let json = r#"{
            "id": "a1b2",
            "type": "COMMON_HALL",
            "stationId": "Зал 1",
            "startTime": "2024-01-01T10:00:00.000Z",
            "items": [{"name": "Cola", "price": 50, "quantity": 2}],
            "isActive": true
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.placement, Placement::SharedHall);
        assert_eq!(session.station_display_name, "Зал 1");
        assert!(session.end_time.is_none());
        assert!(session.total_bill.is_none());
        assert_eq!(session.items[0].price, Decimal::new(50, 0));
        assert_eq!(session.items_total(), Decimal::new(100, 0));
        assert!(!session.is_closed());
    }

    #[test]
    fn test_closed_session_json() {
        let json = r#"{
            "id": "a1b2",
            "type": "CABIN",
            "stationId": "Кабина 2",
            "startTime": "2024-01-01T10:00:00Z",
            "endTime": "2024-01-01T11:30:00Z",
            "items": [],
            "isActive": false,
            "playTimePrice": 150.5,
            "totalBill": 150.5
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();
        assert!(session.is_closed());
        assert_eq!(session.play_time_price, Some(Decimal::new(1505, 1)));
        assert_eq!(session.total_bill, Some(Decimal::new(1505, 1)));

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["playTimePrice"].as_f64(), Some(150.5));
        assert_eq!(value["totalBill"].as_f64(), Some(150.5));
    }

    #[test]
    fn test_elapsed_never_negative() {
        let start: DateTime<Utc> = "2024-01-01T10:00:00Z".parse().unwrap();
        let session = Session {
            id: "s".to_string(),
            placement: Placement::Booth,
            station_display_name: "Кабина 1".to_string(),
            start_time: start,
            end_time: None,
            items: vec![],
            is_active: true,
            play_time_price: None,
            total_bill: None,
        };

        let before = start - chrono::Duration::seconds(30);
        assert_eq!(session.elapsed_at(before), chrono::Duration::zero());
        assert_eq!(
            session.elapsed_at(start + chrono::Duration::seconds(90)),
            chrono::Duration::seconds(90)
        );
    }
}
