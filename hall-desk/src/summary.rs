//! Closed-session summary
//!
//! Read-only view of a stopped session, built straight from the stop response.

use chrono::{Local, TimeZone};
use rust_decimal::Decimal;
use shared::Session;
use shared::util::{money, money_with_currency};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error("Session {0} has no end time")]
    NotClosed(String),
}

/// One purchased item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Display-ready summary of a closed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    pub station_name: String,
    pub placement_label: &'static str,
    pub start_date: String,
    pub start_clock: String,
    pub end_date: String,
    pub end_clock: String,
    /// Whole minutes, rounded half away from zero
    pub duration_minutes: i64,
    pub lines: Vec<SummaryLine>,
    pub items_total: Decimal,
    pub play_time_price: Decimal,
    pub grand_total: Decimal,
}

impl SessionSummary {
    /// Build with dates rendered in the local time zone
    pub fn from_session(session: &Session) -> Result<Self, SummaryError> {
        Self::from_session_in(session, &Local)
    }

    pub fn from_session_in<Tz>(session: &Session, tz: &Tz) -> Result<Self, SummaryError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let end = session
            .end_time
            .ok_or_else(|| SummaryError::NotClosed(session.id.clone()))?;

        let played_ms = (end - session.start_time).num_milliseconds().max(0);
        let duration_minutes = (played_ms + 30_000) / 60_000;

        let lines = session
            .items
            .iter()
            .map(|item| SummaryLine {
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.price,
                line_total: item.line_total(),
            })
            .collect();

        let items_total = session.items_total();
        let grand_total = session.total_bill.unwrap_or_default();
        let play_time_price = session
            .play_time_price
            .unwrap_or(grand_total - items_total);

        let start = session.start_time.with_timezone(tz);
        let end = end.with_timezone(tz);

        Ok(Self {
            session_id: session.id.clone(),
            station_name: session.station_display_name.clone(),
            placement_label: session.placement.label(),
            start_date: start.format("%d.%m.%Y").to_string(),
            start_clock: start.format("%H:%M:%S").to_string(),
            end_date: end.format("%d.%m.%Y").to_string(),
            end_clock: end.format("%H:%M:%S").to_string(),
            duration_minutes,
            lines,
            items_total,
            play_time_price,
            grand_total,
        })
    }

    /// `H ч M мин`, or `M мин` under an hour
    pub fn duration_label(&self) -> String {
        let hours = self.duration_minutes / 60;
        let minutes = self.duration_minutes % 60;
        if hours > 0 {
            format!("{hours} ч {minutes} мин")
        } else {
            format!("{minutes} мин")
        }
    }

    /// Plain-text rendering, one line per row
    pub fn render_lines(&self) -> Vec<String> {
        let mut out = vec![
            format!("Станция: {} ({})", self.station_name, self.placement_label),
            format!("Начало: {} {}", self.start_date, self.start_clock),
            format!("Окончание: {} {}", self.end_date, self.end_clock),
            format!("Длительность: {}", self.duration_label()),
        ];

        if !self.lines.is_empty() {
            out.push("Товары:".to_string());
            for line in &self.lines {
                out.push(format!(
                    "  {} × {} = {}",
                    line.name,
                    line.quantity,
                    money_with_currency(line.line_total)
                ));
            }
            out.push(format!("Сумма товаров: {}", money_with_currency(self.items_total)));
        }

        out.push(format!("Время игры: {}", money_with_currency(self.play_time_price)));
        out.push(format!("Итого: {}", money_with_currency(self.grand_total)));
        out
    }

    pub fn grand_total_display(&self) -> String {
        money(self.grand_total)
    }
}
