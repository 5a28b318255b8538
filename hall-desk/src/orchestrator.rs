//! Session lifecycle orchestrator
//!
//! Turns operator actions into backend calls. Every remote failure is caught
//! here and becomes a notification plus an [`Outcome::Failed`]; nothing is
//! written to the active-session snapshot, which only the poller updates.
//!
//! Per-station exclusion comes from [`TransientFlags`]: an action holds its
//! flag for the whole round trip and the guard clears it on every exit path.
//! Responses arriving after [`Orchestrator::shutdown`] are dropped.

use crate::notify::Notifier;
use crate::poller::{PollerHandle, RefreshRequest};
use crate::presentation::{Transient, TransientFlags, TransientGuard};
use crate::summary::SessionSummary;
use crate::topology::StationRegistry;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use hall_client::{ClientError, FailureKind, SessionBackend};
use rust_decimal::Decimal;
use shared::util::money_with_currency;
use shared::{AddItemRequest, Session, SessionItem, StartSessionRequest, Station};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const TITLE_ERROR: &str = "Ошибка";
const TITLE_VALIDATION: &str = "Ошибка валидации";

// ============================================================================
// Outcomes
// ============================================================================

/// Why an action was not attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownStation(String),
    /// Another action on the station is still in flight
    StationBusy(Transient),
    AlreadyActive,
    NoActiveSession,
    DialogClosed,
    ShuttingDown,
}

/// Result of an operator action; never an `Err`
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    /// Nothing was sent and nothing was shown
    Ignored(IgnoreReason),
    /// Rejected before any network call
    Invalid(ValidationError),
    Failed(ClientError),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Ignored(reason) => Outcome::Ignored(reason),
            Outcome::Invalid(err) => Outcome::Invalid(err),
            Outcome::Failed(err) => Outcome::Failed(err),
        }
    }
}

// ============================================================================
// Forms
// ============================================================================

/// Client-side form validation failure; the text is shown to the operator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Пожалуйста, заполните все поля")]
    MissingFields,
    #[error("Цена должна быть больше нуля")]
    InvalidPrice,
    #[error("Количество должно быть целым числом не меньше 1")]
    InvalidQuantity,
    #[error("Часы должны быть от 0 до 23")]
    HoursOutOfRange,
    #[error("Минуты должны быть от 0 до 59")]
    MinutesOutOfRange,
    #[error("Длительность должна быть больше нуля")]
    EmptyDuration,
    #[error("Длительность указывается в формате Ч:ММ")]
    DurationFormat,
    #[error("Некорректное время начала")]
    InvalidStartTime,
}

/// Requested session length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationInput {
    pub hours: u32,
    pub minutes: u32,
}

impl DurationInput {
    pub fn new(hours: u32, minutes: u32) -> Self {
        Self { hours, minutes }
    }

    pub fn validate(&self) -> Result<u32, ValidationError> {
        if self.hours > 23 {
            return Err(ValidationError::HoursOutOfRange);
        }
        if self.minutes > 59 {
            return Err(ValidationError::MinutesOutOfRange);
        }
        let total = self.hours * 60 + self.minutes;
        if total == 0 {
            return Err(ValidationError::EmptyDuration);
        }
        Ok(total)
    }

    /// Parse `H:MM`; range checks are left to [`DurationInput::validate`]
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let (hours, minutes) = text
            .trim()
            .split_once(':')
            .ok_or(ValidationError::DurationFormat)?;
        let hours = hours
            .trim()
            .parse()
            .map_err(|_| ValidationError::DurationFormat)?;
        let minutes = minutes
            .trim()
            .parse()
            .map_err(|_| ValidationError::DurationFormat)?;
        Ok(Self { hours, minutes })
    }
}

impl Default for DurationInput {
    fn default() -> Self {
        Self::new(0, 30)
    }
}

/// Start-with-parameters dialog state
///
/// `start_at` is wall-clock local time; `None` lets the backend use "now".
/// `duration: None` is an open-ended session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartForm {
    pub start_at: Option<NaiveDateTime>,
    pub duration: Option<DurationInput>,
}

/// Validated start parameters, ready for the request body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartParams {
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
}

impl StartForm {
    /// Accepts `YYYY-MM-DDTHH:MM` or `YYYY-MM-DD HH:MM`
    pub fn parse_local(text: &str) -> Result<NaiveDateTime, ValidationError> {
        let text = text.trim();
        ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .ok_or(ValidationError::InvalidStartTime)
    }

    pub fn validate(&self) -> Result<StartParams, ValidationError> {
        self.validate_in(&Local)
    }

    /// Validate, interpreting `start_at` in `tz`
    pub fn validate_in<Tz: TimeZone>(&self, tz: &Tz) -> Result<StartParams, ValidationError> {
        let duration_minutes = self.duration.map(|d| d.validate()).transpose()?;
        let start_time = self
            .start_at
            .map(|local| {
                tz.from_local_datetime(&local)
                    .earliest()
                    .map(|ts| ts.with_timezone(&Utc))
                    .ok_or(ValidationError::InvalidStartTime)
            })
            .transpose()?;

        Ok(StartParams {
            start_time,
            duration_minutes,
        })
    }

    /// Planned end in local wall-clock time, when both ends are known
    pub fn end_preview(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let minutes = self.duration?.validate().ok()?;
        let start = self.start_at.unwrap_or(now);
        Some(start + chrono::Duration::minutes(i64::from(minutes)))
    }
}

impl Default for StartForm {
    fn default() -> Self {
        Self {
            start_at: None,
            duration: Some(DurationInput::default()),
        }
    }
}

/// Add-item form as typed by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub name: String,
    pub price: String,
    pub quantity: String,
}

impl ItemDraft {
    pub fn new(
        name: impl Into<String>,
        price: impl Into<String>,
        quantity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            quantity: quantity.into(),
        }
    }

    pub fn validate(&self) -> Result<AddItemRequest, ValidationError> {
        let name = self.name.trim();
        let price = self.price.trim();
        let quantity = self.quantity.trim();
        if name.is_empty() || price.is_empty() || quantity.is_empty() {
            return Err(ValidationError::MissingFields);
        }

        let price = Decimal::from_str(&price.replace(',', "."))
            .map_err(|_| ValidationError::InvalidPrice)?;
        if price <= Decimal::ZERO {
            return Err(ValidationError::InvalidPrice);
        }

        let quantity: u32 = quantity
            .parse()
            .map_err(|_| ValidationError::InvalidQuantity)?;
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity);
        }

        Ok(AddItemRequest {
            name: name.to_string(),
            price,
            quantity,
        })
    }
}

impl Default for ItemDraft {
    fn default() -> Self {
        Self::new("", "", "1")
    }
}

// ============================================================================
// Items dialog
// ============================================================================

/// Open add-item dialog for one station
///
/// Holds the station's `AddingItem` flag while open, so the station cannot be
/// stopped underneath it. Dropping the dialog closes it.
#[derive(Debug)]
pub struct ItemsDialog {
    station: Station,
    session_id: String,
    items: Vec<SessionItem>,
    guard: Option<TransientGuard>,
}

impl ItemsDialog {
    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current items, read-only
    pub fn items(&self) -> &[SessionItem] {
        &self.items
    }

    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(SessionItem::line_total).sum()
    }

    pub fn is_open(&self) -> bool {
        self.guard.is_some()
    }

    pub fn close(&mut self) {
        self.guard = None;
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn SessionBackend>,
    registry: Arc<StationRegistry>,
    poller: PollerHandle,
    flags: Arc<TransientFlags>,
    notifier: Notifier,
    alive: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        registry: Arc<StationRegistry>,
        poller: PollerHandle,
        flags: Arc<TransientFlags>,
        notifier: Notifier,
    ) -> Self {
        Self {
            backend,
            registry,
            poller,
            flags,
            notifier,
            alive: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }

    pub fn flags(&self) -> &Arc<TransientFlags> {
        &self.flags
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Start an open-ended session now
    pub async fn start(&self, station_id: &str) -> Outcome<Session> {
        self.start_session(station_id, StartParams::default()).await
    }

    /// Validate the form, then start
    pub async fn start_with_params(&self, station_id: &str, form: &StartForm) -> Outcome<Session> {
        match form.validate() {
            Ok(params) => self.start_session(station_id, params).await,
            Err(err) => self.invalid(err),
        }
    }

    async fn start_session(&self, station_id: &str, params: StartParams) -> Outcome<Session> {
        let station = match self.idle_station(station_id) {
            Ok(station) => station,
            Err(reason) => return ignored(station_id, reason),
        };
        let _guard = match self.flags.try_acquire(&station.id, Transient::Starting) {
            Ok(guard) => guard,
            Err(held) => return ignored(station_id, IgnoreReason::StationBusy(held)),
        };

        let name = self.registry.join_key(&station).to_string();
        let request = StartSessionRequest {
            placement: station.placement,
            station_id: name.clone(),
            start_time: params.start_time,
            duration_minutes: params.duration_minutes,
        };

        tracing::debug!(station = %station.id, name = %name, "Starting session");
        let result = self.backend.start(request).await;
        if self.alive.is_cancelled() {
            return discarded(station_id);
        }

        match result {
            Ok(session) => {
                self.poller.request_refresh();
                self.notifier.success(
                    "Сессия начата",
                    format!("Сессия успешно начата для {name}"),
                );
                Outcome::Done(session)
            }
            Err(err) => self.failed(err, "Не удалось начать сессию"),
        }
    }

    /// Stop the station's active session and summarise the closed record
    ///
    /// The summary comes from the stop response itself; the refresh that
    /// clears the station runs in the background.
    pub async fn stop(&self, station_id: &str) -> Outcome<SessionSummary> {
        let (station, session) = match self.active_station(station_id) {
            Ok(found) => found,
            Err(reason) => return ignored(station_id, reason),
        };
        let _guard = match self.flags.try_acquire(&station.id, Transient::Stopping) {
            Ok(guard) => guard,
            Err(held) => return ignored(station_id, IgnoreReason::StationBusy(held)),
        };

        tracing::debug!(station = %station.id, session = %session.id, "Stopping session");
        let result = self.backend.stop(&session.id).await;
        if self.alive.is_cancelled() {
            return discarded(station_id);
        }

        let closed = match result {
            Ok(closed) => closed,
            Err(err) => return self.failed(err, "Не удалось остановить сессию"),
        };
        self.poller.request_refresh();

        match SessionSummary::from_session(&closed) {
            Ok(summary) => {
                self.notifier.success(
                    "Сессия остановлена",
                    format!(
                        "Сессия остановлена. Итого: {}",
                        money_with_currency(closed.total_bill.unwrap_or_default())
                    ),
                );
                Outcome::Done(summary)
            }
            Err(err) => self.failed(
                ClientError::InvalidResponse(err.to_string()),
                "Не удалось остановить сессию",
            ),
        }
    }

    /// Open the add-item dialog with the session's current items
    pub fn open_items(&self, station_id: &str) -> Outcome<ItemsDialog> {
        let (station, session) = match self.active_station(station_id) {
            Ok(found) => found,
            Err(reason) => return ignored(station_id, reason),
        };
        let guard = match self.flags.try_acquire(&station.id, Transient::AddingItem) {
            Ok(guard) => guard,
            Err(held) => return ignored(station_id, IgnoreReason::StationBusy(held)),
        };

        Outcome::Done(ItemsDialog {
            station,
            session_id: session.id,
            items: session.items,
            guard: Some(guard),
        })
    }

    /// Submit one item from an open dialog
    ///
    /// On success the dialog's items are replaced by the server's list and the
    /// dialog closes. On failure it stays open with its items untouched.
    pub async fn submit_item(&self, dialog: &mut ItemsDialog, draft: &ItemDraft) -> Outcome<Session> {
        if !dialog.is_open() {
            return ignored(&dialog.station.id, IgnoreReason::DialogClosed);
        }
        if self.alive.is_cancelled() {
            return ignored(&dialog.station.id, IgnoreReason::ShuttingDown);
        }
        let item = match draft.validate() {
            Ok(item) => item,
            Err(err) => return self.invalid(err),
        };

        let name = item.name.clone();
        tracing::debug!(station = %dialog.station.id, item = %name, "Adding item");
        let result = self.backend.add_item(&dialog.session_id, item).await;
        if self.alive.is_cancelled() {
            return discarded(&dialog.station.id);
        }

        match result {
            Ok(session) => {
                dialog.items = session.items.clone();
                self.poller.request_refresh();
                dialog.close();
                self.notifier
                    .success("Товар добавлен", format!("{name} успешно добавлен"));
                Outcome::Done(session)
            }
            Err(err) => self.failed(err, "Не удалось добавить товар"),
        }
    }

    /// Open the dialog, submit one item and close it
    pub async fn add_item(&self, station_id: &str, draft: &ItemDraft) -> Outcome<Session> {
        let mut dialog = match self.open_items(station_id) {
            Outcome::Done(dialog) => dialog,
            Outcome::Ignored(reason) => return Outcome::Ignored(reason),
            Outcome::Invalid(err) => return Outcome::Invalid(err),
            Outcome::Failed(err) => return Outcome::Failed(err),
        };
        self.submit_item(&mut dialog, draft).await
    }

    /// Ask the poller for an immediate fetch
    pub fn refresh(&self) -> RefreshRequest {
        self.poller.request_refresh()
    }

    /// Every session the backend knows about
    pub async fn history(&self) -> Outcome<Vec<Session>> {
        if self.alive.is_cancelled() {
            return Outcome::Ignored(IgnoreReason::ShuttingDown);
        }
        let result = self.backend.list_all().await;
        if self.alive.is_cancelled() {
            return Outcome::Ignored(IgnoreReason::ShuttingDown);
        }
        match result {
            Ok(sessions) => Outcome::Done(sessions),
            Err(err) => self.failed(err, "Не удалось загрузить историю"),
        }
    }

    /// Stop accepting actions; responses still in flight are dropped
    pub fn shutdown(&self) {
        self.alive.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.alive.is_cancelled()
    }

    fn idle_station(&self, station_id: &str) -> Result<Station, IgnoreReason> {
        if self.alive.is_cancelled() {
            return Err(IgnoreReason::ShuttingDown);
        }
        let station = self
            .registry
            .by_id(station_id)
            .map_err(|_| IgnoreReason::UnknownStation(station_id.to_string()))?;
        let snapshot = self.poller.snapshot();
        if self
            .registry
            .active_session_for(station, &snapshot.sessions)
            .is_some()
        {
            return Err(IgnoreReason::AlreadyActive);
        }
        Ok(station.clone())
    }

    fn active_station(&self, station_id: &str) -> Result<(Station, Session), IgnoreReason> {
        if self.alive.is_cancelled() {
            return Err(IgnoreReason::ShuttingDown);
        }
        let station = self
            .registry
            .by_id(station_id)
            .map_err(|_| IgnoreReason::UnknownStation(station_id.to_string()))?;
        let snapshot = self.poller.snapshot();
        let session = self
            .registry
            .active_session_for(station, &snapshot.sessions)
            .cloned()
            .ok_or(IgnoreReason::NoActiveSession)?;
        Ok((station.clone(), session))
    }

    fn invalid<T>(&self, err: ValidationError) -> Outcome<T> {
        self.notifier.error(TITLE_VALIDATION, err.to_string());
        Outcome::Invalid(err)
    }

    fn failed<T>(&self, err: ClientError, fallback: &str) -> Outcome<T> {
        tracing::warn!(error = %err, "Session action failed");
        let message = match (&err, err.kind()) {
            (ClientError::Validation(reason), _) => format!("{fallback}: {reason}"),
            (_, FailureKind::ServerError) => err.server_message().unwrap_or(fallback).to_string(),
            (_, FailureKind::NetworkError | FailureKind::ValidationError) => {
                fallback.to_string()
            }
        };
        self.notifier.error(TITLE_ERROR, message);
        Outcome::Failed(err)
    }
}

fn ignored<T>(station_id: &str, reason: IgnoreReason) -> Outcome<T> {
    tracing::debug!(station = %station_id, reason = ?reason, "Action ignored");
    Outcome::Ignored(reason)
}

fn discarded<T>(station_id: &str) -> Outcome<T> {
    tracing::debug!(station = %station_id, "Discarding response that arrived after shutdown");
    Outcome::Ignored(IgnoreReason::ShuttingDown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_duration_bounds() {
        assert_eq!(DurationInput::default().validate(), Ok(30));
        assert_eq!(DurationInput::new(1, 15).validate(), Ok(75));
        assert_eq!(DurationInput::new(2, 0).validate(), Ok(120));
        assert_eq!(
            DurationInput::new(0, 0).validate(),
            Err(ValidationError::EmptyDuration)
        );
        assert_eq!(
            DurationInput::new(24, 0).validate(),
            Err(ValidationError::HoursOutOfRange)
        );
        assert_eq!(
            DurationInput::new(0, 60).validate(),
            Err(ValidationError::MinutesOutOfRange)
        );
    }

    #[test]
    fn test_duration_parse() {
        assert_eq!(DurationInput::parse("1:30"), Ok(DurationInput::new(1, 30)));
        assert_eq!(DurationInput::parse(" 0:05 "), Ok(DurationInput::new(0, 5)));
        assert_eq!(
            DurationInput::parse("90"),
            Err(ValidationError::DurationFormat)
        );
        assert_eq!(
            DurationInput::parse("x:10"),
            Err(ValidationError::DurationFormat)
        );
        assert_eq!(
            DurationInput::parse("1:"),
            Err(ValidationError::DurationFormat)
        );
        // Parsed but out of range: reported by `validate`
        let late = DurationInput::parse("25:00").unwrap();
        assert_eq!(late.validate(), Err(ValidationError::HoursOutOfRange));
    }

    #[test]
    fn test_start_form_converts_to_utc() {
        let form = StartForm {
            start_at: Some(local(2024, 1, 1, 10, 0)),
            duration: Some(DurationInput::new(0, 30)),
        };
        let params = form.validate_in(&Utc).unwrap();
        assert_eq!(
            shared::util::iso_millis::format(&params.start_time.unwrap()),
            "2024-01-01T10:00:00.000Z"
        );
        assert_eq!(params.duration_minutes, Some(30));

        let offset = chrono::FixedOffset::east_opt(6 * 3600).unwrap();
        let params = form.validate_in(&offset).unwrap();
        assert_eq!(
            shared::util::iso_millis::format(&params.start_time.unwrap()),
            "2024-01-01T04:00:00.000Z"
        );
    }

    #[test]
    fn test_start_form_open_ended_and_now() {
        let form = StartForm {
            start_at: None,
            duration: None,
        };
        assert_eq!(form.validate_in(&Utc), Ok(StartParams::default()));
        assert_eq!(form.end_preview(local(2024, 1, 1, 10, 0)), None);

        let rejected = StartForm {
            start_at: None,
            duration: Some(DurationInput::new(0, 0)),
        };
        assert_eq!(rejected.validate_in(&Utc), Err(ValidationError::EmptyDuration));
    }

    #[test]
    fn test_end_preview() {
        let form = StartForm {
            start_at: Some(local(2024, 1, 1, 23, 30)),
            duration: Some(DurationInput::new(1, 0)),
        };
        assert_eq!(
            form.end_preview(local(2024, 1, 1, 9, 0)),
            Some(local(2024, 1, 2, 0, 30))
        );
        assert_eq!(
            StartForm::default().end_preview(local(2024, 1, 1, 9, 0)),
            Some(local(2024, 1, 1, 9, 30))
        );
    }

    #[test]
    fn test_parse_local() {
        assert_eq!(
            StartForm::parse_local("2024-01-01T10:00"),
            Ok(local(2024, 1, 1, 10, 0))
        );
        assert_eq!(
            StartForm::parse_local("2024-01-01 10:00"),
            Ok(local(2024, 1, 1, 10, 0))
        );
        assert_eq!(
            StartForm::parse_local("01.01.2024"),
            Err(ValidationError::InvalidStartTime)
        );
    }

    #[test]
    fn test_item_draft() {
        let item = ItemDraft::new(" Cola ", "50", "2").validate().unwrap();
        assert_eq!(item.name, "Cola");
        assert_eq!(item.price, Decimal::new(50, 0));
        assert_eq!(item.quantity, 2);

        let item = ItemDraft::new("Чай", "12,5", "1").validate().unwrap();
        assert_eq!(item.price, Decimal::new(125, 1));

        let cases = [
            (ItemDraft::new("", "50", "1"), ValidationError::MissingFields),
            (ItemDraft::new("Cola", "", "1"), ValidationError::MissingFields),
            (ItemDraft::new("Cola", "50", " "), ValidationError::MissingFields),
            (ItemDraft::new("Cola", "0", "1"), ValidationError::InvalidPrice),
            (ItemDraft::new("Cola", "-3", "1"), ValidationError::InvalidPrice),
            (ItemDraft::new("Cola", "abc", "1"), ValidationError::InvalidPrice),
            (ItemDraft::new("Cola", "50", "0"), ValidationError::InvalidQuantity),
            (ItemDraft::new("Cola", "50", "1.5"), ValidationError::InvalidQuantity),
        ];
        for (draft, expected) in cases {
            assert_eq!(draft.validate(), Err(expected), "{draft:?}");
        }

        assert_eq!(ItemDraft::default().quantity, "1");
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::MissingFields.to_string(),
            "Пожалуйста, заполните все поля"
        );
    }

    #[test]
    fn test_outcome_map() {
        let done: Outcome<u32> = Outcome::Done(2);
        assert_eq!(done.map(|v| v * 2), Outcome::Done(4));
        let ignored: Outcome<u32> = Outcome::Ignored(IgnoreReason::NoActiveSession);
        assert!(!ignored.is_done());
        assert_eq!(ignored.done(), None);
    }
}
