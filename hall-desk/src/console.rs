//! Interactive operator console
//!
//! Reads commands from stdin, prints notifications as they arrive, and can
//! follow the board live. Actions run as spawned tasks so the prompt stays
//! responsive while a request is in flight.

use crate::desk::Desk;
use crate::notify::{NoticeLevel, Notification, Toasts};
use crate::orchestrator::{DurationInput, ItemDraft, Orchestrator, Outcome, StartForm};
use crate::presentation::{Board, StationEntry, StationStatus};
use chrono::{Local, Utc};
use rust_decimal::Decimal;
use shared::util::money_with_currency;
use shared::{Placement, Session, SessionItem};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

pub const HELP: &str = "\
Команды:
  board                                   табло станций
  watch                                   следить за табло (Enter для выхода)
  start <id>                              начать сессию сейчас
  start <id> [at ГГГГ-ММ-ДДTЧЧ:ММ] [for Ч:ММ]  начать сессию с параметрами
  stop <id>                               остановить сессию
  items <id>                              товары текущей сессии
  add <id> <название> <цена> [кол-во]     добавить товар
  refresh                                 обновить сейчас
  history                                 все сессии
  help                                    эта справка
  quit                                    выход";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Неизвестная команда: {0}. Введите help")]
    Unknown(String),
    #[error("Укажите станцию, например: {0} PS1")]
    MissingStation(&'static str),
    #[error("Некорректный аргумент: {0}")]
    BadArgument(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Board,
    Watch,
    /// `form` is `None` for an immediate start
    Start {
        station: String,
        form: Option<StartForm>,
    },
    Stop {
        station: String,
    },
    Items {
        station: String,
    },
    Add {
        station: String,
        draft: ItemDraft,
    },
    Refresh,
    History,
    Help,
    Quit,
}

/// Parse one input line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let verb = verb.to_lowercase();

    let station = |name: &'static str| {
        rest.first()
            .map(|s| s.to_uppercase())
            .ok_or(CommandError::MissingStation(name))
    };

    let command = match verb.as_str() {
        "board" => Command::Board,
        "watch" => Command::Watch,
        "start" => Command::Start {
            station: station("start")?,
            form: parse_start_form(&rest[1..])?,
        },
        "stop" => Command::Stop {
            station: station("stop")?,
        },
        "items" => Command::Items {
            station: station("items")?,
        },
        "add" => Command::Add {
            station: station("add")?,
            draft: parse_item_draft(&rest[1..]),
        },
        "refresh" => Command::Refresh,
        "history" => Command::History,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_start_form(args: &[&str]) -> Result<Option<StartForm>, CommandError> {
    if args.is_empty() {
        return Ok(None);
    }

    let mut form = StartForm {
        start_at: None,
        duration: None,
    };
    let mut args = args.iter();
    while let Some(keyword) = args.next() {
        let value = args
            .next()
            .ok_or_else(|| CommandError::BadArgument(keyword.to_string()))?;
        match *keyword {
            "at" => {
                form.start_at = Some(
                    StartForm::parse_local(value)
                        .map_err(|e| CommandError::BadArgument(format!("{value}: {e}")))?,
                )
            }
            "for" => {
                form.duration = Some(
                    DurationInput::parse(value)
                        .map_err(|e| CommandError::BadArgument(format!("{value}: {e}")))?,
                )
            }
            other => return Err(CommandError::BadArgument(other.to_string())),
        }
    }
    Ok(Some(form))
}

/// `<name...> <price> [qty]`; the name may contain spaces
///
/// Missing parts are left blank for form validation to report.
fn parse_item_draft(args: &[&str]) -> ItemDraft {
    let is_quantity = |s: &str| s.parse::<u32>().is_ok();
    let is_price = |s: &str| s.replace(',', ".").parse::<Decimal>().is_ok();

    match args {
        [] => ItemDraft::new("", "", "1"),
        [name] => ItemDraft::new(*name, "", "1"),
        [name @ .., price, qty] if !name.is_empty() && is_price(*price) && is_quantity(*qty) => {
            ItemDraft::new(name.join(" "), *price, *qty)
        }
        [name @ .., price] => ItemDraft::new(name.join(" "), *price, "1"),
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn status_label(status: StationStatus) -> &'static str {
    match status {
        StationStatus::Idle => "Свободна",
        StationStatus::Starting => "Запуск...",
        StationStatus::Active => "Активна",
        StationStatus::Stopping => "Остановка...",
        StationStatus::AddingItem => "Добавление товара...",
    }
}

fn render_entry(entry: &StationEntry) -> String {
    let mut line = format!(
        "  {:<4} {:<16} {}",
        entry.station.id,
        entry.station.card_title(),
        status_label(entry.status)
    );
    if let Some(elapsed) = &entry.elapsed_display {
        line.push_str(&format!("  {elapsed}"));
    }
    if let Some(total) = entry.items_total_display() {
        line.push_str(&format!("  Товары: {total}"));
    }
    line
}

pub fn render_board(board: &Board) -> Vec<String> {
    let mut out = Vec::new();
    let sections = [
        (Placement::SharedHall, "Общий зал"),
        (Placement::Booth, "Кабины"),
    ];
    for (placement, title) in sections {
        out.push(title.to_string());
        out.extend(board.placement(placement).map(render_entry));
    }
    out
}

pub fn render_items(items: &[SessionItem]) -> Vec<String> {
    if items.is_empty() {
        return vec!["  Товаров нет".to_string()];
    }
    let mut out: Vec<String> = items
        .iter()
        .map(|item| {
            format!(
                "  {} × {} — {}",
                item.name,
                item.quantity,
                money_with_currency(item.line_total())
            )
        })
        .collect();
    let total: Decimal = items.iter().map(SessionItem::line_total).sum();
    out.push(format!("  Итого: {}", money_with_currency(total)));
    out
}

fn render_history_row(session: &Session) -> String {
    let start = session.start_time.with_timezone(&Local);
    let end = session
        .end_time
        .map(|t| t.with_timezone(&Local).format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_else(|| "идёт".to_string());
    let total = session
        .total_bill
        .map(money_with_currency)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "  {:<10} {} → {}  {}",
        session.station_display_name,
        start.format("%d.%m.%Y %H:%M"),
        end,
        total
    )
}

fn print_notification(notification: &Notification) {
    let marker = match notification.level {
        NoticeLevel::Success => "✓",
        NoticeLevel::Error => "✗",
    };
    println!("{marker} {}: {}", notification.title, notification.message);
}

fn print_board(board: &Board, toasts: &mut Toasts) {
    for line in render_board(board) {
        println!("{line}");
    }
    for toast in toasts.visible(Utc::now()) {
        println!("  [{}] {}", toast.title, toast.message);
    }
}

// ============================================================================
// REPL
// ============================================================================

/// Run until `quit` or end of input
pub async fn run(desk: &Desk, toast_ttl: Duration) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut notifications = desk.subscribe_notifications();
    let mut board_rx = desk.subscribe_board();
    let mut toasts = Toasts::new(toast_ttl);
    let mut watching = false;

    println!("{HELP}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if watching {
                    watching = false;
                    continue;
                }
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Watch)) => {
                        watching = true;
                        board_rx.mark_unchanged();
                        print_board(&desk.board(), &mut toasts);
                    }
                    Ok(Some(command)) => execute(desk, command, &mut toasts),
                    Err(e) => println!("{e}"),
                }
            }
            received = notifications.recv() => match received {
                Ok(notification) => {
                    print_notification(&notification);
                    toasts.push(notification);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Console fell behind on notifications");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = board_rx.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let board = board_rx.borrow_and_update().clone();
                println!();
                print_board(&board, &mut toasts);
            }
        }
    }

    Ok(())
}

fn execute(desk: &Desk, command: Command, toasts: &mut Toasts) {
    let orchestrator = desk.orchestrator().clone();
    match command {
        Command::Board => print_board(&desk.board(), toasts),
        Command::Help => println!("{HELP}"),
        Command::Refresh => {
            let request = orchestrator.refresh();
            tracing::debug!(?request, "Manual refresh");
        }
        Command::Items { station } => match desk.board().entry(&station) {
            Some(entry) => match &entry.session {
                Some(session) => {
                    println!("{}", entry.station.card_title());
                    for line in render_items(&session.items) {
                        println!("{line}");
                    }
                }
                None => println!("{}: нет активной сессии", entry.station.display_name),
            },
            None => println!("Станция не найдена: {station}"),
        },
        Command::Start { station, form } => {
            tokio::spawn(async move {
                let outcome = match form {
                    Some(form) => orchestrator.start_with_params(&station, &form).await,
                    None => orchestrator.start(&station).await,
                };
                report_ignored(&station, &outcome);
            });
        }
        Command::Stop { station } => {
            tokio::spawn(async move {
                let outcome = orchestrator.stop(&station).await;
                report_ignored(&station, &outcome);
                if let Outcome::Done(summary) = outcome {
                    println!("Итоги сессии");
                    for line in summary.render_lines() {
                        println!("  {line}");
                    }
                }
            });
        }
        Command::Add { station, draft } => {
            tokio::spawn(async move {
                let outcome = orchestrator.add_item(&station, &draft).await;
                report_ignored(&station, &outcome);
                if let Outcome::Done(session) = outcome {
                    for line in render_items(&session.items) {
                        println!("{line}");
                    }
                }
            });
        }
        Command::History => {
            tokio::spawn(history(orchestrator));
        }
        Command::Watch | Command::Quit => {}
    }
}

async fn history(orchestrator: Orchestrator) {
    if let Outcome::Done(sessions) = orchestrator.history().await {
        println!("Все сессии ({})", sessions.len());
        for session in &sessions {
            println!("{}", render_history_row(session));
        }
    }
}

fn report_ignored<T>(station: &str, outcome: &Outcome<T>) {
    use crate::orchestrator::IgnoreReason;

    let Outcome::Ignored(reason) = outcome else {
        return;
    };
    let text = match reason {
        IgnoreReason::UnknownStation(_) => "станция не найдена",
        IgnoreReason::StationBusy(_) => "станция занята другим действием",
        IgnoreReason::AlreadyActive => "сессия уже идёт",
        IgnoreReason::NoActiveSession => "нет активной сессии",
        IgnoreReason::DialogClosed => "диалог закрыт",
        IgnoreReason::ShuttingDown => "завершение работы",
    };
    println!("{station}: {text}");
}
