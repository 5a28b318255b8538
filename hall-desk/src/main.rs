use hall_client::HallClient;
use hall_desk::{Desk, DeskConfig, console, logger};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = DeskConfig::from_env()?;
    let _log_guard = logger::init_logger(&config.log_level, config.log_dir.as_deref());

    tracing::info!(backend = %config.client.base_url, "Hall desk starting...");

    let client = HallClient::new(&config.client)?;
    let desk = Desk::start(&config, Arc::new(client));

    let result = console::run(&desk, config.toast_ttl).await;
    if desk.check_health() > 0 {
        tracing::error!("Background tasks exited early, board may be stale");
    }
    desk.shutdown().await;

    if let Err(e) = result {
        tracing::error!("Console error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
