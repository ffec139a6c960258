//! Deskbot - IT helpdesk intake bot
//!
//! A Telegram bot that registers employees, collects IT problem reports
//! through a guided dialog, and forwards them to the sysadmin.

mod config;
mod db;
mod dialog;
mod runtime;
mod transport;

use config::BotConfig;
use db::Directory;
use dialog::DialogContext;
use runtime::BotRuntime;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::Bot;
use tokio::sync::Mutex;
use transport::TelegramTransport;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deskbot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening directory database");
    let directory = Directory::open(&config.db_path)?;
    let stats = directory.stats()?;
    tracing::info!(
        total = stats.total,
        blocked = stats.blocked,
        "Directory loaded"
    );

    let bot = Bot::new(config.token.clone());
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let runtime = Arc::new(Mutex::new(BotRuntime::new(
        directory,
        transport,
        DialogContext::new(config.admin_id),
    )));

    tracing::info!(admin_id = config.admin_id, "Deskbot starting");
    transport::telegram::run(bot, Arc::clone(&runtime)).await;

    // Drain any in-flight broadcast before exiting so its report is not lost.
    let mut rt = runtime.lock().await;
    rt.cancel_broadcast();
    if let Some(report) = rt.finish_broadcast().await {
        tracing::info!(
            delivered = report.delivered,
            total = report.total,
            cancelled = report.cancelled,
            "Broadcast drained at shutdown"
        );
    }

    Ok(())
}
