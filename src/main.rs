use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;

use anonbot::cli::{Cli, Commands};
use anonbot::core::{config, init_logger, install_panic_hook, log_startup_configuration, AppResult};
use anonbot::relay::Relay;
use anonbot::storage::{create_pool, SqliteUserStore};
use anonbot::telegram::{create_bot, resolve_entry_url, schema, setup_bot_commands, HandlerDeps, TelegramTransport};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Environment files go first: config statics read the environment once.
    // dotenvy never overrides, so staging values win over .env.
    let staging = if cli.command == Some(Commands::RunStaging) {
        Some(dotenvy::from_filename(".env.staging"))
    } else {
        None
    };
    let _ = dotenv();

    install_panic_hook();
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => {
            log::info!("Running bot in normal mode");
            run_bot().await
        }
        Some(Commands::RunStaging) => {
            log::info!("Running bot in staging mode");
            if let Some(Err(e)) = staging {
                log::warn!("Failed to load .env.staging: {}", e);
            }
            run_bot().await
        }
        Some(Commands::Migrate) => run_migrate(),
    }
}

fn open_store() -> AppResult<SqliteUserStore> {
    let pool = create_pool(&config::DATABASE_PATH)?;
    Ok(SqliteUserStore::new(Arc::new(pool)))
}

fn run_migrate() -> Result<()> {
    log::info!("Applying migrations to {}", config::DATABASE_PATH.as_str());
    open_store().context("Failed to migrate database")?;
    log::info!("Database is up to date");
    Ok(())
}

async fn run_bot() -> Result<()> {
    log_startup_configuration();

    let store = open_store().context("Failed to open database")?;
    log::info!("Database ready ({} users)", store.count().unwrap_or_default());

    let bot = create_bot()?;
    let base = resolve_entry_url(&bot).await.context("Failed to fetch bot identity")?;
    log::info!("Personal links use {}", base);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let relay = Relay::new(TelegramTransport::new(bot.clone()), store, base);
    let deps = HandlerDeps::new(Arc::new(relay));

    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Bot stopped");
    Ok(())
}
