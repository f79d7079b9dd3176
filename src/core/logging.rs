//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A panic hook that routes panics through the logger
//! - Startup configuration summary

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Set up a global panic hook so a panic inside a handler is logged
/// instead of only hitting stderr.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));
}

/// Logs the effective configuration at startup. Never prints the token itself.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Startup configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config::BOT_TOKEN.is_empty() {
        log::error!("❌ BOT_TOKEN / TELOXIDE_TOKEN: not set");
    } else {
        log::info!("✅ BOT_TOKEN: set ({} chars)", config::BOT_TOKEN.len());
    }

    log::info!("DATABASE_PATH: {}", config::DATABASE_PATH.as_str());
    log::info!("LOG_FILE_PATH: {}", config::LOG_FILE_PATH.as_str());

    match config::BOT_API_URL.as_deref() {
        Some(url) => log::info!("BOT_API_URL: {}", url),
        None => log::info!("BOT_API_URL: default (api.telegram.org)"),
    }
    match config::BOT_ENTRY_URL.as_deref() {
        Some(url) => log::info!("BOT_ENTRY_URL: {}", url),
        None => log::info!("BOT_ENTRY_URL: derived from bot username"),
    }
}
