//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Deep-link base for personal links

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start a conversation from a personal link")]
    Start(String),
    #[command(description = "what this bot does")]
    Info,
    #[command(description = "get your personal link")]
    Link,
    #[command(description = "set or remove your username")]
    Username,
}

impl Command {
    /// Argument of `/start`, if one was given.
    pub fn start_argument(arg: &str) -> Option<&str> {
        let arg = arg.trim();
        (!arg.is_empty()).then_some(arg)
    }
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(AppError)` - Missing token, invalid URL or HTTP client failure
pub fn create_bot() -> AppResult<Bot> {
    if config::BOT_TOKEN.is_empty() {
        return Err(AppError::Config("BOT_TOKEN (or TELOXIDE_TOKEN) is not set".to_string()));
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    // Local Bot API server, if configured
    let bot = match config::BOT_API_URL.as_deref() {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            bot.set_api_url(url::Url::parse(bot_api_url)?)
        }
        None => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    let commands = Command::bot_commands()
        .into_iter()
        .map(|c| BotCommand::new(c.command.trim_start_matches('/'), c.description))
        .collect::<Vec<_>>();
    bot.set_my_commands(commands).await?;

    Ok(())
}

/// Asks Telegram who we are and derives the deep-link base from it.
pub async fn resolve_entry_url(bot: &Bot) -> AppResult<String> {
    let me = bot.get_me().await?;
    log::info!("Bot identity: @{}", me.username());
    Ok(entry_url(me.username()))
}

/// Deep-link base: `BOT_ENTRY_URL` when set, otherwise `https://t.me/<username>`.
pub fn entry_url(bot_username: &str) -> String {
    match config::BOT_ENTRY_URL.as_deref() {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => format!("https://t.me/{}", bot_username),
    }
}
