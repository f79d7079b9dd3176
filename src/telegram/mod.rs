//! Telegram bot integration and handlers

pub mod bot;
pub mod handlers;
pub mod transport;

pub use teloxide::Bot;

// Re-exports for convenience
pub use bot::{create_bot, entry_url, resolve_entry_url, setup_bot_commands, Command};
pub use handlers::{schema, BotRelay, HandlerDeps, HandlerError};
pub use transport::TelegramTransport;
