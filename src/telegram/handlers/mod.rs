//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.
//! Every branch converts the update and hands it to the relay.

mod schema;
mod types;

pub use schema::schema;
pub use types::{button_press, incoming_message, is_private_press, BotRelay, HandlerDeps, HandlerError};
