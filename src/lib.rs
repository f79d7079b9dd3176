//! Anonbot - anonymous message relay bot for Telegram
//!
//! Users share a personal deep link; whoever follows it can send them
//! messages without either side learning the other's account.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors and logging
//! - `relay`: conversation state machine, callback tokens and the relay orchestrator
//! - `storage`: SQLite user store and migrations
//! - `telegram`: Telegram transport and dispatcher schema
//! - `testing`: recording transport for tests

pub mod cli;
pub mod core;
pub mod relay;
pub mod storage;
pub mod telegram;
pub mod testing;

// Re-export commonly used types for convenience
pub use core::{config, AppError};
pub use relay::{Relay, Transport, UserStore};
pub use storage::{create_pool, get_connection, DbConnection, DbPool, SqliteUserStore};
