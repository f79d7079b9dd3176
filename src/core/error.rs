use thiserror::Error;

use crate::relay::{RelayError, StoreError};

/// Centralized error types for the application
///
/// Startup failures and relay failures that reach the dispatcher are converted
/// into this enum. Uses `thiserror` for automatic conversion and display formatting.
///
/// # Example
///
/// ```no_run
/// use anonbot::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// User store errors (database, pool, migrations)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Relay core errors (store, transport, callback data)
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
