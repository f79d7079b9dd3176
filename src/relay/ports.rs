//! Collaborator contracts used by the relay core
//!
//! The core never talks to Telegram or SQLite directly. It goes through
//! [`Transport`] (send/edit/delete/copy/react/answer) and [`UserStore`]
//! (lookups plus compare-and-set updates).

use async_trait::async_trait;
use thiserror::Error;

use super::state::UserUpdate;
use super::user::{MessageId, PlatformId, StableId, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Migration error: {0}")]
    Migration(anyhow::Error),

    /// The record changed between read and write.
    #[error("user {stable_id} was modified concurrently")]
    Conflict { stable_id: String },

    /// Unique index on `handle` rejected the write.
    #[error("handle '{handle}' is already taken")]
    HandleTaken { handle: String },

    #[error("user {stable_id} does not exist")]
    UserNotFound { stable_id: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of user records.
///
/// Calls are synchronous; implementations may block briefly on the database.
pub trait UserStore: Send + Sync {
    fn find_by_platform_id(&self, platform_id: PlatformId) -> StoreResult<Option<User>>;

    fn find_by_stable_id(&self, stable_id: &StableId) -> StoreResult<Option<User>>;

    /// Case-insensitive.
    fn find_by_handle(&self, handle: &str) -> StoreResult<Option<User>>;

    /// Creates the record for `platform_id` if missing and returns it.
    fn create(&self, platform_id: PlatformId) -> StoreResult<User>;

    /// Applies `update` only if `user.version` still matches the stored row.
    ///
    /// Returns the updated record, or [`StoreError::Conflict`] when another
    /// event got there first.
    fn update(&self, user: &User, update: &UserUpdate) -> StoreResult<User>;

    /// Back to Idle, composing fields cleared.
    fn reset_state(&self, user: &User) -> StoreResult<User> {
        self.update(user, &UserUpdate::reset())
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("{0}")]
    Other(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Inline keyboard button carrying callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
        }
    }
}

/// Options shared by send and copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Thread under this message; sent anyway if it no longer exists.
    pub reply_to: Option<MessageId>,
    /// One row of inline buttons.
    pub buttons: Vec<Button>,
}

impl SendOptions {
    pub fn reply_to(message_id: MessageId) -> Self {
        Self {
            reply_to: Some(message_id),
            buttons: Vec::new(),
        }
    }

    pub fn maybe_reply_to(message_id: Option<MessageId>) -> Self {
        Self {
            reply_to: message_id,
            buttons: Vec::new(),
        }
    }

    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }

    pub fn with_buttons(mut self, buttons: impl IntoIterator<Item = Button>) -> Self {
        self.buttons.extend(buttons);
        self
    }
}

/// Outbound chat operations.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, chat: PlatformId, text: &str, options: SendOptions) -> TransportResult<MessageId>;

    async fn edit_message_text(&self, chat: PlatformId, message: MessageId, text: &str) -> TransportResult<()>;

    /// Removes the inline keyboard from a message.
    async fn clear_buttons(&self, chat: PlatformId, message: MessageId) -> TransportResult<()>;

    async fn delete_message(&self, chat: PlatformId, message: MessageId) -> TransportResult<()>;

    /// Copies `message` from `from_chat` into `to_chat` without a forward header.
    async fn copy_message(
        &self,
        to_chat: PlatformId,
        from_chat: PlatformId,
        message: MessageId,
        options: SendOptions,
    ) -> TransportResult<MessageId>;

    async fn set_reaction(&self, chat: PlatformId, message: MessageId, emoji: &str) -> TransportResult<()>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> TransportResult<()>;
}
