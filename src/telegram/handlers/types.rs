//! Handler types, dependencies, and update conversion helpers

use std::sync::Arc;

use teloxide::types::{CallbackQuery, MaybeInaccessibleMessage, Message};

use crate::relay::{ButtonPress, IncomingMessage, PressedMessage, Relay};
use crate::storage::SqliteUserStore;
use crate::telegram::transport::TelegramTransport;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The relay as wired in production.
pub type BotRelay = Relay<TelegramTransport, SqliteUserStore>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub relay: Arc<BotRelay>,
}

impl HandlerDeps {
    pub fn new(relay: Arc<BotRelay>) -> Self {
        Self { relay }
    }
}

/// Converts a Telegram message into the relay's view of it.
///
/// `None` for messages without a sender (channel posts) or with an id that
/// does not fit a chat id.
pub fn incoming_message(msg: &Message) -> Option<IncomingMessage> {
    let from = msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())?;
    Some(IncomingMessage {
        from,
        chat: msg.chat.id.0,
        message_id: msg.id.0,
        text: msg.text().map(str::to_owned),
    })
}

pub fn button_press(q: &CallbackQuery) -> Option<ButtonPress> {
    let from = i64::try_from(q.from.id.0).ok()?;
    let message = q.message.as_ref().map(|m| PressedMessage {
        chat: m.chat().id.0,
        id: m.id().0,
        reply_to: match m {
            MaybeInaccessibleMessage::Regular(regular) => regular.reply_to_message().map(|r| r.id.0),
            MaybeInaccessibleMessage::Inaccessible(_) => None,
        },
    });

    Some(ButtonPress {
        callback_id: q.id.0.clone(),
        from,
        message,
        data: q.data.clone().unwrap_or_default(),
    })
}

/// Only private chats and button presses that came from one.
pub fn is_private_press(q: &CallbackQuery) -> bool {
    q.message.as_ref().map(|m| m.chat().is_private()).unwrap_or(true)
}
