//! [`Transport`] on top of the Telegram Bot API

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId as TgMessageId, ReactionType,
    ReplyParameters,
};

use crate::relay::ports::{Button, SendOptions, Transport, TransportResult};
use crate::relay::user::{MessageId, PlatformId};

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Threads under `message_id`, still sending if it was deleted meanwhile.
fn reply_parameters(message_id: MessageId) -> ReplyParameters {
    let mut params = ReplyParameters::new(TgMessageId(message_id));
    params.allow_sending_without_reply = Some(true);
    params
}

fn keyboard(buttons: &[Button]) -> Option<InlineKeyboardMarkup> {
    if buttons.is_empty() {
        return None;
    }
    let row = buttons
        .iter()
        .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.data.clone()))
        .collect::<Vec<_>>();
    Some(InlineKeyboardMarkup::new(vec![row]))
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(&self, chat: PlatformId, text: &str, options: SendOptions) -> TransportResult<MessageId> {
        let mut req = self.bot.send_message(ChatId(chat), text);
        if let Some(reply_to) = options.reply_to {
            req = req.reply_parameters(reply_parameters(reply_to));
        }
        if let Some(markup) = keyboard(&options.buttons) {
            req = req.reply_markup(markup);
        }
        let sent = req.await?;
        Ok(sent.id.0)
    }

    async fn edit_message_text(&self, chat: PlatformId, message: MessageId, text: &str) -> TransportResult<()> {
        self.bot
            .edit_message_text(ChatId(chat), TgMessageId(message), text)
            .await?;
        Ok(())
    }

    async fn clear_buttons(&self, chat: PlatformId, message: MessageId) -> TransportResult<()> {
        self.bot
            .edit_message_reply_markup(ChatId(chat), TgMessageId(message))
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat: PlatformId, message: MessageId) -> TransportResult<()> {
        self.bot.delete_message(ChatId(chat), TgMessageId(message)).await?;
        Ok(())
    }

    async fn copy_message(
        &self,
        to_chat: PlatformId,
        from_chat: PlatformId,
        message: MessageId,
        options: SendOptions,
    ) -> TransportResult<MessageId> {
        let mut req = self
            .bot
            .copy_message(ChatId(to_chat), ChatId(from_chat), TgMessageId(message));
        if let Some(reply_to) = options.reply_to {
            req = req.reply_parameters(reply_parameters(reply_to));
        }
        if let Some(markup) = keyboard(&options.buttons) {
            req = req.reply_markup(markup);
        }
        let copied = req.await?;
        Ok(copied.0)
    }

    async fn set_reaction(&self, chat: PlatformId, message: MessageId, emoji: &str) -> TransportResult<()> {
        let reaction = vec![ReactionType::Emoji {
            emoji: emoji.to_string(),
        }];
        self.bot
            .set_message_reaction(ChatId(chat), TgMessageId(message))
            .reaction(reaction)
            .is_big(true)
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> TransportResult<()> {
        let mut req = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(text) = text {
            req = req.text(text);
        }
        req.await?;
        Ok(())
    }
}
