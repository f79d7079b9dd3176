//! Relay orchestrator
//!
//! Entry point for every inbound event. Each handler loads (or lazily creates)
//! the acting user, looks at its state, and drives the resolver, the token
//! protocol and the transport. State changes go through [`Transition`] and a
//! single compare-and-set on the store.

use thiserror::Error;

use super::best_effort::BestEffort;
use super::handle::{personal_links, resolve_recipient, resolve_stable, Handle, RecipientRef, ResolveError};
use super::ports::{Button, SendOptions, StoreError, Transport, TransportError, UserStore};
use super::state::{Composing, TextIntent, Transition, UserUpdate};
use super::texts;
use super::token::{CallbackToken, MessagePointer, TokenError};
use super::user::{MessageId, PlatformId, User};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

pub type RelayResult<T> = Result<T, RelayError>;

/// A private-chat message addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub from: PlatformId,
    pub chat: PlatformId,
    pub message_id: MessageId,
    /// `None` for media, stickers and the like.
    pub text: Option<String>,
}

/// The message an inline button was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressedMessage {
    pub chat: PlatformId,
    pub id: MessageId,
    /// What that message itself replied to, if anything.
    pub reply_to: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPress {
    pub callback_id: String,
    pub from: PlatformId,
    pub message: Option<PressedMessage>,
    pub data: String,
}

impl ButtonPress {
    fn chat(&self) -> PlatformId {
        self.message.map(|m| m.chat).unwrap_or(self.from)
    }
}

pub struct Relay<T, S> {
    transport: T,
    store: S,
    entry_url: String,
}

impl<T: Transport, S: UserStore> Relay<T, S> {
    /// `entry_url` is the deep-link base, e.g. `https://t.me/my_relay_bot`.
    pub fn new(transport: T, store: S, entry_url: impl Into<String>) -> Self {
        Self {
            transport,
            store,
            entry_url: entry_url.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `/start [reference]`
    pub async fn start(&self, msg: &IncomingMessage, argument: Option<&str>) -> RelayResult<()> {
        let user = self.acting_user(msg.from)?;
        let reference = argument.map(str::trim).filter(|a| !a.is_empty());

        let Some(reference) = reference else {
            log::info!("/start from {} without link", msg.from);
            self.transport
                .send_message(msg.chat, texts::WELCOME, SendOptions::default())
                .await?;
            self.finish(&user, Transition::CommandServed)?;
            return Ok(());
        };

        log::info!("/start from {} with reference '{}'", msg.from, reference);
        let recipient = match resolve_recipient(&self.store, &user, &RecipientRef::parse(reference)) {
            Ok(recipient) => recipient,
            Err(ResolveError::NotFound) => {
                self.transport
                    .send_message(msg.chat, texts::RECIPIENT_NOT_FOUND, SendOptions::default())
                    .await?;
                return Ok(());
            }
            Err(ResolveError::SelfAddress) => {
                self.transport
                    .send_message(msg.chat, texts::SELF_ADDRESS, SendOptions::default())
                    .await?;
                return Ok(());
            }
            Err(ResolveError::Store(e)) => return Err(e.into()),
        };

        let transition = Transition::OpenRecipient {
            contact: recipient.stable_id.clone(),
        };
        if self.commit(&user, transition)?.is_none() {
            return self.notify_conflict(msg.chat).await;
        }

        self.transport
            .send_message(
                msg.chat,
                &texts::recipient_prompt(recipient.display_name()),
                SendOptions::default(),
            )
            .await?;
        Ok(())
    }

    /// `/info`
    pub async fn info(&self, msg: &IncomingMessage) -> RelayResult<()> {
        let user = self.acting_user(msg.from)?;
        log::info!("/info from {}", msg.from);

        self.transport
            .send_message(msg.chat, texts::INFO, SendOptions::default())
            .await?;
        self.finish(&user, Transition::CommandServed)
    }

    /// `/link`
    pub async fn link(&self, msg: &IncomingMessage) -> RelayResult<()> {
        let user = self.acting_user(msg.from)?;
        log::info!("/link from {}", msg.from);

        let links = personal_links(&self.entry_url, &user);
        self.transport
            .send_message(msg.chat, &texts::links(&links), SendOptions::reply_to(msg.message_id))
            .await?;
        self.finish(&user, Transition::CommandServed)
    }

    /// `/username`: shows the handle menu. State is left as is until a button is pressed.
    pub async fn manage_handle(&self, msg: &IncomingMessage) -> RelayResult<()> {
        let user = self.acting_user(msg.from)?;
        log::info!("/username from {}", msg.from);

        let (text, buttons) = match &user.handle {
            Some(handle) => (
                texts::current_handle(handle.as_str()),
                vec![
                    Button::new(texts::CHANGE_HANDLE_BUTTON, CallbackToken::SetHandle.encode()),
                    Button::new(texts::REMOVE_HANDLE_BUTTON, CallbackToken::RemoveHandle.encode()),
                    Button::new(texts::CANCEL_BUTTON, CallbackToken::CancelHandle.encode()),
                ],
            ),
            None => (
                texts::NO_HANDLE.to_string(),
                vec![
                    Button::new(texts::SET_HANDLE_BUTTON, CallbackToken::SetHandle.encode()),
                    Button::new(texts::CANCEL_BUTTON, CallbackToken::CancelHandle.encode()),
                ],
            ),
        };

        self.transport
            .send_message(msg.chat, &text, SendOptions::default().with_buttons(buttons))
            .await?;
        Ok(())
    }

    /// Anything that is not a command.
    pub async fn text(&self, msg: &IncomingMessage) -> RelayResult<()> {
        let user = self.acting_user(msg.from)?;
        log::info!("Message {} from {} while {}", msg.message_id, msg.from, user.state.kind());

        match user.state.text_intent() {
            TextIntent::Relay(composing) => {
                let composing = composing.clone();
                self.deliver(&user, composing, msg).await
            }
            TextIntent::RegisterHandle => self.register_handle(&user, msg).await,
            TextIntent::Unrecognized => {
                self.transport
                    .send_message(msg.chat, texts::UNKNOWN_COMMAND, SendOptions::reply_to(msg.message_id))
                    .await?;
                Ok(())
            }
        }
    }

    /// Inline button press.
    pub async fn press(&self, press: &ButtonPress) -> RelayResult<()> {
        let user = self.acting_user(press.from)?;

        let token = match CallbackToken::decode(&press.data) {
            Ok(token) => token,
            Err(e) => {
                log::warn!("Rejected callback from {}: {}", press.from, e);
                if let Err(answer_err) = self
                    .transport
                    .answer_callback(&press.callback_id, Some(texts::MALFORMED_CALLBACK))
                    .await
                {
                    log::warn!("Failed to answer malformed callback: {}", answer_err);
                }
                return Err(e.into());
            }
        };

        log::info!("Button '{}' pressed by {}", press.data, press.from);
        match token {
            CallbackToken::Open(ptr) => self.open(&user, press, ptr).await,
            CallbackToken::Reply(ptr) => self.reply(&user, press, ptr).await,
            CallbackToken::SetHandle | CallbackToken::RemoveHandle | CallbackToken::CancelHandle => {
                self.handle_menu(&user, press, token).await
            }
        }
    }

    /// Relays `msg` to the composing user's counterpart.
    async fn deliver(&self, sender: &User, composing: Composing, msg: &IncomingMessage) -> RelayResult<()> {
        // Resolution at send time is the authoritative check for stale reply context.
        let recipient = match resolve_stable(&self.store, sender, &composing.contact) {
            Ok(recipient) => recipient,
            Err(ResolveError::NotFound | ResolveError::SelfAddress) => {
                log::info!("Counterpart {} of {} no longer resolves", composing.contact, sender.stable_id);
                self.transport
                    .send_message(msg.chat, texts::PARTNER_NOT_FOUND, SendOptions::default())
                    .await?;
                self.finish(sender, Transition::Cancel)?;
                return Ok(());
            }
            Err(ResolveError::Store(e)) => return Err(e.into()),
        };

        let notice = if composing.reply_to.is_some() {
            texts::NEW_REPLY
        } else {
            texts::NEW_MESSAGE
        };

        let delivery_id = self
            .transport
            .send_message(msg.chat, texts::MESSAGE_SENT, SendOptions::reply_to(msg.message_id))
            .await?;

        let open = CallbackToken::Open(MessagePointer {
            stable_id: sender.stable_id.clone(),
            message_id: msg.message_id,
            delivery_message_id: delivery_id,
        });
        self.transport
            .send_message(
                recipient.platform_id,
                notice,
                SendOptions::maybe_reply_to(composing.reply_to).with_button(Button::new(texts::OPEN_BUTTON, open.encode())),
            )
            .await?;

        if let Some(pending) = composing.pending_delivery {
            let mut cleanup = BestEffort::new();
            cleanup.push(
                "delete superseded delivery notice",
                self.transport.delete_message(recipient.platform_id, pending),
            );
            cleanup.run().await;
        }

        log::info!("Relayed message {} from {} to {}", msg.message_id, sender.stable_id, recipient.stable_id);
        self.finish(sender, Transition::Relayed)
    }

    async fn register_handle(&self, user: &User, msg: &IncomingMessage) -> RelayResult<()> {
        let parsed = msg.text.as_deref().map(Handle::parse);
        let handle = match parsed {
            Some(Ok(handle)) => handle,
            Some(Err(e)) => {
                log::debug!("Handle rejected for {}: {}", msg.from, e);
                return self.retry_handle(user, msg, texts::HANDLE_INVALID).await;
            }
            None => return self.retry_handle(user, msg, texts::HANDLE_INVALID).await,
        };

        match self.store.find_by_handle(handle.as_str())? {
            Some(owner) if owner.is_same_user(user) => {
                self.reply_text(msg, texts::HANDLE_ALREADY_YOURS).await?;
                self.finish(user, Transition::HandleAlreadyOwned)
            }
            Some(_) => self.retry_handle(user, msg, texts::HANDLE_TAKEN).await,
            None => match self.commit(user, Transition::HandleStored(handle.clone())) {
                Ok(Some(_)) => {
                    log::info!("User {} registered handle '{}'", user.stable_id, handle);
                    self.reply_text(msg, &texts::handle_set(handle.as_str())).await
                }
                Ok(None) => self.notify_conflict(msg.chat).await,
                // lost the race for the unique index
                Err(RelayError::Store(StoreError::HandleTaken { .. })) => {
                    self.retry_handle(user, msg, texts::HANDLE_TAKEN).await
                }
                Err(e) => Err(e),
            },
        }
    }

    async fn open(&self, user: &User, press: &ButtonPress, ptr: MessagePointer) -> RelayResult<()> {
        let Some(sender) = self.resolve_partner(user, press, &ptr).await? else {
            return Ok(());
        };

        self.transport
            .answer_callback(&press.callback_id, Some(texts::OPENED_ANSWER))
            .await?;

        let chat = press.chat();
        let reply = CallbackToken::Reply(ptr.clone());
        self.transport
            .copy_message(
                chat,
                sender.platform_id,
                ptr.message_id,
                SendOptions::maybe_reply_to(press.message.and_then(|m| m.reply_to))
                    .with_button(Button::new(texts::REPLY_BUTTON, reply.encode())),
            )
            .await?;

        let mut followups = BestEffort::new();
        followups.push(
            "mark delivery notice as seen",
            self.transport
                .edit_message_text(sender.platform_id, ptr.delivery_message_id, texts::MESSAGE_SEEN),
        );
        followups.push(
            "react to original message",
            self.transport
                .set_reaction(sender.platform_id, ptr.message_id, texts::SEEN_REACTION),
        );
        if let Some(pressed) = press.message {
            followups.push(
                "remove open button message",
                self.transport.delete_message(pressed.chat, pressed.id),
            );
        }
        followups.run().await;

        log::info!("User {} opened message {} from {}", user.stable_id, ptr.message_id, sender.stable_id);
        Ok(())
    }

    async fn reply(&self, user: &User, press: &ButtonPress, ptr: MessagePointer) -> RelayResult<()> {
        let Some(counterpart) = self.resolve_partner(user, press, &ptr).await? else {
            return Ok(());
        };

        let transition = Transition::ReplyTo {
            contact: counterpart.stable_id.clone(),
            reply_to: ptr.message_id,
            pending_delivery: ptr.delivery_message_id,
        };
        if self.commit(user, transition)?.is_none() {
            self.transport
                .answer_callback(&press.callback_id, Some(texts::CONCURRENT_UPDATE))
                .await?;
            return Ok(());
        }

        self.transport
            .answer_callback(&press.callback_id, Some(texts::REPLYING_ANSWER))
            .await?;
        self.transport
            .send_message(
                press.chat(),
                texts::REPLY_PROMPT,
                SendOptions::maybe_reply_to(press.message.map(|m| m.id)),
            )
            .await?;
        Ok(())
    }

    /// `u`, `ru` and `cu`. The menu message itself is only tidied up afterwards.
    async fn handle_menu(&self, user: &User, press: &ButtonPress, action: CallbackToken) -> RelayResult<()> {
        let transition = match action {
            CallbackToken::SetHandle => Transition::BeginHandleRegistration,
            CallbackToken::RemoveHandle => Transition::RemoveHandle,
            _ => Transition::Cancel,
        };
        let is_cancel = transition == Transition::Cancel;

        if self.commit(user, transition)?.is_none() && !is_cancel {
            self.transport
                .answer_callback(&press.callback_id, Some(texts::CONCURRENT_UPDATE))
                .await?;
            return Ok(());
        }

        let answer = match action {
            CallbackToken::SetHandle => {
                self.transport
                    .send_message(
                        press.chat(),
                        texts::HANDLE_RULES_PROMPT,
                        SendOptions::maybe_reply_to(press.message.map(|m| m.id)),
                    )
                    .await?;
                texts::SETTING_HANDLE_ANSWER
            }
            CallbackToken::RemoveHandle => {
                log::info!("User {} removed handle", user.stable_id);
                texts::HANDLE_REMOVED_ANSWER
            }
            _ => texts::CANCEL_ANSWER,
        };
        self.transport.answer_callback(&press.callback_id, Some(answer)).await?;

        if let Some(menu) = press.message {
            let mut tidy = BestEffort::new();
            tidy.push("clear handle menu buttons", self.transport.clear_buttons(menu.chat, menu.id));
            if action == CallbackToken::RemoveHandle {
                tidy.push(
                    "mark handle as removed",
                    self.transport.edit_message_text(menu.chat, menu.id, texts::HANDLE_REMOVED),
                );
            }
            tidy.run().await;
        }
        Ok(())
    }

    /// Resolves the user named by a callback token, answering the press when it can't.
    async fn resolve_partner(&self, user: &User, press: &ButtonPress, ptr: &MessagePointer) -> RelayResult<Option<User>> {
        match resolve_stable(&self.store, user, &ptr.stable_id) {
            Ok(partner) => Ok(Some(partner)),
            Err(ResolveError::NotFound | ResolveError::SelfAddress) => {
                log::info!("Callback partner {} not resolvable for {}", ptr.stable_id, user.stable_id);
                self.transport
                    .answer_callback(&press.callback_id, Some(texts::PARTNER_NOT_FOUND))
                    .await?;
                Ok(None)
            }
            Err(ResolveError::Store(e)) => Err(e.into()),
        }
    }

    fn acting_user(&self, platform_id: PlatformId) -> RelayResult<User> {
        match self.store.find_by_platform_id(platform_id)? {
            Some(user) => Ok(user),
            None => {
                log::info!("First contact from {}", platform_id);
                Ok(self.store.create(platform_id)?)
            }
        }
    }

    /// Applies `transition` with compare-and-set. `Ok(None)` means another event won.
    fn commit(&self, user: &User, transition: Transition) -> RelayResult<Option<User>> {
        let Some(update) = transition.into_update() else {
            return Ok(Some(user.clone()));
        };
        let written = if update == UserUpdate::reset() {
            self.store.reset_state(user)
        } else {
            self.store.update(user, &update)
        };
        match written {
            Ok(updated) => Ok(Some(updated)),
            Err(StoreError::Conflict { stable_id }) => {
                log::warn!("Concurrent update for {}, dropping transition", stable_id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Final write of an interaction; a lost race leaves the winner's state alone.
    fn finish(&self, user: &User, transition: Transition) -> RelayResult<()> {
        self.commit(user, transition).map(|_| ())
    }

    /// Registration stays open; the user gets `text` and may try again.
    async fn retry_handle(&self, user: &User, msg: &IncomingMessage, text: &str) -> RelayResult<()> {
        self.reply_text(msg, text).await?;
        self.finish(user, Transition::HandleRetry)
    }

    async fn reply_text(&self, msg: &IncomingMessage, text: &str) -> RelayResult<()> {
        self.transport
            .send_message(msg.chat, text, SendOptions::reply_to(msg.message_id))
            .await?;
        Ok(())
    }

    async fn notify_conflict(&self, chat: PlatformId) -> RelayResult<()> {
        self.transport
            .send_message(chat, texts::CONCURRENT_UPDATE, SendOptions::default())
            .await?;
        Ok(())
    }
}
