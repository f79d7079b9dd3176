//! Transport that records relay output instead of talking to Telegram

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::relay::ports::{Button, SendOptions, Transport, TransportError, TransportResult};
use crate::relay::user::{MessageId, PlatformId};

/// First id handed out; keeps recorded ids clear of ids used for user messages in tests.
const FIRST_MESSAGE_ID: MessageId = 1000;

/// Operation kind, used to select simulated failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Send,
    EditText,
    ClearButtons,
    Delete,
    Copy,
    React,
    Answer,
}

/// One successful transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Send {
        chat: PlatformId,
        text: String,
        reply_to: Option<MessageId>,
        buttons: Vec<Button>,
        id: MessageId,
    },
    EditText {
        chat: PlatformId,
        message: MessageId,
        text: String,
    },
    ClearButtons {
        chat: PlatformId,
        message: MessageId,
    },
    Delete {
        chat: PlatformId,
        message: MessageId,
    },
    Copy {
        to_chat: PlatformId,
        from_chat: PlatformId,
        message: MessageId,
        reply_to: Option<MessageId>,
        buttons: Vec<Button>,
        id: MessageId,
    },
    React {
        chat: PlatformId,
        message: MessageId,
        emoji: String,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
    },
}

impl TransportCall {
    pub fn kind(&self) -> CallKind {
        match self {
            Self::Send { .. } => CallKind::Send,
            Self::EditText { .. } => CallKind::EditText,
            Self::ClearButtons { .. } => CallKind::ClearButtons,
            Self::Delete { .. } => CallKind::Delete,
            Self::Copy { .. } => CallKind::Copy,
            Self::React { .. } => CallKind::React,
            Self::Answer { .. } => CallKind::Answer,
        }
    }

    /// Callback data of every button attached to a send or copy.
    pub fn button_data(&self) -> Vec<&str> {
        match self {
            Self::Send { buttons, .. } | Self::Copy { buttons, .. } => {
                buttons.iter().map(|b| b.data.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Default)]
struct Recorded {
    calls: Vec<TransportCall>,
    failing: HashSet<CallKind>,
}

pub struct RecordingTransport {
    recorded: Mutex<Recorded>,
    next_id: AtomicI32,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            recorded: Mutex::new(Recorded::default()),
            next_id: AtomicI32::new(FIRST_MESSAGE_ID),
        }
    }

    // A panicking test must not take the recorder down with it
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every later call of `kind` fail.
    pub fn fail(&self, kind: CallKind) {
        self.lock().failing.insert(kind);
    }

    pub fn recover(&self, kind: CallKind) {
        self.lock().failing.remove(&kind);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }

    /// Returns and forgets everything recorded so far.
    pub fn take(&self) -> Vec<TransportCall> {
        std::mem::take(&mut self.lock().calls)
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<TransportCall> {
        self.lock().calls.iter().filter(|c| c.kind() == kind).cloned().collect()
    }

    /// Texts of messages sent to `chat`, in order.
    pub fn sent_texts(&self, chat: PlatformId) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Send { chat: to, text, .. } if *to == chat => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last message sent to `chat`.
    pub fn last_sent(&self, chat: PlatformId) -> Option<TransportCall> {
        self.lock()
            .calls
            .iter()
            .rev()
            .find(|c| matches!(c, TransportCall::Send { chat: to, .. } if *to == chat))
            .cloned()
    }

    /// Text of the last callback answer.
    pub fn last_answer(&self) -> Option<Option<String>> {
        self.lock().calls.iter().rev().find_map(|c| match c {
            TransportCall::Answer { text, .. } => Some(text.clone()),
            _ => None,
        })
    }

    fn record(&self, call: TransportCall) -> TransportResult<()> {
        let mut recorded = self.lock();
        if recorded.failing.contains(&call.kind()) {
            return Err(TransportError::Other(format!("simulated {:?} failure", call.kind())));
        }
        recorded.calls.push(call);
        Ok(())
    }

    fn allocate_id(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(&self, chat: PlatformId, text: &str, options: SendOptions) -> TransportResult<MessageId> {
        let id = self.allocate_id();
        self.record(TransportCall::Send {
            chat,
            text: text.to_string(),
            reply_to: options.reply_to,
            buttons: options.buttons,
            id,
        })?;
        Ok(id)
    }

    async fn edit_message_text(&self, chat: PlatformId, message: MessageId, text: &str) -> TransportResult<()> {
        self.record(TransportCall::EditText {
            chat,
            message,
            text: text.to_string(),
        })
    }

    async fn clear_buttons(&self, chat: PlatformId, message: MessageId) -> TransportResult<()> {
        self.record(TransportCall::ClearButtons { chat, message })
    }

    async fn delete_message(&self, chat: PlatformId, message: MessageId) -> TransportResult<()> {
        self.record(TransportCall::Delete { chat, message })
    }

    async fn copy_message(
        &self,
        to_chat: PlatformId,
        from_chat: PlatformId,
        message: MessageId,
        options: SendOptions,
    ) -> TransportResult<MessageId> {
        let id = self.allocate_id();
        self.record(TransportCall::Copy {
            to_chat,
            from_chat,
            message,
            reply_to: options.reply_to,
            buttons: options.buttons,
            id,
        })?;
        Ok(id)
    }

    async fn set_reaction(&self, chat: PlatformId, message: MessageId, emoji: &str) -> TransportResult<()> {
        self.record(TransportCall::React {
            chat,
            message,
            emoji: emoji.to_string(),
        })
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> TransportResult<()> {
        self.record(TransportCall::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        })
    }
}
