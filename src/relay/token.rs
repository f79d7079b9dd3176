//! Callback token protocol
//!
//! Inline buttons carry everything needed to resume an exchange, so nothing
//! about a conversation is stored server-side. Tokens are positional and
//! pipe-delimited to stay inside Telegram's 64-byte `callback_data` limit:
//!
//! ```text
//! o|<sender stable id>|<sender message id>|<sender delivery notice id>
//! r|<recipient stable id>|<recipient message id>|<recipient delivery notice id>
//! u | ru | cu
//! ```

use std::fmt;

use thiserror::Error;

use super::user::{MessageId, StableId};

/// Telegram rejects `callback_data` longer than this (bytes).
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

const SEPARATOR: char = '|';

const TAG_OPEN: &str = "o";
const TAG_REPLY: &str = "r";
const TAG_SET_HANDLE: &str = "u";
const TAG_REMOVE_HANDLE: &str = "ru";
const TAG_CANCEL_HANDLE: &str = "cu";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed callback data: {data}")]
    Malformed { data: String },

    #[error("unknown callback tag '{tag}'")]
    UnknownTag { tag: String },
}

/// A message somewhere in a user's chat plus the notice that reported its delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePointer {
    /// Owner of the chat the ids below belong to.
    pub stable_id: StableId,
    pub message_id: MessageId,
    pub delivery_message_id: MessageId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackToken {
    /// "Open" on a new-message notice; points at the sender's original message.
    Open(MessagePointer),
    /// "Reply" on an opened message; points back at the message being answered.
    Reply(MessagePointer),
    SetHandle,
    RemoveHandle,
    CancelHandle,
}

impl CallbackToken {
    pub fn encode(&self) -> String {
        match self {
            Self::Open(ptr) => encode_pointer(TAG_OPEN, ptr),
            Self::Reply(ptr) => encode_pointer(TAG_REPLY, ptr),
            Self::SetHandle => TAG_SET_HANDLE.to_string(),
            Self::RemoveHandle => TAG_REMOVE_HANDLE.to_string(),
            Self::CancelHandle => TAG_CANCEL_HANDLE.to_string(),
        }
    }

    /// Parses callback data. Any arity mismatch is rejected outright.
    pub fn decode(data: &str) -> Result<Self, TokenError> {
        let fields: Vec<&str> = data.split(SEPARATOR).collect();
        let malformed = || TokenError::Malformed { data: data.to_string() };

        match fields[0] {
            TAG_OPEN | TAG_REPLY => {
                let [tag, stable_id, message_id, delivery_message_id] = fields[..] else {
                    return Err(malformed());
                };
                let ptr = MessagePointer {
                    stable_id: StableId::parse(stable_id).ok_or_else(malformed)?,
                    message_id: message_id.parse().map_err(|_| malformed())?,
                    delivery_message_id: delivery_message_id.parse().map_err(|_| malformed())?,
                };
                Ok(if tag == TAG_OPEN {
                    Self::Open(ptr)
                } else {
                    Self::Reply(ptr)
                })
            }
            TAG_SET_HANDLE | TAG_REMOVE_HANDLE | TAG_CANCEL_HANDLE => {
                if fields.len() != 1 {
                    return Err(malformed());
                }
                Ok(match fields[0] {
                    TAG_SET_HANDLE => Self::SetHandle,
                    TAG_REMOVE_HANDLE => Self::RemoveHandle,
                    _ => Self::CancelHandle,
                })
            }
            tag => Err(TokenError::UnknownTag { tag: tag.to_string() }),
        }
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn encode_pointer(tag: &str, ptr: &MessagePointer) -> String {
    let data = format!(
        "{tag}{sep}{}{sep}{}{sep}{}",
        ptr.stable_id,
        ptr.message_id,
        ptr.delivery_message_id,
        sep = SEPARATOR
    );
    debug_assert!(
        data.len() <= MAX_CALLBACK_DATA_LEN,
        "callback data is {} bytes: {}",
        data.len(),
        data
    );
    data
}
