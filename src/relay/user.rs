//! User record and identifiers

use std::fmt;

use uuid::Uuid;

use super::handle::Handle;
use super::state::ConversationState;

/// Telegram user id; in private chats it doubles as the chat id.
pub type PlatformId = i64;

/// Telegram message id within one chat.
pub type MessageId = i32;

/// Opaque identifier assigned at first contact. Never changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StableId(String);

impl StableId {
    /// Generates a fresh identifier (UUID v4, hyphenated).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts identifier-form input from links and callback data.
    ///
    /// Only the shape is checked; the raw text is kept as-is so lookups stay exact.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(|_| Self(raw.to_string()))
    }

    /// Wraps a value read back from storage.
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row per Telegram account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub platform_id: PlatformId,
    pub stable_id: StableId,
    pub handle: Option<Handle>,
    pub state: ConversationState,
    /// Optimistic-concurrency counter, bumped by every write.
    pub version: i64,
}

impl User {
    /// Name shown to someone about to write to this user.
    pub fn display_name(&self) -> &str {
        match &self.handle {
            Some(handle) => handle.as_str(),
            None => self.stable_id.as_str(),
        }
    }

    pub fn is_same_user(&self, other: &User) -> bool {
        self.stable_id == other.stable_id
    }
}
