//! Conversation state machine
//!
//! Each user has exactly one active mode. The composing context (counterpart,
//! reply target, pending delivery notice) only exists inside
//! [`ConversationState::ComposingOutbound`], so leaving that state drops it.
//!
//! Handlers never patch individual columns. They pick a [`Transition`], turn it
//! into a [`UserUpdate`], and the store applies that as one compare-and-set.

use thiserror::Error;

use super::handle::Handle;
use super::user::{MessageId, StableId, User};

/// Addressing context of a user who is about to send something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composing {
    /// Who the next message goes to.
    pub contact: StableId,
    /// Message in the counterpart's chat that the delivery should thread under.
    pub reply_to: Option<MessageId>,
    /// Counterpart's "sent"/"seen" notice to remove once this reply lands.
    pub pending_delivery: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    ComposingOutbound(Composing),
    RegisteringHandle,
}

/// Column values used by the SQLite row mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateColumns {
    pub kind: &'static str,
    pub contact: Option<String>,
    pub reply_to: Option<MessageId>,
    pub pending_delivery: Option<MessageId>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateDecodeError {
    #[error("unknown conversation state '{0}'")]
    UnknownKind(String),

    #[error("composing state without a contact")]
    MissingContact,

    #[error("state '{0}' carries composing fields")]
    StrayFields(String),
}

/// What the next non-command message means for a user.
#[derive(Debug, PartialEq, Eq)]
pub enum TextIntent<'a> {
    Relay(&'a Composing),
    RegisterHandle,
    Unrecognized,
}

const KIND_IDLE: &str = "idle";
const KIND_COMPOSING: &str = "composing";
const KIND_REGISTERING: &str = "registering";

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn composing(&self) -> Option<&Composing> {
        match self {
            Self::ComposingOutbound(composing) => Some(composing),
            _ => None,
        }
    }

    pub fn text_intent(&self) -> TextIntent<'_> {
        match self {
            Self::ComposingOutbound(composing) => TextIntent::Relay(composing),
            Self::RegisteringHandle => TextIntent::RegisterHandle,
            Self::Idle => TextIntent::Unrecognized,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Idle => KIND_IDLE,
            Self::ComposingOutbound(_) => KIND_COMPOSING,
            Self::RegisteringHandle => KIND_REGISTERING,
        }
    }

    pub fn to_columns(&self) -> StateColumns {
        match self {
            Self::ComposingOutbound(c) => StateColumns {
                kind: KIND_COMPOSING,
                contact: Some(c.contact.as_str().to_string()),
                reply_to: c.reply_to,
                pending_delivery: c.pending_delivery,
            },
            other => StateColumns {
                kind: other.kind(),
                contact: None,
                reply_to: None,
                pending_delivery: None,
            },
        }
    }

    /// Rebuilds the state from stored columns. A zero message id means "none".
    pub fn from_columns(
        kind: &str,
        contact: Option<String>,
        reply_to: Option<MessageId>,
        pending_delivery: Option<MessageId>,
    ) -> Result<Self, StateDecodeError> {
        let reply_to = reply_to.filter(|id| *id != 0);
        let pending_delivery = pending_delivery.filter(|id| *id != 0);

        match kind {
            KIND_COMPOSING => {
                let contact = contact.ok_or(StateDecodeError::MissingContact)?;
                Ok(Self::ComposingOutbound(Composing {
                    contact: StableId::from_stored(contact),
                    reply_to,
                    pending_delivery,
                }))
            }
            KIND_IDLE | KIND_REGISTERING => {
                if contact.is_some() || reply_to.is_some() || pending_delivery.is_some() {
                    return Err(StateDecodeError::StrayFields(kind.to_string()));
                }
                Ok(if kind == KIND_IDLE {
                    Self::Idle
                } else {
                    Self::RegisteringHandle
                })
            }
            other => Err(StateDecodeError::UnknownKind(other.to_string())),
        }
    }
}

/// Explicit patch applied atomically by the store.
///
/// `None` leaves a field untouched. `handle: Some(None)` clears the handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub state: Option<ConversationState>,
    pub handle: Option<Option<Handle>>,
}

impl UserUpdate {
    pub fn to_state(state: ConversationState) -> Self {
        Self {
            state: Some(state),
            handle: None,
        }
    }

    pub fn reset() -> Self {
        Self::to_state(ConversationState::Idle)
    }

    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(Some(handle));
        self
    }

    pub fn clear_handle(mut self) -> Self {
        self.handle = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.handle.is_none()
    }

    /// The record as it looks after this patch (version bumped once).
    pub fn apply_to(&self, user: &User) -> User {
        let mut next = user.clone();
        if let Some(state) = &self.state {
            next.state = state.clone();
        }
        if let Some(handle) = &self.handle {
            next.handle = handle.clone();
        }
        next.version += 1;
        next
    }
}

/// Every state change the orchestrator can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A recipient link resolved to someone else.
    OpenRecipient { contact: StableId },
    /// "Reply" pressed on a delivered message.
    ReplyTo {
        contact: StableId,
        reply_to: MessageId,
        pending_delivery: MessageId,
    },
    /// The composed message went out.
    Relayed,
    /// "Set handle" pressed.
    BeginHandleRegistration,
    /// A valid, free handle was entered.
    HandleStored(Handle),
    /// The entered handle already belongs to this user.
    HandleAlreadyOwned,
    /// The entered handle is invalid or taken by someone else.
    HandleRetry,
    RemoveHandle,
    Cancel,
    /// `/start`, `/info`, `/link` and anything else that is not a continuation.
    CommandServed,
}

impl Transition {
    /// Canonical write for this transition, `None` when the state stays as it is.
    pub fn into_update(self) -> Option<UserUpdate> {
        match self {
            Self::OpenRecipient { contact } => Some(UserUpdate::to_state(ConversationState::ComposingOutbound(
                Composing {
                    contact,
                    reply_to: None,
                    pending_delivery: None,
                },
            ))),
            Self::ReplyTo {
                contact,
                reply_to,
                pending_delivery,
            } => Some(UserUpdate::to_state(ConversationState::ComposingOutbound(Composing {
                contact,
                reply_to: Some(reply_to).filter(|id| *id != 0),
                pending_delivery: Some(pending_delivery).filter(|id| *id != 0),
            }))),
            Self::BeginHandleRegistration => Some(UserUpdate::to_state(ConversationState::RegisteringHandle)),
            Self::HandleStored(handle) => Some(UserUpdate::reset().with_handle(handle)),
            Self::RemoveHandle => Some(UserUpdate::reset().clear_handle()),
            Self::Relayed | Self::HandleAlreadyOwned | Self::Cancel | Self::CommandServed => Some(UserUpdate::reset()),
            Self::HandleRetry => None,
        }
    }
}
