//! Anonymous relay core: state machine, callback tokens, identity resolution
//! and the orchestrator that drives them. Transport and persistence are
//! reached only through the traits in [`ports`].

pub mod best_effort;
pub mod handle;
pub mod orchestrator;
pub mod ports;
pub mod state;
pub mod texts;
pub mod token;
pub mod user;

pub use handle::{Handle, HandleError, RecipientRef, ResolveError};
pub use orchestrator::{ButtonPress, IncomingMessage, PressedMessage, Relay, RelayError, RelayResult};
pub use ports::{Button, SendOptions, StoreError, StoreResult, Transport, TransportError, UserStore};
pub use state::{Composing, ConversationState, Transition, UserUpdate};
pub use token::{CallbackToken, MessagePointer, TokenError};
pub use user::{MessageId, PlatformId, StableId, User};
