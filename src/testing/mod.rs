//! Testing utilities
//!
//! [`RecordingTransport`] stands in for Telegram: it records every call the
//! relay makes, hands out increasing message ids and can be told to fail
//! selected operations.
//!
//! ```
//! use anonbot::testing::{CallKind, RecordingTransport};
//!
//! let transport = RecordingTransport::new();
//! transport.fail(CallKind::React);
//! assert!(transport.calls().is_empty());
//! ```

pub mod recorder;

pub use recorder::{CallKind, RecordingTransport, TransportCall};
