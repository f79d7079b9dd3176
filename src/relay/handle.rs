//! Identity resolver
//!
//! - Handle validation and normalization
//! - Recipient reference parsing (`_handle` vs stable identifier)
//! - Personal deep links
//! - Resolution of a reference to a user, rejecting self-addressing

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::ports::{StoreError, UserStore};
use super::user::{StableId, User};

/// Leading marker that turns a start parameter into a handle reference.
pub const HANDLE_MARKER: char = '_';

pub const HANDLE_MIN_LEN: usize = 3;
pub const HANDLE_MAX_LEN: usize = 20;

static HANDLE_CHARSET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("handle charset regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error("handle must be {}-{} characters long", HANDLE_MIN_LEN, HANDLE_MAX_LEN)]
    Length,

    #[error("handle may only contain English letters, digits and underscores")]
    Charset,

    #[error("handle must start with a letter")]
    LeadingCharacter,
}

/// A validated handle, always stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(String);

impl Handle {
    /// Validates user input and normalizes it to lowercase.
    ///
    /// # Examples
    /// ```
    /// use anonbot::relay::Handle;
    ///
    /// assert_eq!(Handle::parse("Abc_1").unwrap().as_str(), "abc_1");
    /// assert!(Handle::parse("ab").is_err());
    /// assert!(Handle::parse("3abc").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, HandleError> {
        let len = input.chars().count();
        if !(HANDLE_MIN_LEN..=HANDLE_MAX_LEN).contains(&len) {
            return Err(HandleError::Length);
        }
        if !HANDLE_CHARSET.is_match(input) {
            return Err(HandleError::Charset);
        }
        // charset check above guarantees ASCII
        if !input.as_bytes()[0].is_ascii_alphabetic() {
            return Err(HandleError::LeadingCharacter);
        }
        Ok(Self(input.to_ascii_lowercase()))
    }

    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a deep link names its recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientRef {
    /// `_<handle>`; kept lowercase so lookups are case-insensitive.
    Handle(String),
    /// Anything without the marker.
    Stable(String),
}

impl RecipientRef {
    pub fn parse(arg: &str) -> Self {
        let arg = arg.trim();
        match arg.strip_prefix(HANDLE_MARKER) {
            Some(handle) => Self::Handle(handle.to_ascii_lowercase()),
            None => Self::Stable(arg.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("recipient not found")]
    NotFound,

    #[error("recipient is the sender")]
    SelfAddress,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Looks a reference up without any sender check.
pub fn lookup(store: &dyn UserStore, reference: &RecipientRef) -> Result<Option<User>, StoreError> {
    match reference {
        RecipientRef::Handle(handle) => {
            if handle.is_empty() {
                return Ok(None);
            }
            store.find_by_handle(handle)
        }
        RecipientRef::Stable(raw) => match StableId::parse(raw) {
            Some(stable_id) => store.find_by_stable_id(&stable_id),
            None => Ok(None),
        },
    }
}

/// Resolves the recipient for `sender`, refusing to address the sender.
pub fn resolve_recipient(store: &dyn UserStore, sender: &User, reference: &RecipientRef) -> Result<User, ResolveError> {
    let recipient = lookup(store, reference)?.ok_or(ResolveError::NotFound)?;
    if recipient.is_same_user(sender) {
        return Err(ResolveError::SelfAddress);
    }
    Ok(recipient)
}

/// Same as [`resolve_recipient`] for identifiers carried in callback data.
pub fn resolve_stable(store: &dyn UserStore, sender: &User, stable_id: &StableId) -> Result<User, ResolveError> {
    let recipient = store.find_by_stable_id(stable_id)?.ok_or(ResolveError::NotFound)?;
    if recipient.is_same_user(sender) {
        return Err(ResolveError::SelfAddress);
    }
    Ok(recipient)
}

/// Deep links that open a conversation with `user`.
///
/// Handle-based link first when the user has a handle, identifier-based link always.
pub fn personal_links(entry_url: &str, user: &User) -> Vec<String> {
    let base = entry_url.trim_end_matches('/');
    let mut links = Vec::with_capacity(2);
    if let Some(handle) = &user.handle {
        links.push(format!("{}?start={}{}", base, HANDLE_MARKER, handle));
    }
    links.push(format!("{}?start={}", base, user.stable_id));
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::state::ConversationState;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_handle_length_bounds() {
        assert_eq!(Handle::parse("ab"), Err(HandleError::Length));
        assert!(Handle::parse("abc").is_ok());
        assert!(Handle::parse(&"a".repeat(20)).is_ok());
        assert_eq!(Handle::parse(&"a".repeat(21)), Err(HandleError::Length));
        assert_eq!(Handle::parse(""), Err(HandleError::Length));
    }

    #[test]
    fn test_handle_leading_character() {
        assert_eq!(Handle::parse("3abc"), Err(HandleError::LeadingCharacter));
        assert_eq!(Handle::parse("_abc"), Err(HandleError::LeadingCharacter));
        assert!(Handle::parse("a_3").is_ok());
    }

    #[test]
    fn test_handle_charset() {
        assert_eq!(Handle::parse("ab-c"), Err(HandleError::Charset));
        assert_eq!(Handle::parse("ab c"), Err(HandleError::Charset));
        assert_eq!(Handle::parse("абвг"), Err(HandleError::Charset));
        assert_eq!(Handle::parse("abc!"), Err(HandleError::Charset));
    }

    #[test]
    fn test_handle_is_lowercased() {
        assert_eq!(Handle::parse("abc_1").unwrap().as_str(), "abc_1");
        assert_eq!(Handle::parse("AliCe").unwrap().as_str(), "alice");
    }

    #[test]
    fn test_recipient_ref_forms() {
        assert_eq!(RecipientRef::parse("_Bob"), RecipientRef::Handle("bob".into()));
        assert_eq!(RecipientRef::parse("_"), RecipientRef::Handle(String::new()));
        let id = StableId::generate();
        assert_eq!(RecipientRef::parse(id.as_str()), RecipientRef::Stable(id.to_string()));
        assert_eq!(RecipientRef::parse(" bob "), RecipientRef::Stable("bob".into()));
    }

    #[test]
    fn test_personal_links() {
        let mut user = User {
            platform_id: 5,
            stable_id: StableId::generate(),
            handle: None,
            state: ConversationState::Idle,
            version: 0,
        };
        let links = personal_links("https://t.me/relay_bot/", &user);
        assert_eq!(links, vec![format!("https://t.me/relay_bot?start={}", user.stable_id)]);

        user.handle = Some(Handle::parse("alice").unwrap());
        let links = personal_links("https://t.me/relay_bot", &user);
        assert_eq!(
            links,
            vec![
                "https://t.me/relay_bot?start=_alice".to_string(),
                format!("https://t.me/relay_bot?start={}", user.stable_id),
            ]
        );
    }
}
