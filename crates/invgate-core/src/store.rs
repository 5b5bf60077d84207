//! The `SessionStore` trait: durable storage for the token and the last known
//! user snapshot.
//!
//! Implemented by `invgate-store-sqlite` (durable) and by the in-memory store
//! in `invgate-session`. The session state machine only sees this trait.

use std::future::Future;

use crate::user::{Token, UserSnapshot};

/// Storage key of the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Storage key of the serialised [`UserSnapshot`].
pub const USER_KEY: &str = "user";

/// What a store hands back on [`SessionStore::read`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSession {
  pub token: Option<Token>,
  pub user:  Option<UserSnapshot>,
}

impl PersistedSession {
  pub fn is_empty(&self) -> bool { self.token.is_none() && self.user.is_none() }
}

/// Decode the two raw stored values.
///
/// An `Err` means the user blob is unreadable; the caller is expected to wipe
/// both keys and carry on with an empty session.
pub fn decode_persisted(
  token: Option<String>,
  user: Option<String>,
) -> Result<PersistedSession, serde_json::Error> {
  let user = user
    .as_deref()
    .map(serde_json::from_str::<UserSnapshot>)
    .transpose()?;
  Ok(PersistedSession {
    token: token.filter(|t| !t.is_empty()).map(Token::new),
    user,
  })
}

/// Encode a snapshot for the `user` key.
pub fn encode_user(user: &UserSnapshot) -> Result<String, serde_json::Error> {
  serde_json::to_string(user)
}

/// Abstraction over the device-local session storage.
///
/// `read` never fails because of corrupt content: an unparsable user blob
/// clears both values and yields an empty [`PersistedSession`]. Errors are
/// reserved for the storage medium itself.
pub trait SessionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Load the persisted token and user snapshot.
  fn read(
    &self,
  ) -> impl Future<Output = Result<PersistedSession, Self::Error>> + Send + '_;

  /// Overwrite both values. `None` for `user` removes the stored snapshot.
  fn write<'a>(
    &'a self,
    token: &'a Token,
    user: Option<&'a UserSnapshot>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove both values.
  fn clear(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn corrupt_user_blob_is_an_error() {
    let result = decode_persisted(Some("T1".into()), Some("{not json".into()));
    assert!(result.is_err());
  }

  #[test]
  fn token_without_user_decodes() {
    let persisted = decode_persisted(Some("T1".into()), None).unwrap();
    assert_eq!(persisted.token, Some(Token::new("T1")));
    assert!(persisted.user.is_none());
  }

  #[test]
  fn empty_token_counts_as_absent() {
    let persisted = decode_persisted(Some(String::new()), None).unwrap();
    assert!(persisted.is_empty());
  }
}
