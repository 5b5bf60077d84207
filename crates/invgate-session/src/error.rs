//! Error type for `invgate-session`.

use invgate_core::{BackendError, user::UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
  /// The backend rejected the username/password pair. Carries the backend's
  /// message verbatim.
  #[error("{0}")]
  Credentials(String),

  /// The credential exchange failed for a reason other than bad credentials.
  #[error("credential exchange failed: {0}")]
  Exchange(#[source] BackendError),

  #[error("could not load the user profile: {0}")]
  ProfileFetch(#[source] BackendError),

  #[error("corrupted session state: {0}")]
  CorruptedState(String),

  #[error("no active session")]
  Unauthorized,

  #[error("record belongs to user {found}, session holds user {expected}")]
  UserMismatch { expected: UserId, found: UserId },

  #[error("could not update the user: {0}")]
  Update(#[source] BackendError),

  /// A login or logout happened while this operation was waiting on the
  /// network; its result was dropped.
  #[error("session changed while the request was in flight")]
  Superseded,

  #[error("session storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SessionError {
  pub(crate) fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
