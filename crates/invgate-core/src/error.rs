//! Error types for `invgate-core`.

use thiserror::Error;

use crate::user::UserId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user snapshot has no id")]
  MissingUserId,

  #[error("user snapshot for {0} does not say whether it is a doctor")]
  MissingRoleFlag(UserId),

  #[error("user {0} is a doctor but carries no doctor record")]
  MissingDoctorRecord(UserId),

  #[error("user {0} carries no staff profile")]
  MissingProfile(UserId),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A failed one-shot call against the REST backend.
///
/// Implementations of [`AuthBackend`](crate::backend::AuthBackend) map every
/// transport and protocol failure onto one of these variants; callers never
/// see the underlying HTTP client's error type.
#[derive(Debug, Error)]
pub enum BackendError {
  /// The backend rejected a username/password pair. The message is the one
  /// the backend sent, suitable for showing to the person who typed it.
  #[error("{0}")]
  Credentials(String),

  /// Any other non-success response. `payload` holds the JSON error body when
  /// the backend sent one.
  #[error("backend responded with status {status}")]
  Status {
    status:  u16,
    payload: Option<serde_json::Value>,
  },

  #[error("transport error: {0}")]
  Transport(String),

  #[error("malformed response: {0}")]
  Decode(String),

  /// The response parsed but does not describe a usable user.
  #[error("incomplete user record: {0}")]
  Incomplete(#[from] Error),
}

impl BackendError {
  /// HTTP status of a rejected request, if the backend answered at all.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}
