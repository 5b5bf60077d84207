//! The `AuthBackend` trait: the three REST calls the session manager makes.
//!
//! Each method is a single request/response exchange with no retries.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  BackendError,
  user::{Token, UserId, UserPatch, UserSnapshot},
};

/// Successful answer of `POST auth/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
  pub token:   Token,
  pub user_id: UserId,
}

pub trait AuthBackend: Send + Sync {
  /// `POST auth/`: trade a username/password pair for a token.
  ///
  /// A rejected pair is reported as [`BackendError::Credentials`].
  fn exchange_credentials<'a>(
    &'a self,
    username: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<Grant, BackendError>> + Send + 'a;

  /// `GET users/{id}/`: fetch the full user record.
  fn fetch_profile<'a>(
    &'a self,
    token: &'a Token,
    user_id: UserId,
  ) -> impl Future<Output = Result<UserSnapshot, BackendError>> + Send + 'a;

  /// `PATCH users/{id}/`: partial update of the user.
  fn update_user<'a>(
    &'a self,
    token: &'a Token,
    user_id: UserId,
    patch: &'a UserPatch,
  ) -> impl Future<Output = Result<(), BackendError>> + Send + 'a;
}
