//! Async HTTP client for the invgate REST backend.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use invgate_core::{
  BackendError,
  backend::{AuthBackend, Grant},
  user::{Token, UserId, UserPatch, UserSnapshot},
};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";

const DEFAULT_CREDENTIALS_MESSAGE: &str = "Invalid username or password.";

/// Connection settings for the backend.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  /// Root of the API, e.g. `http://localhost:8000/api/`.
  pub base_url: String,
  pub timeout:  Duration,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_API_URL.to_string(),
      timeout:  Duration::from_secs(30),
    }
  }
}

/// Async HTTP client for the backend's auth and user endpoints.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpBackend {
  client: Client,
  config: ApiConfig,
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
  username: &'a str,
  password: &'a str,
}

impl HttpBackend {
  pub fn new(config: ApiConfig) -> Result<Self, BackendError> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &ApiConfig { &self.config }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn user_url(&self, user_id: UserId) -> String { self.url(&format!("users/{user_id}/")) }
}

// ─── Response handling ───────────────────────────────────────────────────────

/// Best-effort JSON body of an error response.
async fn error_payload(resp: Response) -> Option<serde_json::Value> {
  resp.json::<serde_json::Value>().await.ok()
}

async fn rejected(resp: Response) -> BackendError {
  let status = resp.status().as_u16();
  BackendError::Status { status, payload: error_payload(resp).await }
}

async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T, BackendError> {
  resp
    .json()
    .await
    .map_err(|e| BackendError::Decode(format!("{what}: {e}")))
}

fn transport(e: reqwest::Error) -> BackendError { BackendError::Transport(e.to_string()) }

/// The message to show for a rejected login: the first `non_field_errors`
/// entry, else `detail`, else a generic one.
fn credentials_message(payload: Option<&serde_json::Value>) -> String {
  let Some(payload) = payload else {
    return DEFAULT_CREDENTIALS_MESSAGE.to_string();
  };
  payload
    .get("non_field_errors")
    .and_then(|errors| errors.get(0))
    .and_then(|m| m.as_str())
    .or_else(|| payload.get("detail").and_then(|m| m.as_str()))
    .unwrap_or(DEFAULT_CREDENTIALS_MESSAGE)
    .to_string()
}

// ─── AuthBackend impl ────────────────────────────────────────────────────────

impl AuthBackend for HttpBackend {
  /// `POST auth/`
  async fn exchange_credentials(
    &self,
    username: &str,
    password: &str,
  ) -> Result<Grant, BackendError> {
    debug!(username, "POST auth/");
    let resp = self
      .client
      .post(self.url("auth/"))
      .json(&CredentialsBody { username, password })
      .send()
      .await
      .map_err(transport)?;

    match resp.status() {
      s if s.is_success() => decode(resp, "credential grant").await,
      StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
        let payload = error_payload(resp).await;
        Err(BackendError::Credentials(credentials_message(payload.as_ref())))
      }
      _ => Err(rejected(resp).await),
    }
  }

  /// `GET users/{id}/`
  async fn fetch_profile(
    &self,
    token: &Token,
    user_id: UserId,
  ) -> Result<UserSnapshot, BackendError> {
    debug!(%user_id, "GET users/{{id}}/");
    let resp = self
      .client
      .get(self.user_url(user_id))
      .header(reqwest::header::AUTHORIZATION, token.authorization())
      .send()
      .await
      .map_err(transport)?;

    if !resp.status().is_success() {
      return Err(rejected(resp).await);
    }
    decode(resp, "user record").await
  }

  /// `PATCH users/{id}/`
  async fn update_user(
    &self,
    token: &Token,
    user_id: UserId,
    patch: &UserPatch,
  ) -> Result<(), BackendError> {
    debug!(%user_id, "PATCH users/{{id}}/");
    let resp = self
      .client
      .patch(self.user_url(user_id))
      .header(reqwest::header::AUTHORIZATION, token.authorization())
      .json(patch)
      .send()
      .await
      .map_err(transport)?;

    if !resp.status().is_success() {
      return Err(rejected(resp).await);
    }
    Ok(())
  }
}
