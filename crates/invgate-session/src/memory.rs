//! [`MemoryStore`]: a volatile [`SessionStore`] for embedding and tests.
//!
//! Values are kept as the same raw strings a durable store would hold, so a
//! corrupt user blob behaves exactly as it would on disk.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::warn;

use invgate_core::{
  store::{PersistedSession, SessionStore, TOKEN_KEY, USER_KEY, decode_persisted, encode_user},
  user::{Token, UserSnapshot},
};

/// In-process session storage. Clones share the same values.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  values: Arc<Mutex<HashMap<&'static str, String>>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Seed the store with raw values, as if a previous process had left them.
  pub fn with_raw(token: Option<&str>, user: Option<&str>) -> Self {
    let mut values = HashMap::new();
    if let Some(token) = token {
      values.insert(TOKEN_KEY, token.to_owned());
    }
    if let Some(user) = user {
      values.insert(USER_KEY, user.to_owned());
    }
    Self { values: Arc::new(Mutex::new(values)) }
  }

  /// The raw value stored under `key`, if any.
  pub async fn raw(&self, key: &str) -> Option<String> {
    self.values.lock().await.get(key).cloned()
  }
}

impl SessionStore for MemoryStore {
  type Error = serde_json::Error;

  async fn read(&self) -> Result<PersistedSession, serde_json::Error> {
    let mut values = self.values.lock().await;
    let token = values.get(TOKEN_KEY).cloned();
    let user = values.get(USER_KEY).cloned();
    match decode_persisted(token, user) {
      Ok(persisted) => Ok(persisted),
      Err(e) => {
        warn!(error = %e, "persisted user snapshot is unreadable; clearing session");
        values.remove(TOKEN_KEY);
        values.remove(USER_KEY);
        Ok(PersistedSession::default())
      }
    }
  }

  async fn write(
    &self,
    token: &Token,
    user: Option<&UserSnapshot>,
  ) -> Result<(), serde_json::Error> {
    let user = user.map(encode_user).transpose()?;
    let mut values = self.values.lock().await;
    values.insert(TOKEN_KEY, token.as_str().to_owned());
    match user {
      Some(user) => values.insert(USER_KEY, user),
      None => values.remove(USER_KEY),
    };
    Ok(())
  }

  async fn clear(&self) -> Result<(), serde_json::Error> {
    let mut values = self.values.lock().await;
    values.remove(TOKEN_KEY);
    values.remove(USER_KEY);
    Ok(())
  }
}
