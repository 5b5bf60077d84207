//! [`SqliteStore`]: the SQLite implementation of [`SessionStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use tracing::{debug, warn};

use invgate_core::{
  store::{PersistedSession, SessionStore, TOKEN_KEY, USER_KEY, decode_persisted, encode_user},
  user::{Token, UserSnapshot},
};

use crate::{Error, Result, schema::SCHEMA};

const UPSERT: &str = "
INSERT INTO session_values (key, value) VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET
    value      = excluded.value,
    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

// ─── Store ───────────────────────────────────────────────────────────────────

/// Session storage backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch the raw `(token, user)` strings without interpreting them.
  pub(crate) async fn read_raw(&self) -> Result<(Option<String>, Option<String>)> {
    let raw = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare_cached("SELECT value FROM session_values WHERE key = ?1")?;
        let token: Option<String> = stmt
          .query_row([TOKEN_KEY], |r| r.get(0))
          .optional()?;
        let user: Option<String> = stmt
          .query_row([USER_KEY], |r| r.get(0))
          .optional()?;
        Ok((token, user))
      })
      .await?;
    Ok(raw)
  }

  /// Store an arbitrary value under `key`, bypassing encoding.
  #[cfg(test)]
  pub(crate) async fn put_raw(&self, key: &'static str, value: &str) -> Result<()> {
    let value = value.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(UPSERT, rusqlite::params![key, value])?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for SqliteStore {
  type Error = Error;

  async fn read(&self) -> Result<PersistedSession> {
    let (token, user) = self.read_raw().await?;
    match decode_persisted(token, user) {
      Ok(persisted) => Ok(persisted),
      Err(e) => {
        warn!(error = %e, "persisted user snapshot is unreadable; clearing session");
        self.clear().await?;
        Ok(PersistedSession::default())
      }
    }
  }

  async fn write(&self, token: &Token, user: Option<&UserSnapshot>) -> Result<()> {
    let token = token.as_str().to_owned();
    let user = user.map(encode_user).transpose()?;
    let has_user = user.is_some();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(UPSERT, rusqlite::params![TOKEN_KEY, token])?;
        match user {
          Some(user) => {
            tx.execute(UPSERT, rusqlite::params![USER_KEY, user])?;
          }
          None => {
            tx.execute(
              "DELETE FROM session_values WHERE key = ?1",
              rusqlite::params![USER_KEY],
            )?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(has_user, "persisted session");
    Ok(())
  }

  async fn clear(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute(
          "DELETE FROM session_values WHERE key IN (?1, ?2)",
          rusqlite::params![TOKEN_KEY, USER_KEY],
        )?;
        Ok(())
      })
      .await?;
    debug!("cleared persisted session");
    Ok(())
  }
}
