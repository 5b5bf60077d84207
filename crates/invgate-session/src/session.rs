//! The [`Session`] state machine.
//!
//! ```text
//!   Idle ──login──▶ Rehydrating ──profile ok──▶ Ready
//!                        │                        │
//!                        └──any failure──▶ logout ◀┘
//! ```
//!
//! Every login and logout starts a new *epoch*. A network result is only
//! applied if the epoch it was requested under is still current, and the
//! epoch check, the storage write and the in-memory update happen under one
//! lock. A stale response can therefore never overwrite the outcome of a
//! later login or logout.

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use invgate_core::{
  BackendError,
  backend::AuthBackend,
  store::SessionStore,
  user::{Token, UserId, UserPatch, UserRecord, UserSnapshot},
};

use crate::{Result, SessionError};

// ─── State ───────────────────────────────────────────────────────────────────

/// Whether the UI should block on the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadingState {
  /// Nothing has happened yet and there is no token.
  #[default]
  Idle,
  /// A token is present and the user behind it is being fetched.
  Rehydrating,
  /// Settled: either a complete user is loaded or the attempt ended.
  Ready,
}

/// The user as far as the session knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
  /// A complete record; no fetch needed.
  Resolved(Arc<UserRecord>),
  /// A persisted snapshot that is missing something. Only its id is used,
  /// to fetch the full record.
  Unresolved(UserSnapshot),
}

impl Identity {
  pub fn id(&self) -> Option<UserId> {
    match self {
      Self::Resolved(user) => Some(user.id),
      Self::Unresolved(snapshot) => snapshot.id,
    }
  }
}

/// A consistent copy of the session state, as published to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
  pub token:   Option<Token>,
  pub user:    Option<Identity>,
  pub loading: LoadingState,
}

impl SessionView {
  pub fn is_authenticated(&self) -> bool { self.token.is_some() }

  pub fn is_loading(&self) -> bool { self.loading == LoadingState::Rehydrating }

  /// The complete user record, once there is one.
  pub fn user(&self) -> Option<&Arc<UserRecord>> {
    match &self.user {
      Some(Identity::Resolved(user)) => Some(user),
      _ => None,
    }
  }
}

/// Outcome of [`Session::rehydrate`]. Failures are recovered by logging out,
/// so they are reported here rather than as an `Err`.
#[derive(Debug)]
pub enum Rehydration {
  /// Nothing to do: no token, or the user is already complete.
  Skipped,
  Restored(Arc<UserRecord>),
  /// The attempt failed and the session was logged out.
  LoggedOut(SessionError),
  /// A login or logout overtook the attempt; its result was dropped.
  Discarded,
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Owns the token and user for one client. Construct it once at startup with
/// [`Session::start`] (or [`Session::restore`]) and share it by reference or
/// `Arc`; dropping it is the teardown point.
pub struct Session<B, S> {
  backend: B,
  store:   S,
  state:   watch::Sender<SessionView>,
  epoch:   AtomicU64,
  /// Serialises "check epoch, write storage, publish state" sequences.
  commit:  Mutex<()>,
}

impl<B, S> Session<B, S>
where
  B: AuthBackend,
  S: SessionStore,
{
  /// Build a session from whatever the store holds, without touching the
  /// network.
  ///
  /// No token gives `Idle`. A token with a complete user snapshot gives
  /// `Ready`. A token with a partial or missing snapshot gives `Rehydrating`,
  /// and [`Session::rehydrate`] should follow.
  pub async fn restore(backend: B, store: S) -> Result<Self> {
    let persisted = store.read().await.map_err(SessionError::storage)?;

    let view = match (persisted.token, persisted.user) {
      (None, user) => {
        if user.is_some() {
          warn!("found a persisted user without a token; discarding it");
          store.clear().await.map_err(SessionError::storage)?;
        }
        SessionView::default()
      }
      (Some(token), Some(snapshot)) if snapshot.is_complete() => {
        match UserRecord::try_from(snapshot) {
          Ok(user) => SessionView {
            token:   Some(token),
            user:    Some(Identity::Resolved(Arc::new(user))),
            loading: LoadingState::Ready,
          },
          Err(e) => return Err(SessionError::CorruptedState(e.to_string())),
        }
      }
      (Some(token), snapshot) => SessionView {
        token:   Some(token),
        user:    snapshot.map(Identity::Unresolved),
        loading: LoadingState::Rehydrating,
      },
    };

    debug!(
      authenticated = view.is_authenticated(),
      loading = ?view.loading,
      "restored session"
    );

    let (state, _) = watch::channel(view);
    Ok(Self {
      backend,
      store,
      state,
      epoch: AtomicU64::new(0),
      commit: Mutex::new(()),
    })
  }

  /// [`Session::restore`] followed by [`Session::rehydrate`].
  pub async fn start(backend: B, store: S) -> Result<Self> {
    let session = Self::restore(backend, store).await?;
    match session.rehydrate().await {
      Rehydration::LoggedOut(e) => warn!(error = %e, "stored session could not be restored"),
      outcome => debug!(?outcome, "startup rehydration finished"),
    }
    Ok(session)
  }

  // ── Observation ───────────────────────────────────────────────────────────

  /// A copy of the current state.
  pub fn view(&self) -> SessionView { self.state.borrow().clone() }

  /// Receive every subsequent state change.
  pub fn subscribe(&self) -> watch::Receiver<SessionView> { self.state.subscribe() }

  pub fn backend(&self) -> &B { &self.backend }

  fn current_epoch(&self) -> u64 { self.epoch.load(Ordering::SeqCst) }

  fn next_epoch(&self) -> u64 { self.epoch.fetch_add(1, Ordering::SeqCst) + 1 }

  fn publish(&self, update: impl FnOnce(&mut SessionView)) {
    self.state.send_modify(update);
  }

  // ── Rehydration ───────────────────────────────────────────────────────────

  /// Make sure the user behind the current token is fully loaded.
  ///
  /// Does not call the backend when there is no token or the user is already
  /// complete. Otherwise fetches the profile for the known user id (falling
  /// back to the persisted snapshot's id) and installs it. Any failure,
  /// including having no id at all, logs the session out. `loading` is never
  /// left at `Rehydrating`.
  pub async fn rehydrate(&self) -> Rehydration {
    let epoch = self.current_epoch();

    let (token, known_id) = {
      let view = self.state.borrow();
      match (&view.token, &view.user) {
        (Some(token), Some(Identity::Unresolved(snapshot))) => {
          (Some(token.clone()), snapshot.id)
        }
        (Some(token), None) => (Some(token.clone()), None),
        _ => (None, None),
      }
    };

    let Some(token) = token else {
      // No token, or a complete user: settle without a fetch.
      self.state.send_if_modified(|view| {
        let settle = view.loading == LoadingState::Rehydrating;
        if settle {
          view.loading = LoadingState::Ready;
        }
        settle
      });
      debug!("rehydration not needed");
      return Rehydration::Skipped;
    };

    self.publish(|view| view.loading = LoadingState::Rehydrating);

    let user_id = match known_id {
      Some(id) => Some(id),
      None => match self.store.read().await {
        Ok(persisted) => persisted.user.and_then(|u| u.id),
        Err(e) => {
          warn!(error = %e, "could not read persisted user during rehydration");
          None
        }
      },
    };

    let Some(user_id) = user_id else {
      let err = SessionError::CorruptedState("no user id to rehydrate".into());
      return self.fail_rehydration(epoch, err).await;
    };

    debug!(%user_id, "fetching profile to rehydrate session");
    let fetched = self
      .backend
      .fetch_profile(&token, user_id)
      .await
      .map_err(SessionError::ProfileFetch)
      .and_then(|snapshot| fetched_record(snapshot, user_id));

    let user = match fetched {
      Ok(user) => user,
      Err(e) => return self.fail_rehydration(epoch, e).await,
    };

    match self.commit_user(epoch, token, user).await {
      Ok(user) => {
        info!(user_id = %user.id, "session rehydrated");
        Rehydration::Restored(user)
      }
      Err(SessionError::Superseded) => {
        debug!("rehydration overtaken by a newer login or logout");
        Rehydration::Discarded
      }
      Err(e) => self.fail_rehydration(epoch, e).await,
    }
  }

  async fn fail_rehydration(&self, epoch: u64, err: SessionError) -> Rehydration {
    let _guard = self.commit.lock().await;
    if self.current_epoch() != epoch {
      debug!(error = %err, "stale rehydration failure ignored");
      return Rehydration::Discarded;
    }
    warn!(error = %err, "rehydration failed; logging out");
    if let Err(e) = self.logout_locked().await {
      warn!(error = %e, "could not clear persisted session");
    }
    Rehydration::LoggedOut(err)
  }

  // ── Login / logout ────────────────────────────────────────────────────────

  /// Exchange credentials for a token, then load the user behind it.
  ///
  /// Prior credentials are wiped before the attempt. If either step fails
  /// the session is logged out and the failure returned; a rejected password
  /// comes back as [`SessionError::Credentials`] with the backend's message.
  pub async fn login(&self, username: &str, password: &str) -> Result<Arc<UserRecord>> {
    let epoch = {
      let _guard = self.commit.lock().await;
      let epoch = self.next_epoch();
      self.publish(|view| {
        view.token = None;
        view.user = None;
        view.loading = LoadingState::Rehydrating;
      });
      if let Err(e) = self.store.clear().await {
        let err = SessionError::storage(e);
        self.logout_quietly().await;
        return Err(err);
      }
      epoch
    };

    info!(username, "logging in");

    let grant = match self.backend.exchange_credentials(username, password).await {
      Ok(grant) => grant,
      Err(BackendError::Credentials(message)) => {
        return Err(self.abort_login(epoch, SessionError::Credentials(message)).await);
      }
      Err(e) => return Err(self.abort_login(epoch, SessionError::Exchange(e)).await),
    };

    // Checkpoint: token plus granted user id. `rehydrate` resumes from here.
    {
      let _guard = self.commit.lock().await;
      if self.current_epoch() != epoch {
        return Err(SessionError::Superseded);
      }
      let pending = UserSnapshot { id: Some(grant.user_id), ..Default::default() };
      if let Err(e) = self.store.write(&grant.token, Some(&pending)).await {
        let err = SessionError::storage(e);
        self.logout_quietly().await;
        return Err(err);
      }
      let token = grant.token.clone();
      self.publish(|view| {
        view.token = Some(token);
        view.user = Some(Identity::Unresolved(pending));
      });
    }

    let fetched = self
      .backend
      .fetch_profile(&grant.token, grant.user_id)
      .await
      .map_err(SessionError::ProfileFetch)
      .and_then(|snapshot| fetched_record(snapshot, grant.user_id));

    let user = match fetched {
      Ok(user) => user,
      Err(e) => return Err(self.abort_login(epoch, e).await),
    };

    match self.commit_user(epoch, grant.token, user).await {
      Ok(user) => {
        info!(user_id = %user.id, "logged in");
        Ok(user)
      }
      Err(SessionError::Superseded) => Err(SessionError::Superseded),
      Err(e) => Err(self.abort_login(epoch, e).await),
    }
  }

  async fn abort_login(&self, epoch: u64, err: SessionError) -> SessionError {
    let _guard = self.commit.lock().await;
    if self.current_epoch() == epoch {
      warn!(error = %err, "login failed; logging out");
      self.logout_quietly().await;
    }
    err
  }

  /// Forget the token and user, in memory and in storage. Safe to call in any
  /// state, any number of times.
  ///
  /// The in-memory state is cleared even when clearing storage fails; the
  /// storage error is still returned.
  pub async fn logout(&self) -> Result<()> {
    let _guard = self.commit.lock().await;
    self.logout_locked().await
  }

  /// Caller must hold `commit`.
  async fn logout_locked(&self) -> Result<()> {
    self.next_epoch();
    let was_authenticated = self.state.borrow().is_authenticated();
    self.publish(|view| {
      view.token = None;
      view.user = None;
      view.loading = LoadingState::Ready;
    });
    let cleared = self.store.clear().await.map_err(SessionError::storage);
    if was_authenticated {
      info!("logged out");
    }
    cleared
  }

  /// Caller must hold `commit`.
  async fn logout_quietly(&self) {
    if let Err(e) = self.logout_locked().await {
      warn!(error = %e, "could not clear persisted session");
    }
  }

  // ── User updates ──────────────────────────────────────────────────────────

  /// Replace the current user with `record` and persist it. The token is not
  /// touched.
  ///
  /// A login or logout that lands first wins; the update then fails with
  /// [`SessionError::Superseded`].
  pub async fn update_user(&self, record: UserRecord) -> Result<Arc<UserRecord>> {
    let epoch = self.current_epoch();
    let token = self.view().token.ok_or(SessionError::Unauthorized)?;
    self.commit_user(epoch, token, record).await
  }

  /// Send `patch` to the backend, then reload the user and install it.
  ///
  /// Failures are returned without logging out: the session itself is still
  /// valid.
  pub async fn save_profile(&self, patch: UserPatch) -> Result<Arc<UserRecord>> {
    let view = self.view();
    let token = view.token.clone().ok_or(SessionError::Unauthorized)?;
    let user = view.user().cloned().ok_or(SessionError::Unauthorized)?;
    let epoch = self.current_epoch();

    let patch = patch.retaining_role(&user);
    self
      .backend
      .update_user(&token, user.id, &patch)
      .await
      .map_err(SessionError::Update)?;

    let snapshot = self
      .backend
      .fetch_profile(&token, user.id)
      .await
      .map_err(SessionError::ProfileFetch)?;
    let record = fetched_record(snapshot, user.id)?;

    let updated = self.commit_user(epoch, token, record).await?;
    info!(user_id = %updated.id, "profile saved");
    Ok(updated)
  }

  /// Persist `user` under `token` and publish it, unless `epoch` is no longer
  /// current or the session already belongs to another user.
  async fn commit_user(
    &self,
    epoch: u64,
    token: Token,
    user: UserRecord,
  ) -> Result<Arc<UserRecord>> {
    let _guard = self.commit.lock().await;
    if epoch != self.current_epoch() {
      return Err(SessionError::Superseded);
    }

    let expected = self.state.borrow().user.as_ref().and_then(Identity::id);
    if let Some(expected) = expected
      && expected != user.id
    {
      return Err(SessionError::UserMismatch { expected, found: user.id });
    }

    self
      .store
      .write(&token, Some(&UserSnapshot::from(&user)))
      .await
      .map_err(SessionError::storage)?;

    let user = Arc::new(user);
    let published = Arc::clone(&user);
    self.publish(move |view| {
      view.token = Some(token);
      view.user = Some(Identity::Resolved(published));
      view.loading = LoadingState::Ready;
    });
    Ok(user)
  }
}

/// Turn a freshly fetched payload into a record, insisting it is the user
/// that was asked for.
fn fetched_record(snapshot: UserSnapshot, requested: UserId) -> Result<UserRecord> {
  let user = UserRecord::from_fetched(snapshot)
    .map_err(|e| SessionError::ProfileFetch(BackendError::Incomplete(e)))?;
  if user.id != requested {
    return Err(SessionError::UserMismatch { expected: requested, found: user.id });
  }
  Ok(user)
}
