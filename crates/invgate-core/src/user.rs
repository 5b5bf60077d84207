//! User identity: the loose snapshot the backend sends and the device
//! persists, and the complete [`UserRecord`] the rest of the system reasons
//! about.
//!
//! A [`UserSnapshot`] mirrors the backend's JSON verbatim, so every field is
//! optional. A [`UserRecord`] can only be built from a snapshot that carries
//! everything role derivation needs; the role-specific sub-record lives inside
//! [`UserKind`] rather than as two independent optionals.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Backend primary key of a user account.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// Canonical identifier of a doctor: the `id` of the doctor record.
///
/// Resources reference their requesting doctor by this id and nothing else;
/// ownership checks compare values of this type only.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DoctorId(pub u64);

impl fmt::Display for DoctorId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// Opaque bearer credential issued by the backend's credential exchange.
///
/// The `Debug` impl never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
  pub fn new(raw: impl Into<String>) -> Self { Self(raw.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  /// Value for the `Authorization` header: `Token <token>`.
  pub fn authorization(&self) -> String { format!("Token {}", self.0) }
}

impl fmt::Debug for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Token(***)")
  }
}

// ─── Sub-records ─────────────────────────────────────────────────────────────

/// Attributes of non-doctor staff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
  pub full_name:     Option<String>,
  pub position:      Option<String>,
  pub area:          Option<String>,
  pub phone_number:  Option<String>,
  pub location:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_login_at: Option<DateTime<Utc>>,
}

/// Attributes of a doctor. `id` is required: a doctor record without one
/// cannot take part in ownership checks and is rejected when parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorRecord {
  pub id:              DoctorId,
  pub full_name:       Option<String>,
  pub specialty:       Option<String>,
  pub medical_license: Option<String>,
  pub phone_number:    Option<String>,
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// The user JSON as the backend serves it and as it is persisted on the
/// device. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
  pub id:          Option<UserId>,
  pub username:    Option<String>,
  pub email:       Option<String>,
  pub is_staff:    Option<bool>,
  pub es_doctor:   Option<bool>,
  pub userprofile: Option<ProfileRecord>,
  pub doctor:      Option<DoctorRecord>,
}

impl UserSnapshot {
  /// A snapshot is complete when it has an id, a definite doctor flag and the
  /// sub-record matching that flag. Complete snapshots need no refetch.
  pub fn is_complete(&self) -> bool { self.check_complete().is_ok() }

  fn check_complete(&self) -> Result<UserId> {
    let id = self.id.ok_or(Error::MissingUserId)?;
    match self.es_doctor {
      None => Err(Error::MissingRoleFlag(id)),
      Some(true) if self.doctor.is_none() => Err(Error::MissingDoctorRecord(id)),
      Some(false) if self.userprofile.is_none() => Err(Error::MissingProfile(id)),
      Some(_) => Ok(id),
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Role-specific part of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserKind {
  Staff { profile: ProfileRecord },
  Doctor { doctor: DoctorRecord },
}

/// A complete user identity. Replaced wholesale on every update, never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
  pub id:               UserId,
  pub username:         String,
  pub email:            Option<String>,
  pub is_administrator: bool,
  pub kind:             UserKind,
}

impl UserRecord {
  /// Build a record from a payload the backend just served.
  ///
  /// Unlike [`TryFrom<UserSnapshot>`], a staff account without a profile is
  /// accepted with an empty one: the backend is authoritative and simply has
  /// none stored. A doctor without a doctor record is still rejected.
  pub fn from_fetched(mut snapshot: UserSnapshot) -> Result<Self> {
    if snapshot.es_doctor == Some(false) && snapshot.userprofile.is_none() {
      snapshot.userprofile = Some(ProfileRecord::default());
    }
    Self::try_from(snapshot)
  }

  pub fn doctor(&self) -> Option<&DoctorRecord> {
    match &self.kind {
      UserKind::Doctor { doctor } => Some(doctor),
      UserKind::Staff { .. } => None,
    }
  }

  pub fn profile(&self) -> Option<&ProfileRecord> {
    match &self.kind {
      UserKind::Staff { profile } => Some(profile),
      UserKind::Doctor { .. } => None,
    }
  }

  /// Best available human name: the role record's full name, else the
  /// username.
  pub fn display_name(&self) -> &str {
    let full = match &self.kind {
      UserKind::Staff { profile } => profile.full_name.as_deref(),
      UserKind::Doctor { doctor } => doctor.full_name.as_deref(),
    };
    full.filter(|n| !n.is_empty()).unwrap_or(self.username.as_str())
  }
}

impl TryFrom<UserSnapshot> for UserRecord {
  type Error = Error;

  fn try_from(snapshot: UserSnapshot) -> Result<Self> {
    let id = snapshot.check_complete()?;
    let kind = match (snapshot.es_doctor, snapshot.doctor, snapshot.userprofile) {
      (Some(true), Some(doctor), _) => UserKind::Doctor { doctor },
      (Some(false), _, Some(profile)) => UserKind::Staff { profile },
      // check_complete rules out every other combination
      _ => return Err(Error::MissingRoleFlag(id)),
    };
    Ok(Self {
      id,
      username: snapshot.username.unwrap_or_default(),
      email: snapshot.email,
      is_administrator: snapshot.is_staff.unwrap_or(false),
      kind,
    })
  }
}

impl From<&UserRecord> for UserSnapshot {
  fn from(user: &UserRecord) -> Self {
    let (userprofile, doctor) = match &user.kind {
      UserKind::Staff { profile } => (Some(profile.clone()), None),
      UserKind::Doctor { doctor } => (None, Some(doctor.clone())),
    };
    Self {
      id: Some(user.id),
      username: Some(user.username.clone()),
      email: user.email.clone(),
      is_staff: Some(user.is_administrator),
      es_doctor: Some(doctor.is_some()),
      userprofile,
      doctor,
    }
  }
}

// ─── Patch ───────────────────────────────────────────────────────────────────

/// Body of `PATCH users/{id}/`. Absent fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email:       Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_staff:    Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub userprofile: Option<ProfileRecord>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub doctor:      Option<DoctorRecord>,
}

impl UserPatch {
  /// Carry the user's current doctor record along when the patch does not set
  /// one. The backend treats a missing `doctor` as "no longer a doctor".
  pub fn retaining_role(mut self, user: &UserRecord) -> Self {
    if self.doctor.is_none() {
      self.doctor = user.doctor().cloned();
    }
    self
  }
}
