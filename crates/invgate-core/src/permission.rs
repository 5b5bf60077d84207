//! Role and ownership derivations.
//!
//! Everything here is a pure function of its arguments: no I/O, no hidden
//! state. The same functions back route-level gating and per-field view/edit
//! decisions.

use serde::{Deserialize, Serialize};

use crate::user::{DoctorId, UserKind, UserRecord};

// ─── Roles ───────────────────────────────────────────────────────────────────

/// The role a user acts under. Derived from the record, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Administrator,
  Doctor,
  Staff,
}

pub fn is_admin(user: &UserRecord) -> bool { user.is_administrator }

pub fn is_doctor_role(user: &UserRecord) -> bool {
  matches!(user.kind, UserKind::Doctor { .. })
}

/// Administrator wins over doctor: an administrator who is also a doctor
/// navigates as an administrator.
pub fn role(user: &UserRecord) -> Role {
  if is_admin(user) {
    Role::Administrator
  } else if is_doctor_role(user) {
    Role::Doctor
  } else {
    Role::Staff
  }
}

// ─── Ownership ───────────────────────────────────────────────────────────────

/// A fetched domain entity that may name its requesting doctor.
pub trait Owned {
  fn doctor_id(&self) -> Option<DoctorId>;
}

/// The ownership-relevant slice of any resource payload. Deserialises from
/// the resource JSON, ignoring every other field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
  #[serde(rename = "doctor", default)]
  pub doctor_id: Option<DoctorId>,
}

impl Owned for ResourceRef {
  fn doctor_id(&self) -> Option<DoctorId> { self.doctor_id }
}

impl<T: Owned> Owned for &T {
  fn doctor_id(&self) -> Option<DoctorId> { (**self).doctor_id() }
}

/// True when the viewer's doctor record is the resource's requesting doctor.
/// False when either side has no doctor id.
pub fn is_owner(user: &UserRecord, resource: &impl Owned) -> bool {
  match (user.doctor(), resource.doctor_id()) {
    (Some(doctor), Some(owner)) => doctor.id == owner,
    _ => false,
  }
}

/// Doctor id to prefill on a resource the viewer is about to create.
pub fn default_requesting_doctor(user: &UserRecord) -> Option<DoctorId> {
  user.doctor().map(|d| d.id)
}

// ─── Editing ─────────────────────────────────────────────────────────────────

/// Whether a resource form is creating a new record or showing a saved one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
  Creating,
  Viewing,
}

impl EditMode {
  /// `Creating` for a resource with no id yet, `Viewing` otherwise.
  pub fn for_resource<I>(existing_id: Option<I>) -> Self {
    match existing_id {
      None => Self::Creating,
      Some(_) => Self::Viewing,
    }
  }
}

/// Only an in-progress creation is editable. Saved resources are read-only,
/// owner or not.
pub fn can_edit(mode: EditMode) -> bool { mode == EditMode::Creating }

// ─── Sections ────────────────────────────────────────────────────────────────

/// Top-level navigation areas of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
  Assets,
  Inventory,
  Contracts,
  Users,
  Map,
  Settings,
  ImagingRequests,
}

impl Section {
  pub const ALL: [Section; 7] = [
    Self::Assets,
    Self::Inventory,
    Self::Contracts,
    Self::Users,
    Self::Map,
    Self::Settings,
    Self::ImagingRequests,
  ];

  pub fn path(self) -> &'static str {
    match self {
      Self::Assets => "/assets",
      Self::Inventory => "/inventory",
      Self::Contracts => "/contracts",
      Self::Users => "/users",
      Self::Map => "/map",
      Self::Settings => "/settings",
      Self::ImagingRequests => "/imaging-requests",
    }
  }

  pub fn title(self) -> &'static str {
    match self {
      Self::Assets => "Assets",
      Self::Inventory => "Inventory",
      Self::Contracts => "Contracts",
      Self::Users => "Users",
      Self::Map => "Map",
      Self::Settings => "Settings",
      Self::ImagingRequests => "Imaging requests",
    }
  }

  /// Administrators see everything, doctors only imaging requests, other
  /// staff nothing.
  pub fn visible_to(self, user: &UserRecord) -> bool {
    match role(user) {
      Role::Administrator => true,
      Role::Doctor => self == Self::ImagingRequests,
      Role::Staff => false,
    }
  }
}

/// Sections the viewer may navigate to, in menu order.
pub fn visible_sections(user: &UserRecord) -> Vec<Section> {
  Section::ALL
    .into_iter()
    .filter(|s| s.visible_to(user))
    .collect()
}

/// Where a freshly authenticated viewer lands.
pub fn landing_section(user: &UserRecord) -> Section {
  if is_doctor_role(user) {
    Section::ImagingRequests
  } else {
    Section::Assets
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::user::{DoctorRecord, ProfileRecord, UserId};

  fn doctor(doctor_id: u64, admin: bool) -> UserRecord {
    UserRecord {
      id:               UserId(7),
      username:         "bob".into(),
      email:            None,
      is_administrator: admin,
      kind:             UserKind::Doctor {
        doctor: DoctorRecord {
          id:              DoctorId(doctor_id),
          full_name:       Some("Bob".into()),
          specialty:       None,
          medical_license: None,
          phone_number:    None,
        },
      },
    }
  }

  fn staff(admin: bool) -> UserRecord {
    UserRecord {
      id:               UserId(3),
      username:         "alice".into(),
      email:            Some("alice@example.com".into()),
      is_administrator: admin,
      kind:             UserKind::Staff { profile: ProfileRecord::default() },
    }
  }

  fn resource(doctor_id: Option<u64>) -> ResourceRef {
    ResourceRef { doctor_id: doctor_id.map(DoctorId) }
  }

  #[test]
  fn owner_matches_on_doctor_id_only() {
    let bob = doctor(42, false);
    assert!(is_owner(&bob, &resource(Some(42))));
    assert!(!is_owner(&bob, &resource(Some(99))));
    assert!(!is_owner(&bob, &resource(None)));
    // user id 7 is not a doctor id
    assert!(!is_owner(&bob, &resource(Some(7))));
  }

  #[test]
  fn staff_never_owns() {
    assert!(!is_owner(&staff(true), &resource(Some(42))));
    assert_eq!(default_requesting_doctor(&staff(false)), None);
    assert_eq!(default_requesting_doctor(&doctor(42, false)), Some(DoctorId(42)));
  }

  #[test]
  fn resource_ref_reads_doctor_field_from_payload() {
    let json = serde_json::json!({
      "id": 11,
      "patient_name": "X",
      "doctor": 42,
      "selected_exams": [1, 2]
    });
    let r: ResourceRef = serde_json::from_value(json).unwrap();
    assert_eq!(r.doctor_id, Some(DoctorId(42)));

    let orphan: ResourceRef =
      serde_json::from_value(serde_json::json!({ "doctor": null })).unwrap();
    assert_eq!(orphan.doctor_id, None);
  }

  #[test]
  fn roles_prefer_administrator() {
    assert_eq!(role(&doctor(1, true)), Role::Administrator);
    assert_eq!(role(&doctor(1, false)), Role::Doctor);
    assert_eq!(role(&staff(false)), Role::Staff);
    assert!(is_doctor_role(&doctor(1, true)));
    assert!(!is_admin(&staff(false)));
  }

  #[test]
  fn derivations_are_repeatable() {
    let bob = doctor(42, false);
    let r = resource(Some(42));
    let first = (is_admin(&bob), is_doctor_role(&bob), is_owner(&bob, &r));
    for _ in 0..3 {
      assert_eq!(first, (is_admin(&bob), is_doctor_role(&bob), is_owner(&bob, &r)));
    }
  }

  #[test]
  fn only_creation_is_editable() {
    assert_eq!(EditMode::for_resource::<u64>(None), EditMode::Creating);
    assert_eq!(EditMode::for_resource(Some(5)), EditMode::Viewing);
    assert!(can_edit(EditMode::Creating));
    assert!(!can_edit(EditMode::Viewing));
  }

  #[test]
  fn sections_follow_role() {
    assert_eq!(visible_sections(&staff(true)), Section::ALL.to_vec());
    assert_eq!(visible_sections(&doctor(1, false)), vec![Section::ImagingRequests]);
    assert!(visible_sections(&staff(false)).is_empty());

    assert_eq!(landing_section(&doctor(1, false)), Section::ImagingRequests);
    assert_eq!(landing_section(&staff(true)), Section::Assets);
  }
}
