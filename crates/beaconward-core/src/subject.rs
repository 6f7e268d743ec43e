//! Subjects: the elders and map-app users a device can be bound to.
//!
//! Each subject carries its own pointer to the bound device (`device_id` on
//! an elder, `bound_device_id` on a map user). The pointer mirrors the
//! device's `bound_to` and is kept in step by the binding coordinator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  device::{BindingType, validate_name, validate_notes},
};

// ─── References ──────────────────────────────────────────────────────────────

/// The kind of entity a subject is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubjectKind {
  Elder,
  MapUser,
}

impl SubjectKind {
  pub fn binding_type(self) -> BindingType {
    match self {
      Self::Elder => BindingType::Elder,
      Self::MapUser => BindingType::MapUser,
    }
  }

  pub fn from_binding_type(binding_type: BindingType) -> Option<Self> {
    match binding_type {
      BindingType::Elder => Some(Self::Elder),
      BindingType::MapUser => Some(Self::MapUser),
      BindingType::Unbound | BindingType::Anonymous => None,
    }
  }
}

/// A typed pointer to a subject: `{"kind": "elder", "id": "..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
  pub kind: SubjectKind,
  pub id:   Uuid,
}

impl SubjectRef {
  pub fn elder(id: Uuid) -> Self { Self { kind: SubjectKind::Elder, id } }

  pub fn map_user(id: Uuid) -> Self { Self { kind: SubjectKind::MapUser, id } }
}

impl fmt::Display for SubjectRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind {
      SubjectKind::Elder => write!(f, "elder/{}", self.id),
      SubjectKind::MapUser => write!(f, "map-user/{}", self.id),
    }
  }
}

// ─── Elder ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Elder {
  pub elder_id:   Uuid,
  pub name:       String,
  pub notes:      Option<String>,
  pub device_id:  Option<Uuid>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewElder {
  pub name:  String,
  #[serde(default)]
  pub notes: Option<String>,
}

impl NewElder {
  pub fn validate(&self) -> Result<()> {
    validate_name("name", &self.name)?;
    if let Some(notes) = &self.notes {
      validate_notes(notes)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElderUpdate {
  pub name:  Option<String>,
  #[serde(default, deserialize_with = "double_option")]
  pub notes: Option<Option<String>>,
}

impl ElderUpdate {
  pub fn validate(&self) -> Result<()> {
    if let Some(name) = &self.name {
      validate_name("name", name)?;
    }
    if let Some(Some(notes)) = &self.notes {
      validate_notes(notes)?;
    }
    Ok(())
  }
}

// ─── Map app user ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapUser {
  pub user_id:         Uuid,
  pub display_name:    String,
  pub email:           String,
  pub bound_device_id: Option<Uuid>,
  /// Soft-deleted accounts keep their record but can no longer act.
  pub deleted:         bool,
  pub created_at:      DateTime<Utc>,
}

impl MapUser {
  /// Fail with [`Error::AccountDeleted`] for a soft-deleted account.
  pub fn ensure_active(&self) -> Result<()> {
    if self.deleted {
      return Err(Error::AccountDeleted(self.user_id));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMapUser {
  pub display_name: String,
  pub email:        String,
}

impl NewMapUser {
  pub fn validate(&self) -> Result<()> {
    validate_name("displayName", &self.display_name)?;
    validate_email(&self.email)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapUserUpdate {
  pub display_name: Option<String>,
  pub email:        Option<String>,
}

impl MapUserUpdate {
  pub fn validate(&self) -> Result<()> {
    if let Some(name) = &self.display_name {
      validate_name("displayName", name)?;
    }
    if let Some(email) = &self.email {
      validate_email(email)?;
    }
    Ok(())
  }
}

fn validate_email(email: &str) -> Result<()> {
  match email.trim().split_once('@') {
    Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
    _ => Err(Error::validation("email", "must be an email address")),
  }
}

/// Deserialize a field that may be absent (`None`), `null` (`Some(None)`) or
/// set (`Some(Some(v))`). Pair with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(
  de: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  Deserialize::deserialize(de).map(Some)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn subject_ref_wire_shape() {
    let id = Uuid::nil();
    let json = serde_json::to_value(SubjectRef::map_user(id)).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "mapUser", "id": id }));
  }

  #[test]
  fn kind_maps_to_binding_type_and_back() {
    for kind in [SubjectKind::Elder, SubjectKind::MapUser] {
      assert_eq!(SubjectKind::from_binding_type(kind.binding_type()), Some(kind));
    }
    assert_eq!(SubjectKind::from_binding_type(BindingType::Anonymous), None);
  }

  #[test]
  fn email_validation() {
    let ok = NewMapUser { display_name: "Ana".into(), email: "ana@example.com".into() };
    assert!(ok.validate().is_ok());

    let bad = NewMapUser { display_name: "Ana".into(), email: "ana".into() };
    assert!(matches!(bad.validate(), Err(Error::Validation { field: "email", .. })));
  }

  #[test]
  fn deleted_account_is_rejected() {
    let user = MapUser {
      user_id:         Uuid::new_v4(),
      display_name:    "Ana".into(),
      email:           "ana@example.com".into(),
      bound_device_id: None,
      deleted:         true,
      created_at:      Utc::now(),
    };
    assert_eq!(user.ensure_active(), Err(Error::AccountDeleted(user.user_id)));
  }
}
