//! Devices: the physical BLE beacons the service tracks.
//!
//! A device is identified on the air by its [`BeaconIdentity`] and inside the
//! store by `device_id`. The binding fields (`binding_type`, `bound_to`,
//! `bound_at`) are only ever written by the binding coordinator; the create
//! and update inputs in this module deliberately have no way to set them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub(crate) const MAX_NAME_LEN: usize = 120;
pub(crate) const MAX_NOTES_LEN: usize = 2000;

// ─── Identity ────────────────────────────────────────────────────────────────

/// The iBeacon broadcast triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BeaconIdentity {
  pub uuid:  Uuid,
  pub major: u16,
  pub minor: u16,
}

impl fmt::Display for BeaconIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.uuid, self.major, self.minor)
  }
}

// ─── Binding ─────────────────────────────────────────────────────────────────

/// What, if anything, a device is currently bound to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingType {
  #[default]
  Unbound,
  Elder,
  MapUser,
  /// Handed out without a registered subject (e.g. a visitor tag).
  Anonymous,
}

impl BindingType {
  /// Whether a subject record must point back at a device of this type.
  pub fn has_subject(self) -> bool {
    matches!(self, Self::Elder | Self::MapUser)
  }
}

// ─── Device ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
  pub device_id:    Uuid,
  pub identity:     BeaconIdentity,
  pub name:         String,
  pub notes:        Option<String>,
  pub binding_type: BindingType,
  /// Id of the elder or map user this device is bound to.
  pub bound_to:     Option<Uuid>,
  /// Server time at which the current binding was committed.
  pub bound_at:     Option<DateTime<Utc>>,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::TrackingStore::create_device`]. Devices are
/// always created unbound; binding fields are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewDevice {
  pub identity: BeaconIdentity,
  pub name:     String,
  #[serde(default)]
  pub notes:    Option<String>,
}

impl NewDevice {
  pub fn validate(&self) -> Result<()> {
    validate_name("name", &self.name)?;
    if let Some(notes) = &self.notes {
      validate_notes(notes)?;
    }
    Ok(())
  }
}

/// Partial update for the descriptive fields of a device.
///
/// `notes` distinguishes "leave alone" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeviceUpdate {
  pub name:  Option<String>,
  #[serde(default, deserialize_with = "crate::subject::double_option")]
  pub notes: Option<Option<String>>,
}

impl DeviceUpdate {
  pub fn validate(&self) -> Result<()> {
    if let Some(name) = &self.name {
      validate_name("name", name)?;
    }
    if let Some(Some(notes)) = &self.notes {
      validate_notes(notes)?;
    }
    Ok(())
  }

  /// Whether applying this update would change nothing.
  pub fn is_empty(&self) -> bool { self.name.is_none() && self.notes.is_none() }
}

/// Filter for [`crate::store::TrackingStore::list_devices`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceQuery {
  pub binding_type: Option<BindingType>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

// ─── Validation helpers ──────────────────────────────────────────────────────

pub(crate) fn validate_name(field: &'static str, value: &str) -> Result<()> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(Error::validation(field, "must not be empty"));
  }
  if trimmed.chars().count() > MAX_NAME_LEN {
    return Err(Error::validation(
      field,
      format!("must be at most {MAX_NAME_LEN} characters"),
    ));
  }
  Ok(())
}

pub(crate) fn validate_notes(value: &str) -> Result<()> {
  if value.chars().count() > MAX_NOTES_LEN {
    return Err(Error::validation(
      "notes",
      format!("must be at most {MAX_NOTES_LEN} characters"),
    ));
  }
  Ok(())
}
