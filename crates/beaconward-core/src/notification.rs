//! Notification points: a map-app user's "tell me when my beacon passes
//! this gateway" subscriptions.
//!
//! A point joins one user to one gateway. Only the owning user may read or
//! change it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, device::validate_name};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPoint {
  pub point_id:        Uuid,
  pub user_id:         Uuid,
  pub gateway_id:      Uuid,
  pub name:            String,
  pub notify_on_enter: bool,
  pub notify_on_leave: bool,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

fn default_true() -> bool { true }

/// Request body for adding a point; the owner comes from the caller's token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotificationPoint {
  pub gateway_id:      Uuid,
  pub name:            String,
  #[serde(default = "default_true")]
  pub notify_on_enter: bool,
  #[serde(default)]
  pub notify_on_leave: bool,
}

impl NewNotificationPoint {
  pub fn validate(&self) -> Result<()> { validate_name("name", &self.name) }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPointUpdate {
  pub gateway_id:      Option<Uuid>,
  pub name:            Option<String>,
  pub notify_on_enter: Option<bool>,
  pub notify_on_leave: Option<bool>,
}

impl NotificationPointUpdate {
  pub fn validate(&self) -> Result<()> {
    if let Some(name) = &self.name {
      validate_name("name", name)?;
    }
    Ok(())
  }
}
