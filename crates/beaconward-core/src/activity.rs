//! Sightings and the activity footprint read model.
//!
//! A sighting records that a gateway heard a beacon. The store resolves the
//! beacon to a device and copies the device's subject at that moment into
//! the sighting, so a footprint stays correct after the device is rebound.

use chrono::{DateTime, Datelike as _, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, device::BeaconIdentity, subject::SubjectRef};

pub const DEFAULT_FOOTPRINT_LIMIT: usize = 100;
pub const MAX_FOOTPRINT_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
  pub sighting_id: Uuid,
  pub device_id:   Uuid,
  pub gateway_id:  Uuid,
  /// The subject the device was bound to when it was seen.
  pub subject:     Option<SubjectRef>,
  pub rssi:        i16,
  pub seen_at:     DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSighting {
  pub identity: BeaconIdentity,
  pub rssi:     i16,
  /// Defaults to server time.
  #[serde(default)]
  pub seen_at:  Option<DateTime<Utc>>,
}

impl NewSighting {
  pub fn validate(&self) -> Result<()> {
    // BLE RSSI is always negative dBm; 0 and above are reader glitches.
    if !(-127..0).contains(&self.rssi) {
      return Err(Error::validation("rssi", "must be within [-127, -1] dBm"));
    }
    if let Some(seen_at) = self.seen_at {
      ensure_four_digit_year("seenAt", seen_at)?;
    }
    Ok(())
  }
}

/// Timestamps are stored as RFC 3339 text, which only sorts and parses
/// for years 0000 through 9999.
fn ensure_four_digit_year(field: &'static str, at: DateTime<Utc>) -> Result<()> {
  if !(0..=9999).contains(&at.year()) {
    return Err(Error::validation(field, "year must be between 0000 and 9999"));
  }
  Ok(())
}

/// Parameters for [`crate::store::TrackingStore::footprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootprintQuery {
  pub subject_id: Uuid,
  pub from:       Option<DateTime<Utc>>,
  pub to:         Option<DateTime<Utc>>,
  pub limit:      Option<usize>,
}

impl FootprintQuery {
  pub fn new(subject_id: Uuid) -> Self {
    Self { subject_id, from: None, to: None, limit: None }
  }

  pub fn validate(&self) -> Result<()> {
    if let (Some(from), Some(to)) = (self.from, self.to)
      && from > to
    {
      return Err(Error::validation("from", "must not be after `to`"));
    }
    if let Some(from) = self.from {
      ensure_four_digit_year("from", from)?;
    }
    if let Some(to) = self.to {
      ensure_four_digit_year("to", to)?;
    }
    if self.limit == Some(0) {
      return Err(Error::validation("limit", "must be positive"));
    }
    Ok(())
  }

  /// The row limit to apply, clamped to [`MAX_FOOTPRINT_LIMIT`].
  pub fn effective_limit(&self) -> usize {
    self
      .limit
      .unwrap_or(DEFAULT_FOOTPRINT_LIMIT)
      .min(MAX_FOOTPRINT_LIMIT)
  }
}
