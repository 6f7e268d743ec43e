//! Gateways: receivers that detect beacon broadcasts and report sightings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, device::validate_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
  /// Mounted at a known location.
  #[default]
  Fixed,
  /// Carried around, e.g. a phone running the map app.
  Mobile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
  pub gateway_id: Uuid,
  pub name:       String,
  pub kind:       GatewayKind,
  pub location:   Option<String>,
  pub latitude:   Option<f64>,
  pub longitude:  Option<f64>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGateway {
  pub name:      String,
  #[serde(default)]
  pub kind:      GatewayKind,
  #[serde(default)]
  pub location:  Option<String>,
  #[serde(default)]
  pub latitude:  Option<f64>,
  #[serde(default)]
  pub longitude: Option<f64>,
}

impl NewGateway {
  pub fn validate(&self) -> Result<()> {
    validate_name("name", &self.name)?;
    match (self.latitude, self.longitude) {
      (None, None) => Ok(()),
      (Some(lat), Some(lon)) => {
        if !(-90.0..=90.0).contains(&lat) {
          return Err(Error::validation("latitude", "must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&lon) {
          return Err(Error::validation("longitude", "must be within [-180, 180]"));
        }
        Ok(())
      }
      _ => Err(Error::validation(
        "latitude",
        "latitude and longitude must be given together",
      )),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn gateway(lat: Option<f64>, lon: Option<f64>) -> NewGateway {
    NewGateway {
      name:      "Lobby".into(),
      kind:      GatewayKind::Fixed,
      location:  None,
      latitude:  lat,
      longitude: lon,
    }
  }

  #[test]
  fn coordinates_must_come_in_pairs() {
    assert!(gateway(None, None).validate().is_ok());
    assert!(gateway(Some(25.03), Some(121.56)).validate().is_ok());
    assert!(gateway(Some(25.03), None).validate().is_err());
  }

  #[test]
  fn out_of_range_latitude_rejected() {
    assert!(matches!(
      gateway(Some(91.0), Some(0.0)).validate(),
      Err(Error::Validation { field: "latitude", .. })
    ));
  }
}
