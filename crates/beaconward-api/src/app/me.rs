//! The caller's own account and beacon.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/me` | |
//! | `POST`   | `/device` | Body: `{"identity":{"uuid":…,"major":…,"minor":…}}` |
//! | `DELETE` | `/device` | No-op when nothing is bound |

use axum::extract::State;
use beaconward_core::{
  device::{BeaconIdentity, Device},
  store::TrackingStore,
  subject::{MapUser, SubjectRef},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
  AppState,
  auth::AppUser,
  error::ApiError,
  extract::{Envelope, JsonBody},
};

#[derive(Debug, Serialize)]
pub struct MePayload {
  pub user: MapUser,
}

#[derive(Debug, Serialize)]
pub struct DevicePayload {
  pub device: Option<Device>,
}

/// `GET /me`
pub async fn profile(AppUser(user): AppUser) -> Envelope<MePayload> {
  Envelope::ok(MePayload { user })
}

#[derive(Debug, Deserialize)]
pub struct ClaimBody {
  pub identity: BeaconIdentity,
}

/// `POST /device`: bind the caller to the beacon they are holding.
///
/// A beacon already bound to someone else cannot be claimed from the app;
/// moving it is an admin operation.
pub async fn claim_device<S>(
  AppUser(user): AppUser,
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<ClaimBody>,
) -> Result<Envelope<DevicePayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let device = state
    .store
    .find_device_by_identity(body.identity)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(beaconward_core::Error::BeaconNotRegistered(body.identity))?;

  if device.binding_type.has_subject() && device.bound_to != Some(user.user_id) {
    warn!(user_id = %user.user_id, device_id = %device.device_id, "claim of a bound beacon refused");
    return Err(ApiError::forbidden("beacon is bound to another subject"));
  }

  let bound = state
    .bindings
    .bind(device.device_id, SubjectRef::map_user(user.user_id))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Envelope::ok(DevicePayload { device: Some(bound) }))
}

/// `DELETE /device`
pub async fn release_device<S>(
  AppUser(user): AppUser,
  State(state): State<AppState<S>>,
) -> Result<Envelope<DevicePayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let Some(device_id) = user.bound_device_id else {
    return Ok(Envelope::ok(DevicePayload { device: None }));
  };

  let device = state.bindings.unbind(device_id).await.map_err(ApiError::from_store)?;
  Ok(Envelope::ok(DevicePayload { device: Some(device) }))
}
