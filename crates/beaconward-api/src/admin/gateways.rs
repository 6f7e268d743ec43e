//! Handlers for `/gateways` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/gateways` | Sorted by name |
//! | `POST` | `/gateways` | Body: `NewGateway` |
//! | `GET`  | `/gateways/{id}` | |
//! | `POST` | `/gateways/{id}/sightings` | Body: `NewSighting`; subject is resolved at record time |

use axum::extract::State;
use beaconward_core::{
  Error as CoreError,
  activity::{NewSighting, Sighting},
  gateway::{Gateway, NewGateway},
  store::TrackingStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::AdminAuth,
  error::ApiError,
  extract::{Envelope, JsonBody, PathParam},
};

#[derive(Debug, Serialize)]
pub struct GatewayPayload {
  pub gateway: Gateway,
}

#[derive(Debug, Serialize)]
pub struct GatewaysPayload {
  pub gateways: Vec<Gateway>,
}

#[derive(Debug, Serialize)]
pub struct SightingPayload {
  pub sighting: Sighting,
}

/// `GET /gateways`
pub async fn list<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
) -> Result<Envelope<GatewaysPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let gateways = state.store.list_gateways().await.map_err(ApiError::from_store)?;
  Ok(Envelope::ok(GatewaysPayload { gateways }))
}

/// `POST /gateways`
pub async fn create<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  JsonBody(input): JsonBody<NewGateway>,
) -> Result<Envelope<GatewayPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  input.validate()?;
  let gateway = state.store.create_gateway(input).await.map_err(ApiError::from_store)?;
  Ok(Envelope::created(GatewayPayload { gateway }))
}

/// `GET /gateways/{id}`
pub async fn get_one<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<GatewayPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let gateway = state
    .store
    .get_gateway(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(CoreError::GatewayNotFound(id))?;
  Ok(Envelope::ok(GatewayPayload { gateway }))
}

/// `POST /gateways/{id}/sightings`
pub async fn record_sighting<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
  JsonBody(input): JsonBody<NewSighting>,
) -> Result<Envelope<SightingPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  input.validate()?;
  let sighting = state.store.record_sighting(id, input).await.map_err(ApiError::from_store)?;
  Ok(Envelope::created(SightingPayload { sighting }))
}
