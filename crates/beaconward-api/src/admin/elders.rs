//! Handlers for `/elders` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/elders` | |
//! | `POST`   | `/elders` | Body: `NewElder` |
//! | `GET`    | `/elders/{id}` | |
//! | `PATCH`  | `/elders/{id}` | Body: `ElderUpdate` |
//! | `DELETE` | `/elders/{id}` | Releases the elder's device in the same batch |
//! | `GET`    | `/elders/{id}/footprint` | `?from=&to=&limit=` (RFC 3339 bounds) |

use axum::extract::State;
use beaconward_core::{
  Error as CoreError,
  activity::{FootprintQuery, Sighting},
  store::TrackingStore,
  subject::{Elder, ElderUpdate, NewElder},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::AdminAuth,
  error::ApiError,
  extract::{Envelope, JsonBody, PathParam, QueryParams},
};

#[derive(Debug, Serialize)]
pub struct ElderPayload {
  pub elder: Elder,
}

#[derive(Debug, Serialize)]
pub struct EldersPayload {
  pub elders: Vec<Elder>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedPayload {
  pub elder_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FootprintPayload {
  pub elder_id:  Uuid,
  pub sightings: Vec<Sighting>,
}

/// `GET /elders`
pub async fn list<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
) -> Result<Envelope<EldersPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let elders = state.store.list_elders().await.map_err(ApiError::from_store)?;
  Ok(Envelope::ok(EldersPayload { elders }))
}

/// `POST /elders`
pub async fn create<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  JsonBody(input): JsonBody<NewElder>,
) -> Result<Envelope<ElderPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  input.validate()?;
  let elder = state.store.create_elder(input).await.map_err(ApiError::from_store)?;
  Ok(Envelope::created(ElderPayload { elder }))
}

async fn require_elder<S>(state: &AppState<S>, id: Uuid) -> Result<Elder, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  Ok(
    state
      .store
      .get_elder(id)
      .await
      .map_err(ApiError::from_store)?
      .ok_or(CoreError::ElderNotFound(id))?,
  )
}

/// `GET /elders/{id}`
pub async fn get_one<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<ElderPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let elder = require_elder(&state, id).await?;
  Ok(Envelope::ok(ElderPayload { elder }))
}

/// `PATCH /elders/{id}`
pub async fn update<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
  JsonBody(update): JsonBody<ElderUpdate>,
) -> Result<Envelope<ElderPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  update.validate()?;
  let elder = state.store.update_elder(id, update).await.map_err(ApiError::from_store)?;
  Ok(Envelope::ok(ElderPayload { elder }))
}

/// `DELETE /elders/{id}`
pub async fn remove<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<RemovedPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  state.bindings.remove_elder(id).await.map_err(ApiError::from_store)?;
  Ok(Envelope::ok(RemovedPayload { elder_id: id }))
}

// ─── Footprint ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct FootprintParams {
  pub from:  Option<DateTime<Utc>>,
  pub to:    Option<DateTime<Utc>>,
  pub limit: Option<usize>,
}

/// `GET /elders/{id}/footprint`
pub async fn footprint<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
  QueryParams(params): QueryParams<FootprintParams>,
) -> Result<Envelope<FootprintPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let query = FootprintQuery {
    from: params.from,
    to: params.to,
    limit: params.limit,
    ..FootprintQuery::new(id)
  };
  query.validate()?;
  require_elder(&state, id).await?;

  let sightings = state.store.footprint(query).await.map_err(ApiError::from_store)?;
  Ok(Envelope::ok(FootprintPayload { elder_id: id, sightings }))
}
