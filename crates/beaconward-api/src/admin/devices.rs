//! Handlers for `/devices` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/devices` | `?bindingType=&limit=&offset=` |
//! | `POST`  | `/devices` | Body: `NewDevice`; created unbound |
//! | `GET`   | `/devices/{id}` | |
//! | `PATCH` | `/devices/{id}` | Body: `DeviceUpdate`; binding fields rejected |
//! | `POST`  | `/devices/{id}/bind` | Body: `{"subject":{"kind":"elder","id":…}}` |
//! | `POST`  | `/devices/{id}/unbind` | |
//! | `POST`  | `/devices/{id}/anonymous` | |

use axum::extract::State;
use beaconward_core::{
  Error as CoreError,
  device::{BindingType, Device, DeviceQuery, DeviceUpdate, NewDevice},
  store::TrackingStore,
  subject::SubjectRef,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::AdminAuth,
  error::ApiError,
  extract::{Envelope, JsonBody, PathParam, QueryParams},
};

#[derive(Debug, Serialize)]
pub struct DevicePayload {
  pub device: Device,
}

#[derive(Debug, Serialize)]
pub struct DevicesPayload {
  pub devices: Vec<Device>,
}

fn device(device: Device) -> Envelope<DevicePayload> { Envelope::ok(DevicePayload { device }) }

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  pub binding_type: Option<BindingType>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

/// `GET /devices`
pub async fn list<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<ListParams>,
) -> Result<Envelope<DevicesPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let query = DeviceQuery {
    binding_type: params.binding_type,
    limit:        params.limit,
    offset:       params.offset,
  };
  let devices = state.store.list_devices(query).await.map_err(ApiError::from_store)?;
  Ok(Envelope::ok(DevicesPayload { devices }))
}

// ─── Create / read / update ──────────────────────────────────────────────────

/// `POST /devices`
pub async fn create<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  JsonBody(input): JsonBody<NewDevice>,
) -> Result<Envelope<DevicePayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  input.validate()?;
  let device = state.store.create_device(input).await.map_err(ApiError::from_store)?;
  Ok(Envelope::created(DevicePayload { device }))
}

/// `GET /devices/{id}`
pub async fn get_one<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<DevicePayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let found = state
    .store
    .get_device(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(CoreError::DeviceNotFound(id))?;
  Ok(device(found))
}

/// `PATCH /devices/{id}`
pub async fn update<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
  JsonBody(update): JsonBody<DeviceUpdate>,
) -> Result<Envelope<DevicePayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  update.validate()?;
  let updated = state.store.update_device(id, update).await.map_err(ApiError::from_store)?;
  Ok(device(updated))
}

// ─── Binding ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BindBody {
  pub subject: SubjectRef,
}

/// `POST /devices/{id}/bind`
pub async fn bind<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
  JsonBody(body): JsonBody<BindBody>,
) -> Result<Envelope<DevicePayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let bound = state.bindings.bind(id, body.subject).await.map_err(ApiError::from_store)?;
  Ok(device(bound))
}

/// `POST /devices/{id}/unbind`
pub async fn unbind<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<DevicePayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let unbound = state.bindings.unbind(id).await.map_err(ApiError::from_store)?;
  Ok(device(unbound))
}

/// `POST /devices/{id}/anonymous`
pub async fn anonymous<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<DevicePayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let marked = state.bindings.bind_anonymous(id).await.map_err(ApiError::from_store)?;
  Ok(device(marked))
}
