//! Handlers for `/map-users` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/map-users` | `?includeDeleted=true` to list retired accounts too |
//! | `POST`   | `/map-users` | Body: `NewMapUser` |
//! | `GET`    | `/map-users/{id}` | Retired accounts are still readable |
//! | `PATCH`  | `/map-users/{id}` | Body: `MapUserUpdate`; 403 for retired accounts |
//! | `DELETE` | `/map-users/{id}` | Soft delete; releases the user's device |
//! | `POST`   | `/map-users/{id}/tokens` | Issues a bearer token, shown once |

use axum::extract::State;
use beaconward_core::{
  Error as CoreError,
  store::TrackingStore,
  subject::{MapUser, MapUserUpdate, NewMapUser},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{self, AdminAuth},
  error::ApiError,
  extract::{Envelope, JsonBody, PathParam, QueryParams},
};

#[derive(Debug, Serialize)]
pub struct UserPayload {
  pub user: MapUser,
}

#[derive(Debug, Serialize)]
pub struct UsersPayload {
  pub users: Vec<MapUser>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
  pub user_id: Uuid,
  pub token:   String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  #[serde(default)]
  pub include_deleted: bool,
}

/// `GET /map-users`
pub async fn list<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<ListParams>,
) -> Result<Envelope<UsersPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let users = state
    .store
    .list_map_users(params.include_deleted)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Envelope::ok(UsersPayload { users }))
}

/// `POST /map-users`
pub async fn create<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  JsonBody(input): JsonBody<NewMapUser>,
) -> Result<Envelope<UserPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  input.validate()?;
  let user = state.store.create_map_user(input).await.map_err(ApiError::from_store)?;
  Ok(Envelope::created(UserPayload { user }))
}

async fn require_user<S>(state: &AppState<S>, id: Uuid) -> Result<MapUser, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  Ok(
    state
      .store
      .get_map_user(id)
      .await
      .map_err(ApiError::from_store)?
      .ok_or(CoreError::UserNotFound(id))?,
  )
}

/// `GET /map-users/{id}`
pub async fn get_one<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<UserPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let user = require_user(&state, id).await?;
  Ok(Envelope::ok(UserPayload { user }))
}

/// `PATCH /map-users/{id}`
pub async fn update<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
  JsonBody(update): JsonBody<MapUserUpdate>,
) -> Result<Envelope<UserPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  update.validate()?;
  require_user(&state, id).await?.ensure_active()?;
  let user = state.store.update_map_user(id, update).await.map_err(ApiError::from_store)?;
  Ok(Envelope::ok(UserPayload { user }))
}

/// `DELETE /map-users/{id}`
pub async fn retire<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<UserPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let user = state.bindings.retire_map_user(id).await.map_err(ApiError::from_store)?;
  Ok(Envelope::ok(UserPayload { user }))
}

/// `POST /map-users/{id}/tokens`
pub async fn issue_token<S>(
  _: AdminAuth,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<TokenPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  require_user(&state, id).await?.ensure_active()?;

  let issued = auth::issue_token();
  state
    .store
    .store_token(id, issued.digest)
    .await
    .map_err(ApiError::from_store)?;
  info!(user_id = %id, "bearer token issued");

  Ok(Envelope::created(TokenPayload { user_id: id, token: issued.token }))
}
