//! The caller's notification points.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/notification-points` | |
//! | `POST`   | `/notification-points` | Body: `NewNotificationPoint` |
//! | `GET`    | `/notification-points/{id}` | Owner only |
//! | `PATCH`  | `/notification-points/{id}` | Owner only; body: `NotificationPointUpdate` |
//! | `DELETE` | `/notification-points/{id}` | Owner only |

use axum::extract::State;
use beaconward_core::{
  Error as CoreError,
  notification::{NewNotificationPoint, NotificationPoint, NotificationPointUpdate},
  store::TrackingStore,
  subject::MapUser,
};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
  AppState,
  auth::AppUser,
  error::ApiError,
  extract::{Envelope, JsonBody, PathParam},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointPayload {
  pub notification_point: NotificationPoint,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsPayload {
  pub notification_points: Vec<NotificationPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedPayload {
  pub point_id: Uuid,
}

/// Load a point and check the caller owns it.
async fn owned_point<S>(
  state: &AppState<S>,
  user: &MapUser,
  id: Uuid,
) -> Result<NotificationPoint, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let point = state
    .store
    .get_notification_point(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(CoreError::NotificationPointNotFound(id))?;

  if point.user_id != user.user_id {
    warn!(user_id = %user.user_id, point_id = %id, "notification point access refused");
    return Err(ApiError::forbidden("notification point belongs to another user"));
  }
  Ok(point)
}

/// `GET /notification-points`
pub async fn list<S>(
  AppUser(user): AppUser,
  State(state): State<AppState<S>>,
) -> Result<Envelope<PointsPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let notification_points = state
    .store
    .list_notification_points(user.user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Envelope::ok(PointsPayload { notification_points }))
}

/// `POST /notification-points`
pub async fn create<S>(
  AppUser(user): AppUser,
  State(state): State<AppState<S>>,
  JsonBody(input): JsonBody<NewNotificationPoint>,
) -> Result<Envelope<PointPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  input.validate()?;
  let notification_point = state
    .store
    .add_notification_point(user.user_id, input)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Envelope::created(PointPayload { notification_point }))
}

/// `GET /notification-points/{id}`
pub async fn get_one<S>(
  AppUser(user): AppUser,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<PointPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  let notification_point = owned_point(&state, &user, id).await?;
  Ok(Envelope::ok(PointPayload { notification_point }))
}

/// `PATCH /notification-points/{id}`
pub async fn update<S>(
  AppUser(user): AppUser,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
  JsonBody(update): JsonBody<NotificationPointUpdate>,
) -> Result<Envelope<PointPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  owned_point(&state, &user, id).await?;
  update.validate()?;
  let notification_point = state
    .store
    .update_notification_point(id, update)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Envelope::ok(PointPayload { notification_point }))
}

/// `DELETE /notification-points/{id}`
pub async fn remove<S>(
  AppUser(user): AppUser,
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<Uuid>,
) -> Result<Envelope<RemovedPayload>, ApiError>
where
  S: TrackingStore + Clone + 'static,
{
  owned_point(&state, &user, id).await?;
  state
    .store
    .remove_notification_point(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Envelope::ok(RemovedPayload { point_id: id }))
}
