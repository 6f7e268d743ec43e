//! Map app endpoints, mounted under `/api/app`. Every handler takes
//! [`crate::auth::AppUser`], so callers are always an active account.

pub mod me;
pub mod points;

use axum::{
  Router,
  routing::{get, post},
};
use beaconward_core::store::TrackingStore;

use crate::AppState;

pub fn router<S>() -> Router<AppState<S>>
where
  S: TrackingStore + Clone + 'static,
{
  Router::new()
    .route("/me", get(me::profile))
    .route("/device", post(me::claim_device::<S>).delete(me::release_device::<S>))
    .route("/notification-points", get(points::list::<S>).post(points::create::<S>))
    .route(
      "/notification-points/{id}",
      get(points::get_one::<S>)
        .patch(points::update::<S>)
        .delete(points::remove::<S>),
    )
}
