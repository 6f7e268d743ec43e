//! Admin console endpoints, mounted under `/api/admin`. Every handler takes
//! [`crate::auth::AdminAuth`].

pub mod devices;
pub mod elders;
pub mod gateways;
pub mod map_users;

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
    // Devices
    .route("/devices", get(devices::list::<S>).post(devices::create::<S>))
    .route("/devices/{id}", get(devices::get_one::<S>).patch(devices::update::<S>))
    .route("/devices/{id}/bind", post(devices::bind::<S>))
    .route("/devices/{id}/unbind", post(devices::unbind::<S>))
    .route("/devices/{id}/anonymous", post(devices::anonymous::<S>))
    // Elders
    .route("/elders", get(elders::list::<S>).post(elders::create::<S>))
    .route(
      "/elders/{id}",
      get(elders::get_one::<S>)
        .patch(elders::update::<S>)
        .delete(elders::remove::<S>),
    )
    .route("/elders/{id}/footprint", get(elders::footprint::<S>))
    // Map app users
    .route("/map-users", get(map_users::list::<S>).post(map_users::create::<S>))
    .route(
      "/map-users/{id}",
      get(map_users::get_one::<S>)
        .patch(map_users::update::<S>)
        .delete(map_users::retire::<S>),
    )
    .route("/map-users/{id}/tokens", post(map_users::issue_token::<S>))
    // Gateways
    .route("/gateways", get(gateways::list::<S>).post(gateways::create::<S>))
    .route("/gateways/{id}", get(gateways::get_one::<S>))
    .route("/gateways/{id}/sightings", post(gateways::record_sighting::<S>))
}
