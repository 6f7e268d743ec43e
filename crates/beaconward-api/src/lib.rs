//! JSON REST API for beaconward.
//!
//! Two surfaces share one [`AppState`]:
//!
//! | Prefix       | Caller          | Auth                    |
//! |--------------|-----------------|-------------------------|
//! | `/api/admin` | admin console   | HTTP Basic (argon2)     |
//! | `/api/app`   | map app         | `Authorization: Bearer` |
//!
//! Responses use the envelope in [`extract::Envelope`]; failures render
//! through [`ApiError`].

pub mod admin;
pub mod app;
pub mod auth;
pub mod error;
pub mod extract;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use beaconward_core::{binding::BindingCoordinator, store::TrackingStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `BEACONWARD_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  pub admin_username:      String,
  pub admin_password_hash: String,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: TrackingStore> {
  pub store:    Arc<S>,
  pub bindings: BindingCoordinator<S>,
  pub auth:     Arc<AuthConfig>,
}

impl<S: TrackingStore> AppState<S> {
  pub fn new(store: Arc<S>, auth: AuthConfig) -> Self {
    Self {
      bindings: BindingCoordinator::new(Arc::clone(&store)),
      store,
      auth: Arc::new(auth),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full API router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: TrackingStore + Clone + 'static,
{
  Router::new()
    .nest("/api/admin", admin::router::<S>())
    .nest("/api/app", app::router::<S>())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
