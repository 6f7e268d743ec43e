//! Authentication for both API surfaces.
//!
//! The admin console uses HTTP Basic against a single argon2-hashed
//! password from the server config. Map-app users present a bearer token;
//! the store only ever sees the token's SHA-256 digest.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use beaconward_core::{store::TrackingStore, subject::MapUser};
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest as _, Sha256};
use tracing::warn;

use crate::{AppState, error::ApiError};

const BASIC_CHALLENGE: &str = "Basic realm=\"beaconward-admin\"";
const BEARER_CHALLENGE: &str = "Bearer realm=\"beaconward\"";

/// Admin credentials accepted by this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

// ─── Admin (Basic) ────────────────────────────────────────────────────────────

/// Present in a handler's arguments means the caller is the administrator.
pub struct AdminAuth;

fn admin_unauthorized() -> ApiError { ApiError::Unauthorized { challenge: BASIC_CHALLENGE } }

/// Verify Basic credentials against `config`.
pub fn verify_basic(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  let encoded = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Basic "))
    .ok_or_else(admin_unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| admin_unauthorized())?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| admin_unauthorized())?;
  let (username, password) = creds.split_once(':').ok_or_else(admin_unauthorized)?;

  if username != config.username {
    return Err(admin_unauthorized());
  }

  let parsed_hash = PasswordHash::new(&config.password_hash).map_err(|e| {
    warn!(error = %e, "configured admin password hash is not a valid PHC string");
    admin_unauthorized()
  })?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| admin_unauthorized())
}

impl<S> FromRequestParts<AppState<S>> for AdminAuth
where
  S: TrackingStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_basic(&parts.headers, &state.auth).inspect_err(|_| {
      warn!(path = %parts.uri.path(), "rejected admin credentials");
    })?;
    Ok(AdminAuth)
  }
}

// ─── Map app (Bearer) ─────────────────────────────────────────────────────────

/// The map-app user a bearer token resolved to. Deleted accounts never get
/// this far.
pub struct AppUser(pub MapUser);

/// A freshly issued bearer token. The plaintext is shown once; only the
/// digest is stored.
pub struct IssuedToken {
  pub token:  String,
  pub digest: String,
}

/// Generate a random 256-bit bearer token.
pub fn issue_token() -> IssuedToken {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  let token = hex::encode(bytes);
  let digest = digest_token(&token);
  IssuedToken { token, digest }
}

/// Hex SHA-256 of a bearer token, the form tokens are looked up by.
pub fn digest_token(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

fn app_unauthorized() -> ApiError { ApiError::Unauthorized { challenge: BEARER_CHALLENGE } }

impl<S> FromRequestParts<AppState<S>> for AppUser
where
  S: TrackingStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.strip_prefix("Bearer "))
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or_else(app_unauthorized)?;

    let user_id = state
      .store
      .resolve_token(digest_token(token))
      .await
      .map_err(ApiError::from_store)?
      .ok_or_else(|| {
        warn!(path = %parts.uri.path(), "rejected unknown bearer token");
        app_unauthorized()
      })?;

    let user = state
      .store
      .get_map_user(user_id)
      .await
      .map_err(ApiError::from_store)?
      .ok_or_else(app_unauthorized)?;
    user.ensure_active()?;

    Ok(AppUser(user))
  }
}
