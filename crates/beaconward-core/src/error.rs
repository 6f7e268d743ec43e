//! Error types for `beaconward-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::device::BeaconIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("device not found: {0}")]
  DeviceNotFound(Uuid),

  #[error("no device registered for beacon {0}")]
  BeaconNotRegistered(BeaconIdentity),

  #[error("beacon {0} is already registered")]
  DeviceAlreadyRegistered(BeaconIdentity),

  #[error("elder not found: {0}")]
  ElderNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("account {0} has been deleted")]
  AccountDeleted(Uuid),

  #[error("gateway not found: {0}")]
  GatewayNotFound(Uuid),

  #[error("notification point not found: {0}")]
  NotificationPointNotFound(Uuid),

  #[error("invalid {field}: {reason}")]
  Validation {
    field:  &'static str,
    reason: String,
  },
}

impl Error {
  pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
    Self::Validation { field, reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Implemented by store error types so callers can recover the domain
/// failure (not-found, validation, ...) from a backend error.
pub trait DomainError: std::error::Error + From<Error> + Send + Sync + 'static {
  /// The wrapped domain error, if this is one.
  fn domain(&self) -> Option<&Error>;
}

impl DomainError for Error {
  fn domain(&self) -> Option<&Error> { Some(self) }
}
