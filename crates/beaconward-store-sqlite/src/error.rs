//! Error type for `beaconward-store-sqlite`.

use beaconward_core::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] beaconward_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value outside the set the schema allows.
  #[error("unexpected {column} value: {value:?}")]
  Decode {
    column: &'static str,
    value:  String,
  },
}

impl DomainError for Error {
  fn domain(&self) -> Option<&beaconward_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
