//! Error type for `spmi-store-sqlite`.

use spmi_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] spmi_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  /// A stored column did not decode into its domain type.
  #[error("decode error: {0}")]
  Decode(String),
}

impl StoreError for Error {
  fn domain(&self) -> Option<&spmi_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
