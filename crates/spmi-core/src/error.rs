//! Error types for `spmi-core`.

use thiserror::Error;

use crate::validate::ValidationErrors;

#[derive(Debug, Clone, Error)]
pub enum Error {
  #[error("{entity} {id} not found")]
  NotFound { entity: &'static str, id: i64 },

  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("unknown {kind} value: {value:?}")]
  InvalidValue { kind: &'static str, value: String },
}

impl Error {
  pub fn not_found(entity: &'static str, id: i64) -> Self {
    Self::NotFound { entity, id }
  }

  /// A validation error carrying a single field message.
  pub fn field(field: &str, message: impl Into<String>) -> Self {
    Self::Validation(ValidationErrors::single(field, message))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
