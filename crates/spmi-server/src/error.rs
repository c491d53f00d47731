//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  extract::multipart::MultipartError,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use spmi_core::{Error as CoreError, store::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error(transparent)]
  Domain(#[from] CoreError),
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("multipart error: {0}")]
  Multipart(#[from] MultipartError),
  #[error("file storage error: {0}")]
  Io(#[from] std::io::Error),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Keep the domain cause of a backend error so it maps to a 4xx status.
  pub fn store<E: StoreError>(error: E) -> Self {
    match error.domain() {
      Some(domain) => Self::Domain(domain.clone()),
      None => Self::Store(Box::new(error)),
    }
  }
}

fn message(status: StatusCode, error: &impl ToString) -> Response {
  (status, Json(json!({ "error": error.to_string() }))).into_response()
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res = message(StatusCode::UNAUTHORIZED, &"unauthorized");
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"spmi\""),
        );
        res
      }
      Error::Domain(CoreError::Validation(errors)) => (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": "validation failed", "errors": errors })),
      )
        .into_response(),
      Error::Domain(e @ CoreError::NotFound { .. }) => message(StatusCode::NOT_FOUND, &e),
      Error::Domain(e @ CoreError::Conflict(_)) => message(StatusCode::CONFLICT, &e),
      Error::Domain(e @ CoreError::Forbidden(_)) => message(StatusCode::FORBIDDEN, &e),
      Error::Domain(e @ CoreError::InvalidValue { .. }) => message(StatusCode::BAD_REQUEST, &e),
      Error::BadRequest(msg) => message(StatusCode::BAD_REQUEST, &msg),
      Error::Multipart(e) => message(e.status(), &e.body_text()),
      Error::Io(e) => {
        tracing::error!(error = %e, "file storage failure");
        message(StatusCode::INTERNAL_SERVER_ERROR, &"internal server error")
      }
      Error::Store(e) => {
        tracing::error!(error = %e, "store failure");
        message(StatusCode::INTERNAL_SERVER_ERROR, &"internal server error")
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn body_json(res: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn validation_lists_fields() {
    let res = Error::from(CoreError::field("finding", "finding is required")).into_response();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(res).await;
    assert_eq!(body["errors"]["finding"][0], "finding is required");
  }

  #[tokio::test]
  async fn domain_statuses() {
    let cases = [
      (CoreError::not_found("car", 3), StatusCode::NOT_FOUND),
      (CoreError::Conflict("locked".into()), StatusCode::CONFLICT),
      (CoreError::Forbidden("nope".into()), StatusCode::FORBIDDEN),
    ];
    for (error, status) in cases {
      assert_eq!(Error::from(error).into_response().status(), status);
    }
  }

  #[tokio::test]
  async fn internal_errors_hide_detail() {
    let io = std::io::Error::other("disk on fire");
    let res = Error::from(io).into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(res).await["error"], "internal server error");
  }

  #[test]
  fn unauthorized_challenges_basic() {
    let res = Error::Unauthorized.into_response();
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }
}
