//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error renders as `{"status": "error", "error": "<message>"}` so
//! AJAX callers can branch on `status` alone.

use axum::{
  Json,
  extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(String),

  /// A request body, path or query string that axum could not extract.
  #[error("{1}")]
  Rejected(StatusCode, String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

impl From<snapmark_core::Error> for ApiError {
  fn from(err: snapmark_core::Error) -> Self {
    use snapmark_core::Error as E;
    match err {
      E::UserNotFound(_) | E::ImageNotFound(_) => Self::NotFound(err.to_string()),
      E::UnknownAction(_)
      | E::UnknownTargetKind(_)
      | E::SelfFollow
      | E::EmptyField(_)
      | E::InvalidImageUrl(_) => Self::BadRequest(err.to_string()),
      E::Store(e) => Self::Store(e),
    }
  }
}

macro_rules! from_rejection {
  ($($rejection:ty),+ $(,)?) => {$(
    impl From<$rejection> for ApiError {
      fn from(rejection: $rejection) -> Self {
        Self::Rejected(rejection.status(), rejection.body_text())
      }
    }
  )+};
}

from_rejection!(FormRejection, JsonRejection, PathRejection, QueryRejection);

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Rejected(status, _) => *status,
      ApiError::Internal(_) | ApiError::Store(_) => {
        tracing::error!(error = %self, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    let mut res = (status, Json(json!({ "status": "error", "error": self.to_string() })))
      .into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"snapmark\""),
      );
    }
    res
  }
}
