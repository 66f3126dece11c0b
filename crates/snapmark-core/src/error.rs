//! Error types for `snapmark-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user not found: {0}")]
  UserNotFound(i64),

  #[error("image not found: {0}")]
  ImageNotFound(i64),

  #[error("unknown action: {0:?}")]
  UnknownAction(String),

  #[error("unknown target kind: {0:?}")]
  UnknownTargetKind(String),

  #[error("users cannot follow themselves")]
  SelfFollow,

  #[error("{0} must not be empty")]
  EmptyField(&'static str),

  #[error("invalid image url: {0}")]
  InvalidImageUrl(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
