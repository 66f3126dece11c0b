//! Error type for `snapmark-counter-redis`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("redis error: {0}")]
  Redis(#[from] redis::RedisError),

  #[error("counter store did not answer {op} within {after:?}")]
  Timeout { op: &'static str, after: Duration },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
