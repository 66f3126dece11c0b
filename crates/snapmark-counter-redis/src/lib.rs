//! Redis backend for the Snapmark counter store.
//!
//! The connection is a [`ConnectionManager`], created on first use and
//! reconnecting on its own after failures. Every call, including the first
//! connect, shares one deadline, so a Redis outage costs a request at most one
//! timeout and never blocks startup.

pub mod error;

use std::{future::Future, time::Duration};

use redis::{AsyncCommands as _, RedisResult, aio::ConnectionManager};
use snapmark_core::counter::CounterStore;
use tokio::sync::OnceCell;

pub use error::{Error, Result};

/// Default bound on a single Redis call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// A [`CounterStore`] backed by Redis `INCR`, `ZINCRBY` and `ZREVRANGE`.
pub struct RedisCounterStore {
  client:  redis::Client,
  manager: OnceCell<ConnectionManager>,
  timeout: Duration,
}

impl RedisCounterStore {
  /// Validate `url` without connecting.
  pub fn new(url: &str, timeout: Duration) -> Result<Self> {
    Ok(Self { client: redis::Client::open(url)?, manager: OnceCell::new(), timeout })
  }

  /// The shared manager. Concurrent first callers wait on a single connect;
  /// if it fails or is cancelled the next caller retries.
  async fn connection(&self) -> RedisResult<ConnectionManager> {
    let manager = self
      .manager
      .get_or_try_init(|| async {
        let manager = ConnectionManager::new(self.client.clone()).await?;
        tracing::debug!("connected to counter store");
        Ok::<_, redis::RedisError>(manager)
      })
      .await?;
    Ok(manager.clone())
  }

  /// Run one command, connect included, under the timeout.
  async fn run<T, F, Fut>(&self, op: &'static str, command: F) -> Result<T>
  where
    F: FnOnce(ConnectionManager) -> Fut,
    Fut: Future<Output = RedisResult<T>>,
  {
    let call = async { command(self.connection().await?).await };
    match tokio::time::timeout(self.timeout, call).await {
      Ok(result) => Ok(result?),
      Err(_) => Err(Error::Timeout { op, after: self.timeout }),
    }
  }
}

impl CounterStore for RedisCounterStore {
  type Error = Error;

  async fn increment(&self, key: String) -> Result<i64> {
    self
      .run("INCR", |mut conn| async move { conn.incr(key, 1_i64).await })
      .await
  }

  async fn increment_score(&self, set: String, member: String, delta: f64) -> Result<f64> {
    self
      .run("ZINCRBY", |mut conn| async move { conn.zincr(set, member, delta).await })
      .await
  }

  async fn top_n(&self, set: String, n: usize) -> Result<Vec<String>> {
    // A stop index of -1 would mean "everything".
    if n == 0 {
      return Ok(Vec::new());
    }
    let stop = isize::try_from(n).unwrap_or(isize::MAX) - 1;
    self
      .run("ZREVRANGE", |mut conn| async move { conn.zrevrange(set, 0, stop).await })
      .await
  }
}
