//! The `CounterStore` trait: view counters and the popularity ranking.
//!
//! Counters live in an external key/sorted-set service (Redis in production).
//! They are best-effort telemetry: callers log and swallow failures instead
//! of failing the request.

use std::{
  collections::HashMap,
  convert::Infallible,
  future::Future,
  sync::{Mutex, MutexGuard},
};

/// Name of the sorted set that ranks images by view count.
pub const RANKING_SET: &str = "content_ranking";

/// Key of the per-image view counter.
pub fn view_key(image_id: i64) -> String { format!("content:{image_id}:views") }

/// The narrow slice of a counter service the application needs.
///
/// Every call reaches the store; nothing is cached and nothing is
/// idempotent.
pub trait CounterStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Add one to `key`, creating it at 1 if absent. Returns the new value.
  fn increment(
    &self,
    key: String,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Add `delta` to `member`'s score in `set`, creating it at `delta` if
  /// absent. Returns the new score.
  fn increment_score(
    &self,
    set: String,
    member: String,
    delta: f64,
  ) -> impl Future<Output = Result<f64, Self::Error>> + Send + '_;

  /// The `n` highest-scored members of `set`, highest first.
  fn top_n(
    &self,
    set: String,
    n: usize,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;
}

/// Count one view of `image_id` and bump its ranking score.
///
/// Returns the new view count, or `None` if the counter store could not be
/// reached. A failed ranking update is logged but does not discard the view
/// count.
pub async fn record_view<C: CounterStore>(counters: &C, image_id: i64) -> Option<i64> {
  let views = match counters.increment(view_key(image_id)).await {
    Ok(views) => views,
    Err(e) => {
      tracing::warn!(image_id, error = %e, "view counter unavailable; skipping");
      return None;
    }
  };

  match counters
    .increment_score(RANKING_SET.to_owned(), image_id.to_string(), 1.0)
    .await
  {
    Ok(score) => tracing::debug!(image_id, views, score, "recorded view"),
    Err(e) => tracing::warn!(image_id, error = %e, "ranking update failed; skipping"),
  }
  Some(views)
}

// ─── In-memory implementation ────────────────────────────────────────────────

/// A process-local [`CounterStore`], for tests and single-node development.
///
/// Ties in [`top_n`](CounterStore::top_n) are broken by member in reverse
/// lexicographic order, as Redis does for `ZREVRANGE`.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
  counters: Mutex<HashMap<String, i64>>,
  sets:     Mutex<HashMap<String, HashMap<String, f64>>>,
}

impl MemoryCounterStore {
  pub fn new() -> Self { Self::default() }

  /// Current value of `key` without modifying it.
  pub fn get(&self, key: &str) -> Option<i64> { lock(&self.counters).get(key).copied() }

  /// Current score of `member` in `set` without modifying it.
  pub fn score(&self, set: &str, member: &str) -> Option<f64> {
    lock(&self.sets).get(set).and_then(|s| s.get(member)).copied()
  }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CounterStore for MemoryCounterStore {
  type Error = Infallible;

  async fn increment(&self, key: String) -> Result<i64, Infallible> {
    let mut counters = lock(&self.counters);
    let value = counters.entry(key).or_insert(0);
    *value += 1;
    Ok(*value)
  }

  async fn increment_score(
    &self,
    set: String,
    member: String,
    delta: f64,
  ) -> Result<f64, Infallible> {
    let mut sets = lock(&self.sets);
    let score = sets.entry(set).or_default().entry(member).or_insert(0.0);
    *score += delta;
    Ok(*score)
  }

  async fn top_n(&self, set: String, n: usize) -> Result<Vec<String>, Infallible> {
    let sets = lock(&self.sets);
    let Some(members) = sets.get(&set) else {
      return Ok(Vec::new());
    };

    let mut ranked: Vec<(&String, f64)> = members.iter().map(|(m, s)| (m, *s)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(a.0)));
    Ok(ranked.into_iter().take(n).map(|(m, _)| m.clone()).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn view_key_format() {
    assert_eq!(view_key(42), "content:42:views");
  }

  #[tokio::test]
  async fn increment_creates_at_one() {
    let c = MemoryCounterStore::new();
    assert_eq!(c.increment("k".into()).await.unwrap(), 1);
    assert_eq!(c.increment("k".into()).await.unwrap(), 2);
    assert_eq!(c.get("k"), Some(2));
    assert_eq!(c.get("other"), None);
  }

  #[tokio::test]
  async fn increment_score_creates_at_delta() {
    let c = MemoryCounterStore::new();
    assert_eq!(c.increment_score("s".into(), "a".into(), 2.5).await.unwrap(), 2.5);
    assert_eq!(c.increment_score("s".into(), "a".into(), 1.0).await.unwrap(), 3.5);
  }

  #[tokio::test]
  async fn top_n_orders_descending_and_truncates() {
    let c = MemoryCounterStore::new();
    for (member, times) in [("1", 1), ("2", 5), ("3", 3)] {
      for _ in 0..times {
        c.increment_score("s".into(), member.into(), 1.0).await.unwrap();
      }
    }
    assert_eq!(c.top_n("s".into(), 10).await.unwrap(), ["2", "3", "1"]);
    assert_eq!(c.top_n("s".into(), 2).await.unwrap(), ["2", "3"]);
    assert!(c.top_n("missing".into(), 5).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn record_view_bumps_counter_and_rank() {
    let c = MemoryCounterStore::new();
    for _ in 0..3 {
      record_view(&c, 42).await;
    }
    record_view(&c, 7).await;

    assert_eq!(c.get(&view_key(42)), Some(3));
    assert_eq!(c.score(RANKING_SET, "42"), Some(3.0));
    assert_eq!(c.top_n(RANKING_SET.into(), 1).await.unwrap(), ["42"]);
  }
}
