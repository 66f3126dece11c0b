//! JSON/form HTTP API for Snapmark.
//!
//! Exposes an axum [`Router`] backed by any [`SocialStore`] for relational
//! data and any [`CounterStore`] for view counts and the ranking.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = snapmark_api::router(state).layer(TraceLayer::new_for_http());
//! ```

pub mod accounts;
pub mod auth;
pub mod download;
pub mod error;
pub mod extract;
pub mod images;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post, put},
};
use serde::Deserialize;
use snapmark_core::{action::DedupPolicy, counter::CounterStore, store::SocialStore};

pub use error::ApiError;

/// Number of actions shown on the dashboard.
pub const FEED_SIZE: usize = 10;

/// Images per page of `GET /api/images`.
pub const PAGE_SIZE: usize = 8;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SNAPMARK_*` environment variables. Every key has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub database_path:      PathBuf,
  pub redis_url:          String,
  pub counter_timeout_ms: u64,
  pub dedup_window_secs:  i64,
  pub ranking_size:       usize,
  /// Directory remote images are downloaded into. Unset disables downloads.
  pub media_dir:          Option<PathBuf>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               "127.0.0.1".to_string(),
      port:               8000,
      database_path:      PathBuf::from("snapmark.db"),
      redis_url:          "redis://127.0.0.1:6379".to_string(),
      counter_timeout_ms: 250,
      dedup_window_secs:  DedupPolicy::DEFAULT_WINDOW_SECS,
      ranking_size:       10,
      media_dir:          None,
    }
  }
}

impl ServerConfig {
  pub fn dedup_policy(&self) -> DedupPolicy {
    DedupPolicy::with_window_secs(self.dedup_window_secs)
  }

  pub fn counter_timeout(&self) -> Duration { Duration::from_millis(self.counter_timeout_ms) }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, C> {
  pub store:    Arc<S>,
  pub counters: Arc<C>,
  pub config:   Arc<ServerConfig>,
  pub http:     reqwest::Client,
}

// Derived `Clone` would require `S: Clone` and `C: Clone`.
impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      counters: Arc::clone(&self.counters),
      config:   Arc::clone(&self.config),
      http:     self.http.clone(),
    }
  }
}

impl<S, C> AppState<S, C> {
  pub fn new(store: S, counters: C, config: ServerConfig) -> Result<Self, reqwest::Error> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .user_agent(concat!("snapmark/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self {
      store: Arc::new(store),
      counters: Arc::new(counters),
      config: Arc::new(config),
      http,
    })
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the `/api` router.
pub fn router<S, C>(state: AppState<S, C>) -> Router
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  Router::new()
    // Accounts
    .route("/api/register", post(accounts::register::<S, C>))
    .route("/api/users", get(accounts::list::<S, C>))
    .route("/api/users/follow", post(accounts::follow::<S, C>))
    .route("/api/users/{username}", get(accounts::detail::<S, C>))
    .route("/api/profile", put(accounts::edit_profile::<S, C>))
    .route("/api/dashboard", get(accounts::dashboard::<S, C>))
    // Images
    .route("/api/images", get(images::list::<S, C>).post(images::create::<S, C>))
    .route("/api/images/like", post(images::like::<S, C>))
    .route("/api/images/ranking", get(images::ranking::<S, C>))
    .route("/api/images/{id}", get(images::detail::<S, C>))
    .with_state(state)
}

/// Form body shared by the follow and like toggles.
#[derive(Debug, Deserialize)]
pub struct ToggleForm {
  pub id:     Option<String>,
  pub action: Option<String>,
}

impl ToggleForm {
  /// Parse `id` and `action`. Both are required.
  pub fn parse<A>(self) -> Result<(i64, A), ApiError>
  where
    A: std::str::FromStr<Err = snapmark_core::Error>,
  {
    let id = self
      .id
      .as_deref()
      .and_then(|id| id.trim().parse::<i64>().ok())
      .ok_or_else(|| ApiError::BadRequest("missing or malformed id".into()))?;
    let action = self
      .action
      .as_deref()
      .ok_or_else(|| ApiError::BadRequest("missing action".into()))?
      .parse::<A>()?;
    Ok((id, action))
  }
}

#[cfg(test)]
mod tests;
