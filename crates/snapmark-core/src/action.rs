//! The action log: an append-only record of "user did X (to Y)".
//!
//! Actions are never updated or deleted. Repeats of the same action within a
//! short window are suppressed at write time by [`DedupPolicy`].

use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, store::SocialStore};

/// Verbs recorded by the service.
pub mod verbs {
  pub const CREATED_ACCOUNT: &str = "has created an account";
  pub const FOLLOWING: &str = "is following";
  pub const LIKES: &str = "likes";
  pub const BOOKMARKED: &str = "bookmarked";
}

// ─── Target ──────────────────────────────────────────────────────────────────

/// The kind of entity an action points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
  User,
  Image,
}

impl TargetKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::User => "user",
      Self::Image => "image",
    }
  }
}

impl fmt::Display for TargetKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TargetKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "user" => Ok(Self::User),
      "image" => Ok(Self::Image),
      other => Err(Error::UnknownTargetKind(other.to_owned())),
    }
  }
}

/// A typed reference from an action to the entity it concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
  pub kind: TargetKind,
  pub id:   i64,
}

impl Target {
  pub fn user(id: i64) -> Self { Self { kind: TargetKind::User, id } }

  pub fn image(id: i64) -> Self { Self { kind: TargetKind::Image, id } }
}

// ─── Action ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
  pub action_id: i64,
  pub actor_id:  i64,
  pub verb:      String,
  pub target:    Option<Target>,
  pub created:   DateTime<Utc>,
}

/// Input to [`SocialStore::record_action`]. `created` is supplied separately
/// so the dedup check and the stored timestamp agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAction {
  pub actor_id: i64,
  pub verb:     String,
  pub target:   Option<Target>,
}

/// Parameters for [`SocialStore::list_actions`].
#[derive(Debug, Clone, Default)]
pub struct ActionQuery {
  /// Restrict to these actors. `None` means every actor.
  pub actor_ids:     Option<Vec<i64>>,
  pub exclude_actor: Option<i64>,
  pub verb:          Option<String>,
  pub limit:         Option<usize>,
}

// ─── Dedup ───────────────────────────────────────────────────────────────────

/// When an action counts as a repeat of an earlier identical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupPolicy {
  /// Identical actions newer than `now - window` suppress the write.
  pub window:   TimeDelta,
  /// How many of the most recent identical actions are inspected.
  pub lookback: usize,
}

impl DedupPolicy {
  pub const DEFAULT_WINDOW_SECS: i64 = 60;
  pub const DEFAULT_LOOKBACK: usize = 10;

  pub fn with_window_secs(secs: i64) -> Self {
    Self { window: TimeDelta::seconds(secs), ..Self::default() }
  }

  /// Given the `created` timestamps of the most recent identical actions
  /// (newest first), decide whether a new action at `now` is a repeat.
  ///
  /// An action exactly `window` old no longer counts.
  pub fn is_duplicate(&self, recent: &[DateTime<Utc>], now: DateTime<Utc>) -> bool {
    let cutoff = now - self.window;
    recent.iter().take(self.lookback).any(|created| *created > cutoff)
  }
}

impl Default for DedupPolicy {
  fn default() -> Self {
    Self {
      window:   TimeDelta::seconds(Self::DEFAULT_WINDOW_SECS),
      lookback: Self::DEFAULT_LOOKBACK,
    }
  }
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// Append an action unless an identical one happened within the policy
/// window. Returns `true` if a row was written.
pub async fn record<S: SocialStore>(
  store: &S,
  actor_id: i64,
  verb: &str,
  target: Option<Target>,
  policy: DedupPolicy,
) -> Result<bool> {
  let input = NewAction { actor_id, verb: verb.to_owned(), target };
  let recorded = store
    .record_action(input, policy, Utc::now())
    .await
    .map_err(Error::store)?;

  match recorded {
    Some(action) => {
      tracing::debug!(action_id = action.action_id, actor_id, verb, "recorded action");
      Ok(true)
    }
    None => {
      tracing::debug!(actor_id, verb, ?target, "suppressed repeated action");
      Ok(false)
    }
  }
}

/// The activity stream shown to `viewer_id`: recent actions by the users they
/// follow, or by everyone when they follow nobody. Their own actions are
/// never included.
pub async fn feed<S: SocialStore>(
  store: &S,
  viewer_id: i64,
  limit: usize,
) -> Result<Vec<Action>> {
  let following = store.following_ids(viewer_id).await.map_err(Error::store)?;
  let query = ActionQuery {
    actor_ids:     (!following.is_empty()).then_some(following),
    exclude_actor: Some(viewer_id),
    verb:          None,
    limit:         Some(limit),
  };
  store.list_actions(&query).await.map_err(Error::store)
}
