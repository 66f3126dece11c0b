//! The `SocialStore` trait, the relational system of record.
//!
//! The trait is implemented by storage backends (e.g. `snapmark-store-sqlite`).
//! Higher layers (`snapmark-api`) depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  action::{Action, ActionQuery, DedupPolicy, NewAction},
  image::{Image, NewImage},
  social::FollowRelation,
  user::{FollowCounts, NewUser, Profile, ProfileUpdate, User},
};

/// Abstraction over a Snapmark relational backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SocialStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Insert a user and its empty profile in a single transaction.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<(User, Profile), Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user_by_username(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// The user together with its stored password hash, for authentication.
  fn get_credentials(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<(User, String)>, Self::Error>> + Send + '_;

  fn list_users(&self) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// Apply a partial update to a user and its profile. Returns `None` if the
  /// user does not exist.
  fn update_profile(
    &self,
    user_id: i64,
    update: ProfileUpdate,
  ) -> impl Future<Output = Result<Option<(User, Profile)>, Self::Error>> + Send + '_;

  // ── Social graph ──────────────────────────────────────────────────────

  /// Idempotent insert. Returns the relation if it is new, `None` if
  /// `follower_id` already followed `followed_id`.
  fn follow(
    &self,
    follower_id: i64,
    followed_id: i64,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<FollowRelation>, Self::Error>> + Send + '_;

  /// Idempotent delete. Returns `true` if a relation was removed.
  fn unfollow(
    &self,
    follower_id: i64,
    followed_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn is_following(
    &self,
    follower_id: i64,
    followed_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Ids of every user `user_id` follows.
  fn following_ids(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + '_;

  fn follow_counts(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<FollowCounts, Self::Error>> + Send + '_;

  // ── Images ────────────────────────────────────────────────────────────

  fn create_image(
    &self,
    owner_id: i64,
    input: NewImage,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Image, Self::Error>> + Send + '_;

  fn get_image(
    &self,
    image_id: i64,
  ) -> impl Future<Output = Result<Option<Image>, Self::Error>> + Send + '_;

  /// Fetch the images with the given ids. Missing ids are skipped and the
  /// result order is unspecified.
  fn get_images_by_ids(
    &self,
    image_ids: Vec<i64>,
  ) -> impl Future<Output = Result<Vec<Image>, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_images(
    &self,
    limit: usize,
    offset: usize,
  ) -> impl Future<Output = Result<Vec<Image>, Self::Error>> + Send + '_;

  // ── Likes ─────────────────────────────────────────────────────────────

  /// Idempotent insert. Returns `true` if the like is new.
  fn like(
    &self,
    user_id: i64,
    image_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Idempotent delete. Returns `true` if a like was removed.
  fn unlike(
    &self,
    user_id: i64,
    image_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_likers(
    &self,
    image_id: i64,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  // ── Actions ───────────────────────────────────────────────────────────

  /// Append `input` stamped with `now`, unless `policy` judges it a repeat
  /// of a recent identical action. Returns the stored action, or `None` when
  /// the write was suppressed.
  ///
  /// Implementations should perform the check and the insert atomically.
  /// A backend that cannot may let two concurrent identical requests both
  /// insert; that is a tolerated, documented limitation.
  fn record_action(
    &self,
    input: NewAction,
    policy: DedupPolicy,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Action>, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_actions<'a>(
    &'a self,
    query: &'a ActionQuery,
  ) -> impl Future<Output = Result<Vec<Action>, Self::Error>> + Send + 'a;
}
