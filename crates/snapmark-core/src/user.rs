//! Users and their profiles.
//!
//! A user and its profile are always created together by
//! [`SocialStore::create_user`]; there is no implicit hook that fills in the
//! profile later.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  action::{self, DedupPolicy, verbs},
  store::SocialStore,
};

/// A registered account. The password hash is never part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:     i64,
  pub username:    String,
  pub email:       String,
  pub first_name:  String,
  pub last_name:   String,
  pub date_joined: DateTime<Utc>,
}

/// Optional personal details attached one-to-one to a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub user_id:       i64,
  pub date_of_birth: Option<NaiveDate>,
  /// Path of the profile photo relative to the media directory.
  pub photo:         Option<String>,
}

/// Input to [`SocialStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub email:         String,
  /// argon2 PHC string; hashing happens before the store sees the password.
  pub password_hash: String,
  pub first_name:    String,
  pub last_name:     String,
}

/// Partial update for [`SocialStore::update_profile`]. `None` leaves the
/// field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
  pub first_name:    Option<String>,
  pub last_name:     Option<String>,
  pub email:         Option<String>,
  pub date_of_birth: Option<NaiveDate>,
  pub photo:         Option<String>,
}

/// Follower and following totals for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FollowCounts {
  pub followers: u64,
  pub following: u64,
}

/// Create a user together with its profile, then log the sign-up.
pub async fn register<S: SocialStore>(
  store: &S,
  input: NewUser,
  policy: DedupPolicy,
) -> Result<(User, Profile)> {
  if input.username.trim().is_empty() {
    return Err(Error::EmptyField("username"));
  }
  if input.password_hash.is_empty() {
    return Err(Error::EmptyField("password"));
  }

  let (user, profile) = store.create_user(input).await.map_err(Error::store)?;
  tracing::info!(user_id = user.user_id, username = %user.username, "registered user");

  action::record(store, user.user_id, verbs::CREATED_ACCOUNT, None, policy).await?;
  Ok((user, profile))
}
