//! Follow and like toggles.
//!
//! Both are idempotent: repeating a follow or like leaves exactly one row,
//! and removing an absent relation is a no-op. Only the positive direction
//! writes to the action log.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  action::{self, DedupPolicy, Target, verbs},
  store::SocialStore,
};

/// `follower_id` follows `followed_id`. Unique per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowRelation {
  pub follower_id: i64,
  pub followed_id: i64,
  pub created:     DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowAction {
  Follow,
  Unfollow,
}

impl FromStr for FollowAction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "follow" => Ok(Self::Follow),
      "unfollow" => Ok(Self::Unfollow),
      other => Err(Error::UnknownAction(other.to_owned())),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
  Like,
  Unlike,
}

impl FromStr for LikeAction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "like" => Ok(Self::Like),
      "unlike" => Ok(Self::Unlike),
      other => Err(Error::UnknownAction(other.to_owned())),
    }
  }
}

/// Apply a follow or unfollow from `follower_id` to `followed_id`.
///
/// A follow that creates a new relation is logged as "is following"; a
/// follow of an already-followed user is a silent no-op.
pub async fn set_follow<S: SocialStore>(
  store: &S,
  follower_id: i64,
  followed_id: i64,
  action: FollowAction,
  policy: DedupPolicy,
) -> Result<()> {
  if follower_id == followed_id {
    return Err(Error::SelfFollow);
  }
  store
    .get_user(followed_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::UserNotFound(followed_id))?;

  match action {
    FollowAction::Follow => {
      let created = store
        .follow(follower_id, followed_id, Utc::now())
        .await
        .map_err(Error::store)?;
      if let Some(relation) = created {
        let target = Target::user(relation.followed_id);
        action::record(store, relation.follower_id, verbs::FOLLOWING, Some(target), policy).await?;
      }
    }
    FollowAction::Unfollow => {
      store.unfollow(follower_id, followed_id).await.map_err(Error::store)?;
    }
  }
  Ok(())
}

/// Apply a like or unlike from `user_id` on `image_id`.
///
/// `like` is logged as "likes" (subject to dedup); `unlike` is never logged.
pub async fn set_like<S: SocialStore>(
  store: &S,
  user_id: i64,
  image_id: i64,
  action: LikeAction,
  policy: DedupPolicy,
) -> Result<()> {
  store
    .get_image(image_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::ImageNotFound(image_id))?;

  match action {
    LikeAction::Like => {
      store.like(user_id, image_id).await.map_err(Error::store)?;
      action::record(store, user_id, verbs::LIKES, Some(Target::image(image_id)), policy).await?;
    }
    LikeAction::Unlike => {
      store.unlike(user_id, image_id).await.map_err(Error::store)?;
    }
  }
  Ok(())
}
