//! Handlers for accounts, the social graph and the dashboard.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/register` | JSON body, no auth; 409 if the username is taken, 400 if reserved |
//! | `GET`  | `/api/users` | |
//! | `GET`  | `/api/users/{username}` | includes follower/following counts |
//! | `POST` | `/api/users/follow` | form `id`, `action=follow\|unfollow` |
//! | `PUT`  | `/api/profile` | partial update of the caller's account |
//! | `GET`  | `/api/dashboard` | recent actions of others |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use snapmark_core::{
  action::{self, Action},
  counter::CounterStore,
  social::{self, FollowAction},
  store::SocialStore,
  user::{self, FollowCounts, NewUser, Profile, ProfileUpdate, User},
};

use crate::{
  AppState, FEED_SIZE, ToggleForm,
  auth::{Authenticated, hash_password},
  error::ApiError,
  extract::{FormBody, JsonBody, PathParam},
};

/// Usernames that collide with static routes under `/api/users/`.
pub const RESERVED_USERNAMES: &[&str] = &["follow"];

/// A user together with its profile.
#[derive(Debug, Serialize)]
pub struct Account {
  pub user:    User,
  pub profile: Profile,
}

// ─── Register ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub username:   String,
  pub email:      String,
  pub password:   String,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name:  String,
}

/// `POST /api/register`
pub async fn register<S, C>(
  State(state): State<AppState<S, C>>,
  JsonBody(body): JsonBody<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  if body.password.is_empty() {
    return Err(snapmark_core::Error::EmptyField("password").into());
  }
  if RESERVED_USERNAMES.contains(&body.username.trim()) {
    return Err(ApiError::BadRequest(format!("username {:?} is reserved", body.username)));
  }
  let existing = state
    .store
    .get_user_by_username(body.username.clone())
    .await
    .map_err(ApiError::store)?;
  if existing.is_some() {
    return Err(ApiError::Conflict(format!("username {:?} is taken", body.username)));
  }

  let input = NewUser {
    username:      body.username,
    email:         body.email,
    password_hash: hash_password(&body.password)?,
    first_name:    body.first_name,
    last_name:     body.last_name,
  };
  let (user, profile) = user::register(&*state.store, input, state.config.dedup_policy()).await?;
  Ok((StatusCode::CREATED, Json(Account { user, profile })))
}

// ─── List / detail ────────────────────────────────────────────────────────────

/// `GET /api/users`
pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  _auth: Authenticated,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  let users = state.store.list_users().await.map_err(ApiError::store)?;
  Ok(Json(users))
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
  pub user:         User,
  pub profile:      Option<Profile>,
  pub counts:       FollowCounts,
  /// Whether the caller follows this user.
  pub is_following: bool,
}

/// `GET /api/users/{username}`
pub async fn detail<S, C>(
  State(state): State<AppState<S, C>>,
  Authenticated(viewer): Authenticated,
  PathParam(username): PathParam<String>,
) -> Result<Json<UserDetail>, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  let store = &state.store;
  let user = store
    .get_user_by_username(username.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {username:?}")))?;

  let profile = store.get_profile(user.user_id).await.map_err(ApiError::store)?;
  let counts = store.follow_counts(user.user_id).await.map_err(ApiError::store)?;
  let is_following = store
    .is_following(viewer.user_id, user.user_id)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(UserDetail { user, profile, counts, is_following }))
}

// ─── Follow toggle ────────────────────────────────────────────────────────────

/// `POST /api/users/follow`, form: `id=<user id>&action=follow|unfollow`
pub async fn follow<S, C>(
  State(state): State<AppState<S, C>>,
  Authenticated(viewer): Authenticated,
  FormBody(form): FormBody<ToggleForm>,
) -> Result<Json<Value>, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  let (followed_id, action) = form.parse::<FollowAction>()?;
  social::set_follow(
    &*state.store,
    viewer.user_id,
    followed_id,
    action,
    state.config.dedup_policy(),
  )
  .await?;
  Ok(Json(json!({ "status": "ok" })))
}

// ─── Profile edit ─────────────────────────────────────────────────────────────

/// `PUT /api/profile` with any subset of `first_name`, `last_name`, `email`,
/// `date_of_birth` (`YYYY-MM-DD`) and `photo`.
pub async fn edit_profile<S, C>(
  State(state): State<AppState<S, C>>,
  Authenticated(viewer): Authenticated,
  JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<Json<Account>, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  let (user, profile) = state
    .store
    .update_profile(viewer.user_id, update)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {}", viewer.user_id)))?;
  tracing::info!(user_id = user.user_id, "updated profile");
  Ok(Json(Account { user, profile }))
}

// ─── Dashboard ────────────────────────────────────────────────────────────────

/// `GET /api/dashboard`
pub async fn dashboard<S, C>(
  State(state): State<AppState<S, C>>,
  Authenticated(viewer): Authenticated,
) -> Result<Json<Vec<Action>>, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  let actions = action::feed(&*state.store, viewer.user_id, FEED_SIZE).await?;
  Ok(Json(actions))
}
