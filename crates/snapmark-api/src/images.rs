//! Handlers for `/api/images` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/images` | `?page=N`, newest first, [`PAGE_SIZE`] per page |
//! | `POST` | `/api/images` | JSON `{title, url, description?}` |
//! | `GET`  | `/api/images/{id}` | counts a view; 404 if not found |
//! | `POST` | `/api/images/like` | form `id`, `action=like\|unlike` |
//! | `GET`  | `/api/images/ranking` | most viewed first |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use snapmark_core::{
  counter::{self, CounterStore},
  image::{self, Image, NewImage},
  ranking,
  social::{self, LikeAction},
  store::SocialStore,
  user::User,
};

use crate::{
  AppState, PAGE_SIZE, ToggleForm,
  auth::Authenticated,
  download::download_image,
  error::ApiError,
  extract::{FormBody, JsonBody, PathParam, QueryParams},
};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub page: Option<usize>,
}

/// `GET /api/images[?page=N]`. Pages start at 1. A page past the end is
/// empty.
pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  _auth: Authenticated,
  QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Vec<Image>>, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  let page = params.page.unwrap_or(1).max(1);
  let offset = (page - 1).saturating_mul(PAGE_SIZE);
  let images = state
    .store
    .list_images(PAGE_SIZE, offset)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(images))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub title:       String,
  pub url:         String,
  #[serde(default)]
  pub description: String,
}

/// `POST /api/images`
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  Authenticated(owner): Authenticated,
  JsonBody(body): JsonBody<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  let mut input = NewImage {
    title: body.title,
    url: body.url,
    description: body.description,
    ..NewImage::default()
  };
  // Nothing is fetched or written for a request that will be rejected.
  let ext = input.validate()?;

  if let Some(media_dir) = &state.config.media_dir {
    let slug = input.resolved_slug();
    let downloaded = download_image(&state.http, media_dir, &input.url, &slug, &ext).await?;
    input.slug = Some(slug);
    input.image_path = Some(downloaded.image_path);
    input.content_hash = Some(downloaded.content_hash);
  }

  let image =
    image::bookmark(&*state.store, owner.user_id, input, state.config.dedup_policy()).await?;
  Ok((StatusCode::CREATED, Json(image)))
}

// ─── Detail ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ImageDetail {
  #[serde(flatten)]
  pub image:       Image,
  /// `null` when the counter store is unavailable.
  pub total_views: Option<i64>,
  pub likers:      Vec<User>,
}

/// `GET /api/images/{id}`
pub async fn detail<S, C>(
  State(state): State<AppState<S, C>>,
  _auth: Authenticated,
  PathParam(image_id): PathParam<i64>,
) -> Result<Json<ImageDetail>, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  let image = state
    .store
    .get_image(image_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("image {image_id}")))?;
  let likers = state.store.list_likers(image_id).await.map_err(ApiError::store)?;

  let total_views = counter::record_view(&*state.counters, image_id).await;
  Ok(Json(ImageDetail { image, total_views, likers }))
}

// ─── Like toggle ──────────────────────────────────────────────────────────────

/// `POST /api/images/like`, form: `id=<image id>&action=like|unlike`
pub async fn like<S, C>(
  State(state): State<AppState<S, C>>,
  Authenticated(viewer): Authenticated,
  FormBody(form): FormBody<ToggleForm>,
) -> Result<Json<Value>, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  let (image_id, action) = form.parse::<LikeAction>()?;
  social::set_like(&*state.store, viewer.user_id, image_id, action, state.config.dedup_policy())
    .await?;
  Ok(Json(json!({ "status": "ok" })))
}

// ─── Ranking ──────────────────────────────────────────────────────────────────

/// `GET /api/images/ranking`
pub async fn ranking<S, C>(
  State(state): State<AppState<S, C>>,
  _auth: Authenticated,
) -> Result<Json<Vec<Image>>, ApiError>
where
  S: SocialStore + 'static,
  C: CounterStore + 'static,
{
  let images =
    ranking::ranked_content(&*state.store, &*state.counters, state.config.ranking_size).await?;
  Ok(Json(images))
}
