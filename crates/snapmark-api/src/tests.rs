//! Router tests against an in-memory SQLite store and counter store.

use std::{
  io,
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use axum::{
  Router,
  body::Body,
  extract::State,
  http::{Request, StatusCode, header},
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::Utc;
use serde_json::{Value, json};
use snapmark_core::{
  action::{ActionQuery, verbs},
  counter::{CounterStore, MemoryCounterStore, RANKING_SET, view_key},
  image::NewImage,
  store::SocialStore,
};
use snapmark_store_sqlite::SqliteStore;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt as _;

use crate::{AppState, ServerConfig, download::content_hash, router};

const PASSWORD: &str = "secret";

/// A counter store that is always unreachable.
struct DownCounters;

impl CounterStore for DownCounters {
  type Error = io::Error;

  async fn increment(&self, _: String) -> Result<i64, io::Error> {
    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "counter store down"))
  }

  async fn increment_score(&self, _: String, _: String, _: f64) -> Result<f64, io::Error> {
    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "counter store down"))
  }

  async fn top_n(&self, _: String, _: usize) -> Result<Vec<String>, io::Error> {
    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "counter store down"))
  }
}

async fn make_state_with<C>(counters: C) -> AppState<SqliteStore, C> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(store, counters, ServerConfig::default()).unwrap()
}

async fn make_state() -> AppState<SqliteStore, MemoryCounterStore> {
  make_state_with(MemoryCounterStore::new()).await
}

/// State that downloads bookmarked images into a fresh temporary directory.
async fn make_state_with_media() -> (AppState<SqliteStore, MemoryCounterStore>, TempDir) {
  let media = tempfile::tempdir().unwrap();
  let config = ServerConfig { media_dir: Some(media.path().to_path_buf()), ..ServerConfig::default() };
  let store = SqliteStore::open_in_memory().await.unwrap();
  let state = AppState::new(store, MemoryCounterStore::new(), config).unwrap();
  (state, media)
}

/// Serve `GET /pic.jpg` on a local port, answering `body-1`, `body-2`, ... on
/// successive requests. Returns the image URL and the request counter.
async fn serve_images() -> (String, Arc<AtomicUsize>) {
  async fn pic(State(hits): State<Arc<AtomicUsize>>) -> String {
    format!("body-{}", hits.fetch_add(1, Ordering::SeqCst) + 1)
  }

  let hits = Arc::new(AtomicUsize::new(0));
  let app = Router::new().route("/pic.jpg", axum::routing::get(pic)).with_state(hits.clone());
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
  (format!("http://{addr}/pic.jpg"), hits)
}

fn files_under(dir: &Path) -> usize {
  std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

fn auth_header(user: &str, pass: &str) -> String {
  format!("Basic {}", B64.encode(format!("{user}:{pass}")))
}

async fn oneshot_raw<C>(
  state: &AppState<SqliteStore, C>,
  method: &str,
  uri: &str,
  user: Option<&str>,
  content_type: Option<&str>,
  body: String,
) -> Response
where
  C: CounterStore + 'static,
{
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(user) = user {
    builder = builder.header(header::AUTHORIZATION, auth_header(user, PASSWORD));
  }
  if let Some(content_type) = content_type {
    builder = builder.header(header::CONTENT_TYPE, content_type);
  }
  let req = builder.body(Body::from(body)).unwrap();
  router(state.clone()).oneshot(req).await.unwrap()
}

async fn body_json(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

async fn get<C: CounterStore + 'static>(
  state: &AppState<SqliteStore, C>,
  uri: &str,
  user: &str,
) -> (StatusCode, Value) {
  let resp = oneshot_raw(state, "GET", uri, Some(user), None, String::new()).await;
  (resp.status(), body_json(resp).await)
}

async fn send_json<C: CounterStore + 'static>(
  state: &AppState<SqliteStore, C>,
  method: &str,
  uri: &str,
  user: Option<&str>,
  body: Value,
) -> (StatusCode, Value) {
  let resp =
    oneshot_raw(state, method, uri, user, Some("application/json"), body.to_string()).await;
  (resp.status(), body_json(resp).await)
}

async fn send_form<C: CounterStore + 'static>(
  state: &AppState<SqliteStore, C>,
  uri: &str,
  user: &str,
  form: &str,
) -> (StatusCode, Value) {
  let resp = oneshot_raw(
    state,
    "POST",
    uri,
    Some(user),
    Some("application/x-www-form-urlencoded"),
    form.to_string(),
  )
  .await;
  (resp.status(), body_json(resp).await)
}

/// Register `username` with [`PASSWORD`] and return its id.
async fn register<C: CounterStore + 'static>(state: &AppState<SqliteStore, C>, username: &str) -> i64 {
  let (status, body) = send_json(
    state,
    "POST",
    "/api/register",
    None,
    json!({ "username": username, "email": format!("{username}@example.com"), "password": PASSWORD }),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["user"]["user_id"].as_i64().unwrap()
}

/// Insert an image owned by `owner_id` directly, bypassing the API.
async fn seed_image<C>(state: &AppState<SqliteStore, C>, owner_id: i64, title: &str) -> i64 {
  let input = NewImage {
    title: title.into(),
    url: "http://example.com/picture.jpg".into(),
    ..NewImage::default()
  };
  state.store.create_image(owner_id, input, Utc::now()).await.unwrap().image_id
}

async fn count_actions<C>(state: &AppState<SqliteStore, C>, verb: &str) -> usize {
  let query = ActionQuery { verb: Some(verb.to_owned()), ..ActionQuery::default() };
  state.store.list_actions(&query).await.unwrap().len()
}

// ── Accounts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_creates_user_and_logs_signup() {
  let state = make_state().await;
  let alice = register(&state, "alice").await;

  let profile = state.store.get_profile(alice).await.unwrap();
  assert!(profile.is_some());
  assert_eq!(count_actions(&state, verbs::CREATED_ACCOUNT).await, 1);
}

#[tokio::test]
async fn register_duplicate_username_conflicts() {
  let state = make_state().await;
  register(&state, "alice").await;

  let (status, body) = send_json(
    &state,
    "POST",
    "/api/register",
    None,
    json!({ "username": "alice", "email": "other@example.com", "password": "x" }),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["status"], "error");
  assert_eq!(count_actions(&state, verbs::CREATED_ACCOUNT).await, 1);
}

#[tokio::test]
async fn register_rejects_reserved_username() {
  let state = make_state().await;

  let (status, body) = send_json(
    &state,
    "POST",
    "/api/register",
    None,
    json!({ "username": "follow", "email": "follow@example.com", "password": "x" }),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["status"], "error");
  assert!(state.store.get_user_by_username("follow".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_json_body_is_a_json_error() {
  let state = make_state().await;

  let resp = oneshot_raw(
    &state,
    "POST",
    "/api/register",
    None,
    Some("application/json"),
    "{\"username\": ".to_string(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = body_json(resp).await;
  assert_eq!(body["status"], "error");
  assert!(body["error"].is_string());

  let resp = oneshot_raw(
    &state,
    "POST",
    "/api/register",
    None,
    Some("application/json"),
    json!({ "username": "alice" }).to_string(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body_json(resp).await["status"], "error");
}

#[tokio::test]
async fn bad_path_and_content_type_are_json_errors() {
  let state = make_state().await;
  register(&state, "alice").await;

  let (status, body) = get(&state, "/api/images/abc", "alice").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["status"], "error");

  let resp = oneshot_raw(
    &state,
    "POST",
    "/api/images/like",
    Some("alice"),
    Some("text/plain"),
    "id=1&action=like".to_string(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
  assert_eq!(body_json(resp).await["status"], "error");
}

#[tokio::test]
async fn missing_credentials_are_rejected() {
  let state = make_state().await;
  let resp = oneshot_raw(&state, "GET", "/api/users", None, None, String::new()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  assert_eq!(body_json(resp).await["status"], "error");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
  let state = make_state().await;
  register(&state, "alice").await;

  let req = Request::builder()
    .uri("/api/users")
    .header(header::AUTHORIZATION, auth_header("alice", "wrong"))
    .body(Body::empty())
    .unwrap();
  let resp = router(state).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_detail_includes_follow_counts() {
  let state = make_state().await;
  register(&state, "alice").await;
  let bob = register(&state, "bob").await;

  let (status, body) = send_form(&state, "/api/users/follow", "alice", &format!("id={bob}&action=follow")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "status": "ok" }));

  let (status, body) = get(&state, "/api/users/bob", "alice").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["counts"]["followers"], 1);
  assert_eq!(body["counts"]["following"], 0);
  assert_eq!(body["is_following"], true);

  let (status, _) = get(&state, "/api/users/nobody", "alice").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edit_profile_applies_partial_update() {
  let state = make_state().await;
  register(&state, "alice").await;

  let (status, body) = send_json(
    &state,
    "PUT",
    "/api/profile",
    Some("alice"),
    json!({ "first_name": "Alice", "date_of_birth": "1990-05-01" }),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["user"]["first_name"], "Alice");
  assert_eq!(body["user"]["email"], "alice@example.com");
  assert_eq!(body["profile"]["date_of_birth"], "1990-05-01");
}

// ── Follow toggle ────────────────────────────────────────────────────────────

#[tokio::test]
async fn follow_twice_then_unfollow() {
  let state = make_state().await;
  let alice = register(&state, "alice").await;
  let bob = register(&state, "bob").await;
  let form = format!("id={bob}&action=follow");

  for _ in 0..2 {
    let (status, body) = send_form(&state, "/api/users/follow", "alice", &form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
  }
  assert!(state.store.is_following(alice, bob).await.unwrap());
  assert_eq!(count_actions(&state, verbs::FOLLOWING).await, 1);

  let form = format!("id={bob}&action=unfollow");
  for _ in 0..2 {
    let (status, _) = send_form(&state, "/api/users/follow", "alice", &form).await;
    assert_eq!(status, StatusCode::OK);
  }
  assert!(!state.store.is_following(alice, bob).await.unwrap());
}

#[tokio::test]
async fn follow_rejects_bad_input() {
  let state = make_state().await;
  let alice = register(&state, "alice").await;
  let bob = register(&state, "bob").await;

  let cases = [
    format!("id={bob}&action=block"),
    format!("id={bob}"),
    "id=abc&action=follow".to_string(),
    format!("id={alice}&action=follow"),
  ];
  for form in cases {
    let (status, body) = send_form(&state, "/api/users/follow", "alice", &form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{form}");
    assert_eq!(body["status"], "error");
  }
  assert!(!state.store.is_following(alice, bob).await.unwrap());

  let (status, _) = send_form(&state, "/api/users/follow", "alice", "id=9999&action=follow").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Images ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bookmark_creates_image_and_logs_it() {
  let state = make_state().await;
  let alice = register(&state, "alice").await;

  let (status, body) = send_json(
    &state,
    "POST",
    "/api/images",
    Some("alice"),
    json!({ "title": "Sunset Over Water", "url": "https://example.com/sunset.JPG" }),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert_eq!(body["slug"], "sunset-over-water");
  assert_eq!(body["owner_id"], alice);
  assert!(body["image_path"].is_null());
  assert_eq!(count_actions(&state, verbs::BOOKMARKED).await, 1);
}

#[tokio::test]
async fn bookmark_rejects_unsupported_extension() {
  let state = make_state().await;
  register(&state, "alice").await;

  let (status, body) = send_json(
    &state,
    "POST",
    "/api/images",
    Some("alice"),
    json!({ "title": "Doc", "url": "https://example.com/file.pdf" }),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["status"], "error");
  assert_eq!(count_actions(&state, verbs::BOOKMARKED).await, 0);
}

#[tokio::test]
async fn bookmarks_with_same_title_keep_separate_files() {
  let (state, media) = make_state_with_media().await;
  register(&state, "alice").await;
  let (url, _) = serve_images().await;

  let mut stored = Vec::new();
  for _ in 0..2 {
    let (status, body) = send_json(
      &state,
      "POST",
      "/api/images",
      Some("alice"),
      json!({ "title": "Same Title", "url": url }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["slug"], "same-title");
    stored.push(body);
  }

  assert_ne!(stored[0]["image_path"], stored[1]["image_path"]);
  for body in &stored {
    let path = media.path().join(body["image_path"].as_str().unwrap());
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(body["content_hash"], content_hash(&bytes));
  }
  assert_eq!(files_under(&media.path().join("images")), 2);
}

#[tokio::test]
async fn rejected_bookmark_downloads_nothing() {
  let (state, media) = make_state_with_media().await;
  register(&state, "alice").await;
  let (url, hits) = serve_images().await;

  let (status, body) = send_json(
    &state,
    "POST",
    "/api/images",
    Some("alice"),
    json!({ "title": "   ", "url": url }),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["status"], "error");
  assert_eq!(hits.load(Ordering::SeqCst), 0);
  assert_eq!(files_under(&media.path().join("images")), 0);
  assert_eq!(count_actions(&state, verbs::BOOKMARKED).await, 0);
}

#[tokio::test]
async fn like_then_unlike() {
  let state = make_state().await;
  let alice = register(&state, "alice").await;
  register(&state, "bob").await;
  let image = seed_image(&state, alice, "Mountains").await;

  let (status, body) =
    send_form(&state, "/api/images/like", "bob", &format!("id={image}&action=like")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "status": "ok" }));
  assert_eq!(state.store.get_image(image).await.unwrap().unwrap().total_likes, 1);
  assert_eq!(count_actions(&state, verbs::LIKES).await, 1);

  let (status, _) =
    send_form(&state, "/api/images/like", "bob", &format!("id={image}&action=unlike")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(state.store.get_image(image).await.unwrap().unwrap().total_likes, 0);
  assert_eq!(count_actions(&state, verbs::LIKES).await, 1);

  let (status, body) =
    send_form(&state, "/api/images/like", "bob", &format!("id={image}&action=love")).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn list_pages_newest_first() {
  let state = make_state().await;
  let alice = register(&state, "alice").await;
  let mut ids = Vec::new();
  for n in 0..10 {
    ids.push(seed_image(&state, alice, &format!("Image {n}")).await);
  }

  let (status, body) = get(&state, "/api/images", "alice").await;
  assert_eq!(status, StatusCode::OK);
  let page = body.as_array().unwrap();
  assert_eq!(page.len(), crate::PAGE_SIZE);
  assert_eq!(page[0]["image_id"], ids[9]);

  let (_, body) = get(&state, "/api/images?page=2", "alice").await;
  assert_eq!(body.as_array().unwrap().len(), 2);

  let (_, body) = get(&state, "/api/images?page=5", "alice").await;
  assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn detail_counts_views_and_bumps_ranking() {
  let state = make_state().await;
  let alice = register(&state, "alice").await;
  let image = seed_image(&state, alice, "Forest").await;
  let uri = format!("/api/images/{image}");

  let (status, body) = get(&state, &uri, "alice").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total_views"], 1);
  assert_eq!(body["title"], "Forest");

  let (_, body) = get(&state, &uri, "alice").await;
  assert_eq!(body["total_views"], 2);
  assert_eq!(state.counters.get(&view_key(image)), Some(2));
  assert_eq!(state.counters.score(RANKING_SET, &image.to_string()), Some(2.0));

  let (status, body) = get(&state, "/api/images/9999", "alice").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn ranking_orders_by_views() {
  let state = make_state().await;
  let alice = register(&state, "alice").await;
  let first = seed_image(&state, alice, "First").await;
  let _unviewed = seed_image(&state, alice, "Second").await;
  let third = seed_image(&state, alice, "Third").await;

  for _ in 0..3 {
    get(&state, &format!("/api/images/{third}"), "alice").await;
  }
  get(&state, &format!("/api/images/{first}"), "alice").await;

  let (status, body) = get(&state, "/api/images/ranking", "alice").await;
  assert_eq!(status, StatusCode::OK);
  let ids: Vec<i64> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|image| image["image_id"].as_i64().unwrap())
    .collect();
  assert_eq!(ids, vec![third, first]);
}

#[tokio::test]
async fn unavailable_counters_degrade_gracefully() {
  let state = make_state_with(DownCounters).await;
  let alice = register(&state, "alice").await;
  let image = seed_image(&state, alice, "Lake").await;

  let (status, body) = get(&state, &format!("/api/images/{image}"), "alice").await;
  assert_eq!(status, StatusCode::OK);
  assert!(body["total_views"].is_null());
  assert_eq!(body["image_id"], image);

  let (status, body) = get(&state, "/api/images/ranking", "alice").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));
}

// ── Dashboard ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dashboard_shows_followed_users_only() {
  let state = make_state().await;
  register(&state, "alice").await;
  let bob = register(&state, "bob").await;
  let carol = register(&state, "carol").await;
  seed_image(&state, carol, "Carol's").await;

  // Before following anyone, alice sees everyone else.
  let (_, body) = get(&state, "/api/dashboard", "alice").await;
  let actors: Vec<i64> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|a| a["actor_id"].as_i64().unwrap())
    .collect();
  assert!(actors.contains(&bob) && actors.contains(&carol));

  send_form(&state, "/api/users/follow", "alice", &format!("id={bob}&action=follow")).await;

  let (status, body) = get(&state, "/api/dashboard", "alice").await;
  assert_eq!(status, StatusCode::OK);
  let feed = body.as_array().unwrap();
  assert!(!feed.is_empty());
  assert!(feed.iter().all(|a| a["actor_id"] == bob), "{body}");
}
