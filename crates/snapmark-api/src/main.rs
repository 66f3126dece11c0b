//! snapmark server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) overlaid by
//! `SNAPMARK_*` environment variables, opens the SQLite store, points the
//! counter client at Redis, and serves the JSON API over HTTP.
//!
//! Redis is contacted lazily: the server starts even when it is down, and
//! view counts and the ranking degrade until it comes back.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use snapmark_api::{AppState, ServerConfig};
use snapmark_counter_redis::RedisCounterStore;
use snapmark_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Snapmark image bookmarking server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SNAPMARK"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let database_path = expand_tilde(&server_cfg.database_path);
  let store = SqliteStore::open(&database_path)
    .await
    .with_context(|| format!("failed to open store at {database_path:?}"))?;

  let counters = RedisCounterStore::new(&server_cfg.redis_url, server_cfg.counter_timeout())
    .with_context(|| format!("invalid redis_url {:?}", server_cfg.redis_url))?;

  if let Some(media_dir) = &server_cfg.media_dir {
    tracing::info!(?media_dir, "downloading bookmarked images");
  }

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let state = AppState::new(store, counters, server_cfg)
    .context("failed to build HTTP client")?;
  let app = snapmark_api::router(state).layer(TraceLayer::new_for_http());

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
