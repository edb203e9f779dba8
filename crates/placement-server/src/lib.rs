//! Configuration and router assembly for the placement server binary.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use placement_core::store::{ArchiveStore, MirrorStore, PrimaryStore};
use placement_engine::{Engine, EngineConfig};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `placement.toml` and
/// `PLACEMENT_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  /// SQLite file holding active and archived records.
  pub store_path:         PathBuf,
  /// SQLite file holding the mobile projections.
  pub mirror_path:        PathBuf,
  /// Offset from UTC, in minutes, of the calendar "today" is taken in.
  pub utc_offset_minutes: i32,
  pub engine:             EngineConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               "127.0.0.1".to_string(),
      port:               8080,
      store_path:         PathBuf::from("placement.db"),
      mirror_path:        PathBuf::from("placement-mobile.db"),
      utc_offset_minutes: 0,
      engine:             EngineConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Layer the optional TOML file at `path` under the environment.
  ///
  /// Nested keys use a double underscore:
  /// `PLACEMENT_ENGINE__WINDOW_DAYS=14`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("PLACEMENT")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    settings.try_deserialize().context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  expand_tilde_in(path, std::env::var("HOME").ok().as_deref())
}

fn expand_tilde_in(path: &Path, home: Option<&str>) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Some(home) = home
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API under `/api`, with request tracing.
pub fn app<P, A, M>(engine: Arc<Engine<P, A, M>>) -> Router
where
  P: PrimaryStore + 'static,
  A: ArchiveStore + 'static,
  M: MirrorStore + 'static,
{
  Router::new()
    .nest("/api", placement_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}
