//! placement-server binary.
//!
//! Reads `placement.toml` (or the path given with `--config`), opens the
//! SQLite record store and the separate SQLite mirror store, and serves the
//! JSON API while the sync loop keeps derived status and the mirror current.
//!
//! # One-off reconciliation
//!
//! ```
//! cargo run -p placement-server -- --reconcile-once
//! ```
//!
//! runs a single full pass, waits for the mirror writes to drain, prints the
//! report as JSON and exits. Suitable for a daily cron job when the server is
//! not kept running.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use placement_core::clock::{Clock, SystemClock};
use placement_engine::{Engine, sync_loop::SyncLoop};
use placement_server::{ServerConfig, app, expand_tilde};
use placement_store_sqlite::{SqliteMirror, SqliteStore};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for queued mirror writes.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(author, version, about = "Placement record lifecycle server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "placement.toml")]
  config: PathBuf,

  /// Run one full reconciliation pass, print the report and exit.
  #[arg(long)]
  reconcile_once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let clock = SystemClock::with_offset_minutes(cfg.utc_offset_minutes)
    .with_context(|| format!("utc_offset_minutes out of range: {}", cfg.utc_offset_minutes))?;

  // Open both SQLite databases.
  let store_path = expand_tilde(&cfg.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );
  let mirror_path = expand_tilde(&cfg.mirror_path);
  let mirror = Arc::new(
    SqliteMirror::open(&mirror_path)
      .await
      .with_context(|| format!("failed to open mirror store at {mirror_path:?}"))?,
  );

  let engine = Arc::new(Engine::new(
    store.clone(),
    store,
    mirror,
    Arc::new(clock) as Arc<dyn Clock>,
    cfg.engine.clone(),
  ));

  if cli.reconcile_once {
    let report = engine.reconcile_all().await.context("reconciliation pass failed")?;
    engine.wait_mirror_idle().await;
    let stats = engine.mirror_stats();
    if stats.dead_lettered > 0 {
      tracing::warn!(dead_lettered = stats.dead_lettered, "some mirror writes were not applied");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  let sync = SyncLoop::spawn(engine.clone(), cfg.engine.reconcile_interval());

  let address = cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app(engine.clone()))
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  sync.shutdown().await;
  if tokio::time::timeout(DRAIN_TIMEOUT, engine.wait_mirror_idle()).await.is_err() {
    tracing::warn!(pending = engine.mirror_stats().pending, "mirror writes still queued at exit");
  }

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "could not listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
