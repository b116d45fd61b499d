//! wayfare-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the journey decision API over HTTP.
//!
//! # Seeding edge configuration
//!
//! ```
//! cargo run -p wayfare-server -- seed --edges demos/edges.sample.json
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use wayfare_core::{
  edge::{Condition, Edge, EdgeGraph},
  store::JourneyStore as _,
};
use wayfare_engine::JourneyEngine;
use wayfare_store_sqlite::SqliteStore;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` with
/// `WAYFARE_*` environment overrides.
#[derive(Deserialize, Clone)]
struct ServerConfig {
  #[serde(default = "default_host")]
  host:       String,
  #[serde(default = "default_port")]
  port:       u16,
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("wayfare.db") }

// ─── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Wayfare journey decision server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default when no subcommand is given).
  Run,
  /// Replace the edge configuration from a JSON file and exit.
  Seed {
    /// Path to a JSON array of edge definitions.
    #[arg(long)]
    edges: PathBuf,
  },
}

/// One edge as authored in a seed file; `edge_id` is assigned on import.
#[derive(Deserialize)]
struct EdgeSeed {
  from_stage: Option<String>,
  to_stage:   String,
  #[serde(flatten)]
  condition:  Condition,
}

impl From<EdgeSeed> for Edge {
  fn from(seed: EdgeSeed) -> Self {
    Edge {
      edge_id:    Uuid::new_v4(),
      from_stage: seed.from_stage,
      to_stage:   seed.to_stage,
      condition:  seed.condition,
    }
  }
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
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

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("WAYFARE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  if let Some(Command::Seed { edges }) = &cli.command {
    return seed_edges(&store, edges).await;
  }

  let engine = JourneyEngine::load(store)
    .await
    .context("failed to load edge configuration")?;

  let app = wayfare_api::api_router(Arc::new(engine))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Parse a seed file and atomically replace the stored edge set.
async fn seed_edges(store: &SqliteStore, path: &Path) -> anyhow::Result<()> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {path:?}"))?;
  let seeds: Vec<EdgeSeed> =
    serde_json::from_str(&raw).context("failed to parse edge seed file")?;
  let edges: Vec<Edge> = seeds.into_iter().map(Edge::from).collect();

  // Surface authoring defects now rather than at first decide.
  EdgeGraph::from_edges(edges.clone())
    .validate()
    .context("edge seed file is defective")?;

  let count = edges.len();
  store
    .replace_edges(edges)
    .await
    .context("failed to write edges")?;
  println!("seeded {count} edges from {}", path.display());
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
