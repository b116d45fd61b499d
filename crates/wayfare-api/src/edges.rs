//! Handlers for `/edges` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/edges` | Persisted configuration, priority order |
//! | `POST` | `/edges/reload` | Swap the active graph from the store |

use std::sync::Arc;

use axum::{Json, extract::State};
use serde_json::{Value, json};
use wayfare_core::{edge::Edge, store::JourneyStore};
use wayfare_engine::JourneyEngine;

use crate::error::ApiError;

/// `GET /edges`
pub async fn list<S>(
  State(engine): State<Arc<JourneyEngine<S>>>,
) -> Result<Json<Vec<Edge>>, ApiError>
where
  S: JourneyStore + 'static,
{
  let edges = engine.edges().await.map_err(ApiError::from_engine)?;
  Ok(Json(edges))
}

/// `POST /edges/reload` — re-reads the edge set and swaps the active graph.
/// In-flight decisions finish on the old snapshot.
pub async fn reload<S>(
  State(engine): State<Arc<JourneyEngine<S>>>,
) -> Result<Json<Value>, ApiError>
where
  S: JourneyStore + 'static,
{
  let count = engine.reload_edges().await.map_err(ApiError::from_engine)?;
  Ok(Json(json!({ "edges": count })))
}
