//! JSON REST API for Wayfare.
//!
//! Exposes an axum [`Router`] backed by a [`JourneyEngine`] over any
//! [`wayfare_core::store::JourneyStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", wayfare_api::api_router(engine.clone()))
//! ```

pub mod edges;
pub mod error;
pub mod journey;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use wayfare_core::store::JourneyStore;
use wayfare_engine::JourneyEngine;

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<JourneyEngine<S>>) -> Router<()>
where
  S: JourneyStore + 'static,
{
  Router::new()
    // Journey
    .route("/persons/{id}/journey", get(journey::state::<S>))
    .route("/persons/{id}/decide", post(journey::decide::<S>))
    // Answers
    .route(
      "/persons/{id}/answers",
      get(journey::answers::<S>).post(journey::record_answer::<S>),
    )
    .route(
      "/persons/{id}/answers/{question_id}/history",
      get(journey::answer_history::<S>),
    )
    // History
    .route("/persons/{id}/visits", get(journey::visits::<S>))
    .route("/persons/{id}/transitions", get(journey::transitions::<S>))
    // Edges
    .route("/edges", get(edges::list::<S>))
    .route("/edges/reload", post(edges::reload::<S>))
    .with_state(engine)
}
