//! Handlers for `/persons/{id}/...` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/persons/:id/journey` | Current cursor; 404 before first decide |
//! | `POST` | `/persons/:id/decide` | Evaluate and maybe transition |
//! | `GET`  | `/persons/:id/answers` | Optional `?stage=<stage_id>` |
//! | `POST` | `/persons/:id/answers` | Body: [`AnswerBody`]; returns 201 |
//! | `GET`  | `/persons/:id/answers/:question_id/history` | Newest first |
//! | `GET`  | `/persons/:id/visits` | Full visit log, entry order |
//! | `GET`  | `/persons/:id/transitions` | Audit ledger, chronological |

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use wayfare_core::{
  answer::{Answer, AnswerReceipt, AnswerValue},
  decision::Decision,
  journey::{JourneyState, TransitionRecord, VisitRecord},
  store::JourneyStore,
};
use wayfare_engine::JourneyEngine;

use crate::error::ApiError;

// ─── Journey cursor ───────────────────────────────────────────────────────────

/// `GET /persons/:id/journey`
pub async fn state<S>(
  State(engine): State<Arc<JourneyEngine<S>>>,
  Path(person_id): Path<Uuid>,
) -> Result<Json<JourneyState>, ApiError>
where
  S: JourneyStore + 'static,
{
  let state = engine
    .journey_state(person_id)
    .await
    .map_err(ApiError::from_engine)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("person {person_id} has no journey"))
    })?;
  Ok(Json(state))
}

// ─── Decide ───────────────────────────────────────────────────────────────────

/// `POST /persons/:id/decide`
///
/// Always 200 with a tagged [`Decision`] body; "no move" outcomes are data,
/// not errors.
pub async fn decide<S>(
  State(engine): State<Arc<JourneyEngine<S>>>,
  Path(person_id): Path<Uuid>,
) -> Result<Json<Decision>, ApiError>
where
  S: JourneyStore + 'static,
{
  let decision =
    engine.decide(person_id).await.map_err(ApiError::from_engine)?;
  Ok(Json(decision))
}

// ─── Answers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnswersParams {
  /// If set, restrict to answers recorded in this stage.
  pub stage: Option<String>,
}

/// `GET /persons/:id/answers[?stage=<stage_id>]`
pub async fn answers<S>(
  State(engine): State<Arc<JourneyEngine<S>>>,
  Path(person_id): Path<Uuid>,
  Query(params): Query<AnswersParams>,
) -> Result<Json<BTreeMap<String, AnswerValue>>, ApiError>
where
  S: JourneyStore + 'static,
{
  let answers = engine
    .current_answers(person_id, params.stage.as_deref())
    .await
    .map_err(ApiError::from_engine)?;
  Ok(Json(answers))
}

/// JSON body accepted by `POST /persons/:id/answers`.
#[derive(Debug, Deserialize)]
pub struct AnswerBody {
  pub question_id: String,
  pub value:       AnswerValue,
}

/// `POST /persons/:id/answers` — returns 201 + the [`AnswerReceipt`].
///
/// Storage only: no transition happens until the next `decide` call.
pub async fn record_answer<S>(
  State(engine): State<Arc<JourneyEngine<S>>>,
  Path(person_id): Path<Uuid>,
  Json(body): Json<AnswerBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: JourneyStore + 'static,
{
  if body.question_id.is_empty() {
    return Err(ApiError::BadRequest("question_id must not be empty".into()));
  }
  let receipt = engine
    .record_answer(person_id, &body.question_id, body.value)
    .await
    .map_err(ApiError::from_engine)?;
  Ok((StatusCode::CREATED, Json(receipt)))
}

/// `GET /persons/:id/answers/:question_id/history` — every version, newest
/// first.
pub async fn answer_history<S>(
  State(engine): State<Arc<JourneyEngine<S>>>,
  Path((person_id, question_id)): Path<(Uuid, String)>,
) -> Result<Json<Vec<Answer>>, ApiError>
where
  S: JourneyStore + 'static,
{
  let history = engine
    .answer_history(person_id, &question_id)
    .await
    .map_err(ApiError::from_engine)?;
  Ok(Json(history))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /persons/:id/visits`
pub async fn visits<S>(
  State(engine): State<Arc<JourneyEngine<S>>>,
  Path(person_id): Path<Uuid>,
) -> Result<Json<Vec<VisitRecord>>, ApiError>
where
  S: JourneyStore + 'static,
{
  let visits = engine
    .visit_history(person_id)
    .await
    .map_err(ApiError::from_engine)?;
  Ok(Json(visits))
}

/// `GET /persons/:id/transitions`
pub async fn transitions<S>(
  State(engine): State<Arc<JourneyEngine<S>>>,
  Path(person_id): Path<Uuid>,
) -> Result<Json<Vec<TransitionRecord>>, ApiError>
where
  S: JourneyStore + 'static,
{
  let ledger = engine
    .transition_history(person_id)
    .await
    .map_err(ApiError::from_engine)?;
  Ok(Json(ledger))
}
