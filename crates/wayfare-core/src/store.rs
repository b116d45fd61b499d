//! The `JourneyStore` trait — the seam between the decision engine and its
//! transactional backing store.
//!
//! Implemented by storage backends (e.g. `wayfare-store-sqlite`). The engine
//! and API layers depend on this abstraction, not on any concrete backend.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::{
  collections::{BTreeMap, BTreeSet},
  future::Future,
};

use uuid::Uuid;

use crate::{
  answer::{Answer, AnswerReceipt, AnswerValue},
  edge::Edge,
  journey::{JourneyState, TransitionRecord, VisitRecord},
};

// ─── Error classification ────────────────────────────────────────────────────

/// Coarse classification of store failures, used at the API boundary to
/// pick a status code and a retry hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
  /// Lock or serialization contention. Retryable; the failed attempt left
  /// no observable writes.
  Conflict,
  /// I/O failure. Retryable with backoff; no partial write survives.
  Unavailable,
  /// The person has no journey yet.
  JourneyNotStarted,
  /// Everything else (corrupt rows, programming errors).
  Other,
}

impl StoreErrorKind {
  pub fn is_retryable(self) -> bool {
    matches!(self, Self::Conflict | Self::Unavailable)
  }
}

/// Implemented by store error types so callers can classify failures
/// without depending on the concrete backend.
pub trait ClassifyError {
  fn kind(&self) -> StoreErrorKind;
}

// ─── Write-path inputs and outputs ───────────────────────────────────────────

/// Everything the store needs to apply one transition atomically. Produced
/// by the executor after priority resolution.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
  pub person_id:           Uuid,
  /// The stage the person is expected to still be in when the write lands;
  /// `None` for the bootstrap entry. A mismatch aborts with a conflict.
  pub from_stage:          Option<String>,
  pub from_visit_number:   Option<i64>,
  pub to_stage:            String,
  pub matched_edge_id:     Uuid,
  pub matched_question_id: Option<String>,
  pub matched_value:       Option<AnswerValue>,
  pub reason:              String,
}

/// The rows written by a successfully-applied transition.
#[derive(Debug, Clone)]
pub struct AppliedTransition {
  pub record: TransitionRecord,
  pub visit:  VisitRecord,
  pub state:  JourneyState,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the journey engine's backing store.
///
/// Answers, visits, and transitions are append-only; the only in-place
/// update anywhere is the `is_current` flag flip and the materialized
/// [`JourneyState`] cursor, and both happen inside the store's own
/// transactions.
pub trait JourneyStore: Send + Sync {
  type Error: std::error::Error + ClassifyError + Send + Sync + 'static;

  // ── Edges (read-only configuration) ───────────────────────────────────

  /// All configured edges in insertion order. Called at startup and on
  /// explicit reload; never per decision.
  fn load_edges(
    &self,
  ) -> impl Future<Output = Result<Vec<Edge>, Self::Error>> + Send + '_;

  /// Append one edge after the existing configuration.
  fn insert_edge(
    &self,
    edge: Edge,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Atomically replace the whole edge set, preserving `edges` order.
  fn replace_edges(
    &self,
    edges: Vec<Edge>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Answers ───────────────────────────────────────────────────────────

  /// Current (`is_current = true`) answers keyed by question id, optionally
  /// restricted to one stage.
  fn current_answers<'a>(
    &'a self,
    person_id: Uuid,
    stage_id:  Option<&'a str>,
  ) -> impl Future<Output = Result<BTreeMap<String, AnswerValue>, Self::Error>>
  + Send
  + 'a;

  /// Version-and-insert write: flips `is_current` on the prior row (if any)
  /// and inserts the next version, in one transaction. Never triggers a
  /// transition.
  fn record_answer<'a>(
    &'a self,
    person_id:   Uuid,
    stage_id:    &'a str,
    question_id: &'a str,
    value:       AnswerValue,
  ) -> impl Future<Output = Result<AnswerReceipt, Self::Error>> + Send + 'a;

  /// All versions of one answer, newest first.
  fn answer_history<'a>(
    &'a self,
    person_id:   Uuid,
    question_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Answer>, Self::Error>> + Send + 'a;

  // ── Visit history (two derived views over one log) ────────────────────

  /// Deduplicated set of every stage the person has ever entered.
  fn visited_stages(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<BTreeSet<String>, Self::Error>> + Send + '_;

  /// How many times the person has entered `stage_id`.
  fn visit_count<'a>(
    &'a self,
    person_id: Uuid,
    stage_id:  &'a str,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  /// Full visit log in entry order.
  fn visit_history(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<VisitRecord>, Self::Error>> + Send + '_;

  // ── Audit ledger ──────────────────────────────────────────────────────

  /// The append-only transition ledger, chronological.
  fn transition_history(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TransitionRecord>, Self::Error>> + Send + '_;

  // ── Journey cursor ────────────────────────────────────────────────────

  /// The materialized cursor, or `None` if the person has never entered.
  fn journey_state(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Option<JourneyState>, Self::Error>> + Send + '_;

  // ── Atomic write path ─────────────────────────────────────────────────

  /// Apply `plan` as one atomic unit of work: compute the destination visit
  /// number, insert the transition record, close the current visit, insert
  /// the new visit, and update the journey cursor. All of it commits
  /// together or none of it does; a concurrent move of the same person
  /// fails the stale-stage check and surfaces as a retryable conflict.
  fn apply_transition(
    &self,
    plan: TransitionPlan,
  ) -> impl Future<Output = Result<AppliedTransition, Self::Error>> + Send + '_;
}
