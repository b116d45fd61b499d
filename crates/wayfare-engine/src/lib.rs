//! The journey decision engine.
//!
//! Owns the in-memory edge graph, serializes evaluation per person, and
//! drives the evaluate-then-apply cycle against a [`JourneyStore`]. The
//! pure matching and priority-resolution logic lives in `wayfare-core`;
//! this crate adds state, locking, and persistence orchestration.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use wayfare_core::{
  answer::{Answer, AnswerReceipt, AnswerValue},
  decision::Decision,
  edge::{Edge, EdgeGraph},
  journey::{JourneyState, TransitionRecord, VisitRecord},
  routing,
  store::{ClassifyError, JourneyStore, StoreErrorKind, TransitionPlan},
};

mod graph;
mod locks;

pub use graph::EdgeCache;
pub use locks::PersonLocks;

#[cfg(test)]
mod tests;

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError<E: std::error::Error> {
  /// An operation that requires a live journey was called for a person who
  /// has never entered one.
  #[error("journey not started for person {0}")]
  JourneyNotStarted(Uuid),

  #[error(transparent)]
  Store(#[from] E),
}

impl<E: std::error::Error + ClassifyError> EngineError<E> {
  pub fn kind(&self) -> StoreErrorKind {
    match self {
      Self::JourneyNotStarted(_) => StoreErrorKind::JourneyNotStarted,
      Self::Store(e) => e.kind(),
    }
  }
}

pub type Result<T, E> = std::result::Result<T, EngineError<E>>;

// ─── Engine ──────────────────────────────────────────────────────────────────

/// One engine instance serves every person; per-person locks keep concurrent
/// decisions for the same person strictly sequential within the process.
pub struct JourneyEngine<S: JourneyStore> {
  store: Arc<S>,
  graph: EdgeCache,
  locks: PersonLocks,
}

impl<S: JourneyStore> JourneyEngine<S> {
  /// Load the edge configuration from `store` and build a ready engine.
  ///
  /// A defective entry-edge configuration is reported at decide time, not
  /// here, so a misconfigured deployment still starts and serves reads.
  pub async fn load(store: Arc<S>) -> Result<Self, S::Error> {
    let edges = store.load_edges().await?;
    let graph = EdgeGraph::from_edges(edges);
    if let Err(e) = graph.validate() {
      warn!(error = %e, "edge configuration is defective");
    }
    info!(edges = graph.len(), "edge graph loaded");
    Ok(Self { store, graph: EdgeCache::new(graph), locks: PersonLocks::new() })
  }

  /// Re-read the edge set from the store and swap the active graph.
  /// In-flight decisions finish on the snapshot they started with.
  pub async fn reload_edges(&self) -> Result<usize, S::Error> {
    let edges = self.store.load_edges().await?;
    let graph = EdgeGraph::from_edges(edges);
    if let Err(e) = graph.validate() {
      warn!(error = %e, "edge configuration is defective");
    }
    let count = graph.len();
    self.graph.replace(graph);
    info!(edges = count, "edge graph reloaded");
    Ok(count)
  }

  // ── Decisions ─────────────────────────────────────────────────────────────

  /// Evaluate the person's current situation and, if exactly one edge wins
  /// priority resolution, apply the transition atomically.
  ///
  /// Never signals "no move" through an error: staying put comes back as
  /// [`Decision::NeedsMoreAnswers`], [`Decision::ConfigurationGap`], or
  /// [`Decision::AtTerminal`].
  pub async fn decide(&self, person_id: Uuid) -> Result<Decision, S::Error> {
    let lock = self.locks.lock_for(person_id);
    let _guard = lock.lock().await;
    let graph = self.graph.current();

    let Some(state) = self.store.journey_state(person_id).await? else {
      return self.enter(person_id, &graph).await;
    };

    let outgoing = graph.outgoing(Some(state.current_stage.as_str()));
    if outgoing.is_empty() {
      debug!(person = %person_id, stage = %state.current_stage, "at terminal stage");
      return Ok(Decision::AtTerminal { stage: state.current_stage });
    }

    let answers = self.store.current_answers(person_id, None).await?;
    let matches = routing::matching_edges(outgoing, &answers);
    if matches.is_empty() {
      let missing = routing::missing_questions(outgoing, &answers);
      return Ok(if missing.is_empty() {
        error!(
          person = %person_id,
          stage = %state.current_stage,
          "no edge covers the current answers"
        );
        Decision::ConfigurationGap { stage: Some(state.current_stage) }
      } else {
        Decision::NeedsMoreAnswers { stage: state.current_stage, missing }
      });
    }

    let visited = self.store.visited_stages(person_id).await?;
    let Some(edge) = routing::choose_edge(&matches, &visited) else {
      return Ok(Decision::ConfigurationGap { stage: Some(state.current_stage) });
    };

    let matched_question_id = edge.condition.question_id().map(str::to_owned);
    let matched_value = matched_question_id
      .as_deref()
      .and_then(|q| answers.get(q).cloned());

    let applied = self
      .store
      .apply_transition(TransitionPlan {
        person_id,
        from_stage: Some(state.current_stage.clone()),
        from_visit_number: Some(state.visit_number),
        to_stage: edge.to_stage.clone(),
        matched_edge_id: edge.edge_id,
        matched_question_id,
        matched_value,
        reason: edge.to_string(),
      })
      .await?;

    info!(
      person = %person_id,
      from = %state.current_stage,
      to = %applied.record.to_stage,
      visit = applied.record.to_visit_number,
      "transitioned"
    );
    Ok(Decision::Transitioned {
      from_stage:          applied.record.from_stage,
      to_stage:            applied.record.to_stage,
      to_visit_number:     applied.record.to_visit_number,
      matched_edge_id:     applied.record.matched_edge_id,
      matched_question_id: applied.record.matched_question_id,
      matched_value:       applied.record.matched_value,
    })
  }

  /// Bootstrap: the person has no journey yet, so the only candidate is
  /// the entry edge.
  async fn enter(
    &self,
    person_id: Uuid,
    graph: &EdgeGraph,
  ) -> Result<Decision, S::Error> {
    let Some(entry) = graph.entry_edge() else {
      error!(person = %person_id, "no entry edge configured");
      return Ok(Decision::ConfigurationGap { stage: None });
    };

    let applied = self
      .store
      .apply_transition(TransitionPlan {
        person_id,
        from_stage: None,
        from_visit_number: None,
        to_stage: entry.to_stage.clone(),
        matched_edge_id: entry.edge_id,
        matched_question_id: None,
        matched_value: None,
        reason: entry.to_string(),
      })
      .await?;

    info!(person = %person_id, to = %applied.record.to_stage, "journey started");
    Ok(Decision::Transitioned {
      from_stage:          None,
      to_stage:            applied.record.to_stage,
      to_visit_number:     applied.record.to_visit_number,
      matched_edge_id:     applied.record.matched_edge_id,
      matched_question_id: None,
      matched_value:       None,
    })
  }

  // ── Answers ───────────────────────────────────────────────────────────────

  /// Record one answer against the person's current stage. Storage only;
  /// no transition is evaluated until the next [`Self::decide`].
  pub async fn record_answer(
    &self,
    person_id: Uuid,
    question_id: &str,
    value: AnswerValue,
  ) -> Result<AnswerReceipt, S::Error> {
    let state = self
      .store
      .journey_state(person_id)
      .await?
      .ok_or(EngineError::JourneyNotStarted(person_id))?;
    let receipt = self
      .store
      .record_answer(person_id, &state.current_stage, question_id, value)
      .await?;
    debug!(
      person = %person_id,
      stage = %state.current_stage,
      question = question_id,
      version = receipt.version,
      "answer recorded"
    );
    Ok(receipt)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub async fn journey_state(
    &self,
    person_id: Uuid,
  ) -> Result<Option<JourneyState>, S::Error> {
    Ok(self.store.journey_state(person_id).await?)
  }

  pub async fn current_answers(
    &self,
    person_id: Uuid,
    stage_id: Option<&str>,
  ) -> Result<std::collections::BTreeMap<String, AnswerValue>, S::Error> {
    Ok(self.store.current_answers(person_id, stage_id).await?)
  }

  pub async fn answer_history(
    &self,
    person_id: Uuid,
    question_id: &str,
  ) -> Result<Vec<Answer>, S::Error> {
    Ok(self.store.answer_history(person_id, question_id).await?)
  }

  pub async fn visit_history(
    &self,
    person_id: Uuid,
  ) -> Result<Vec<VisitRecord>, S::Error> {
    Ok(self.store.visit_history(person_id).await?)
  }

  pub async fn transition_history(
    &self,
    person_id: Uuid,
  ) -> Result<Vec<TransitionRecord>, S::Error> {
    Ok(self.store.transition_history(person_id).await?)
  }

  /// The persisted edge configuration, in priority order.
  pub async fn edges(&self) -> Result<Vec<Edge>, S::Error> {
    Ok(self.store.load_edges().await?)
  }
}
