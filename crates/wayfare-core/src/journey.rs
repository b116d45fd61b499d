//! The visit log, the transition ledger, and the materialized journey cursor.
//!
//! Visits and transitions are append-only. The "which stages has this person
//! seen" set and the per-stage visit counter are both derived views over the
//! visit log, never separately-mutated fields that could drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answer::AnswerValue;

/// One entry in the append-only visit log. Re-entering a stage appends a new
/// row with the next visit number; prior rows keep their history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRecord {
  pub person_id:    Uuid,
  pub stage_id:     String,
  /// Ordinal count of entries into `stage_id` for this person, starting at 1.
  pub visit_number: i64,
  pub entered_at:   DateTime<Utc>,
  pub exited_at:    Option<DateTime<Utc>>,
  /// At most one current visit per person.
  pub is_current:   bool,
}

/// One entry in the audit ledger. Never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
  pub person_id:           Uuid,
  /// `None` for the bootstrap entry into the journey.
  pub from_stage:          Option<String>,
  pub to_stage:            String,
  pub from_visit_number:   Option<i64>,
  pub to_visit_number:     i64,
  pub matched_edge_id:     Uuid,
  pub matched_question_id: Option<String>,
  pub matched_value:       Option<AnswerValue>,
  /// Human-readable rendering of the matched edge, for audit display.
  pub reason:              String,
  pub transitioned_at:     DateTime<Utc>,
}

/// Denormalized "where is this person now" cursor. Exists purely for O(1)
/// reads; written only by the same transaction that writes the matching
/// visit and transition rows, so it can never disagree with the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyState {
  pub person_id:     Uuid,
  pub current_stage: String,
  pub visit_number:  i64,
  pub started_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}
