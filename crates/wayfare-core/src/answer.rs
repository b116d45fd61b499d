//! Answer values and versioned answer rows.
//!
//! Answers are never updated in place. Submitting a new value for a question
//! flips `is_current` on the prior row and inserts the next version, so the
//! full submission history survives for audit.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Value ───────────────────────────────────────────────────────────────────

/// The submitted value of a measurement. Opaque to the engine except that
/// numeric values are comparable for `equals`/`range` edge conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
  Number(f64),
  Bool(bool),
  Text(String),
}

impl AnswerValue {
  /// Numeric view used by edge-condition evaluation. Booleans map to 1/0 so
  /// yes/no questions can drive `equals` edges; text is never numeric.
  pub fn as_number(&self) -> Option<f64> {
    match self {
      Self::Number(n) => Some(*n),
      Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
      Self::Text(_) => None,
    }
  }
}

impl fmt::Display for AnswerValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Number(n) => write!(f, "{n}"),
      Self::Bool(b) => write!(f, "{b}"),
      Self::Text(s) => write!(f, "{s}"),
    }
  }
}

// ─── Stored rows ─────────────────────────────────────────────────────────────

/// A stored answer row. At most one row per `(person, question)` has
/// `is_current = true`; superseded versions are kept, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
  pub person_id:    Uuid,
  pub stage_id:     String,
  pub question_id:  String,
  pub value:        AnswerValue,
  /// The person's visit number for `stage_id` when this was submitted.
  pub visit_number: i64,
  pub version:      i64,
  pub is_current:   bool,
  pub answered_at:  DateTime<Utc>,
}

/// Returned by answer submission: the superseded value (if any) for the
/// caller's diff display, and the version just written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerReceipt {
  pub previous_value: Option<AnswerValue>,
  pub version:        i64,
}
