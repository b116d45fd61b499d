//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, answer values as compact
//! JSON, UUIDs as hyphenated lowercase strings. Edge conditions are stored
//! flat (`condition_type` plus the numeric columns it uses).

use chrono::{DateTime, Utc};
use uuid::Uuid;
use wayfare_core::{
  answer::{Answer, AnswerValue},
  edge::{Condition, Edge},
  journey::{JourneyState, TransitionRecord, VisitRecord},
};

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── AnswerValue ─────────────────────────────────────────────────────────────

pub fn encode_value(v: &AnswerValue) -> Result<String> {
  Ok(serde_json::to_string(v)?)
}

pub fn decode_value(s: &str) -> Result<AnswerValue> {
  Ok(serde_json::from_str(s)?)
}

// ─── Condition ───────────────────────────────────────────────────────────────

/// Flat column values for a condition:
/// `(condition_type, question_id, range_min, range_max, equals_value)`.
pub fn condition_columns(
  c: &Condition,
) -> (&'static str, Option<String>, Option<f64>, Option<f64>, Option<f64>) {
  match c {
    Condition::Always => ("always", None, None, None, None),
    Condition::Equals { question_id, value } => {
      ("equals", Some(question_id.clone()), None, None, Some(*value))
    }
    Condition::Range { question_id, min, max } => {
      ("range", Some(question_id.clone()), Some(*min), Some(*max), None)
    }
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `journey_edges` row.
pub struct RawEdge {
  pub edge_id:        String,
  pub from_stage:     Option<String>,
  pub to_stage:       String,
  pub condition_type: String,
  pub question_id:    Option<String>,
  pub range_min:      Option<f64>,
  pub range_max:      Option<f64>,
  pub equals_value:   Option<f64>,
}

impl RawEdge {
  pub fn into_edge(self) -> Result<Edge> {
    let malformed = |what: &str| {
      Error::MalformedEdge(format!(
        "edge {}: {what} for condition_type {:?}",
        self.edge_id, self.condition_type
      ))
    };

    let condition = match self.condition_type.as_str() {
      "always" => Condition::Always,
      "equals" => Condition::Equals {
        question_id: self
          .question_id
          .clone()
          .ok_or_else(|| malformed("question_id is NULL"))?,
        value:       self
          .equals_value
          .ok_or_else(|| malformed("equals_value is NULL"))?,
      },
      "range" => Condition::Range {
        question_id: self
          .question_id
          .clone()
          .ok_or_else(|| malformed("question_id is NULL"))?,
        min:         self.range_min.ok_or_else(|| malformed("range_min is NULL"))?,
        max:         self.range_max.ok_or_else(|| malformed("range_max is NULL"))?,
      },
      _ => return Err(malformed("unknown condition_type")),
    };

    Ok(Edge {
      edge_id: decode_uuid(&self.edge_id)?,
      from_stage: self.from_stage,
      to_stage: self.to_stage,
      condition,
    })
  }
}

/// Raw values read directly from an `answers` row.
pub struct RawAnswer {
  pub person_id:    String,
  pub stage_id:     String,
  pub question_id:  String,
  pub value_json:   String,
  pub visit_number: i64,
  pub version:      i64,
  pub is_current:   bool,
  pub answered_at:  String,
}

impl RawAnswer {
  pub fn into_answer(self) -> Result<Answer> {
    Ok(Answer {
      person_id:    decode_uuid(&self.person_id)?,
      stage_id:     self.stage_id,
      question_id:  self.question_id,
      value:        decode_value(&self.value_json)?,
      visit_number: self.visit_number,
      version:      self.version,
      is_current:   self.is_current,
      answered_at:  decode_dt(&self.answered_at)?,
    })
  }
}

/// Raw values read directly from a `visits` row.
pub struct RawVisit {
  pub person_id:    String,
  pub stage_id:     String,
  pub visit_number: i64,
  pub entered_at:   String,
  pub exited_at:    Option<String>,
  pub is_current:   bool,
}

impl RawVisit {
  pub fn into_visit(self) -> Result<VisitRecord> {
    Ok(VisitRecord {
      person_id:    decode_uuid(&self.person_id)?,
      stage_id:     self.stage_id,
      visit_number: self.visit_number,
      entered_at:   decode_dt(&self.entered_at)?,
      exited_at:    self.exited_at.as_deref().map(decode_dt).transpose()?,
      is_current:   self.is_current,
    })
  }
}

/// Raw values read directly from a `transitions` row.
pub struct RawTransition {
  pub person_id:           String,
  pub from_stage:          Option<String>,
  pub to_stage:            String,
  pub from_visit_number:   Option<i64>,
  pub to_visit_number:     i64,
  pub matched_edge_id:     String,
  pub matched_question_id: Option<String>,
  pub matched_value_json:  Option<String>,
  pub reason:              String,
  pub transitioned_at:     String,
}

impl RawTransition {
  pub fn into_record(self) -> Result<TransitionRecord> {
    Ok(TransitionRecord {
      person_id:           decode_uuid(&self.person_id)?,
      from_stage:          self.from_stage,
      to_stage:            self.to_stage,
      from_visit_number:   self.from_visit_number,
      to_visit_number:     self.to_visit_number,
      matched_edge_id:     decode_uuid(&self.matched_edge_id)?,
      matched_question_id: self.matched_question_id,
      matched_value:       self
        .matched_value_json
        .as_deref()
        .map(decode_value)
        .transpose()?,
      reason:              self.reason,
      transitioned_at:     decode_dt(&self.transitioned_at)?,
    })
  }
}

/// Raw values read directly from a `journey_state` row.
pub struct RawState {
  pub person_id:     String,
  pub current_stage: String,
  pub visit_number:  i64,
  pub started_at:    String,
  pub updated_at:    String,
}

impl RawState {
  pub fn into_state(self) -> Result<JourneyState> {
    Ok(JourneyState {
      person_id:     decode_uuid(&self.person_id)?,
      current_stage: self.current_stage,
      visit_number:  self.visit_number,
      started_at:    decode_dt(&self.started_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}
