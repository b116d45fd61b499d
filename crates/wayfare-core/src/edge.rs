//! The journey graph: edges, match conditions, and the in-memory index.
//!
//! Edges are configuration, authored out-of-band and immutable for the
//! duration of a decision. The engine loads them once into an [`EdgeGraph`]
//! and swaps the whole graph on an explicit reload.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, answer::AnswerValue};

// ─── Condition ───────────────────────────────────────────────────────────────

/// How an edge decides whether it applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition_type", rename_all = "snake_case")]
pub enum Condition {
  /// Unconditional; used only by the journey entry edge.
  Always,
  /// Satisfied iff the question's current answer equals `value` exactly.
  Equals { question_id: String, value: f64 },
  /// Satisfied iff `min <= answer <= max`, both ends inclusive.
  Range {
    question_id: String,
    min:         f64,
    max:         f64,
  },
}

impl Condition {
  /// The question this condition reads, if any.
  pub fn question_id(&self) -> Option<&str> {
    match self {
      Self::Always => None,
      Self::Equals { question_id, .. } | Self::Range { question_id, .. } => {
        Some(question_id)
      }
    }
  }

  /// Evaluate against the current answer for this condition's question.
  /// A missing or non-numeric answer never satisfies a numeric condition.
  pub fn is_satisfied_by(&self, value: Option<&AnswerValue>) -> bool {
    match self {
      Self::Always => true,
      Self::Equals { value: expected, .. } => value
        .and_then(AnswerValue::as_number)
        .is_some_and(|n| n == *expected),
      Self::Range { min, max, .. } => value
        .and_then(AnswerValue::as_number)
        .is_some_and(|n| *min <= n && n <= *max),
    }
  }
}

// ─── Edge ────────────────────────────────────────────────────────────────────

/// A configured directed transition between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
  pub edge_id:    Uuid,
  /// `None` marks the journey entry edge.
  pub from_stage: Option<String>,
  pub to_stage:   String,
  #[serde(flatten)]
  pub condition:  Condition,
}

impl fmt::Display for Edge {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let from = self.from_stage.as_deref().unwrap_or("ENTRY");
    match &self.condition {
      Condition::Always => write!(f, "{from} -> {} (always)", self.to_stage),
      Condition::Equals { question_id, value } => {
        write!(f, "{from} -> {} (if {question_id} = {value})", self.to_stage)
      }
      Condition::Range { question_id, min, max } => write!(
        f,
        "{from} -> {} (if {question_id} in [{min}, {max}])",
        self.to_stage
      ),
    }
  }
}

// ─── EdgeGraph ───────────────────────────────────────────────────────────────

/// The edge set indexed by source stage, preserving configuration insertion
/// order within each source. That order is the tie-break of last resort
/// during priority resolution, so it must survive indexing intact.
#[derive(Debug, Clone, Default)]
pub struct EdgeGraph {
  entry:     Vec<Edge>,
  by_source: HashMap<String, Vec<Edge>>,
  len:       usize,
}

impl EdgeGraph {
  /// Index `edges`, preserving their relative order within each source.
  pub fn from_edges(edges: Vec<Edge>) -> Self {
    let len = edges.len();
    let mut entry = Vec::new();
    let mut by_source: HashMap<String, Vec<Edge>> = HashMap::new();

    for edge in edges {
      match &edge.from_stage {
        None => entry.push(edge),
        Some(stage) => by_source.entry(stage.clone()).or_default().push(edge),
      }
    }

    Self { entry, by_source, len }
  }

  /// Outgoing edges for a stage (`None` = journey entry), in configuration
  /// order. Unknown and terminal stages yield an empty slice, not an error.
  pub fn outgoing(&self, from_stage: Option<&str>) -> &[Edge] {
    match from_stage {
      None => &self.entry,
      Some(stage) => {
        self.by_source.get(stage).map(Vec::as_slice).unwrap_or(&[])
      }
    }
  }

  /// The single edge with no source stage, used once to bootstrap a journey.
  pub fn entry_edge(&self) -> Option<&Edge> { self.entry.first() }

  pub fn len(&self) -> usize { self.len }

  pub fn is_empty(&self) -> bool { self.len == 0 }

  /// Detect (never repair) entry-edge configuration defects.
  pub fn validate(&self) -> Result<()> {
    match self.entry.len() {
      0 => Err(Error::MissingEntryEdge),
      1 => Ok(()),
      n => Err(Error::MultipleEntryEdges(n)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn range_edge(from: &str, to: &str, question: &str, min: f64, max: f64) -> Edge {
    Edge {
      edge_id:    Uuid::new_v4(),
      from_stage: Some(from.to_owned()),
      to_stage:   to.to_owned(),
      condition:  Condition::Range {
        question_id: question.to_owned(),
        min,
        max,
      },
    }
  }

  #[test]
  fn range_is_inclusive_at_both_ends() {
    let cond = Condition::Range {
      question_id: "ref_karnofsky".into(),
      min:         40.0,
      max:         100.0,
    };
    assert!(cond.is_satisfied_by(Some(&AnswerValue::Number(40.0))));
    assert!(cond.is_satisfied_by(Some(&AnswerValue::Number(100.0))));
    assert!(cond.is_satisfied_by(Some(&AnswerValue::Number(50.0))));
    assert!(!cond.is_satisfied_by(Some(&AnswerValue::Number(39.999))));
    assert!(!cond.is_satisfied_by(Some(&AnswerValue::Number(100.001))));
  }

  #[test]
  fn missing_answer_never_satisfies_numeric_conditions() {
    let cond = Condition::Equals { question_id: "dnr_clearance".into(), value: 1.0 };
    assert!(!cond.is_satisfied_by(None));
  }

  #[test]
  fn text_answer_never_satisfies_numeric_conditions() {
    let cond = Condition::Range { question_id: "q".into(), min: 0.0, max: 10.0 };
    assert!(!cond.is_satisfied_by(Some(&AnswerValue::Text("five".into()))));
  }

  #[test]
  fn bool_answer_compares_as_one_or_zero() {
    let cond = Condition::Equals { question_id: "q".into(), value: 1.0 };
    assert!(cond.is_satisfied_by(Some(&AnswerValue::Bool(true))));
    assert!(!cond.is_satisfied_by(Some(&AnswerValue::Bool(false))));
  }

  #[test]
  fn always_matches_with_or_without_answers() {
    assert!(Condition::Always.is_satisfied_by(None));
    assert!(Condition::Always.is_satisfied_by(Some(&AnswerValue::Number(0.0))));
  }

  #[test]
  fn graph_preserves_insertion_order_per_source() {
    let a = range_edge("BOARD", "WORKUP", "brd_needs_more_tests", 1.0, 1.0);
    let b = range_edge("BOARD", "PREOP", "brd_risk_score", 0.0, 6.999);
    let c = range_edge("BOARD", "EXIT", "brd_risk_score", 7.0, 10.0);
    let graph = EdgeGraph::from_edges(vec![a.clone(), b.clone(), c.clone()]);

    let out: Vec<_> = graph
      .outgoing(Some("BOARD"))
      .iter()
      .map(|e| e.edge_id)
      .collect();
    assert_eq!(out, vec![a.edge_id, b.edge_id, c.edge_id]);
  }

  #[test]
  fn unknown_stage_yields_empty_not_error() {
    let graph = EdgeGraph::from_edges(vec![]);
    assert!(graph.outgoing(Some("NOWHERE")).is_empty());
  }

  #[test]
  fn validate_flags_missing_and_duplicate_entry_edges() {
    let graph = EdgeGraph::from_edges(vec![]);
    assert!(matches!(graph.validate(), Err(Error::MissingEntryEdge)));

    let entry = |to: &str| Edge {
      edge_id:    Uuid::new_v4(),
      from_stage: None,
      to_stage:   to.to_owned(),
      condition:  Condition::Always,
    };
    let graph = EdgeGraph::from_edges(vec![entry("REFERRAL"), entry("WORKUP")]);
    assert!(matches!(graph.validate(), Err(Error::MultipleEntryEdges(2))));
  }
}
