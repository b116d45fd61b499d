//! The pure decision algorithms: candidate matching and priority resolution.
//!
//! Both functions are strictly deterministic: identical inputs always yield
//! the identical output, so any decision can be replayed from the audit
//! ledger. Nothing here touches a store or the clock.

use std::collections::{BTreeMap, BTreeSet};

use crate::{answer::AnswerValue, edge::Edge};

/// The ordered subset of `edges` whose condition is satisfied by the current
/// answers. An edge whose question has no current answer is skipped — absence
/// of an answer means "not yet satisfiable", not an error.
pub fn matching_edges<'a>(
  edges:   &'a [Edge],
  answers: &BTreeMap<String, AnswerValue>,
) -> Vec<&'a Edge> {
  edges
    .iter()
    .filter(|edge| {
      let value = edge.condition.question_id().and_then(|q| answers.get(q));
      edge.condition.is_satisfied_by(value)
    })
    .collect()
}

/// Pick the single winning edge among `matches`, or `None` if no edge
/// matched.
///
/// A match whose destination the person has already visited (a revisit —
/// an unmet requirement sending them back) always outranks a match to an
/// unvisited stage. Ties within either class fall back to configuration
/// insertion order, which `matches` preserves.
pub fn choose_edge<'a>(
  matches: &[&'a Edge],
  visited: &BTreeSet<String>,
) -> Option<&'a Edge> {
  matches
    .iter()
    .find(|edge| visited.contains(&edge.to_stage))
    .or_else(|| matches.iter().find(|edge| !visited.contains(&edge.to_stage)))
    .copied()
}

/// Question ids referenced by `edges`, deduplicated, in edge order.
pub fn required_questions(edges: &[Edge]) -> Vec<String> {
  let mut seen = BTreeSet::new();
  let mut out = Vec::new();
  for edge in edges {
    if let Some(q) = edge.condition.question_id()
      && seen.insert(q.to_owned())
    {
      out.push(q.to_owned());
    }
  }
  out
}

/// Required questions that have no current answer, in edge order. Empty
/// output with no match means the rule set has a gap.
pub fn missing_questions(
  edges:   &[Edge],
  answers: &BTreeMap<String, AnswerValue>,
) -> Vec<String> {
  required_questions(edges)
    .into_iter()
    .filter(|q| !answers.contains_key(q))
    .collect()
}
