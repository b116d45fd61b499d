//! The structured outcome of one evaluation call.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answer::AnswerValue;

/// What one call to `decide` concluded.
///
/// `NeedsMoreAnswers` and `ConfigurationGap` are first-class values, not
/// errors, and are never collapsed into each other: the first means "wait
/// for more input", the second means "fix the rule set".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
  /// A matching edge was chosen and the move was applied atomically.
  Transitioned {
    from_stage:          Option<String>,
    to_stage:            String,
    to_visit_number:     i64,
    matched_edge_id:     Uuid,
    matched_question_id: Option<String>,
    matched_value:       Option<AnswerValue>,
  },
  /// No match, and at least one question read by the outgoing edges has no
  /// current answer. `missing` lists exactly those questions, in edge order.
  NeedsMoreAnswers { stage: String, missing: Vec<String> },
  /// No match although every referenced question is answered: the configured
  /// edges do not cover the observed answer combination. A rule-authoring
  /// defect, reported rather than silently treated as "stay".
  ConfigurationGap { stage: Option<String> },
  /// The current stage has no outgoing edges; the journey ends here.
  AtTerminal { stage: String },
}

impl Decision {
  pub fn transitioned(&self) -> bool {
    matches!(self, Self::Transitioned { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reason_tags_use_screaming_snake_case() {
    let d = Decision::NeedsMoreAnswers {
      stage:   "WORKUP".into(),
      missing: vec!["wrk_egfr".into()],
    };
    let json = serde_json::to_value(&d).unwrap();
    assert_eq!(json["reason"], "NEEDS_MORE_ANSWERS");
    assert_eq!(json["missing"][0], "wrk_egfr");

    let d = Decision::ConfigurationGap { stage: Some("BOARD".into()) };
    let json = serde_json::to_value(&d).unwrap();
    assert_eq!(json["reason"], "CONFIGURATION_GAP");
  }

  #[test]
  fn matched_value_serializes_untagged() {
    let d = Decision::Transitioned {
      from_stage:          Some("BOARD".into()),
      to_stage:            "PREOP".into(),
      to_visit_number:     1,
      matched_edge_id:     Uuid::new_v4(),
      matched_question_id: Some("brd_risk_score".into()),
      matched_value:       Some(AnswerValue::Number(5.0)),
    };
    let json = serde_json::to_value(&d).unwrap();
    assert_eq!(json["reason"], "TRANSITIONED");
    assert_eq!(json["matched_value"], 5.0);
  }
}
