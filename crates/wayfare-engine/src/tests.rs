use std::sync::Arc;

use uuid::Uuid;
use wayfare_core::{
  answer::AnswerValue,
  decision::Decision,
  edge::{Condition, Edge},
  store::{JourneyStore as _, StoreErrorKind},
};
use wayfare_store_sqlite::SqliteStore;

use crate::{EngineError, JourneyEngine};

fn edge(from: Option<&str>, to: &str, condition: Condition) -> Edge {
  Edge {
    edge_id: Uuid::new_v4(),
    from_stage: from.map(str::to_owned),
    to_stage: to.to_owned(),
    condition,
  }
}

fn range(question: &str, min: f64, max: f64) -> Condition {
  Condition::Range { question_id: question.to_owned(), min, max }
}

fn equals(question: &str, value: f64) -> Condition {
  Condition::Equals { question_id: question.to_owned(), value }
}

/// The kidney-transplant journey used throughout these tests.
fn transplant_edges() -> Vec<Edge> {
  vec![
    edge(None, "REFERRAL", Condition::Always),
    edge(Some("REFERRAL"), "WORKUP", range("ref_karnofsky", 40.0, 100.0)),
    edge(Some("REFERRAL"), "EXIT", range("ref_karnofsky", 0.0, 39.999)),
    edge(Some("WORKUP"), "MATCH", range("wrk_egfr", 0.0, 15.999)),
    edge(Some("MATCH"), "DONOR", range("mtc_pra", 0.0, 79.999)),
    edge(Some("MATCH"), "RELIST", range("mtc_pra", 80.0, 100.0)),
    edge(Some("DONOR"), "BOARD", equals("dnr_clearance", 1.0)),
    edge(Some("BOARD"), "WORKUP", equals("brd_needs_more_tests", 1.0)),
    edge(Some("BOARD"), "PREOP", range("brd_risk_score", 0.0, 6.999)),
    edge(Some("BOARD"), "EXIT", range("brd_risk_score", 7.0, 10.0)),
  ]
}

async fn engine_with(edges: Vec<Edge>) -> JourneyEngine<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  store.replace_edges(edges).await.unwrap();
  JourneyEngine::load(Arc::new(store)).await.unwrap()
}

/// Drive the person to BOARD through the happy path.
async fn walk_to_board(engine: &JourneyEngine<SqliteStore>, person: Uuid) {
  assert!(engine.decide(person).await.unwrap().transitioned()); // REFERRAL
  engine
    .record_answer(person, "ref_karnofsky", AnswerValue::Number(80.0))
    .await
    .unwrap();
  assert!(engine.decide(person).await.unwrap().transitioned()); // WORKUP
  engine
    .record_answer(person, "wrk_egfr", AnswerValue::Number(12.0))
    .await
    .unwrap();
  assert!(engine.decide(person).await.unwrap().transitioned()); // MATCH
  engine
    .record_answer(person, "mtc_pra", AnswerValue::Number(40.0))
    .await
    .unwrap();
  assert!(engine.decide(person).await.unwrap().transitioned()); // DONOR
  engine
    .record_answer(person, "dnr_clearance", AnswerValue::Bool(true))
    .await
    .unwrap();
  assert!(engine.decide(person).await.unwrap().transitioned()); // BOARD
}

#[tokio::test]
async fn first_decide_enters_the_journey() {
  let engine = engine_with(transplant_edges()).await;
  let person = Uuid::new_v4();

  let decision = engine.decide(person).await.unwrap();
  let Decision::Transitioned { from_stage, to_stage, to_visit_number, .. } =
    decision
  else {
    panic!("expected a transition, got {decision:?}");
  };
  assert_eq!(from_stage, None);
  assert_eq!(to_stage, "REFERRAL");
  assert_eq!(to_visit_number, 1);

  let state = engine.journey_state(person).await.unwrap().unwrap();
  assert_eq!(state.current_stage, "REFERRAL");
}

#[tokio::test]
async fn missing_entry_edge_is_a_configuration_gap() {
  let engine = engine_with(vec![edge(
    Some("REFERRAL"),
    "WORKUP",
    Condition::Always,
  )])
  .await;
  let person = Uuid::new_v4();

  let decision = engine.decide(person).await.unwrap();
  assert_eq!(decision, Decision::ConfigurationGap { stage: None });
  assert!(engine.journey_state(person).await.unwrap().is_none());
}

#[tokio::test]
async fn unanswered_questions_block_with_exact_missing_list() {
  let engine = engine_with(transplant_edges()).await;
  let person = Uuid::new_v4();
  engine.decide(person).await.unwrap(); // enter REFERRAL

  let decision = engine.decide(person).await.unwrap();
  assert_eq!(decision, Decision::NeedsMoreAnswers {
    stage:   "REFERRAL".into(),
    missing: vec!["ref_karnofsky".into()],
  });

  // Idempotent: nothing changed, so the same call yields the same answer
  // and writes nothing.
  assert_eq!(engine.decide(person).await.unwrap(), decision);
  let state = engine.journey_state(person).await.unwrap().unwrap();
  assert_eq!(state.current_stage, "REFERRAL");
  assert_eq!(engine.transition_history(person).await.unwrap().len(), 1);
  assert_eq!(engine.visit_history(person).await.unwrap().len(), 1);
}

#[tokio::test]
async fn answered_question_moves_forward_and_records_the_match() {
  let engine = engine_with(transplant_edges()).await;
  let person = Uuid::new_v4();
  engine.decide(person).await.unwrap();
  engine
    .record_answer(person, "ref_karnofsky", AnswerValue::Number(80.0))
    .await
    .unwrap();

  let decision = engine.decide(person).await.unwrap();
  let Decision::Transitioned {
    to_stage, matched_question_id, matched_value, ..
  } = decision
  else {
    panic!("expected a transition, got {decision:?}");
  };
  assert_eq!(to_stage, "WORKUP");
  assert_eq!(matched_question_id.as_deref(), Some("ref_karnofsky"));
  assert_eq!(matched_value, Some(AnswerValue::Number(80.0)));

  let ledger = engine.transition_history(person).await.unwrap();
  assert_eq!(ledger.len(), 2);
  assert_eq!(ledger[1].reason, "REFERRAL -> WORKUP (if ref_karnofsky in [40, 100])");
}

#[tokio::test]
async fn superseding_an_answer_changes_the_next_decision() {
  let engine = engine_with(transplant_edges()).await;
  let person = Uuid::new_v4();
  engine.decide(person).await.unwrap();

  engine
    .record_answer(person, "ref_karnofsky", AnswerValue::Number(30.0))
    .await
    .unwrap();
  engine
    .record_answer(person, "ref_karnofsky", AnswerValue::Number(80.0))
    .await
    .unwrap();

  // Only the current version counts; version 1 would have routed to EXIT.
  let decision = engine.decide(person).await.unwrap();
  assert!(
    matches!(&decision, Decision::Transitioned { to_stage, .. } if to_stage == "WORKUP")
  );
}

#[tokio::test]
async fn revisit_outranks_forward_and_increments_the_visit_number() {
  let engine = engine_with(transplant_edges()).await;
  let person = Uuid::new_v4();
  walk_to_board(&engine, person).await;

  // Both BOARD -> WORKUP (revisit) and BOARD -> PREOP (forward) match.
  engine
    .record_answer(person, "brd_needs_more_tests", AnswerValue::Bool(true))
    .await
    .unwrap();
  engine
    .record_answer(person, "brd_risk_score", AnswerValue::Number(5.0))
    .await
    .unwrap();

  let decision = engine.decide(person).await.unwrap();
  let Decision::Transitioned { to_stage, to_visit_number, .. } = decision else {
    panic!("expected a transition, got {decision:?}");
  };
  assert_eq!(to_stage, "WORKUP");
  assert_eq!(to_visit_number, 2);
}

#[tokio::test]
async fn self_loop_increments_the_visit_number() {
  let engine = engine_with(vec![
    edge(None, "HOME", Condition::Always),
    edge(Some("HOME"), "HOME", range("hom_followup_ok", 1.0, 1.0)),
  ])
  .await;
  let person = Uuid::new_v4();
  engine.decide(person).await.unwrap();
  engine
    .record_answer(person, "hom_followup_ok", AnswerValue::Number(1.0))
    .await
    .unwrap();

  let decision = engine.decide(person).await.unwrap();
  let Decision::Transitioned { to_stage, to_visit_number, .. } = decision else {
    panic!("expected a transition, got {decision:?}");
  };
  assert_eq!(to_stage, "HOME");
  assert_eq!(to_visit_number, 2);
}

#[tokio::test]
async fn covered_but_unmatched_answers_are_a_configuration_gap() {
  let engine = engine_with(transplant_edges()).await;
  let person = Uuid::new_v4();
  engine.decide(person).await.unwrap();
  engine
    .record_answer(person, "ref_karnofsky", AnswerValue::Number(80.0))
    .await
    .unwrap();
  engine.decide(person).await.unwrap(); // WORKUP

  // Every question the WORKUP edges read is answered, but no range covers
  // the value: a rule-authoring defect, not "needs more answers".
  engine
    .record_answer(person, "wrk_egfr", AnswerValue::Number(25.0))
    .await
    .unwrap();
  let decision = engine.decide(person).await.unwrap();
  assert_eq!(decision, Decision::ConfigurationGap { stage: Some("WORKUP".into()) });
}

#[tokio::test]
async fn terminal_stage_reports_at_terminal() {
  let engine = engine_with(transplant_edges()).await;
  let person = Uuid::new_v4();
  engine.decide(person).await.unwrap();
  engine
    .record_answer(person, "ref_karnofsky", AnswerValue::Number(20.0))
    .await
    .unwrap();
  engine.decide(person).await.unwrap(); // EXIT

  let decision = engine.decide(person).await.unwrap();
  assert_eq!(decision, Decision::AtTerminal { stage: "EXIT".into() });
}

#[tokio::test]
async fn record_answer_requires_a_started_journey() {
  let engine = engine_with(transplant_edges()).await;
  let person = Uuid::new_v4();

  let err = engine
    .record_answer(person, "ref_karnofsky", AnswerValue::Number(80.0))
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::JourneyNotStarted(p) if p == person));
  assert_eq!(err.kind(), StoreErrorKind::JourneyNotStarted);
}

#[tokio::test]
async fn reload_picks_up_edge_changes() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  store
    .replace_edges(vec![edge(None, "REFERRAL", Condition::Always)])
    .await
    .unwrap();
  let engine = JourneyEngine::load(store.clone()).await.unwrap();

  let person = Uuid::new_v4();
  engine.decide(person).await.unwrap();
  // No outgoing edges configured yet.
  assert_eq!(
    engine.decide(person).await.unwrap(),
    Decision::AtTerminal { stage: "REFERRAL".into() }
  );

  store
    .replace_edges(vec![
      edge(None, "REFERRAL", Condition::Always),
      edge(Some("REFERRAL"), "WORKUP", Condition::Always),
    ])
    .await
    .unwrap();
  // The running graph is a snapshot; the new edge applies only after reload.
  assert_eq!(
    engine.decide(person).await.unwrap(),
    Decision::AtTerminal { stage: "REFERRAL".into() }
  );
  assert_eq!(engine.reload_edges().await.unwrap(), 2);
  assert!(engine.decide(person).await.unwrap().transitioned());
}

#[tokio::test]
async fn visit_log_tracks_the_whole_walk() {
  let engine = engine_with(transplant_edges()).await;
  let person = Uuid::new_v4();
  walk_to_board(&engine, person).await;

  let visits = engine.visit_history(person).await.unwrap();
  let stages: Vec<_> = visits.iter().map(|v| v.stage_id.as_str()).collect();
  assert_eq!(stages, vec!["REFERRAL", "WORKUP", "MATCH", "DONOR", "BOARD"]);
  assert!(visits.last().unwrap().is_current);
  assert!(visits[..4].iter().all(|v| v.exited_at.is_some()));
}
