//! [`SqliteStore`] — the SQLite implementation of [`JourneyStore`].

use std::{
  collections::{BTreeMap, BTreeSet},
  path::Path,
};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use wayfare_core::{
  answer::{Answer, AnswerReceipt, AnswerValue},
  edge::Edge,
  journey::{JourneyState, TransitionRecord, VisitRecord},
  store::{AppliedTransition, JourneyStore, TransitionPlan},
};

use crate::{
  Error, Result,
  encode::{
    RawAnswer, RawEdge, RawState, RawTransition, RawVisit, condition_columns,
    decode_value, encode_dt, encode_uuid, encode_value,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A journey store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Result of the apply-transition transaction body.
enum ApplyOutcome {
  Applied(Box<AppliedTransition>),
  /// The cursor no longer points at the expected stage; rolled back.
  Stale { found: Option<String> },
}

/// Result of the record-answer transaction body.
enum AnswerOutcome {
  Saved {
    previous_json: Option<String>,
    version:       i64,
  },
  NoJourney,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── JourneyStore impl ───────────────────────────────────────────────────────

impl JourneyStore for SqliteStore {
  type Error = Error;

  // ── Edges ─────────────────────────────────────────────────────────────────

  async fn load_edges(&self) -> Result<Vec<Edge>> {
    let raws: Vec<RawEdge> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT edge_id, from_stage, to_stage, condition_type,
                  question_id, range_min, range_max, equals_value
           FROM journey_edges
           ORDER BY position ASC",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawEdge {
              edge_id:        row.get(0)?,
              from_stage:     row.get(1)?,
              to_stage:       row.get(2)?,
              condition_type: row.get(3)?,
              question_id:    row.get(4)?,
              range_min:      row.get(5)?,
              range_max:      row.get(6)?,
              equals_value:   row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEdge::into_edge).collect()
  }

  async fn insert_edge(&self, edge: Edge) -> Result<()> {
    let edge_id_str = encode_uuid(edge.edge_id);
    let (cond_type, question_id, range_min, range_max, equals_value) =
      condition_columns(&edge.condition);
    let cond_type = cond_type.to_owned();
    let from_stage = edge.from_stage;
    let to_stage = edge.to_stage;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let position: i64 = tx.query_row(
          "SELECT COALESCE(MAX(position), 0) + 1 FROM journey_edges",
          [],
          |r| r.get(0),
        )?;
        tx.execute(
          "INSERT INTO journey_edges (
             edge_id, from_stage, to_stage, condition_type,
             question_id, range_min, range_max, equals_value, position
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            edge_id_str,
            from_stage,
            to_stage,
            cond_type,
            question_id,
            range_min,
            range_max,
            equals_value,
            position,
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn replace_edges(&self, edges: Vec<Edge>) -> Result<()> {
    // Pre-encode outside the closure; the closure only touches SQLite.
    let rows: Vec<_> = edges
      .into_iter()
      .map(|edge| {
        let (cond_type, question_id, range_min, range_max, equals_value) =
          condition_columns(&edge.condition);
        (
          encode_uuid(edge.edge_id),
          edge.from_stage,
          edge.to_stage,
          cond_type,
          question_id,
          range_min,
          range_max,
          equals_value,
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM journey_edges", [])?;
        for (position, row) in rows.into_iter().enumerate() {
          tx.execute(
            "INSERT INTO journey_edges (
               edge_id, from_stage, to_stage, condition_type,
               question_id, range_min, range_max, equals_value, position
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
              row.0,
              row.1,
              row.2,
              row.3,
              row.4,
              row.5,
              row.6,
              row.7,
              (position + 1) as i64,
            ],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Answers ───────────────────────────────────────────────────────────────

  async fn current_answers<'a>(
    &'a self,
    person_id: Uuid,
    stage_id:  Option<&'a str>,
  ) -> Result<BTreeMap<String, AnswerValue>> {
    let person_str = encode_uuid(person_id);
    let stage_str = stage_id.map(str::to_owned);

    let pairs: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(stage) = stage_str {
          let mut stmt = conn.prepare(
            "SELECT question_id, value_json FROM answers
             WHERE person_id = ?1 AND stage_id = ?2 AND is_current = 1",
          )?;
          stmt
            .query_map(rusqlite::params![person_str, stage], |row| {
              Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(
            "SELECT question_id, value_json FROM answers
             WHERE person_id = ?1 AND is_current = 1",
          )?;
          stmt
            .query_map(rusqlite::params![person_str], |row| {
              Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    pairs
      .into_iter()
      .map(|(q, json)| Ok((q, decode_value(&json)?)))
      .collect()
  }

  async fn record_answer<'a>(
    &'a self,
    person_id:   Uuid,
    stage_id:    &'a str,
    question_id: &'a str,
    value:       AnswerValue,
  ) -> Result<AnswerReceipt> {
    let person_str = encode_uuid(person_id);
    let stage_str = stage_id.to_owned();
    let question_str = question_id.to_owned();
    let value_json = encode_value(&value)?;
    let now_str = encode_dt(Utc::now());

    let outcome: AnswerOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // The visit number the answer belongs to comes from the cursor,
        // inside the same transaction that writes the row.
        let visit_number: Option<i64> = tx
          .query_row(
            "SELECT visit_number FROM journey_state WHERE person_id = ?1",
            rusqlite::params![person_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(visit_number) = visit_number else {
          return Ok(AnswerOutcome::NoJourney);
        };

        let previous: Option<(String, i64)> = tx
          .query_row(
            "SELECT value_json, version FROM answers
             WHERE person_id = ?1 AND question_id = ?2 AND is_current = 1",
            rusqlite::params![person_str, question_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;

        tx.execute(
          "UPDATE answers SET is_current = 0
           WHERE person_id = ?1 AND question_id = ?2 AND is_current = 1",
          rusqlite::params![person_str, question_str],
        )?;

        let version: i64 = tx.query_row(
          "SELECT COALESCE(MAX(version), 0) + 1 FROM answers
           WHERE person_id = ?1 AND question_id = ?2",
          rusqlite::params![person_str, question_str],
          |r| r.get(0),
        )?;

        tx.execute(
          "INSERT INTO answers (
             person_id, stage_id, question_id, value_json,
             visit_number, version, is_current, answered_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
          rusqlite::params![
            person_str,
            stage_str,
            question_str,
            value_json,
            visit_number,
            version,
            now_str,
          ],
        )?;
        tx.commit()?;

        Ok(AnswerOutcome::Saved { previous_json: previous.map(|p| p.0), version })
      })
      .await?;

    match outcome {
      AnswerOutcome::NoJourney => Err(Error::JourneyNotStarted(person_id)),
      AnswerOutcome::Saved { previous_json, version } => Ok(AnswerReceipt {
        previous_value: previous_json.as_deref().map(decode_value).transpose()?,
        version,
      }),
    }
  }

  async fn answer_history<'a>(
    &'a self,
    person_id:   Uuid,
    question_id: &'a str,
  ) -> Result<Vec<Answer>> {
    let person_str = encode_uuid(person_id);
    let question_str = question_id.to_owned();

    let raws: Vec<RawAnswer> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT person_id, stage_id, question_id, value_json,
                  visit_number, version, is_current, answered_at
           FROM answers
           WHERE person_id = ?1 AND question_id = ?2
           ORDER BY version DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![person_str, question_str], |row| {
            Ok(RawAnswer {
              person_id:    row.get(0)?,
              stage_id:     row.get(1)?,
              question_id:  row.get(2)?,
              value_json:   row.get(3)?,
              visit_number: row.get(4)?,
              version:      row.get(5)?,
              is_current:   row.get(6)?,
              answered_at:  row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAnswer::into_answer).collect()
  }

  // ── Visit history ─────────────────────────────────────────────────────────

  async fn visited_stages(&self, person_id: Uuid) -> Result<BTreeSet<String>> {
    let person_str = encode_uuid(person_id);

    let stages: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare("SELECT DISTINCT stage_id FROM visits WHERE person_id = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![person_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(stages.into_iter().collect())
  }

  async fn visit_count<'a>(&'a self, person_id: Uuid, stage_id: &'a str) -> Result<i64> {
    let person_str = encode_uuid(person_id);
    let stage_str = stage_id.to_owned();

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM visits WHERE person_id = ?1 AND stage_id = ?2",
          rusqlite::params![person_str, stage_str],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(count)
  }

  async fn visit_history(&self, person_id: Uuid) -> Result<Vec<VisitRecord>> {
    let person_str = encode_uuid(person_id);

    let raws: Vec<RawVisit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT person_id, stage_id, visit_number, entered_at, exited_at, is_current
           FROM visits
           WHERE person_id = ?1
           ORDER BY entered_at ASC, rowid ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![person_str], |row| {
            Ok(RawVisit {
              person_id:    row.get(0)?,
              stage_id:     row.get(1)?,
              visit_number: row.get(2)?,
              entered_at:   row.get(3)?,
              exited_at:    row.get(4)?,
              is_current:   row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVisit::into_visit).collect()
  }

  // ── Audit ledger ──────────────────────────────────────────────────────────

  async fn transition_history(&self, person_id: Uuid) -> Result<Vec<TransitionRecord>> {
    let person_str = encode_uuid(person_id);

    let raws: Vec<RawTransition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT person_id, from_stage, to_stage, from_visit_number,
                  to_visit_number, matched_edge_id, matched_question_id,
                  matched_value_json, reason, transitioned_at
           FROM transitions
           WHERE person_id = ?1
           ORDER BY transitioned_at ASC, rowid ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![person_str], |row| {
            Ok(RawTransition {
              person_id:           row.get(0)?,
              from_stage:          row.get(1)?,
              to_stage:            row.get(2)?,
              from_visit_number:   row.get(3)?,
              to_visit_number:     row.get(4)?,
              matched_edge_id:     row.get(5)?,
              matched_question_id: row.get(6)?,
              matched_value_json:  row.get(7)?,
              reason:              row.get(8)?,
              transitioned_at:     row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTransition::into_record).collect()
  }

  // ── Journey cursor ────────────────────────────────────────────────────────

  async fn journey_state(&self, person_id: Uuid) -> Result<Option<JourneyState>> {
    let person_str = encode_uuid(person_id);

    let raw: Option<RawState> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT person_id, current_stage, visit_number, started_at, updated_at
               FROM journey_state WHERE person_id = ?1",
              rusqlite::params![person_str],
              |row| {
                Ok(RawState {
                  person_id:     row.get(0)?,
                  current_stage: row.get(1)?,
                  visit_number:  row.get(2)?,
                  started_at:    row.get(3)?,
                  updated_at:    row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawState::into_state).transpose()
  }

  // ── Atomic write path ─────────────────────────────────────────────────────

  async fn apply_transition(&self, plan: TransitionPlan) -> Result<AppliedTransition> {
    let now = Utc::now();
    let now_str = encode_dt(now);
    let person_str = encode_uuid(plan.person_id);
    let edge_id_str = encode_uuid(plan.matched_edge_id);
    let value_json = plan
      .matched_value
      .as_ref()
      .map(encode_value)
      .transpose()?;
    let expected = plan.from_stage.clone();

    let outcome: ApplyOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // The cursor must still point where the decision was made, or a
        // concurrent evaluation won the race. Rolling back leaves nothing.
        let found: Option<(String, i64, String)> = tx
          .query_row(
            "SELECT current_stage, visit_number, started_at
             FROM journey_state WHERE person_id = ?1",
            rusqlite::params![person_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;

        let started_at_str = match (&plan.from_stage, &found) {
          (None, None) => now_str.clone(),
          (Some(expect), Some((actual, _, started))) if expect == actual => {
            started.clone()
          }
          _ => {
            return Ok(ApplyOutcome::Stale {
              found: found.map(|(stage, _, _)| stage),
            });
          }
        };

        let to_visit_number: i64 = tx.query_row(
          "SELECT COUNT(*) + 1 FROM visits WHERE person_id = ?1 AND stage_id = ?2",
          rusqlite::params![person_str, plan.to_stage],
          |r| r.get(0),
        )?;

        tx.execute(
          "INSERT INTO transitions (
             person_id, from_stage, to_stage, from_visit_number,
             to_visit_number, matched_edge_id, matched_question_id,
             matched_value_json, reason, transitioned_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            person_str,
            plan.from_stage,
            plan.to_stage,
            plan.from_visit_number,
            to_visit_number,
            edge_id_str,
            plan.matched_question_id,
            value_json,
            plan.reason,
            now_str,
          ],
        )?;

        tx.execute(
          "UPDATE visits SET exited_at = ?2, is_current = 0
           WHERE person_id = ?1 AND is_current = 1",
          rusqlite::params![person_str, now_str],
        )?;

        tx.execute(
          "INSERT INTO visits (
             person_id, stage_id, visit_number, entered_at, exited_at, is_current
           ) VALUES (?1, ?2, ?3, ?4, NULL, 1)",
          rusqlite::params![person_str, plan.to_stage, to_visit_number, now_str],
        )?;

        if plan.from_stage.is_none() {
          tx.execute(
            "INSERT INTO journey_state (
               person_id, current_stage, visit_number, started_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![person_str, plan.to_stage, to_visit_number, now_str],
          )?;
        } else {
          tx.execute(
            "UPDATE journey_state
             SET current_stage = ?2, visit_number = ?3, updated_at = ?4
             WHERE person_id = ?1",
            rusqlite::params![person_str, plan.to_stage, to_visit_number, now_str],
          )?;
        }

        tx.commit()?;

        let record = TransitionRecord {
          person_id:           plan.person_id,
          from_stage:          plan.from_stage.clone(),
          to_stage:            plan.to_stage.clone(),
          from_visit_number:   plan.from_visit_number,
          to_visit_number,
          matched_edge_id:     plan.matched_edge_id,
          matched_question_id: plan.matched_question_id.clone(),
          matched_value:       plan.matched_value.clone(),
          reason:              plan.reason.clone(),
          transitioned_at:     now,
        };
        let visit = VisitRecord {
          person_id:    plan.person_id,
          stage_id:     plan.to_stage.clone(),
          visit_number: to_visit_number,
          entered_at:   now,
          exited_at:    None,
          is_current:   true,
        };
        // started_at round-trips through its stored string so the struct
        // matches what a later read would return.
        let started_at = chrono::DateTime::parse_from_rfc3339(&started_at_str)
          .map(|dt| dt.with_timezone(&Utc))
          .unwrap_or(now);
        let state = JourneyState {
          person_id:     plan.person_id,
          current_stage: plan.to_stage,
          visit_number:  to_visit_number,
          started_at,
          updated_at:    now,
        };

        Ok(ApplyOutcome::Applied(Box::new(AppliedTransition {
          record,
          visit,
          state,
        })))
      })
      .await?;

    match outcome {
      ApplyOutcome::Applied(applied) => Ok(*applied),
      ApplyOutcome::Stale { found } => Err(Error::StaleState { expected, found }),
    }
  }
}
