//! SQL schema for the Wayfare SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

-- Configuration, authored out-of-band. `position` preserves insertion
-- order, the tie-break of last resort during priority resolution.
CREATE TABLE IF NOT EXISTS journey_edges (
    edge_id        TEXT PRIMARY KEY,
    from_stage     TEXT,             -- NULL marks the journey entry edge
    to_stage       TEXT NOT NULL,
    condition_type TEXT NOT NULL,    -- 'always' | 'equals' | 'range'
    question_id    TEXT,             -- NULL only for 'always'
    range_min      REAL,
    range_max      REAL,
    equals_value   REAL,
    position       INTEGER NOT NULL
);

-- Versioned answers. Superseding flips is_current on the old row and
-- inserts the next version; no row is ever deleted.
CREATE TABLE IF NOT EXISTS answers (
    person_id    TEXT NOT NULL,
    stage_id     TEXT NOT NULL,
    question_id  TEXT NOT NULL,
    value_json   TEXT NOT NULL,
    visit_number INTEGER NOT NULL,
    version      INTEGER NOT NULL,
    is_current   INTEGER NOT NULL DEFAULT 1,
    answered_at  TEXT NOT NULL,
    PRIMARY KEY (person_id, question_id, version)
);

-- At most one current answer per (person, question).
CREATE UNIQUE INDEX IF NOT EXISTS answers_current_idx
    ON answers(person_id, question_id) WHERE is_current = 1;

-- Append-only visit log. The visited-stage set and the per-stage visit
-- counter are both derived from this table at read time.
CREATE TABLE IF NOT EXISTS visits (
    person_id    TEXT NOT NULL,
    stage_id     TEXT NOT NULL,
    visit_number INTEGER NOT NULL,
    entered_at   TEXT NOT NULL,
    exited_at    TEXT,
    is_current   INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (person_id, stage_id, visit_number)
);

-- At most one current visit per person.
CREATE UNIQUE INDEX IF NOT EXISTS visits_current_idx
    ON visits(person_id) WHERE is_current = 1;

-- The audit ledger. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS transitions (
    person_id           TEXT NOT NULL,
    from_stage          TEXT,            -- NULL for the bootstrap entry
    to_stage            TEXT NOT NULL,
    from_visit_number   INTEGER,
    to_visit_number     INTEGER NOT NULL,
    matched_edge_id     TEXT NOT NULL,
    matched_question_id TEXT,
    matched_value_json  TEXT,
    reason              TEXT NOT NULL,
    transitioned_at     TEXT NOT NULL
);

-- Materialized cursor for O(1) current-stage reads; written only inside
-- the same transaction as the matching visit/transition rows.
CREATE TABLE IF NOT EXISTS journey_state (
    person_id     TEXT PRIMARY KEY,
    current_stage TEXT NOT NULL,
    visit_number  INTEGER NOT NULL,
    started_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS answers_person_idx     ON answers(person_id);
CREATE INDEX IF NOT EXISTS visits_person_idx      ON visits(person_id);
CREATE INDEX IF NOT EXISTS transitions_person_idx ON transitions(person_id);

PRAGMA user_version = 1;
";
