//! Error types for `wayfare-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("journey not started for person {0}")]
  JourneyNotStarted(Uuid),

  #[error("no entry edge configured (an edge with no source stage)")]
  MissingEntryEdge,

  #[error("{0} entry edges configured; exactly one may have no source stage")]
  MultipleEntryEdges(usize),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
