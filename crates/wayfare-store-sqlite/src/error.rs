//! Error type for `wayfare-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;
use wayfare_core::store::{ClassifyError, StoreErrorKind};

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  /// The database was busy or locked; the caller may retry.
  #[error("database busy; retry the operation")]
  Busy,

  /// The journey cursor moved between read and write. The transaction was
  /// rolled back; nothing was applied.
  #[error("journey state changed concurrently: expected stage {expected:?}, found {found:?}")]
  StaleState {
    expected: Option<String>,
    found:    Option<String>,
  },

  #[error("journey not started for person {0}")]
  JourneyNotStarted(Uuid),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// An edge row whose columns do not form a valid condition.
  #[error("malformed edge row: {0}")]
  MalformedEdge(String),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _)) = &e
      && matches!(
        f.code,
        rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
      )
    {
      return Self::Busy;
    }
    Self::Database(e)
  }
}

impl ClassifyError for Error {
  fn kind(&self) -> StoreErrorKind {
    match self {
      Self::Busy | Self::StaleState { .. } => StoreErrorKind::Conflict,
      Self::Database(_) => StoreErrorKind::Unavailable,
      Self::JourneyNotStarted(_) => StoreErrorKind::JourneyNotStarted,
      _ => StoreErrorKind::Other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
