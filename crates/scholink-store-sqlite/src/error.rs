//! Error type for `scholink-store-sqlite`.

use rusqlite::ErrorCode;
use scholink_core::Failure;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] scholink_core::Error),

  #[error("stored payload rejected: {0}")]
  Payload(#[from] scholink_scholix::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value: {value:?}")]
  UnknownValue { column: &'static str, value: String },

  #[error("event not found: {0}")]
  EventNotFound(Uuid),

  #[error("group not found: {0}")]
  MissingGroup(Uuid),

  #[error("identifier {0} has no identity group")]
  Unattached(Uuid),

  #[error("deadline passed before commit")]
  Timeout,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn sqlite_is_transient(e: &rusqlite::Error) -> bool {
  match e {
    rusqlite::Error::SqliteFailure(f, _) => matches!(
      f.code,
      ErrorCode::DatabaseBusy
        | ErrorCode::DatabaseLocked
        | ErrorCode::SystemIoFailure
        | ErrorCode::DiskFull
        | ErrorCode::CannotOpen
    ),
    _ => false,
  }
}

impl Failure for Error {
  fn is_retryable(&self) -> bool {
    match self {
      Error::Sqlite(e) => sqlite_is_transient(e),
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) => sqlite_is_transient(e),
      Error::Database(tokio_rusqlite::Error::ConnectionClosed) => true,
      Error::Timeout => true,
      _ => false,
    }
  }

  fn is_timeout(&self) -> bool { matches!(self, Error::Timeout) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn constraint_violations_are_not_retryable() {
    let e = Error::Sqlite(rusqlite::Error::SqliteFailure(
      rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
      Some("UNIQUE constraint failed".into()),
    ));
    assert!(!e.is_retryable());
  }

  #[test]
  fn busy_database_is_retryable() {
    let e = Error::Sqlite(rusqlite::Error::SqliteFailure(
      rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
      None,
    ));
    assert!(e.is_retryable());
    assert!(!e.is_timeout());
  }

  #[test]
  fn timeout_is_classified() {
    assert!(Error::Timeout.is_timeout());
  }
}
