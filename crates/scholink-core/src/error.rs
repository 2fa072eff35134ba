//! Error types for `scholink-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::group::GroupType;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unsupported identifier scheme: {0:?}")]
  UnsupportedScheme(String),

  #[error("empty identifier value for scheme {0:?}")]
  EmptyIdentifier(String),

  #[error("invalid metadata at {path}: {message}")]
  InvalidMetadata { path: String, message: String },

  #[error("cannot merge {left} group {left_id} with {right} group {right_id}")]
  GroupTypeMismatch {
    left_id:  Uuid,
    left:     GroupType,
    right_id: Uuid,
    right:    GroupType,
  },

  #[error("unknown query relation: {0:?}")]
  UnknownQueryRelation(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classification of backend failures, consulted by the event processor
/// when deciding whether an event gets its automatic retry.
pub trait Failure {
  /// Transient I/O that may succeed on a later attempt.
  fn is_retryable(&self) -> bool;

  /// The graph transaction was abandoned because its deadline passed.
  fn is_timeout(&self) -> bool { false }
}
