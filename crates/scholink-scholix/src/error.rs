//! Error types for the Scholix payload codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("event payload must be a JSON array of link packages")]
  NotAnArray,

  #[error("event payload contains no link packages")]
  Empty,

  #[error("event payload has {count} link packages; at most {max} are allowed")]
  TooManyItems { count: usize, max: usize },

  #[error("{path}: {message}")]
  Invalid { path: String, message: String },

  #[error("malformed JSON: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
    Error::Invalid { path: path.into(), message: message.into() }
  }

  /// The JSON path of the offending field, where one applies.
  pub fn path(&self) -> Option<&str> {
    match self {
      Error::Invalid { path, .. } => Some(path),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
