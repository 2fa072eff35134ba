//! The `SearchIndex` trait: the derived, query-facing projection.
//!
//! Indices are named `relationships-<timestamp>`. Two aliases are in use:
//! [`WRITE_ALIAS`] points at the newest index and receives projector writes;
//! [`READ_ALIAS`] serves queries and moves only on rollover.

use std::{collections::BTreeSet, future::Future};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Failure,
  document::RelationshipDocument,
  query::{DocumentPage, DocumentQuery},
};

pub const INDEX_PREFIX: &str = "relationships";
pub const WRITE_ALIAS: &str = "relationships-write";
pub const READ_ALIAS: &str = "relationships-read";

/// Outcome of [`SearchIndex::rollover`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rollover {
  /// The index now behind the read alias.
  pub read_index: String,
  pub deleted:    Vec<String>,
}

pub trait SearchIndex: Send + Sync {
  type Error: std::error::Error + Failure + Send + Sync + 'static;

  /// Name of the index behind the write alias, creating a first index (and
  /// pointing both aliases at it) when none exists.
  fn write_index(
    &self,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Create a fresh suffixed index and point the write alias at it.
  fn create_index(
    &self,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// All index names, newest first.
  fn list_indices(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Remove from the write index every document whose source or target
  /// group is in `groups`. Deleting absent documents is not an error.
  fn delete_for_groups<'a>(
    &'a self,
    groups: &'a BTreeSet<Uuid>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Insert or replace documents in the write index, keyed by document ID.
  fn bulk_index(
    &self,
    docs: Vec<RelationshipDocument>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Query the index behind the read alias.
  fn search<'a>(
    &'a self,
    query: &'a DocumentQuery,
  ) -> impl Future<Output = Result<DocumentPage, Self::Error>> + Send + 'a;

  /// Point the read alias at the write index. With `keep_old` set, delete
  /// all but that many older indices.
  fn rollover(
    &self,
    keep_old: Option<usize>,
  ) -> impl Future<Output = Result<Rollover, Self::Error>> + Send + '_;
}
