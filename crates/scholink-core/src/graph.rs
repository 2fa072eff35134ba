//! The `GraphStore` trait: the relational source of truth.
//!
//! Implemented by storage backends (e.g. `scholink-store-sqlite`). The event
//! processor, the index projector and the HTTP layer depend on this
//! abstraction, not on any concrete backend.

use std::{future::Future, time::Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Failure,
  compact::CompactedGroups,
  document::RelationshipDocument,
  event::{ErrorRecord, Event, EventFilter, EventStatus, NewErrorRecord, NewEvent},
  identifier::{Identifier, IdentifierKey},
  metadata::ObjectMetadata,
  query::{CitationOptions, Citations, GraphQuery, StatusReport},
};

/// Abstraction over the persistent link graph.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait GraphStore: Send + Sync {
  type Error: std::error::Error + Failure + Send + Sync + 'static;

  // ── Assertion log ─────────────────────────────────────────────────────

  /// Persist an event with status `New`.
  fn append_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  fn get_event(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Event IDs matching `filter`, oldest first.
  fn list_event_ids(
    &self,
    filter: EventFilter,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  fn set_event_status(
    &self,
    id: Uuid,
    status: EventStatus,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// IDs of events stuck in `Processing` since before `older_than`.
  fn stale_processing_events(
    &self,
    older_than: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Identifiers an event materialised, via its object-event links.
  fn event_identifiers(
    &self,
    event_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Identifier>, Self::Error>> + Send + '_;

  // ── Error log ─────────────────────────────────────────────────────────

  fn record_error(
    &self,
    input: NewErrorRecord,
  ) -> impl Future<Output = Result<ErrorRecord, Self::Error>> + Send + '_;

  /// Error-log rows, newest first, optionally restricted to one event.
  fn list_errors(
    &self,
    event_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<ErrorRecord>, Self::Error>> + Send + '_;

  // ── Graph mutation ────────────────────────────────────────────────────

  /// Apply every link package of an event in one transaction: resolve
  /// identifiers, record relationships and object events, run the grouping
  /// engine and the metadata coalescer.
  ///
  /// If `deadline` passes before the commit, the transaction is rolled back
  /// and a timeout error is returned. Returns the compacted set of groups
  /// whose documents must be rebuilt.
  fn apply_event(
    &self,
    id: Uuid,
    deadline: Option<Instant>,
  ) -> impl Future<Output = Result<CompactedGroups, Self::Error>> + Send + '_;

  /// Update the metadata of the Identity group owning `key`, creating the
  /// identifier and its groups on first mention.
  fn update_object_metadata(
    &self,
    key: IdentifierKey,
    metadata: ObjectMetadata,
  ) -> impl Future<Output = Result<CompactedGroups, Self::Error>> + Send + '_;

  // ── Projection support ────────────────────────────────────────────────

  /// Build the index documents for the groups in `groups`: every Version
  /// edge touching a group in `idx_vg` and every Identity edge touching a
  /// group in `idx_ig`. Groups that no longer exist are skipped.
  fn documents_for<'a>(
    &'a self,
    groups: &'a CompactedGroups,
  ) -> impl Future<Output = Result<Vec<RelationshipDocument>, Self::Error>> + Send + 'a;

  /// Every live group, packaged for a full re-projection.
  fn all_groups(
    &self,
  ) -> impl Future<Output = Result<CompactedGroups, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Citations of the work identified by `key`. `None` if the identifier is
  /// unknown.
  fn citations(
    &self,
    key: IdentifierKey,
    options: CitationOptions,
  ) -> impl Future<Output = Result<Option<Citations>, Self::Error>> + Send + '_;

  /// Answer a relationships query directly from the graph, bypassing the
  /// index.
  fn db_relationships<'a>(
    &'a self,
    query: &'a GraphQuery,
  ) -> impl Future<Output = Result<Vec<RelationshipDocument>, Self::Error>> + Send + 'a;

  fn status_report(
    &self,
  ) -> impl Future<Output = Result<StatusReport, Self::Error>> + Send + '_;
}
