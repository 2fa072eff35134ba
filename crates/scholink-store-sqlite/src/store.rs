//! [`SqliteStore`]: the SQLite implementation of [`GraphStore`].

use std::{path::Path, time::Instant};

use chrono::{DateTime, Utc};
use scholink_core::{
  compact::CompactedGroups,
  document::RelationshipDocument,
  event::{
    ErrorRecord, Event, EventFilter, EventKind, EventStatus, NewErrorRecord, NewEvent,
    PayloadType,
  },
  graph::GraphStore,
  group::GroupChange,
  identifier::{Identifier, IdentifierKey},
  metadata::ObjectMetadata,
  query::{CitationOptions, Citations, GraphQuery, StatusReport},
};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result, assertions, coalesce, documents, events, grouping, identifiers, queries,
  schema::GRAPH_SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The link graph backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
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
        conn.execute_batch(GRAPH_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// IDs of events whose payload hashes to `digest`.
  pub async fn events_with_digest(&self, digest: String) -> Result<Vec<Uuid>> {
    self
      .conn
      .call(move |conn| Ok(events::ids_with_digest(conn, &digest)))
      .await?
  }

  /// Run `f` on the raw connection. Test-only escape hatch for invariant
  /// checks.
  #[cfg(test)]
  pub(crate) async fn with_connection<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

fn check_deadline(deadline: Option<Instant>) -> Result<()> {
  match deadline {
    Some(d) if Instant::now() >= d => Err(Error::Timeout),
    _ => Ok(()),
  }
}

/// Apply all link packages of one event inside a single transaction.
fn apply_event_tx(
  conn: &mut rusqlite::Connection,
  id: Uuid,
  deadline: Option<Instant>,
) -> Result<CompactedGroups> {
  let tx = conn.transaction()?;
  let event = events::get(&tx, id)?.ok_or(Error::EventNotFound(id))?;
  let packages = scholink_scholix::parse_event(&event.payload, None)?;
  let deleting = event.kind == EventKind::RelationshipDeleted;

  let mut changes = Vec::with_capacity(packages.len());
  for (index, assertion) in packages.iter().enumerate() {
    check_deadline(deadline)?;
    let index = index as u32;

    let source = identifiers::get_or_create(&tx, &assertion.source.key)?;
    let target = identifiers::get_or_create(&tx, &assertion.target.key)?;
    assertions::link_object_event(&tx, id, source.id, PayloadType::Identifier, index)?;
    assertions::link_object_event(&tx, id, target.id, PayloadType::Identifier, index)?;

    let relationship =
      assertions::ensure_relationship(&tx, &source, &target, assertion.relation, deleting)?;
    assertions::link_object_event(&tx, id, relationship.id, PayloadType::Relationship, index)?;

    let change = if deleting {
      let (src_ig, src_vg) = grouping::attach(&tx, &source)?;
      let (trg_ig, trg_vg) = grouping::attach(&tx, &target)?;
      GroupChange { src_ig, trg_ig, merged_ig: None, src_vg, trg_vg, merged_vg: None }
    } else {
      let change =
        grouping::apply_assertion(&tx, &source, &target, &relationship, &assertion.history)?;
      for (ident, object) in [(&source, &assertion.source), (&target, &assertion.target)] {
        let group = grouping::identity_group_of(&tx, ident.id)?.ok_or(Error::Unattached(ident.id))?;
        coalesce::update_group_metadata(&tx, group, &object.metadata)?;
      }
      change
    };
    debug!(event_id = %id, index, relation = %assertion.relation, "applied link package");
    changes.push(change);
  }

  let mut groups = CompactedGroups::compact(&changes);
  fill_versions(&tx, &mut groups)?;

  check_deadline(deadline)?;
  tx.commit()?;
  Ok(groups)
}

fn fill_versions(conn: &rusqlite::Connection, groups: &mut CompactedGroups) -> Result<()> {
  for ig in &groups.idx_ig {
    if let Some(vg) = grouping::version_group_of(conn, *ig)? {
      groups.ig_to_vg.insert(*ig, vg);
    }
  }
  Ok(())
}

fn update_metadata_tx(
  conn: &mut rusqlite::Connection,
  key: &IdentifierKey,
  metadata: &ObjectMetadata,
) -> Result<CompactedGroups> {
  let tx = conn.transaction()?;
  let ident = identifiers::get_or_create(&tx, key)?;
  let (ig, vg) = grouping::attach(&tx, &ident)?;
  coalesce::update_group_metadata(&tx, ig, metadata)?;

  let mut groups = CompactedGroups::default();
  groups.idx_ig.insert(ig);
  groups.idx_vg.insert(vg);
  groups.ig_to_vg.insert(ig, vg);
  tx.commit()?;
  Ok(groups)
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl GraphStore for SqliteStore {
  type Error = Error;

  // ── Assertion log ─────────────────────────────────────────────────────────

  async fn append_event(&self, input: NewEvent) -> Result<Event> {
    self.conn.call(move |conn| Ok(events::insert(conn, input))).await?
  }

  async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
    self.conn.call(move |conn| Ok(events::get(conn, id))).await?
  }

  async fn list_event_ids(&self, filter: EventFilter) -> Result<Vec<Uuid>> {
    self.conn.call(move |conn| Ok(events::list_ids(conn, filter))).await?
  }

  async fn set_event_status(&self, id: Uuid, status: EventStatus) -> Result<()> {
    self
      .conn
      .call(move |conn| Ok(events::set_status(conn, id, status)))
      .await?
  }

  async fn stale_processing_events(&self, older_than: DateTime<Utc>) -> Result<Vec<Uuid>> {
    self
      .conn
      .call(move |conn| Ok(events::stale_processing(conn, older_than)))
      .await?
  }

  async fn event_identifiers(&self, event_id: Uuid) -> Result<Vec<Identifier>> {
    self
      .conn
      .call(move |conn| Ok(events::identifiers(conn, event_id)))
      .await?
  }

  // ── Error log ─────────────────────────────────────────────────────────────

  async fn record_error(&self, input: NewErrorRecord) -> Result<ErrorRecord> {
    self.conn.call(move |conn| Ok(events::record_error(conn, input))).await?
  }

  async fn list_errors(&self, event_id: Option<Uuid>) -> Result<Vec<ErrorRecord>> {
    self
      .conn
      .call(move |conn| Ok(events::list_errors(conn, event_id)))
      .await?
  }

  // ── Graph mutation ────────────────────────────────────────────────────────

  async fn apply_event(&self, id: Uuid, deadline: Option<Instant>) -> Result<CompactedGroups> {
    self
      .conn
      .call(move |conn| Ok(apply_event_tx(conn, id, deadline)))
      .await?
  }

  async fn update_object_metadata(
    &self,
    key: IdentifierKey,
    metadata: ObjectMetadata,
  ) -> Result<CompactedGroups> {
    self
      .conn
      .call(move |conn| Ok(update_metadata_tx(conn, &key, &metadata)))
      .await?
  }

  // ── Projection support ────────────────────────────────────────────────────

  async fn documents_for<'a>(
    &'a self,
    groups: &'a CompactedGroups,
  ) -> Result<Vec<RelationshipDocument>> {
    let groups = groups.clone();
    self
      .conn
      .call(move |conn| Ok(documents::documents_for(conn, &groups)))
      .await?
  }

  async fn all_groups(&self) -> Result<CompactedGroups> {
    self.conn.call(|conn| Ok(documents::all_groups(conn))).await?
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn citations(
    &self,
    key: IdentifierKey,
    options: CitationOptions,
  ) -> Result<Option<Citations>> {
    self
      .conn
      .call(move |conn| Ok(queries::citations(conn, &key, options)))
      .await?
  }

  async fn db_relationships<'a>(
    &'a self,
    query: &'a GraphQuery,
  ) -> Result<Vec<RelationshipDocument>> {
    let query = query.clone();
    self
      .conn
      .call(move |conn| Ok(queries::db_relationships(conn, &query)))
      .await?
  }

  async fn status_report(&self) -> Result<StatusReport> {
    self.conn.call(|conn| Ok(queries::status_report(conn))).await?
  }
}
