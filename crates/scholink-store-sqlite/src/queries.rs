//! Graph-direct read queries: citations, relationships without the index,
//! and the monitor report.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{Connection, params};
use scholink_core::{
  document::RelationshipDocument,
  event::EventStatus,
  group::GroupType,
  identifier::{Identifier, IdentifierKey},
  query::{CitationOptions, Citations, CitingGroup, GraphQuery, Side, StatusReport},
  relation::Relation,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  documents::{DocumentBuilder, edges_on_side},
  encode::{RawIdentifier, decode_uuid, encode_uuid},
  grouping, identifiers,
};

fn identity_group(conn: &Connection, identifier: &Identifier) -> Result<Uuid> {
  grouping::identity_group_of(conn, identifier.id)?.ok_or(Error::Unattached(identifier.id))
}

/// Identifiers at the other end of `HasVersion` assertions touching `ids`.
/// With `parents` set, walks from version to parent; otherwise from parent
/// to version.
fn version_neighbours(
  conn: &Connection,
  ids: &BTreeSet<Uuid>,
  parents: bool,
) -> Result<Vec<Identifier>> {
  let (known, wanted) = if parents {
    ("target_id", "source_id")
  } else {
    ("source_id", "target_id")
  };
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT i.id, i.value, i.scheme FROM relationships r
       JOIN identifiers i ON i.id = r.{wanted}
      WHERE r.{known} = ?1 AND r.relation = ?2"
  ))?;
  let mut out = Vec::new();
  for id in ids {
    let raws = stmt
      .query_map(
        params![encode_uuid(*id), Relation::HasVersion.as_ref()],
        RawIdentifier::from_row,
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    for raw in raws {
      out.push(raw.into_identifier()?);
    }
  }
  Ok(out)
}

pub fn citations(
  conn: &Connection,
  key: &IdentifierKey,
  options: CitationOptions,
) -> Result<Option<Citations>> {
  let Some(queried) = identifiers::find(conn, key)? else {
    return Ok(None);
  };
  let own_group = identity_group(conn, &queried)?;

  let mut targets: BTreeMap<Uuid, Identifier> = identifiers::of_group(conn, own_group)?
    .into_iter()
    .map(|i| (i.id, i))
    .collect();

  if options.with_parents {
    let own: BTreeSet<Uuid> = targets.keys().copied().collect();
    let parents = version_neighbours(conn, &own, true)?;
    let parent_ids: BTreeSet<Uuid> = parents.iter().map(|i| i.id).collect();
    let mut related = parents;
    if options.with_siblings {
      related.extend(version_neighbours(conn, &parent_ids, false)?);
    }
    for ident in related {
      for member in identifiers::of_group(conn, identity_group(conn, &ident)?)? {
        targets.insert(member.id, member);
      }
    }
  }

  let target_groups: BTreeSet<Uuid> = targets
    .values()
    .map(|i| identity_group(conn, i))
    .collect::<Result<_>>()?;

  let mut stmt = conn.prepare_cached(
    "SELECT source_id FROM relationships
      WHERE target_id = ?1 AND deleted = 0 AND relation IN (?2, ?3, ?4)",
  )?;
  let mut citing_groups = BTreeSet::new();
  for target in targets.keys() {
    let sources: Vec<String> = stmt
      .query_map(
        params![
          encode_uuid(*target),
          Relation::Cites.as_ref(),
          Relation::IsSupplementTo.as_ref(),
          Relation::IsRelatedTo.as_ref(),
        ],
        |r| r.get(0),
      )?
      .collect::<rusqlite::Result<_>>()?;
    for source in sources {
      let group = grouping::identity_group_of(conn, decode_uuid(&source)?)?
        .ok_or(Error::Unattached(decode_uuid(&source)?))?;
      if !target_groups.contains(&group) {
        citing_groups.insert(group);
      }
    }
  }

  let citing = citing_groups
    .into_iter()
    .map(|group_id| {
      Ok(CitingGroup { group_id, identifiers: identifiers::of_group(conn, group_id)? })
    })
    .collect::<Result<Vec<_>>>()?;

  let target = if options.expand_target {
    targets.into_values().collect()
  } else {
    vec![queried]
  };
  Ok(Some(Citations { target, citing }))
}

/// Documents for the edges of `query.relation` at the queried identifier's
/// group, computed from the graph rather than the index.
pub fn db_relationships(conn: &Connection, query: &GraphQuery) -> Result<Vec<RelationshipDocument>> {
  let Some(ident) = identifiers::find(conn, &query.identifier)? else {
    return Ok(Vec::new());
  };
  let identity = identity_group(conn, &ident)?;
  let group = match query.grouping {
    GroupType::Identity => identity,
    GroupType::Version => {
      grouping::version_group_of(conn, identity)?.ok_or(Error::MissingGroup(identity))?
    }
  };

  let (relation, side) = query.relation.resolve();
  let column = match side {
    Side::Source => "source_id",
    Side::Target => "target_id",
  };

  let mut builder = DocumentBuilder::new(conn);
  edges_on_side(conn, group, relation, column)?
    .iter()
    .map(|edge| builder.document(edge))
    .collect()
}

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<u64> {
  let n: i64 = conn.query_row(sql, params, |r| r.get(0))?;
  Ok(n.max(0) as u64)
}

pub fn status_report(conn: &Connection) -> Result<StatusReport> {
  let events = |status: EventStatus| {
    count(conn, "SELECT COUNT(*) FROM events WHERE status = ?1", params![status.as_ref()])
  };
  let groups = |kind: GroupType| {
    count(conn, "SELECT COUNT(*) FROM object_groups WHERE type = ?1", params![kind.as_ref()])
  };

  Ok(StatusReport {
    events_new:            events(EventStatus::New)?,
    events_processing:     events(EventStatus::Processing)?,
    events_error:          events(EventStatus::Error)?,
    events_done:           events(EventStatus::Done)?,
    error_log_rows:        count(conn, "SELECT COUNT(*) FROM error_monitoring", [])?,
    identifiers:           count(conn, "SELECT COUNT(*) FROM identifiers", [])?,
    relationships:         count(conn, "SELECT COUNT(*) FROM relationships", [])?,
    deleted_relationships: count(conn, "SELECT COUNT(*) FROM relationships WHERE deleted = 1", [])?,
    identity_groups:       groups(GroupType::Identity)?,
    version_groups:        groups(GroupType::Version)?,
    group_relationships:   count(conn, "SELECT COUNT(*) FROM group_relationships", [])?,
  })
}
