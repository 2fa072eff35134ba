//! Grouping engine: Identity groups (co-referring identifiers), Version
//! groups (Identity groups that are versions of one work), the group-level
//! edges between them, and incremental merges.
//!
//! Every function runs on a borrowed connection, normally the transaction
//! opened for one event. Merges work on the pair ordered as
//! `(min(id), max(id))` and apply their steps in an order that never
//! transiently violates `UNIQUE (source_id, target_id, relation)` on
//! `group_relationships` or the link-table primary keys.

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension as _, params};
use scholink_core::{
  group::{GroupChange, GroupType, Relationship},
  identifier::Identifier,
  metadata::{HistoryEntry, RelationshipHistory},
  relation::Relation,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result, coalesce,
  encode::{decode_enum, decode_uuid, encode_uuid, now},
};

// ─── Groups ──────────────────────────────────────────────────────────────────

pub fn create_group(conn: &Connection, kind: GroupType) -> Result<Uuid> {
  let id = Uuid::new_v4();
  conn.execute(
    "INSERT INTO object_groups (id, type, created_at) VALUES (?1, ?2, ?3)",
    params![encode_uuid(id), kind.as_ref(), now()],
  )?;
  Ok(id)
}

pub fn group_type(conn: &Connection, id: Uuid) -> Result<GroupType> {
  let kind: Option<String> = conn
    .query_row(
      "SELECT type FROM object_groups WHERE id = ?1",
      params![encode_uuid(id)],
      |r| r.get(0),
    )
    .optional()?;
  let kind = kind.ok_or(Error::MissingGroup(id))?;
  decode_enum("object_groups.type", &kind)
}

pub fn identity_group_of(conn: &Connection, identifier: Uuid) -> Result<Option<Uuid>> {
  let id: Option<String> = conn
    .query_row(
      "SELECT group_id FROM identifier_groups WHERE identifier_id = ?1",
      params![encode_uuid(identifier)],
      |r| r.get(0),
    )
    .optional()?;
  id.as_deref().map(decode_uuid).transpose()
}

pub fn version_group_of(conn: &Connection, identity_group: Uuid) -> Result<Option<Uuid>> {
  let id: Option<String> = conn
    .query_row(
      "SELECT group_id FROM group_m2m WHERE subgroup_id = ?1",
      params![encode_uuid(identity_group)],
      |r| r.get(0),
    )
    .optional()?;
  id.as_deref().map(decode_uuid).transpose()
}

/// Identity sub-groups of a Version group, ordered by ID.
pub fn subgroups(conn: &Connection, version_group: Uuid) -> Result<Vec<Uuid>> {
  let mut stmt = conn.prepare_cached(
    "SELECT subgroup_id FROM group_m2m WHERE group_id = ?1 ORDER BY subgroup_id",
  )?;
  let ids: Vec<String> = stmt
    .query_map(params![encode_uuid(version_group)], |r| r.get(0))?
    .collect::<rusqlite::Result<_>>()?;
  ids.iter().map(|s| decode_uuid(s)).collect()
}

/// Ensure `identifier` has an Identity group and that group a Version
/// group. Returns `(identity, version)`.
pub fn attach(conn: &Connection, identifier: &Identifier) -> Result<(Uuid, Uuid)> {
  let identity = match identity_group_of(conn, identifier.id)? {
    Some(g) => g,
    None => {
      let g = create_group(conn, GroupType::Identity)?;
      conn.execute(
        "INSERT INTO identifier_groups (identifier_id, group_id) VALUES (?1, ?2)",
        params![encode_uuid(identifier.id), encode_uuid(g)],
      )?;
      g
    }
  };

  let version = match version_group_of(conn, identity)? {
    Some(v) => v,
    None => {
      let v = create_group(conn, GroupType::Version)?;
      conn.execute(
        "INSERT INTO group_m2m (group_id, subgroup_id) VALUES (?1, ?2)",
        params![encode_uuid(v), encode_uuid(identity)],
      )?;
      v
    }
  };

  Ok((identity, version))
}

fn expect_type(conn: &Connection, a: Uuid, b: Uuid, expected: GroupType) -> Result<()> {
  let (ta, tb) = (group_type(conn, a)?, group_type(conn, b)?);
  if ta != expected || tb != expected {
    return Err(
      scholink_core::Error::GroupTypeMismatch { left_id: a, left: ta, right_id: b, right: tb }
        .into(),
    );
  }
  Ok(())
}

fn ordered(a: Uuid, b: Uuid) -> (Uuid, Uuid) { if a <= b { (a, b) } else { (b, a) } }

// ─── Merges ──────────────────────────────────────────────────────────────────

/// Outcome of [`merge_identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityMerge {
  pub merged:         Uuid,
  /// Set when the two groups lived in different Version groups, which
  /// were merged too.
  pub merged_version: Option<Uuid>,
}

/// Merge two Identity groups into a fresh one. `None` when `a == b`.
///
/// Their Version groups are merged first, so that Version edges are
/// already fused when the Identity edges that hang off them are.
pub fn merge_identity(conn: &Connection, a: Uuid, b: Uuid) -> Result<Option<IdentityMerge>> {
  if a == b {
    return Ok(None);
  }
  let (a, b) = ordered(a, b);
  expect_type(conn, a, b, GroupType::Identity)?;

  let va = version_group_of(conn, a)?.ok_or(Error::MissingGroup(a))?;
  let vb = version_group_of(conn, b)?.ok_or(Error::MissingGroup(b))?;
  let merged_version = merge_version(conn, va, vb)?;
  let version = merged_version.unwrap_or(va);

  let merged = create_group(conn, GroupType::Identity)?;
  merge_group_relationships(conn, a, b, merged, GroupType::Identity)?;

  let (ea, eb, em) = (encode_uuid(a), encode_uuid(b), encode_uuid(merged));
  conn.execute(
    "UPDATE identifier_groups SET group_id = ?3 WHERE group_id IN (?1, ?2)",
    params![ea, eb, em],
  )?;
  conn.execute("DELETE FROM group_m2m WHERE subgroup_id IN (?1, ?2)", params![ea, eb])?;
  conn.execute(
    "INSERT INTO group_m2m (group_id, subgroup_id) VALUES (?1, ?2)",
    params![encode_uuid(version), em],
  )?;

  coalesce::merge_group_metadata(conn, a, b, merged)?;
  conn.execute("DELETE FROM object_groups WHERE id IN (?1, ?2)", params![ea, eb])?;

  info!(%a, %b, %merged, "merged identity groups");
  Ok(Some(IdentityMerge { merged, merged_version }))
}

/// Merge two Version groups into a fresh one. `None` when `a == b`.
///
/// Identity sub-groups move to the merged group but are not merged with
/// each other.
pub fn merge_version(conn: &Connection, a: Uuid, b: Uuid) -> Result<Option<Uuid>> {
  if a == b {
    return Ok(None);
  }
  let (a, b) = ordered(a, b);
  expect_type(conn, a, b, GroupType::Version)?;

  let merged = create_group(conn, GroupType::Version)?;
  merge_group_relationships(conn, a, b, merged, GroupType::Version)?;

  let (ea, eb, em) = (encode_uuid(a), encode_uuid(b), encode_uuid(merged));
  conn.execute(
    "UPDATE group_m2m SET group_id = ?3 WHERE group_id IN (?1, ?2)",
    params![ea, eb, em],
  )?;

  coalesce::merge_group_metadata(conn, a, b, merged)?;
  conn.execute("DELETE FROM object_groups WHERE id IN (?1, ?2)", params![ea, eb])?;

  info!(%a, %b, %merged, "merged version groups");
  Ok(Some(merged))
}

/// Move every group edge incident on `a` or `b` onto `merged`.
///
/// 1. Edges between `a` and `b` are dropped; they would self-loop.
/// 2. Edges that would collide on `merged` (same other endpoint, relation
///    and direction) are fused into one replacement edge that inherits
///    their assertion links, parent and child links, and histories.
/// 3. The remaining edges are re-pointed at `merged`.
fn merge_group_relationships(
  conn: &Connection,
  a: Uuid,
  b: Uuid,
  merged: Uuid,
  kind: GroupType,
) -> Result<()> {
  let (ea, eb, em) = (encode_uuid(a), encode_uuid(b), encode_uuid(merged));

  conn.execute(
    "DELETE FROM group_relationships
      WHERE (source_id = ?1 AND target_id = ?2) OR (source_id = ?2 AND target_id = ?1)",
    params![ea, eb],
  )?;

  for (side, other) in [("source_id", "target_id"), ("target_id", "source_id")] {
    let mut stmt = conn.prepare(&format!(
      "SELECT id, {other}, relation FROM group_relationships
        WHERE {side} IN (?1, ?2)
        ORDER BY created_at, id"
    ))?;
    let rows: Vec<(String, String, String)> = stmt
      .query_map(params![ea, eb], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
      .collect::<rusqlite::Result<_>>()?;

    let mut buckets: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for (id, other_end, relation) in rows {
      buckets.entry((other_end, relation)).or_default().push(id);
    }

    for ((other_end, relation), duplicates) in buckets {
      if duplicates.len() < 2 {
        continue;
      }
      fuse_edges(conn, &duplicates, side, &em, &other_end, &relation, kind)?;
    }
  }

  conn.execute(
    "UPDATE group_relationships SET source_id = ?3 WHERE source_id IN (?1, ?2)",
    params![ea, eb, em],
  )?;
  conn.execute(
    "UPDATE group_relationships SET target_id = ?3 WHERE target_id IN (?1, ?2)",
    params![ea, eb, em],
  )?;
  Ok(())
}

/// Replace `duplicates` (ordered oldest first) with a single edge between
/// `merged` and `other_end`.
fn fuse_edges(
  conn: &Connection,
  duplicates: &[String],
  merged_side: &str,
  merged: &str,
  other_end: &str,
  relation: &str,
  kind: GroupType,
) -> Result<()> {
  let replacement = Uuid::new_v4();
  let er = encode_uuid(replacement);
  let (source, target) = if merged_side == "source_id" {
    (merged, other_end)
  } else {
    (other_end, merged)
  };

  let created_at: String = conn.query_row(
    &format!(
      "SELECT MIN(created_at) FROM group_relationships WHERE id IN ({})",
      placeholders(duplicates.len())
    ),
    rusqlite::params_from_iter(duplicates),
    |r| r.get(0),
  )?;
  conn.execute(
    "INSERT INTO group_relationships (id, type, relation, source_id, target_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![er, kind.as_ref(), relation, source, target, created_at],
  )?;

  let histories = duplicates
    .iter()
    .map(|dup| coalesce::history(conn, decode_uuid(dup)?))
    .collect::<Result<Vec<_>>>()?;
  let fused = RelationshipHistory::concatenated(histories);
  if !fused.is_empty() {
    coalesce::save_history(conn, replacement, &fused)?;
  }

  for dup in duplicates {
    conn.execute(
      "INSERT OR IGNORE INTO relationship_group_relationship (relationship_id, group_relationship_id)
       SELECT relationship_id, ?2 FROM relationship_group_relationship
        WHERE group_relationship_id = ?1",
      params![dup, er],
    )?;
    conn.execute(
      "INSERT OR IGNORE INTO group_relationship_m2m (relationship_id, subrelationship_id)
       SELECT ?2, subrelationship_id FROM group_relationship_m2m WHERE relationship_id = ?1",
      params![dup, er],
    )?;
    conn.execute(
      "INSERT OR IGNORE INTO group_relationship_m2m (relationship_id, subrelationship_id)
       SELECT relationship_id, ?2 FROM group_relationship_m2m WHERE subrelationship_id = ?1",
      params![dup, er],
    )?;
  }

  conn.execute(
    &format!("DELETE FROM group_relationships WHERE id IN ({})", placeholders(duplicates.len())),
    rusqlite::params_from_iter(duplicates),
  )?;

  debug!(replacement = %replacement, fused = duplicates.len(), relation, "fused group edges");
  Ok(())
}

fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

// ─── Group edges ─────────────────────────────────────────────────────────────

/// Return the edge `(source, target, relation)`, creating it if absent.
/// The flag reports whether it was created.
pub fn ensure_group_relationship(
  conn: &Connection,
  kind: GroupType,
  relation: Relation,
  source: Uuid,
  target: Uuid,
) -> Result<(Uuid, bool)> {
  let (es, et) = (encode_uuid(source), encode_uuid(target));
  let existing: Option<String> = conn
    .query_row(
      "SELECT id FROM group_relationships
        WHERE source_id = ?1 AND target_id = ?2 AND relation = ?3",
      params![es, et, relation.as_ref()],
      |r| r.get(0),
    )
    .optional()?;
  if let Some(id) = existing {
    return Ok((decode_uuid(&id)?, false));
  }

  let id = Uuid::new_v4();
  conn.execute(
    "INSERT INTO group_relationships (id, type, relation, source_id, target_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![encode_uuid(id), kind.as_ref(), relation.as_ref(), es, et, now()],
  )?;
  Ok((id, true))
}

// ─── Assertions ──────────────────────────────────────────────────────────────

/// Fold one assertion into the group graph.
///
/// `IsIdenticalTo` merges Identity groups, `HasVersion` merges Version
/// groups, and every other relation ensures an Identity edge (plus its
/// parent Version edge when the endpoints live in different Version
/// groups) and records the assertion's provenance on the Identity edge.
pub fn apply_assertion(
  conn: &Connection,
  source: &Identifier,
  target: &Identifier,
  relationship: &Relationship,
  history: &HistoryEntry,
) -> Result<GroupChange> {
  let (src_ig, src_vg) = attach(conn, source)?;
  let (trg_ig, trg_vg) = attach(conn, target)?;
  let mut change = GroupChange {
    src_ig,
    trg_ig,
    merged_ig: None,
    src_vg,
    trg_vg,
    merged_vg: None,
  };

  match relationship.relation {
    Relation::IsIdenticalTo => {
      if let Some(m) = merge_identity(conn, src_ig, trg_ig)? {
        change.merged_ig = Some(m.merged);
        change.merged_vg = m.merged_version;
      }
    }
    Relation::HasVersion => {
      change.merged_vg = merge_version(conn, src_vg, trg_vg)?;
    }
    relation => {
      if src_ig == trg_ig {
        debug!(relationship = %relationship.id, "endpoints share an identity group");
        return Ok(change);
      }
      let (edge, created) =
        ensure_group_relationship(conn, GroupType::Identity, relation, src_ig, trg_ig)?;
      conn.execute(
        "INSERT OR IGNORE INTO relationship_group_relationship
           (relationship_id, group_relationship_id) VALUES (?1, ?2)",
        params![encode_uuid(relationship.id), encode_uuid(edge)],
      )?;

      if src_vg != trg_vg {
        let (parent, _) =
          ensure_group_relationship(conn, GroupType::Version, relation, src_vg, trg_vg)?;
        conn.execute(
          "INSERT OR IGNORE INTO group_relationship_m2m (relationship_id, subrelationship_id)
           VALUES (?1, ?2)",
          params![encode_uuid(parent), encode_uuid(edge)],
        )?;
      }

      coalesce::append_history(conn, edge, history)?;
      if created {
        debug!(%edge, %relation, "created identity edge");
      }
    }
  }

  Ok(change)
}
