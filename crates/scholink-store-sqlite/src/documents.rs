//! Relationship documents built from the group graph, for the index
//! projector and for graph-direct queries.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rusqlite::{Connection, OptionalExtension as _, params};
use scholink_core::{
  compact::CompactedGroups,
  document::{DocumentObject, IdentifierRef, RelationshipDocument, document_id},
  group::{GroupRelationship, GroupType},
  metadata::{ObjectMetadata, RelationshipHistory},
  relation::Relation,
};
use uuid::Uuid;

use crate::{
  Error, Result, coalesce,
  encode::{decode_enum, decode_uuid, encode_uuid},
  grouping, identifiers,
};

// ─── Edge rows ───────────────────────────────────────────────────────────────

const EDGE_COLUMNS: &str = "id, type, relation, source_id, target_id";

fn edge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<[String; 5]> {
  Ok([row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?])
}

fn decode_edge([id, kind, relation, source, target]: [String; 5]) -> Result<GroupRelationship> {
  Ok(GroupRelationship {
    id:       decode_uuid(&id)?,
    kind:     decode_enum("group_relationships.type", &kind)?,
    relation: decode_enum("group_relationships.relation", &relation)?,
    source:   decode_uuid(&source)?,
    target:   decode_uuid(&target)?,
  })
}

fn query_edges(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<GroupRelationship>> {
  let mut stmt = conn.prepare_cached(sql)?;
  let raws = stmt
    .query_map(params, edge_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(decode_edge).collect()
}

/// Edges with `group` at either end, oldest first.
pub fn edges_touching(conn: &Connection, group: Uuid) -> Result<Vec<GroupRelationship>> {
  query_edges(
    conn,
    &format!(
      "SELECT {EDGE_COLUMNS} FROM group_relationships
        WHERE source_id = ?1 OR target_id = ?1 ORDER BY created_at, id"
    ),
    params![encode_uuid(group)],
  )
}

/// Edges of `relation` with `group` on the given end (`source_id` or
/// `target_id`).
pub fn edges_on_side(
  conn: &Connection,
  group: Uuid,
  relation: Relation,
  column: &str,
) -> Result<Vec<GroupRelationship>> {
  query_edges(
    conn,
    &format!(
      "SELECT {EDGE_COLUMNS} FROM group_relationships
        WHERE {column} = ?1 AND relation = ?2 ORDER BY created_at, id"
    ),
    params![encode_uuid(group), relation.as_ref()],
  )
}

pub fn all_edges(conn: &Connection) -> Result<Vec<GroupRelationship>> {
  query_edges(
    conn,
    &format!("SELECT {EDGE_COLUMNS} FROM group_relationships ORDER BY created_at, id"),
    [],
  )
}

/// Identity sub-edges of a Version edge, oldest first.
fn sub_edges(conn: &Connection, version_edge: Uuid) -> Result<Vec<Uuid>> {
  let mut stmt = conn.prepare_cached(
    "SELECT g.id FROM group_relationship_m2m m
       JOIN group_relationships g ON g.id = m.subrelationship_id
      WHERE m.relationship_id = ?1
      ORDER BY g.created_at, g.id",
  )?;
  let ids: Vec<String> = stmt
    .query_map(params![encode_uuid(version_edge)], |r| r.get(0))?
    .collect::<rusqlite::Result<_>>()?;
  ids.iter().map(|s| decode_uuid(s)).collect()
}

// ─── Version roots ───────────────────────────────────────────────────────────

/// The Identity sub-group whose metadata represents a Version group.
///
/// Starting from the lowest sub-group ID, follow `HasVersion` assertions
/// backwards to their source until no predecessor exists. A node already
/// visited ends the walk at the current node.
pub fn version_root(conn: &Connection, version_group: Uuid) -> Result<Option<Uuid>> {
  let Some(mut current) = grouping::subgroups(conn, version_group)?.first().copied() else {
    return Ok(None);
  };
  let mut visited = BTreeSet::from([current]);

  loop {
    let parent: Option<String> = conn
      .query_row(
        "SELECT sg.group_id
           FROM relationships r
           JOIN identifier_groups tg ON tg.identifier_id = r.target_id
           JOIN identifier_groups sg ON sg.identifier_id = r.source_id
          WHERE r.relation = ?2 AND tg.group_id = ?1 AND sg.group_id != ?1
          ORDER BY sg.group_id
          LIMIT 1",
        params![encode_uuid(current), Relation::HasVersion.as_ref()],
        |r| r.get(0),
      )
      .optional()?;
    let Some(parent) = parent else { break };
    let parent = decode_uuid(&parent)?;
    if !visited.insert(parent) {
      break;
    }
    current = parent;
  }
  Ok(Some(current))
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Builds documents, memoising endpoint objects across edges.
pub struct DocumentBuilder<'c> {
  conn:     &'c Connection,
  ig_to_vg: BTreeMap<Uuid, Uuid>,
  metadata: HashMap<Uuid, ObjectMetadata>,
  objects:  HashMap<Uuid, DocumentObject>,
}

impl<'c> DocumentBuilder<'c> {
  pub fn new(conn: &'c Connection) -> Self {
    Self {
      conn,
      ig_to_vg: BTreeMap::new(),
      metadata: HashMap::new(),
      objects: HashMap::new(),
    }
  }

  /// Seed the Identity → Version lookup with an already-known mapping.
  pub fn with_versions(mut self, ig_to_vg: &BTreeMap<Uuid, Uuid>) -> Self {
    self.ig_to_vg.extend(ig_to_vg.iter().map(|(k, v)| (*k, *v)));
    self
  }

  fn version_of(&mut self, identity_group: Uuid) -> Result<Uuid> {
    if let Some(vg) = self.ig_to_vg.get(&identity_group) {
      return Ok(*vg);
    }
    let vg = grouping::version_group_of(self.conn, identity_group)?
      .ok_or(Error::MissingGroup(identity_group))?;
    self.ig_to_vg.insert(identity_group, vg);
    Ok(vg)
  }

  /// Metadata of a Version group: that of its root Identity sub-group.
  fn version_metadata(&mut self, version_group: Uuid) -> Result<ObjectMetadata> {
    if let Some(m) = self.metadata.get(&version_group) {
      return Ok(m.clone());
    }
    let metadata = match version_root(self.conn, version_group)? {
      Some(root) => coalesce::group_metadata(self.conn, root)?
        .map(|(m, _)| m)
        .unwrap_or_default(),
      None => ObjectMetadata::default(),
    };
    self.metadata.insert(version_group, metadata.clone());
    Ok(metadata)
  }

  fn object(&mut self, group: Uuid, kind: GroupType) -> Result<DocumentObject> {
    if let Some(o) = self.objects.get(&group) {
      return Ok(o.clone());
    }
    let (members, metadata) = match kind {
      GroupType::Identity => {
        let vg = self.version_of(group)?;
        (identifiers::of_group(self.conn, group)?, self.version_metadata(vg)?)
      }
      GroupType::Version => (
        identifiers::of_version_group(self.conn, group)?,
        self.version_metadata(group)?,
      ),
    };
    let refs: Vec<IdentifierRef> = members.iter().map(IdentifierRef::from).collect();
    let object = DocumentObject {
      id: group,
      identifier: refs.clone(),
      search_identifier: refs,
      metadata,
    };
    self.objects.insert(group, object.clone());
    Ok(object)
  }

  pub fn document(&mut self, edge: &GroupRelationship) -> Result<RelationshipDocument> {
    let history = match edge.kind {
      GroupType::Identity => coalesce::history(self.conn, edge.id)?,
      GroupType::Version => {
        let mut histories = Vec::new();
        for sub in sub_edges(self.conn, edge.id)? {
          histories.push(coalesce::history(self.conn, sub)?);
        }
        RelationshipHistory::concatenated(histories)
      }
    };
    Ok(RelationshipDocument {
      id:                document_id(edge.source, edge.id, edge.target),
      grouping:          edge.kind,
      relationship_type: edge.relation,
      history:           history.0,
      source:            self.object(edge.source, edge.kind)?,
      target:            self.object(edge.target, edge.kind)?,
    })
  }
}

/// Every document with an endpoint in `idx_ig` or `idx_vg`, ordered by ID.
/// Groups that no longer exist are skipped.
pub fn documents_for(conn: &Connection, groups: &CompactedGroups) -> Result<Vec<RelationshipDocument>> {
  let mut builder = DocumentBuilder::new(conn).with_versions(&groups.ig_to_vg);
  let mut docs = BTreeMap::new();

  for group in groups.idx_ig.iter().chain(groups.idx_vg.iter()) {
    for edge in edges_touching(conn, *group)? {
      let id = document_id(edge.source, edge.id, edge.target);
      if !docs.contains_key(&id) {
        docs.insert(id, builder.document(&edge)?);
      }
    }
  }
  Ok(docs.into_values().collect())
}

/// The full group set, for reindexing.
pub fn all_groups(conn: &Connection) -> Result<CompactedGroups> {
  let mut out = CompactedGroups::default();

  let mut stmt = conn.prepare("SELECT id, type FROM object_groups")?;
  let rows: Vec<(String, String)> = stmt
    .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
    .collect::<rusqlite::Result<_>>()?;
  for (id, kind) in rows {
    let id = decode_uuid(&id)?;
    match decode_enum("object_groups.type", &kind)? {
      GroupType::Identity => out.idx_ig.insert(id),
      GroupType::Version => out.idx_vg.insert(id),
    };
  }

  let mut stmt = conn.prepare("SELECT subgroup_id, group_id FROM group_m2m")?;
  let rows: Vec<(String, String)> = stmt
    .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
    .collect::<rusqlite::Result<_>>()?;
  for (ig, vg) in rows {
    out.ig_to_vg.insert(decode_uuid(&ig)?, decode_uuid(&vg)?);
  }
  Ok(out)
}
