//! Metadata coalescer persistence: group metadata and group-edge history
//! rows, and how they combine when groups merge.

use rusqlite::{Connection, OptionalExtension as _, params};
use scholink_core::metadata::{HistoryEntry, ObjectMetadata, RelationshipHistory};
use uuid::Uuid;

use crate::{
  Result,
  encode::{encode_uuid, now},
};

// ─── Group metadata ──────────────────────────────────────────────────────────

/// Stored metadata of a group with its last update timestamp.
pub fn group_metadata(conn: &Connection, group: Uuid) -> Result<Option<(ObjectMetadata, String)>> {
  let row: Option<(String, String)> = conn
    .query_row(
      "SELECT json, updated_at FROM group_metadata WHERE group_id = ?1",
      params![encode_uuid(group)],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;
  row
    .map(|(json, at)| Ok((serde_json::from_str(&json)?, at)))
    .transpose()
}

fn save_group_metadata(conn: &Connection, group: Uuid, metadata: &ObjectMetadata) -> Result<()> {
  conn.execute(
    "INSERT INTO group_metadata (group_id, json, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT (group_id) DO UPDATE SET json = excluded.json, updated_at = excluded.updated_at",
    params![encode_uuid(group), serde_json::to_string(metadata)?, now()],
  )?;
  Ok(())
}

/// Fold `incoming` into the group's metadata. Returns whether anything was
/// written; an update that changes nothing leaves the row untouched.
pub fn update_group_metadata(
  conn: &Connection,
  group: Uuid,
  incoming: &ObjectMetadata,
) -> Result<bool> {
  let current = group_metadata(conn, group)?.map(|(m, _)| m);
  let mut next = current.clone().unwrap_or_default();
  next.update(incoming);
  if current.as_ref() == Some(&next) {
    return Ok(false);
  }
  save_group_metadata(conn, group, &next)?;
  Ok(true)
}

/// Give `merged` the combined metadata of `a` and `b`: overridable keys
/// from whichever was updated more recently, mergeable keys from both.
pub fn merge_group_metadata(conn: &Connection, a: Uuid, b: Uuid, merged: Uuid) -> Result<()> {
  let combined = match (group_metadata(conn, a)?, group_metadata(conn, b)?) {
    (Some((ma, at_a)), Some((mb, at_b))) => {
      if at_a <= at_b {
        ObjectMetadata::merged(&ma, &mb)
      } else {
        ObjectMetadata::merged(&mb, &ma)
      }
    }
    (Some((m, _)), None) | (None, Some((m, _))) => m,
    (None, None) => return Ok(()),
  };
  save_group_metadata(conn, merged, &combined)
}

// ─── Group-edge history ──────────────────────────────────────────────────────

pub fn history(conn: &Connection, group_relationship: Uuid) -> Result<RelationshipHistory> {
  let json: Option<String> = conn
    .query_row(
      "SELECT json FROM group_relationship_metadata WHERE group_relationship_id = ?1",
      params![encode_uuid(group_relationship)],
      |r| r.get(0),
    )
    .optional()?;
  match json {
    Some(json) => Ok(serde_json::from_str(&json)?),
    None => Ok(RelationshipHistory::default()),
  }
}

pub fn save_history(
  conn: &Connection,
  group_relationship: Uuid,
  history: &RelationshipHistory,
) -> Result<()> {
  conn.execute(
    "INSERT INTO group_relationship_metadata (group_relationship_id, json, updated_at)
     VALUES (?1, ?2, ?3)
     ON CONFLICT (group_relationship_id)
     DO UPDATE SET json = excluded.json, updated_at = excluded.updated_at",
    params![encode_uuid(group_relationship), serde_json::to_string(history)?, now()],
  )?;
  Ok(())
}

/// Append one provenance entry to an Identity edge's history unless an
/// identical entry is already present.
pub fn append_history(
  conn: &Connection,
  group_relationship: Uuid,
  entry: &HistoryEntry,
) -> Result<bool> {
  let mut current = history(conn, group_relationship)?;
  if current.extend([entry.clone()]) == 0 {
    return Ok(false);
  }
  save_history(conn, group_relationship, &current)?;
  Ok(true)
}
