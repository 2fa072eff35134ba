//! Assertion log: raw relationship triples and the weak links from events
//! to the objects they materialised.

use rusqlite::{Connection, OptionalExtension as _, params};
use scholink_core::{
  event::PayloadType,
  group::Relationship,
  identifier::Identifier,
  relation::Relation,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{decode_uuid, encode_uuid, now},
};

/// Ensure the `(source, target, relation)` row exists with the given
/// `deleted` flag. Deletion is logical; no row is ever removed.
pub fn ensure_relationship(
  conn: &Connection,
  source: &Identifier,
  target: &Identifier,
  relation: Relation,
  deleted: bool,
) -> Result<Relationship> {
  let existing: Option<(String, bool)> = conn
    .query_row(
      "SELECT id, deleted FROM relationships
        WHERE source_id = ?1 AND target_id = ?2 AND relation = ?3",
      params![encode_uuid(source.id), encode_uuid(target.id), relation.as_ref()],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;

  let id = match existing {
    Some((id, was_deleted)) => {
      if was_deleted != deleted {
        conn.execute(
          "UPDATE relationships SET deleted = ?2, updated_at = ?3 WHERE id = ?1",
          params![id, deleted, now()],
        )?;
        debug!(relationship = %id, deleted, "relationship flag changed");
      }
      decode_uuid(&id)?
    }
    None => {
      let id = Uuid::new_v4();
      let at = now();
      conn.execute(
        "INSERT INTO relationships
           (id, source_id, target_id, relation, deleted, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
          encode_uuid(id),
          encode_uuid(source.id),
          encode_uuid(target.id),
          relation.as_ref(),
          deleted,
          at,
        ],
      )?;
      id
    }
  };

  Ok(Relationship { id, source: source.id, target: target.id, relation, deleted })
}

/// Record that `event_id` touched `object` while processing link package
/// `payload_index`. Repeated calls are no-ops.
pub fn link_object_event(
  conn: &Connection,
  event_id: Uuid,
  object: Uuid,
  payload_type: PayloadType,
  payload_index: u32,
) -> Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO object_events (event_id, object_uuid, payload_type, payload_index)
     VALUES (?1, ?2, ?3, ?4)",
    params![
      encode_uuid(event_id),
      encode_uuid(object),
      payload_type.to_string(),
      payload_index,
    ],
  )?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use scholink_core::identifier::IdentifierKey;

  use super::*;
  use crate::{identifiers, schema::graph_connection};

  fn ident(conn: &Connection, v: &str) -> Identifier {
    identifiers::get_or_create(conn, &IdentifierKey::normalized(v, "doi").unwrap()).unwrap()
  }

  #[test]
  fn relationship_is_unique_per_triple() {
    let conn = graph_connection();
    let (a, b) = (ident(&conn, "10.1/a"), ident(&conn, "10.1/b"));
    let r1 = ensure_relationship(&conn, &a, &b, Relation::Cites, false).unwrap();
    let r2 = ensure_relationship(&conn, &a, &b, Relation::Cites, false).unwrap();
    let r3 = ensure_relationship(&conn, &a, &b, Relation::IsSupplementTo, false).unwrap();
    assert_eq!(r1.id, r2.id);
    assert_ne!(r1.id, r3.id);
  }

  #[test]
  fn delete_then_recreate_toggles_flag() {
    let conn = graph_connection();
    let (a, b) = (ident(&conn, "10.1/a"), ident(&conn, "10.1/b"));
    let created = ensure_relationship(&conn, &a, &b, Relation::Cites, false).unwrap();
    let deleted = ensure_relationship(&conn, &a, &b, Relation::Cites, true).unwrap();
    assert_eq!(created.id, deleted.id);
    assert!(deleted.deleted);
    let again = ensure_relationship(&conn, &a, &b, Relation::Cites, false).unwrap();
    assert!(!again.deleted);
    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM relationships", [], |r| r.get(0))
      .unwrap();
    assert_eq!(count, 1);
  }

  #[test]
  fn self_relationship_violates_check() {
    let conn = graph_connection();
    let a = ident(&conn, "10.1/a");
    assert!(ensure_relationship(&conn, &a, &a, Relation::Cites, false).is_err());
  }
}
