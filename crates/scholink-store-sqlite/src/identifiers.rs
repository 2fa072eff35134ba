//! Identifier store: canonical `(value, scheme)` rows with stable IDs.

use rusqlite::{Connection, OptionalExtension as _, params};
use scholink_core::identifier::{Identifier, IdentifierKey};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{RawIdentifier, encode_uuid, now},
};

/// Return the stored identifier for `key`, inserting it on first mention.
///
/// Racing inserts of the same key resolve to the row that won the unique
/// constraint.
pub fn get_or_create(conn: &Connection, key: &IdentifierKey) -> Result<Identifier> {
  if let Some(found) = find(conn, key)? {
    return Ok(found);
  }

  let id = Uuid::new_v4();
  let inserted = conn.execute(
    "INSERT OR IGNORE INTO identifiers (id, value, scheme, created_at)
     VALUES (?1, ?2, ?3, ?4)",
    params![encode_uuid(id), key.value, key.scheme, now()],
  )?;

  if inserted == 0 {
    return find(conn, key)?.ok_or(rusqlite::Error::QueryReturnedNoRows.into());
  }

  debug!(%key, %id, "created identifier");
  Ok(Identifier { id, value: key.value.clone(), scheme: key.scheme.clone() })
}

pub fn find(conn: &Connection, key: &IdentifierKey) -> Result<Option<Identifier>> {
  conn
    .query_row(
      "SELECT id, value, scheme FROM identifiers WHERE value = ?1 AND scheme = ?2",
      params![key.value, key.scheme],
      RawIdentifier::from_row,
    )
    .optional()?
    .map(RawIdentifier::into_identifier)
    .transpose()
}

/// Members of an Identity group, ordered by scheme then value.
pub fn of_group(conn: &Connection, group: Uuid) -> Result<Vec<Identifier>> {
  let mut stmt = conn.prepare_cached(
    "SELECT i.id, i.value, i.scheme
       FROM identifiers i
       JOIN identifier_groups g ON g.identifier_id = i.id
      WHERE g.group_id = ?1
      ORDER BY i.scheme, i.value",
  )?;
  let raws = stmt
    .query_map(params![encode_uuid(group)], RawIdentifier::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawIdentifier::into_identifier).collect()
}

/// Members of every Identity sub-group of a Version group.
pub fn of_version_group(conn: &Connection, group: Uuid) -> Result<Vec<Identifier>> {
  let mut stmt = conn.prepare_cached(
    "SELECT i.id, i.value, i.scheme
       FROM identifiers i
       JOIN identifier_groups g ON g.identifier_id = i.id
       JOIN group_m2m m         ON m.subgroup_id = g.group_id
      WHERE m.group_id = ?1
      ORDER BY i.scheme, i.value",
  )?;
  let raws = stmt
    .query_map(params![encode_uuid(group)], RawIdentifier::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawIdentifier::into_identifier).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::graph_connection;

  fn doi(v: &str) -> IdentifierKey { IdentifierKey::normalized(v, "doi").unwrap() }

  #[test]
  fn get_or_create_is_idempotent() {
    let conn = graph_connection();
    let a = get_or_create(&conn, &doi("10.1/A")).unwrap();
    let b = get_or_create(&conn, &doi("https://doi.org/10.1/a")).unwrap();
    assert_eq!(a, b);
    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM identifiers", [], |r| r.get(0))
      .unwrap();
    assert_eq!(count, 1);
  }

  #[test]
  fn same_value_in_other_scheme_is_distinct() {
    let conn = graph_connection();
    let a = get_or_create(&conn, &doi("10.1/a")).unwrap();
    let b = get_or_create(&conn, &IdentifierKey::normalized("10.1/a", "url").unwrap()).unwrap();
    assert_ne!(a.id, b.id);
  }

  #[test]
  fn preexisting_row_is_reused() {
    let conn = graph_connection();
    let key = doi("10.1/existing");
    let winner = Uuid::new_v4();
    conn
      .execute(
        "INSERT INTO identifiers (id, value, scheme, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![encode_uuid(winner), key.value, key.scheme, now()],
      )
      .unwrap();
    assert_eq!(get_or_create(&conn, &key).unwrap().id, winner);
  }
}
