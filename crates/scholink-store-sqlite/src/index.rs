//! [`SqliteIndex`]: a SQLite-backed [`SearchIndex`].
//!
//! Each suffixed index is a namespace of rows in `search_documents`; the
//! `search_aliases` table holds the read and write aliases. Documents are
//! stored whole as JSON next to flattened identifier and date rows used for
//! filtering.

use std::{collections::BTreeSet, path::Path};

use chrono::{Duration, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use scholink_core::{
  document::RelationshipDocument,
  index::{INDEX_PREFIX, READ_ALIAS, Rollover, SearchIndex, WRITE_ALIAS},
  query::{DocumentPage, DocumentQuery, Side},
};
use tracing::info;
use uuid::Uuid;

use crate::{
  Result,
  encode::{encode_dt, encode_uuid},
  schema::INDEX_SCHEMA,
};

/// The projected relationship index.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteIndex {
  conn: tokio_rusqlite::Connection,
}

impl SqliteIndex {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let index = Self { conn };
    index.init_schema().await?;
    Ok(index)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let index = Self { conn };
    index.init_schema().await?;
    Ok(index)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(INDEX_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Name of the index behind `alias`, if the alias exists.
  pub async fn alias_target(&self, alias: &'static str) -> Result<Option<String>> {
    self.conn.call(move |conn| Ok(alias_target(conn, alias))).await?
  }
}

// ─── Sync helpers ────────────────────────────────────────────────────────────

fn alias_target(conn: &Connection, alias: &str) -> Result<Option<String>> {
  Ok(
    conn
      .query_row(
        "SELECT index_name FROM search_aliases WHERE alias = ?1",
        params![alias],
        |r| r.get(0),
      )
      .optional()?,
  )
}

fn set_alias(conn: &Connection, alias: &str, index: &str) -> Result<()> {
  conn.execute(
    "INSERT INTO search_aliases (alias, index_name) VALUES (?1, ?2)
     ON CONFLICT (alias) DO UPDATE SET index_name = excluded.index_name",
    params![alias, index],
  )?;
  Ok(())
}

/// Create `relationships-<timestamp>` and point the write alias at it. The
/// read alias is pointed at it too when it does not exist yet.
fn create_index(conn: &Connection) -> Result<String> {
  let mut at = Utc::now();
  let name = loop {
    let name = format!("{INDEX_PREFIX}-{}", at.format("%Y%m%d%H%M%S%6f"));
    let inserted = conn.execute(
      "INSERT OR IGNORE INTO search_indices (name, created_at) VALUES (?1, ?2)",
      params![name, encode_dt(at)],
    )?;
    if inserted == 1 {
      break name;
    }
    at += Duration::microseconds(1);
  };

  set_alias(conn, WRITE_ALIAS, &name)?;
  if alias_target(conn, READ_ALIAS)?.is_none() {
    set_alias(conn, READ_ALIAS, &name)?;
  }
  info!(index = %name, "created index");
  Ok(name)
}

fn ensure_write_index(conn: &Connection) -> Result<String> {
  match alias_target(conn, WRITE_ALIAS)? {
    Some(name) => Ok(name),
    None => create_index(conn),
  }
}

fn index_names(conn: &Connection) -> Result<Vec<String>> {
  let mut stmt = conn.prepare("SELECT name FROM search_indices ORDER BY name DESC")?;
  let names = stmt
    .query_map([], |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(names)
}

fn delete_for_groups(conn: &mut Connection, groups: &BTreeSet<Uuid>) -> Result<u64> {
  let tx = conn.transaction()?;
  let index = ensure_write_index(&tx)?;
  let mut deleted = 0u64;
  {
    let mut stmt = tx.prepare(
      "DELETE FROM search_documents
        WHERE index_name = ?1 AND (source_group = ?2 OR target_group = ?2)",
    )?;
    for group in groups {
      deleted += stmt.execute(params![index, encode_uuid(*group)])? as u64;
    }
  }
  tx.commit()?;
  Ok(deleted)
}

fn bulk_index(conn: &mut Connection, docs: &[RelationshipDocument]) -> Result<usize> {
  let tx = conn.transaction()?;
  let index = ensure_write_index(&tx)?;
  {
    let mut remove =
      tx.prepare("DELETE FROM search_documents WHERE index_name = ?1 AND doc_id = ?2")?;
    let mut insert = tx.prepare(
      "INSERT INTO search_documents
         (index_name, doc_id, grouping, relation, source_group, target_group, body)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut ident = tx.prepare(
      "INSERT INTO search_identifiers (index_name, doc_id, side, value, scheme)
       VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let mut date =
      tx.prepare("INSERT INTO search_dates (index_name, doc_id, date) VALUES (?1, ?2, ?3)")?;

    for doc in docs {
      let id = encode_uuid(doc.id);
      remove.execute(params![index, id])?;
      insert.execute(params![
        index,
        id,
        doc.grouping.as_ref(),
        doc.relationship_type.as_ref(),
        encode_uuid(doc.source.id),
        encode_uuid(doc.target.id),
        serde_json::to_string(doc)?,
      ])?;
      for (side, object) in [(Side::Source, &doc.source), (Side::Target, &doc.target)] {
        for i in &object.search_identifier {
          ident.execute(params![index, id, side.as_str(), i.id, i.scheme])?;
        }
      }
      let dates: BTreeSet<&str> =
        doc.history.iter().map(|h| h.link_publication_date.as_str()).collect();
      for d in dates {
        date.execute(params![index, id, d])?;
      }
    }
  }
  tx.commit()?;
  Ok(docs.len())
}

const SEARCH_FILTER: &str = "
  FROM search_documents d
 WHERE d.index_name = ?1
   AND d.grouping = ?2
   AND d.relation = ?3
   AND EXISTS (SELECT 1 FROM search_identifiers s
                WHERE s.index_name = d.index_name AND s.doc_id = d.doc_id
                  AND s.side = ?4 AND s.value = ?5 AND s.scheme = ?6)
   AND ((?7 IS NULL AND ?8 IS NULL)
        OR EXISTS (SELECT 1 FROM search_dates t
                    WHERE t.index_name = d.index_name AND t.doc_id = d.doc_id
                      AND (?7 IS NULL OR t.date >= ?7)
                      AND (?8 IS NULL OR t.date <= ?8)))";

fn search(conn: &Connection, query: &DocumentQuery) -> Result<DocumentPage> {
  let mut page = DocumentPage {
    total: 0,
    page:  query.page,
    size:  query.size,
    hits:  Vec::new(),
  };
  let Some(index) = alias_target(conn, READ_ALIAS)? else {
    return Ok(page);
  };

  let (relation, side) = query.relation.resolve();
  let grouping = query.grouping.as_ref();
  let relation = relation.as_ref();
  let side = side.as_str();
  let (value, scheme) = (&query.identifier.value, &query.identifier.scheme);
  let from = query.from.map(|d| d.format("%Y-%m-%d").to_string());
  let to = query.to.map(|d| d.format("%Y-%m-%d").to_string());

  let total: i64 = conn.query_row(
    &format!("SELECT COUNT(*) {SEARCH_FILTER}"),
    params![index, grouping, relation, side, value, scheme, from, to],
    |r| r.get(0),
  )?;
  page.total = total.max(0) as u64;

  let mut stmt = conn.prepare(&format!(
    "SELECT d.body {SEARCH_FILTER} ORDER BY d.doc_id LIMIT ?9 OFFSET ?10"
  ))?;
  let bodies = stmt
    .query_map(
      params![
        index,
        grouping,
        relation,
        side,
        value,
        scheme,
        from,
        to,
        query.size as i64,
        query.offset() as i64,
      ],
      |r| r.get::<_, String>(0),
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  page.hits = bodies
    .iter()
    .map(|b| serde_json::from_str(b))
    .collect::<serde_json::Result<_>>()?;
  Ok(page)
}

fn rollover(conn: &mut Connection, keep_old: Option<usize>) -> Result<Rollover> {
  let tx = conn.transaction()?;
  let read_index = ensure_write_index(&tx)?;
  set_alias(&tx, READ_ALIAS, &read_index)?;

  let mut deleted = Vec::new();
  if let Some(keep) = keep_old {
    let older = index_names(&tx)?
      .into_iter()
      .filter(|name| *name < read_index)
      .skip(keep);
    for name in older {
      tx.execute("DELETE FROM search_documents WHERE index_name = ?1", params![name])?;
      tx.execute("DELETE FROM search_indices WHERE name = ?1", params![name])?;
      deleted.push(name);
    }
  }
  tx.commit()?;

  info!(index = %read_index, deleted = deleted.len(), "rolled over read alias");
  Ok(Rollover { read_index, deleted })
}

// ─── SearchIndex impl ────────────────────────────────────────────────────────

impl SearchIndex for SqliteIndex {
  type Error = crate::Error;

  async fn write_index(&self) -> Result<String> {
    self.conn.call(|conn| Ok(ensure_write_index(conn))).await?
  }

  async fn create_index(&self) -> Result<String> {
    self.conn.call(|conn| Ok(create_index(conn))).await?
  }

  async fn list_indices(&self) -> Result<Vec<String>> {
    self.conn.call(|conn| Ok(index_names(conn))).await?
  }

  async fn delete_for_groups<'a>(&'a self, groups: &'a BTreeSet<Uuid>) -> Result<u64> {
    let groups = groups.clone();
    self
      .conn
      .call(move |conn| Ok(delete_for_groups(conn, &groups)))
      .await?
  }

  async fn bulk_index(&self, docs: Vec<RelationshipDocument>) -> Result<usize> {
    self.conn.call(move |conn| Ok(bulk_index(conn, &docs))).await?
  }

  async fn search<'a>(&'a self, query: &'a DocumentQuery) -> Result<DocumentPage> {
    let query = query.clone();
    self.conn.call(move |conn| Ok(search(conn, &query))).await?
  }

  async fn rollover(&self, keep_old: Option<usize>) -> Result<Rollover> {
    self.conn.call(move |conn| Ok(rollover(conn, keep_old))).await?
  }
}
