//! Event rows and the error log.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use scholink_core::{
  event::{
    ErrorRecord, Event, EventFilter, EventStatus, NewErrorRecord, NewEvent,
  },
  identifier::Identifier,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawErrorRecord, RawEvent, RawIdentifier, decode_uuid, encode_dt, encode_uuid,
    payload_digest,
  },
};

pub fn insert(conn: &Connection, new: NewEvent) -> Result<Event> {
  let now = Utc::now();
  let event = Event {
    id:             Uuid::new_v4(),
    kind:           new.kind,
    status:         EventStatus::New,
    payload_digest: payload_digest(&new.payload)?,
    payload:        new.payload,
    user_id:        new.user_id,
    created_at:     now,
    updated_at:     now,
  };

  conn.execute(
    "INSERT INTO events
       (id, kind, status, payload, payload_digest, user_id, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
    params![
      encode_uuid(event.id),
      event.kind.as_ref(),
      event.status.as_ref(),
      serde_json::to_string(&event.payload)?,
      event.payload_digest,
      event.user_id,
      encode_dt(now),
    ],
  )?;
  Ok(event)
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Event>> {
  conn
    .query_row(
      &format!("SELECT {} FROM events WHERE id = ?1", RawEvent::COLUMNS),
      params![encode_uuid(id)],
      RawEvent::from_row,
    )
    .optional()?
    .map(RawEvent::into_event)
    .transpose()
}

/// Event IDs in arrival order.
pub fn list_ids(conn: &Connection, filter: EventFilter) -> Result<Vec<Uuid>> {
  let ids: Vec<String> = match filter {
    EventFilter::All => {
      let mut stmt = conn.prepare("SELECT id FROM events ORDER BY created_at, id")?;
      stmt
        .query_map([], |r| r.get(0))?
        .collect::<rusqlite::Result<_>>()?
    }
    EventFilter::Status(status) => {
      let mut stmt =
        conn.prepare("SELECT id FROM events WHERE status = ?1 ORDER BY created_at, id")?;
      stmt
        .query_map(params![status.as_ref()], |r| r.get(0))?
        .collect::<rusqlite::Result<_>>()?
    }
  };
  ids.iter().map(|s| decode_uuid(s)).collect()
}

pub fn ids_with_digest(conn: &Connection, digest: &str) -> Result<Vec<Uuid>> {
  let mut stmt =
    conn.prepare("SELECT id FROM events WHERE payload_digest = ?1 ORDER BY created_at")?;
  let ids: Vec<String> = stmt
    .query_map(params![digest], |r| r.get(0))?
    .collect::<rusqlite::Result<_>>()?;
  ids.iter().map(|s| decode_uuid(s)).collect()
}

pub fn set_status(conn: &Connection, id: Uuid, status: EventStatus) -> Result<()> {
  let changed = conn.execute(
    "UPDATE events SET status = ?2, updated_at = ?3 WHERE id = ?1",
    params![encode_uuid(id), status.as_ref(), encode_dt(Utc::now())],
  )?;
  if changed == 0 {
    return Err(Error::EventNotFound(id));
  }
  Ok(())
}

/// Events left in `Processing` since before `before`.
pub fn stale_processing(conn: &Connection, before: DateTime<Utc>) -> Result<Vec<Uuid>> {
  let mut stmt = conn.prepare(
    "SELECT id FROM events WHERE status = ?1 AND updated_at < ?2 ORDER BY created_at",
  )?;
  let ids: Vec<String> = stmt
    .query_map(
      params![EventStatus::Processing.as_ref(), encode_dt(before)],
      |r| r.get(0),
    )?
    .collect::<rusqlite::Result<_>>()?;
  ids.iter().map(|s| decode_uuid(s)).collect()
}

/// Identifiers an event materialised, in payload order.
pub fn identifiers(conn: &Connection, event_id: Uuid) -> Result<Vec<Identifier>> {
  let mut stmt = conn.prepare(
    "SELECT DISTINCT i.id, i.value, i.scheme
       FROM object_events o
       JOIN identifiers i ON i.id = o.object_uuid
      WHERE o.event_id = ?1 AND o.payload_type = 'Identifier'
      ORDER BY i.scheme, i.value",
  )?;
  let raws = stmt
    .query_map(params![encode_uuid(event_id)], RawIdentifier::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawIdentifier::into_identifier).collect()
}

// ─── Error log ───────────────────────────────────────────────────────────────

pub fn record_error(conn: &Connection, new: NewErrorRecord) -> Result<ErrorRecord> {
  let record = ErrorRecord {
    id:         Uuid::new_v4(),
    event_id:   new.event_id,
    origin:     new.origin,
    error:      new.error,
    n_retries:  new.n_retries,
    payload:    new.payload,
    created_at: Utc::now(),
  };
  conn.execute(
    "INSERT INTO error_monitoring (id, event_id, origin, error, n_retries, payload, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      encode_uuid(record.id),
      encode_uuid(record.event_id),
      record.origin.to_string(),
      record.error,
      record.n_retries,
      serde_json::to_string(&record.payload)?,
      encode_dt(record.created_at),
    ],
  )?;
  Ok(record)
}

pub fn list_errors(conn: &Connection, event_id: Option<Uuid>) -> Result<Vec<ErrorRecord>> {
  let raws = match event_id {
    Some(id) => {
      let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM error_monitoring WHERE event_id = ?1 ORDER BY created_at DESC",
        RawErrorRecord::COLUMNS
      ))?;
      stmt
        .query_map(params![encode_uuid(id)], RawErrorRecord::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?
    }
    None => {
      let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM error_monitoring ORDER BY created_at DESC",
        RawErrorRecord::COLUMNS
      ))?;
      stmt
        .query_map([], RawErrorRecord::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?
    }
  };
  raws.into_iter().map(RawErrorRecord::into_record).collect()
}
