//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order is chronological. Enums are
//! stored by their `strum` names. UUIDs are hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use scholink_core::{
  event::{ErrorRecord, Event},
  identifier::Identifier,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn now() -> String { encode_dt(Utc::now()) }

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::UnknownValue { column, value: s.to_owned() })
}

// ─── Payloads ────────────────────────────────────────────────────────────────

/// SHA-256 of the compact JSON encoding. `serde_json` maps are key-sorted,
/// so equal documents hash equally regardless of their wire key order.
pub fn payload_digest(payload: &serde_json::Value) -> Result<String> {
  let bytes = serde_json::to_vec(payload)?;
  Ok(hex::encode(Sha256::digest(&bytes)))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `events` row.
pub struct RawEvent {
  pub id:             String,
  pub kind:           String,
  pub status:         String,
  pub payload:        String,
  pub payload_digest: String,
  pub user_id:        Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawEvent {
  pub const COLUMNS: &'static str =
    "id, kind, status, payload, payload_digest, user_id, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      kind:           row.get(1)?,
      status:         row.get(2)?,
      payload:        row.get(3)?,
      payload_digest: row.get(4)?,
      user_id:        row.get(5)?,
      created_at:     row.get(6)?,
      updated_at:     row.get(7)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      id:             decode_uuid(&self.id)?,
      kind:           decode_enum("events.kind", &self.kind)?,
      status:         decode_enum("events.status", &self.status)?,
      payload:        serde_json::from_str(&self.payload)?,
      payload_digest: self.payload_digest,
      user_id:        self.user_id,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `error_monitoring` row.
pub struct RawErrorRecord {
  pub id:         String,
  pub event_id:   String,
  pub origin:     String,
  pub error:      String,
  pub n_retries:  u32,
  pub payload:    String,
  pub created_at: String,
}

impl RawErrorRecord {
  pub const COLUMNS: &'static str =
    "id, event_id, origin, error, n_retries, payload, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      event_id:   row.get(1)?,
      origin:     row.get(2)?,
      error:      row.get(3)?,
      n_retries:  row.get(4)?,
      payload:    row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<ErrorRecord> {
    Ok(ErrorRecord {
      id:         decode_uuid(&self.id)?,
      event_id:   decode_uuid(&self.event_id)?,
      origin:     decode_enum("error_monitoring.origin", &self.origin)?,
      error:      self.error,
      n_retries:  self.n_retries,
      payload:    serde_json::from_str(&self.payload)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `identifiers` row.
pub struct RawIdentifier {
  pub id:     String,
  pub value:  String,
  pub scheme: String,
}

impl RawIdentifier {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { id: row.get(0)?, value: row.get(1)?, scheme: row.get(2)? })
  }

  pub fn into_identifier(self) -> Result<Identifier> {
    Ok(Identifier { id: decode_uuid(&self.id)?, value: self.value, scheme: self.scheme })
  }
}
