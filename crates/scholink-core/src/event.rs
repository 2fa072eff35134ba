//! Ingestion events, their weak links to the objects they touched, and the
//! error log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Processing state of an event. Transitions only move forward, except that
/// an operator rerun or the janitor may return an event to `New`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventStatus {
  New,
  Processing,
  Error,
  Done,
}

/// Whether the link packages of an event assert or retract relationships.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
  #[default]
  RelationshipCreated,
  RelationshipDeleted,
}

/// A persisted ingestion event. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  pub id:             Uuid,
  pub kind:           EventKind,
  pub status:         EventStatus,
  /// The raw list of link packages as received.
  pub payload:        serde_json::Value,
  /// SHA-256 hex digest of the canonical payload serialisation.
  pub payload_digest: String,
  pub user_id:        Option<String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`crate::graph::GraphStore::append_event`].
#[derive(Debug, Clone)]
pub struct NewEvent {
  pub kind:    EventKind,
  pub payload: serde_json::Value,
  pub user_id: Option<String>,
}

/// What kind of object an [`ObjectEvent`] points at.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum PayloadType {
  Identifier,
  Relationship,
}

/// Weak link from an event to an identifier or relationship it
/// materialised, with the index of the link package that did so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEvent {
  pub event_id:      Uuid,
  pub object_uuid:   Uuid,
  pub payload_type:  PayloadType,
  pub payload_index: u32,
}

/// Where in the pipeline an event failed.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ErrorOrigin {
  /// Validation or graph transaction.
  Graph,
  /// Index projection after the graph commit.
  Indexer,
}

/// A row of the error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
  pub id:         Uuid,
  pub event_id:   Uuid,
  pub origin:     ErrorOrigin,
  pub error:      String,
  pub n_retries:  u32,
  pub payload:    serde_json::Value,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::graph::GraphStore::record_error`].
#[derive(Debug, Clone)]
pub struct NewErrorRecord {
  pub event_id:  Uuid,
  pub origin:    ErrorOrigin,
  pub error:     String,
  pub n_retries: u32,
  pub payload:   serde_json::Value,
}

/// Selection of events for operator reruns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
  All,
  Status(EventStatus),
}

/// A unit of work on the event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventJob {
  pub event_id: Uuid,
  /// Zero for the first attempt.
  pub attempt:  u32,
}

impl EventJob {
  pub fn new(event_id: Uuid) -> Self { Self { event_id, attempt: 0 } }

  pub fn retry(self) -> Self { Self { attempt: self.attempt + 1, ..self } }
}
