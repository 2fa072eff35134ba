//! Link-package decoding.
//!
//! Pipeline per package:
//!   serde_json::Value
//!     └─ parse_object() × 2        → AssertedObject (normalised key + metadata)
//!     └─ relationship_type()       → NormalizedRelation
//!     └─ HistoryEntry decode       → provenance
//!          └─ inversion swap, self-link check → Assertion

use scholink_core::{
  Error as CoreError,
  assertion::{AssertedObject, Assertion},
  identifier::IdentifierKey,
  metadata::{HistoryEntry, ObjectMetadata},
  relation::{NormalizedRelation, Relation},
};
use serde_json::Value;

use crate::error::{Error, Result};

/// Schema name under which `SubType` carries a DataCite relation name.
const DATACITE_SCHEMA: &str = "DataCite";

// ─── Envelope ────────────────────────────────────────────────────────────────

pub(crate) fn parse_packages(
  payload: &Value,
  max_items: Option<usize>,
) -> Result<Vec<Assertion>> {
  let items = payload.as_array().ok_or(Error::NotAnArray)?;
  if items.is_empty() {
    return Err(Error::Empty);
  }
  if let Some(max) = max_items
    && items.len() > max
  {
    return Err(Error::TooManyItems { count: items.len(), max });
  }
  items
    .iter()
    .enumerate()
    .map(|(i, package)| parse_package(i, package))
    .collect()
}

pub(crate) fn parse_objects(payload: &Value) -> Result<Vec<AssertedObject>> {
  let items = payload.as_array().ok_or(Error::NotAnArray)?;
  items
    .iter()
    .enumerate()
    .map(|(i, object)| parse_object(&format!("[{i}]"), Some(object)))
    .collect()
}

// ─── Packages ────────────────────────────────────────────────────────────────

fn parse_package(index: usize, package: &Value) -> Result<Assertion> {
  let path = format!("[{index}]");
  if !package.is_object() {
    return Err(Error::invalid(path, "expected a link package object"));
  }

  let source = parse_object(&format!("{path}.Source"), package.get("Source"))?;
  let target = parse_object(&format!("{path}.Target"), package.get("Target"))?;
  let NormalizedRelation { relation, inverted } =
    relationship_type(&format!("{path}.RelationshipType"), package.get("RelationshipType"))?;

  let history: HistoryEntry = serde_json::from_value(package.clone())
    .map_err(|e| Error::invalid(path.as_str(), e.to_string()))?;
  history.validate().map_err(|e| core_error(&path, e))?;

  let (source, target) = if inverted { (target, source) } else { (source, target) };
  if source.key == target.key {
    return Err(Error::invalid(
      path,
      format!("source and target are the same identifier ({})", source.key),
    ));
  }

  Ok(Assertion { source, relation, target, history })
}

fn relationship_type(path: &str, value: Option<&Value>) -> Result<NormalizedRelation> {
  let value = value.ok_or_else(|| Error::invalid(path, "missing"))?;
  let name = required_str(value, "Name", path)?;
  let sub_type = value
    .get("SubType")
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty());
  let schema = value.get("SubTypeSchema").and_then(Value::as_str);

  let effective = match (sub_type, schema) {
    (Some(sub_type), Some(DATACITE_SCHEMA)) => sub_type,
    _ => name,
  };
  Ok(Relation::from_datacite(effective))
}

// ─── Objects ─────────────────────────────────────────────────────────────────

fn parse_object(path: &str, value: Option<&Value>) -> Result<AssertedObject> {
  let value = value.ok_or_else(|| Error::invalid(path, "missing"))?;
  if !value.is_object() {
    return Err(Error::invalid(path, "expected an object"));
  }

  let ident_path = format!("{path}.Identifier");
  let ident = value
    .get("Identifier")
    .ok_or_else(|| Error::invalid(ident_path.as_str(), "missing"))?;
  let id = required_str(ident, "ID", &ident_path)?;
  let scheme = required_str(ident, "IDScheme", &ident_path)?;

  let key = IdentifierKey::normalized(id, scheme).map_err(|e| match e {
    CoreError::UnsupportedScheme(s) => Error::invalid(
      format!("{ident_path}.IDScheme"),
      format!("unsupported identifier scheme {s:?}"),
    ),
    CoreError::EmptyIdentifier(_) => {
      Error::invalid(format!("{ident_path}.ID"), "must not be empty")
    }
    other => core_error(&ident_path, other),
  })?;

  let metadata = ObjectMetadata::from_payload(value, true).map_err(|e| core_error(path, e))?;
  Ok(AssertedObject { key, metadata })
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn required_str<'a>(value: &'a Value, key: &str, parent: &str) -> Result<&'a str> {
  match value.get(key) {
    None | Some(Value::Null) => Err(Error::invalid(format!("{parent}.{key}"), "missing")),
    Some(Value::String(s)) if s.trim().is_empty() => {
      Err(Error::invalid(format!("{parent}.{key}"), "must not be empty"))
    }
    Some(Value::String(s)) => Ok(s),
    Some(_) => Err(Error::invalid(format!("{parent}.{key}"), "expected a string")),
  }
}

/// Re-root a core validation error under `prefix`.
fn core_error(prefix: &str, e: CoreError) -> Error {
  match e {
    CoreError::InvalidMetadata { path, message } => Error::Invalid {
      path: format!("{prefix}.{path}"),
      message,
    },
    other => Error::invalid(prefix, other.to_string()),
  }
}
