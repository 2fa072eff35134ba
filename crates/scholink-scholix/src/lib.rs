//! Scholix link-package codec for Scholink.
//!
//! Decodes event payloads (JSON arrays of link packages) into normalised
//! [`Assertion`]s: identifiers are normalised, relation names folded into
//! the five canonical relations, inverse relations swapped, and provenance
//! validated. Failures carry the JSON path of the offending field. Pure
//! synchronous; no HTTP or database dependencies.
//!
//! ```no_run
//! use scholink_scholix::parse_event;
//!
//! let payload = serde_json::json!([{
//!   "Source": {"Identifier": {"ID": "10.1/a", "IDScheme": "doi"}},
//!   "RelationshipType": {"Name": "Cites"},
//!   "Target": {"Identifier": {"ID": "10.1/b", "IDScheme": "doi"}},
//!   "LinkPublicationDate": "2020-01-01",
//!   "LinkProvider": [{"Name": "Zenodo"}]
//! }]);
//! let assertions = parse_event(&payload, Some(200)).unwrap();
//! assert_eq!(assertions.len(), 1);
//! ```

pub mod error;
mod parse;

pub use error::{Error, Result};
use scholink_core::assertion::{AssertedObject, Assertion};
use serde_json::Value;

/// Decode an event payload, enforcing `1 ..= max_items` link packages.
///
/// Pass `None` for `max_items` when re-reading payloads that were already
/// accepted under a different limit.
pub fn parse_event(payload: &Value, max_items: Option<usize>) -> Result<Vec<Assertion>> {
  parse::parse_packages(payload, max_items)
}

/// Decode raw request bytes. Returns the JSON document alongside the
/// assertions so the caller can persist the payload as received.
pub fn parse_event_slice(
  bytes: &[u8],
  max_items: Option<usize>,
) -> Result<(Value, Vec<Assertion>)> {
  let payload: Value = serde_json::from_slice(bytes)?;
  let assertions = parse::parse_packages(&payload, max_items)?;
  Ok((payload, assertions))
}

/// Decode a JSON array of Scholix objects (`Identifier` plus metadata
/// keys), as used by metadata loads.
pub fn parse_objects(payload: &Value) -> Result<Vec<AssertedObject>> {
  parse::parse_objects(payload)
}
