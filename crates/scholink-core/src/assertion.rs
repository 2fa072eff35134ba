//! Normalised assertions: the unit the grouping engine consumes.

use serde::{Deserialize, Serialize};

use crate::{
  identifier::IdentifierKey,
  metadata::{HistoryEntry, ObjectMetadata},
  relation::Relation,
};

/// One endpoint of an assertion together with the metadata its provider
/// supplied for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertedObject {
  pub key:      IdentifierKey,
  pub metadata: ObjectMetadata,
}

/// A single `(source, relation, target)` triple after relation folding and
/// identifier normalisation. Source and target are already swapped when the
/// wire relation was an inverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
  pub source:   AssertedObject,
  pub relation: Relation,
  pub target:   AssertedObject,
  pub history:  HistoryEntry,
}
