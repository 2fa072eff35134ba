//! Identity and Version groups and the edges between them.
//!
//! Assertions name identifiers; queries answer about works. An Identity group
//! collects identifiers known to co-refer; a Version group collects Identity
//! groups known to be versions of one work. Group edges mirror raw
//! relationships at group granularity.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::relation::Relation;

/// The two grouping levels. Doubles as the `Grouping` view parameter of the
/// projected index (`identity` or `version`).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GroupType {
  #[default]
  Identity,
  Version,
}

/// A group row. Created on first contact; destroyed by merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub id:   Uuid,
  #[serde(rename = "type")]
  pub kind: GroupType,
}

/// A raw relationship between two identifiers, unique on
/// `(source, target, relation)`. Deletion only toggles `deleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
  pub id:       Uuid,
  pub source:   Uuid,
  pub target:   Uuid,
  pub relation: Relation,
  pub deleted:  bool,
}

/// A relationship at group granularity, unique on `(source, target,
/// relation)`. Identity edges own the raw relationships they mirror; Version
/// edges own Identity sub-edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRelationship {
  pub id:       Uuid,
  #[serde(rename = "type")]
  pub kind:     GroupType,
  pub relation: Relation,
  pub source:   Uuid,
  pub target:   Uuid,
}

/// The group IDs touched by a single assertion, as reported by the grouping
/// engine. `merged_*` is set when the assertion caused a merge, in which case
/// `src_*` and `trg_*` no longer exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupChange {
  pub src_ig:    Uuid,
  pub trg_ig:    Uuid,
  pub merged_ig: Option<Uuid>,
  pub src_vg:    Uuid,
  pub trg_vg:    Uuid,
  pub merged_vg: Option<Uuid>,
}
