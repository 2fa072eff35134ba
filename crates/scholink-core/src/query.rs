//! Read-side query types shared by the graph store and the search index.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  document::RelationshipDocument,
  group::GroupType,
  identifier::{Identifier, IdentifierKey},
  relation::Relation,
};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Which end of a document the queried identifier sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
  Source,
  Target,
}

impl Side {
  pub fn as_str(self) -> &'static str {
    match self {
      Side::Source => "source",
      Side::Target => "target",
    }
  }
}

/// A relation as phrased from the queried identifier's point of view, e.g.
/// `isCitedBy` means "documents in which the identifier is cited".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryRelation {
  #[serde(rename = "cites")]
  Cites,
  #[serde(rename = "isCitedBy")]
  IsCitedBy,
  #[serde(rename = "isSupplementTo")]
  IsSupplementTo,
  #[serde(rename = "isSupplementedBy")]
  IsSupplementedBy,
  #[serde(rename = "isRelatedTo")]
  IsRelatedTo,
}

impl QueryRelation {
  /// The stored relation and the side the queried identifier must be on.
  pub fn resolve(self) -> (Relation, Side) {
    match self {
      QueryRelation::Cites => (Relation::Cites, Side::Source),
      QueryRelation::IsCitedBy => (Relation::Cites, Side::Target),
      QueryRelation::IsSupplementTo => (Relation::IsSupplementTo, Side::Source),
      QueryRelation::IsSupplementedBy => (Relation::IsSupplementTo, Side::Target),
      QueryRelation::IsRelatedTo => (Relation::IsRelatedTo, Side::Source),
    }
  }
}

impl FromStr for QueryRelation {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cites" => Ok(Self::Cites),
      "isCitedBy" => Ok(Self::IsCitedBy),
      "isSupplementTo" => Ok(Self::IsSupplementTo),
      "isSupplementedBy" => Ok(Self::IsSupplementedBy),
      "isRelatedTo" => Ok(Self::IsRelatedTo),
      other => Err(Error::UnknownQueryRelation(other.to_string())),
    }
  }
}

// ─── Index queries ───────────────────────────────────────────────────────────

/// Parameters for [`crate::index::SearchIndex::search`].
#[derive(Debug, Clone)]
pub struct DocumentQuery {
  pub identifier: IdentifierKey,
  pub relation:   QueryRelation,
  /// Keep documents with a history entry on or after this date.
  pub from:       Option<NaiveDate>,
  /// Keep documents with a history entry on or before this date.
  pub to:         Option<NaiveDate>,
  pub grouping:   GroupType,
  /// 1-based.
  pub page:       usize,
  pub size:       usize,
}

impl DocumentQuery {
  pub fn offset(&self) -> usize { self.page.saturating_sub(1) * self.size }
}

/// One page of search hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
  pub total: u64,
  pub page:  usize,
  pub size:  usize,
  pub hits:  Vec<RelationshipDocument>,
}

// ─── Graph queries ───────────────────────────────────────────────────────────

/// Parameters for [`crate::graph::GraphStore::db_relationships`].
#[derive(Debug, Clone)]
pub struct GraphQuery {
  pub identifier: IdentifierKey,
  pub relation:   QueryRelation,
  pub grouping:   GroupType,
}

/// Options for [`crate::graph::GraphStore::citations`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CitationOptions {
  /// Also count citations of works this one is a version of.
  #[serde(default)]
  pub with_parents:  bool,
  /// With `with_parents`, also count citations of the parents' other
  /// versions.
  #[serde(default)]
  pub with_siblings: bool,
  /// Report every identifier the citations were collected for, not only the
  /// queried one.
  #[serde(default)]
  pub expand_target: bool,
}

/// Citing works grouped by Identity group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitingGroup {
  pub group_id:    Uuid,
  pub identifiers: Vec<Identifier>,
}

/// Result of a citations query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citations {
  pub target: Vec<Identifier>,
  pub citing: Vec<CitingGroup>,
}

/// Counts for the operator monitor report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusReport {
  pub events_new:            u64,
  pub events_processing:     u64,
  pub events_error:          u64,
  pub events_done:           u64,
  pub error_log_rows:        u64,
  pub identifiers:           u64,
  pub relationships:         u64,
  pub deleted_relationships: u64,
  pub identity_groups:       u64,
  pub version_groups:        u64,
  pub group_relationships:   u64,
}
