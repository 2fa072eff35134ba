//! Canonical relation kinds and the DataCite normalisation table.
//!
//! Every relation name arriving on the wire is folded into one of five
//! canonical kinds before it touches the graph. Folding may invert the
//! direction of the assertion (e.g. `IsCitedBy` becomes `Cites` with source
//! and target swapped).

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// The five canonical relations stored in the graph.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
pub enum Relation {
  Cites,
  IsSupplementTo,
  HasVersion,
  IsIdenticalTo,
  IsRelatedTo,
}

/// A wire relation name resolved to its canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedRelation {
  pub relation: Relation,
  /// When set, source and target must be swapped before persisting.
  pub inverted: bool,
}

impl Relation {
  /// Fold a DataCite relation name into its canonical relation.
  ///
  /// Unknown names map to [`Relation::IsRelatedTo`]; this is not an error.
  pub fn from_datacite(name: &str) -> NormalizedRelation {
    let (relation, inverted) = match name {
      "Cites" | "References" => (Relation::Cites, false),
      "IsCitedBy" | "IsReferencedBy" => (Relation::Cites, true),
      "IsSupplementTo" => (Relation::IsSupplementTo, false),
      "IsSupplementedBy" => (Relation::IsSupplementTo, true),
      "HasVersion" | "HasPart" => (Relation::HasVersion, false),
      "IsVersionOf" | "IsPartOf" => (Relation::HasVersion, true),
      "IsIdenticalTo" => (Relation::IsIdenticalTo, false),
      _ => (Relation::IsRelatedTo, false),
    };
    NormalizedRelation { relation, inverted }
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn citation_family_folds_to_cites() {
    for (name, inverted) in [
      ("Cites", false),
      ("References", false),
      ("IsCitedBy", true),
      ("IsReferencedBy", true),
    ] {
      let n = Relation::from_datacite(name);
      assert_eq!(n.relation, Relation::Cites, "{name}");
      assert_eq!(n.inverted, inverted, "{name}");
    }
  }

  #[test]
  fn part_relations_fold_into_has_version() {
    assert_eq!(
      Relation::from_datacite("HasPart"),
      NormalizedRelation { relation: Relation::HasVersion, inverted: false }
    );
    assert_eq!(
      Relation::from_datacite("IsPartOf"),
      NormalizedRelation { relation: Relation::HasVersion, inverted: true }
    );
  }

  #[test]
  fn unknown_names_become_is_related_to() {
    let n = Relation::from_datacite("IsDocumentedBy");
    assert_eq!(n.relation, Relation::IsRelatedTo);
    assert!(!n.inverted);
  }

  #[test]
  fn string_round_trip_matches_column_values() {
    assert_eq!(Relation::IsSupplementTo.to_string(), "IsSupplementTo");
    assert_eq!(Relation::from_str("HasVersion").unwrap(), Relation::HasVersion);
  }
}
