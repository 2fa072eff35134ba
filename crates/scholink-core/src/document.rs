//! Relationship documents held by the projected search index.
//!
//! One document exists per live group edge, for both grouping levels. The
//! document ID is derived from the edge and its endpoints, so re-indexing an
//! unchanged graph rewrites the same documents.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  group::GroupType,
  identifier::Identifier,
  metadata::{HistoryEntry, ObjectMetadata},
  relation::Relation,
};

/// An identifier as it appears inside a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentifierRef {
  #[serde(rename = "ID")]
  pub id:     String,
  #[serde(rename = "IDScheme")]
  pub scheme: String,
  #[serde(rename = "IDURL", default, skip_serializing_if = "Option::is_none")]
  pub id_url: Option<String>,
}

impl From<&Identifier> for IdentifierRef {
  fn from(i: &Identifier) -> Self {
    Self { id: i.value.clone(), scheme: i.scheme.clone(), id_url: id_url(i) }
  }
}

/// Resolvable URL for well-known schemes.
fn id_url(i: &Identifier) -> Option<String> {
  match i.scheme.as_str() {
    "doi" => Some(format!("https://doi.org/{}", i.value)),
    "url" => Some(i.value.clone()),
    "arxiv" => Some(format!("https://arxiv.org/abs/{}", i.value)),
    "ads" => Some(format!("https://ui.adsabs.harvard.edu/abs/{}", i.value)),
    "pmid" => Some(format!("https://pubmed.ncbi.nlm.nih.gov/{}", i.value)),
    _ => None,
  }
}

/// One endpoint of a relationship document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentObject {
  /// The group ID of this endpoint at the document's grouping level.
  #[serde(rename = "ID")]
  pub id:                Uuid,
  #[serde(rename = "Identifier")]
  pub identifier:        Vec<IdentifierRef>,
  /// Identifiers a query may select this endpoint by.
  #[serde(rename = "SearchIdentifier")]
  pub search_identifier: Vec<IdentifierRef>,
  #[serde(flatten)]
  pub metadata:          ObjectMetadata,
}

/// A projected relationship document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDocument {
  #[serde(rename = "ID")]
  pub id:                Uuid,
  #[serde(rename = "Grouping")]
  pub grouping:          GroupType,
  #[serde(rename = "RelationshipType")]
  pub relationship_type: Relation,
  #[serde(rename = "History")]
  pub history:           Vec<HistoryEntry>,
  #[serde(rename = "Source")]
  pub source:            DocumentObject,
  #[serde(rename = "Target")]
  pub target:            DocumentObject,
}

/// Deterministic document ID: the 128-bit XOR of the source group, the
/// group edge and the target group.
pub fn document_id(source_group: Uuid, group_relationship: Uuid, target_group: Uuid) -> Uuid {
  let x = source_group.as_u128() ^ group_relationship.as_u128() ^ target_group.as_u128();
  Uuid::from_u128(x)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn document_id_is_the_xor_of_its_parts() {
    let s = Uuid::from_u128(0b1100);
    let r = Uuid::from_u128(0b1010);
    let t = Uuid::from_u128(0b0001);
    assert_eq!(document_id(s, r, t), Uuid::from_u128(0b0111));
  }

  #[test]
  fn document_id_is_deterministic() {
    let (s, r, t) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    assert_eq!(document_id(s, r, t), document_id(s, r, t));
    assert_ne!(document_id(s, r, t), document_id(t, r, Uuid::new_v4()));
  }

  #[test]
  fn document_serialises_with_scholix_keys() {
    let obj = DocumentObject {
      id:                Uuid::nil(),
      identifier:        vec![IdentifierRef { id: "10.1/a".into(), scheme: "doi".into(), id_url: None }],
      search_identifier: vec![],
      metadata:          ObjectMetadata { title: Some("A".into()), ..Default::default() },
    };
    let doc = RelationshipDocument {
      id:                Uuid::nil(),
      grouping:          GroupType::Version,
      relationship_type: Relation::Cites,
      history:           vec![],
      source:            obj.clone(),
      target:            obj,
    };
    let v = serde_json::to_value(&doc).unwrap();
    assert_eq!(v["Grouping"], "version");
    assert_eq!(v["RelationshipType"], "Cites");
    assert_eq!(v["Source"]["Title"], "A");
    assert_eq!(v["Source"]["Identifier"][0]["IDScheme"], "doi");
    let back: RelationshipDocument = serde_json::from_value(v).unwrap();
    assert_eq!(back, doc);
  }
}
