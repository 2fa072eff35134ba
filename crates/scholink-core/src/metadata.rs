//! Metadata documents attached to Identity groups and Identity group edges.
//!
//! The two documents have different shapes and different merge rules and
//! are kept as separate types on purpose:
//!
//! - [`ObjectMetadata`] describes an Identity group (title, type, creators,
//!   publication date, publishers, keywords). Overridable keys are replaced
//!   by newer non-empty values; mergeable keys are unioned.
//! - [`RelationshipHistory`] is an append-only list of [`HistoryEntry`]
//!   provenance records for an Identity group edge.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const UNKNOWN_TYPE: &str = "unknown";

const OBJECT_TYPES: &[&str] = &["literature", "dataset", "software", UNKNOWN_TYPE];

// ─── Object metadata ─────────────────────────────────────────────────────────

/// `Type` of a Scholix object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectType {
  #[serde(rename = "Name", default = "unknown_type_name")]
  pub name:            String,
  #[serde(rename = "SubType", default, skip_serializing_if = "Option::is_none")]
  pub sub_type:        Option<String>,
  #[serde(
    rename = "SubTypeSchema",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub sub_type_schema: Option<String>,
}

impl Default for ObjectType {
  fn default() -> Self {
    Self { name: unknown_type_name(), sub_type: None, sub_type_schema: None }
  }
}

fn unknown_type_name() -> String { UNKNOWN_TYPE.to_string() }

/// An identifier of a creator or publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyIdentifier {
  #[serde(rename = "ID")]
  pub id:     String,
  #[serde(rename = "IDScheme")]
  pub scheme: String,
}

/// A creator or publisher entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
  #[serde(rename = "Name")]
  pub name:       String,
  #[serde(rename = "Identifier", default, skip_serializing_if = "Vec::is_empty")]
  pub identifier: Vec<PartyIdentifier>,
}

/// Descriptive metadata of an Identity group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
  #[serde(rename = "Title", default, skip_serializing_if = "Option::is_none")]
  pub title:            Option<String>,
  #[serde(rename = "Type", default)]
  pub object_type:      ObjectType,
  #[serde(rename = "Creator", default, skip_serializing_if = "Vec::is_empty")]
  pub creator:          Vec<Party>,
  #[serde(
    rename = "PublicationDate",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub publication_date: Option<String>,
  #[serde(rename = "Publisher", default, skip_serializing_if = "Vec::is_empty")]
  pub publisher:        Vec<Party>,
  #[serde(rename = "Keywords", default, skip_serializing_if = "Vec::is_empty")]
  pub keywords:         Vec<String>,
}

impl ObjectMetadata {
  /// Decode a Scholix object (e.g. the `Source` of a link package). Keys
  /// other than the metadata keys, such as `Identifier`, are ignored.
  ///
  /// With `validate` set, the type name and publication date are checked
  /// against the group-metadata schema.
  pub fn from_payload(payload: &serde_json::Value, validate: bool) -> Result<Self> {
    let metadata: ObjectMetadata = serde_json::from_value(payload.clone())?;
    if validate {
      metadata.validate()?;
    }
    Ok(metadata)
  }

  pub fn validate(&self) -> Result<()> {
    if !OBJECT_TYPES.contains(&self.object_type.name.as_str()) {
      return Err(Error::InvalidMetadata {
        path:    "Type.Name".into(),
        message: format!("unknown object type {:?}", self.object_type.name),
      });
    }
    if let Some(date) = &self.publication_date
      && !date.is_empty()
      && !is_partial_date(date)
    {
      return Err(Error::InvalidMetadata {
        path:    "PublicationDate".into(),
        message: format!("expected YYYY[-MM[-DD]], got {date:?}"),
      });
    }
    for (i, creator) in self.creator.iter().enumerate() {
      if creator.name.trim().is_empty() {
        return Err(Error::InvalidMetadata {
          path:    format!("Creator[{i}].Name"),
          message: "must not be empty".into(),
        });
      }
    }
    Ok(())
  }

  /// Fold `other` into `self`.
  ///
  /// `Title`, `Type`, `Creator` and `PublicationDate` are overwritten when
  /// `other` carries a non-empty value (and, for `Type`, one that is not
  /// `unknown`). `Publisher` and `Keywords` are unioned, de-duplicating
  /// case-insensitively.
  pub fn update(&mut self, other: &ObjectMetadata) {
    if let Some(title) = non_empty(&other.title) {
      self.title = Some(title.to_string());
    }
    if !other.object_type.name.is_empty() && other.object_type.name != UNKNOWN_TYPE {
      self.object_type = other.object_type.clone();
    }
    if !other.creator.is_empty() {
      self.creator = other.creator.clone();
    }
    if let Some(date) = non_empty(&other.publication_date) {
      self.publication_date = Some(date.to_string());
    }
    for publisher in &other.publisher {
      if !self
        .publisher
        .iter()
        .any(|p| p.name.eq_ignore_ascii_case(&publisher.name))
      {
        self.publisher.push(publisher.clone());
      }
    }
    for keyword in &other.keywords {
      if !self.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword)) {
        self.keywords.push(keyword.clone());
      }
    }
    if self.object_type.name.is_empty() {
      self.object_type.name = unknown_type_name();
    }
  }

  /// Metadata for a group produced by merging two groups: the overridable
  /// keys come from `newer`, the mergeable keys from both.
  pub fn merged(older: &ObjectMetadata, newer: &ObjectMetadata) -> ObjectMetadata {
    let mut merged = older.clone();
    merged.update(newer);
    merged
  }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().filter(|v| !v.trim().is_empty())
}

fn is_partial_date(s: &str) -> bool {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
    || NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").is_ok()
    || NaiveDate::parse_from_str(&format!("{s}-01-01"), "%Y-%m-%d").is_ok()
}

// ─── Relationship history ────────────────────────────────────────────────────

/// A link provider named in a link package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
  #[serde(rename = "Name")]
  pub name: String,
}

/// Provenance of one assertion about an Identity group edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
  #[serde(rename = "LinkPublicationDate")]
  pub link_publication_date: String,
  #[serde(rename = "LinkProvider")]
  pub link_provider:         Vec<Provider>,
  #[serde(rename = "LicenseURL", default, skip_serializing_if = "Option::is_none")]
  pub license_url:           Option<String>,
}

impl HistoryEntry {
  pub fn validate(&self) -> Result<()> {
    if NaiveDate::parse_from_str(&self.link_publication_date, "%Y-%m-%d").is_err() {
      return Err(Error::InvalidMetadata {
        path:    "LinkPublicationDate".into(),
        message: format!("expected YYYY-MM-DD, got {:?}", self.link_publication_date),
      });
    }
    if self.link_provider.is_empty() {
      return Err(Error::InvalidMetadata {
        path:    "LinkProvider".into(),
        message: "at least one provider is required".into(),
      });
    }
    if let Some(i) = self.link_provider.iter().position(|p| p.name.trim().is_empty()) {
      return Err(Error::InvalidMetadata {
        path:    format!("LinkProvider[{i}].Name"),
        message: "must not be empty".into(),
      });
    }
    Ok(())
  }

  pub fn date(&self) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&self.link_publication_date, "%Y-%m-%d").ok()
  }
}

/// The metadata list of an Identity group edge, oldest entry first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipHistory(pub Vec<HistoryEntry>);

impl RelationshipHistory {
  /// Append history from a relationship-metadata payload.
  ///
  /// With `multi` set the payload is a list of entries, otherwise a single
  /// entry. Entries identical to one already present are skipped so that
  /// reprocessing an event leaves the history unchanged. Returns the number
  /// of entries appended.
  pub fn update(&mut self, payload: &serde_json::Value, multi: bool) -> Result<usize> {
    let entries: Vec<HistoryEntry> = if multi {
      serde_json::from_value(payload.clone())?
    } else {
      vec![serde_json::from_value(payload.clone())?]
    };
    for entry in &entries {
      entry.validate()?;
    }
    Ok(self.extend(entries))
  }

  /// Append already-validated entries, skipping exact duplicates.
  pub fn extend(&mut self, entries: impl IntoIterator<Item = HistoryEntry>) -> usize {
    let mut appended = 0;
    for entry in entries {
      if !self.0.contains(&entry) {
        self.0.push(entry);
        appended += 1;
      }
    }
    appended
  }

  /// Ordered concatenation of several histories, used when duplicate group
  /// edges are fused.
  pub fn concatenated(histories: impl IntoIterator<Item = RelationshipHistory>) -> Self {
    Self(histories.into_iter().flat_map(|h| h.0).collect())
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn meta(v: serde_json::Value) -> ObjectMetadata {
    ObjectMetadata::from_payload(&v, true).unwrap()
  }

  #[test]
  fn type_defaults_to_unknown() {
    let m = meta(json!({"Identifier": {"ID": "10.1/x", "IDScheme": "doi"}}));
    assert_eq!(m.object_type.name, UNKNOWN_TYPE);
  }

  #[test]
  fn unknown_type_does_not_override() {
    let mut m = meta(json!({"Type": {"Name": "dataset"}}));
    m.update(&meta(json!({"Type": {"Name": "unknown"}, "Title": "Data"})));
    assert_eq!(m.object_type.name, "dataset");
    assert_eq!(m.title.as_deref(), Some("Data"));
  }

  #[test]
  fn empty_title_does_not_override() {
    let mut m = meta(json!({"Title": "Original"}));
    m.update(&meta(json!({"Title": ""})));
    assert_eq!(m.title.as_deref(), Some("Original"));
  }

  #[test]
  fn mergeable_keys_union_case_insensitively() {
    let mut m = meta(json!({
      "Publisher": [{"Name": "Zenodo"}],
      "Keywords": ["Astronomy", "software"],
    }));
    m.update(&meta(json!({
      "Publisher": [{"Name": "ZENODO"}, {"Name": "GitHub"}],
      "Keywords": ["astronomy", "Python"],
    })));
    let publishers: Vec<_> = m.publisher.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(publishers, ["Zenodo", "GitHub"]);
    assert_eq!(m.keywords, ["Astronomy", "software", "Python"]);
  }

  #[test]
  fn merged_takes_overridables_from_newer() {
    let older = meta(json!({"Title": "Old", "Keywords": ["a"], "PublicationDate": "2001"}));
    let newer = meta(json!({"Title": "New", "Keywords": ["B"]}));
    let merged = ObjectMetadata::merged(&older, &newer);
    assert_eq!(merged.title.as_deref(), Some("New"));
    assert_eq!(merged.publication_date.as_deref(), Some("2001"));
    assert_eq!(merged.keywords, ["a", "B"]);
  }

  #[test]
  fn validation_rejects_bad_dates_and_types() {
    let bad_date = json!({"PublicationDate": "yesterday"});
    assert!(matches!(
      ObjectMetadata::from_payload(&bad_date, true),
      Err(Error::InvalidMetadata { path, .. }) if path == "PublicationDate"
    ));
    assert!(ObjectMetadata::from_payload(&bad_date, false).is_ok());

    let bad_type = json!({"Type": {"Name": "poem"}});
    assert!(ObjectMetadata::from_payload(&bad_type, true).is_err());
  }

  #[test]
  fn history_appends_and_skips_duplicates() {
    let entry = json!({
      "LinkPublicationDate": "2018-01-01",
      "LinkProvider": [{"Name": "Provider 1"}],
    });
    let mut history = RelationshipHistory::default();
    assert_eq!(history.update(&entry, false).unwrap(), 1);
    assert_eq!(history.update(&entry, false).unwrap(), 0);

    let more = json!([
      {"LinkPublicationDate": "2018-02-01", "LinkProvider": [{"Name": "Provider 2"}]},
      {"LinkPublicationDate": "2018-03-01", "LinkProvider": [{"Name": "Provider 3"}],
       "LicenseURL": "https://creativecommons.org/licenses/by/4.0"},
    ]);
    assert_eq!(history.update(&more, true).unwrap(), 2);
    assert_eq!(history.len(), 3);
    assert_eq!(history.0[2].license_url.as_deref(), Some("https://creativecommons.org/licenses/by/4.0"));
  }

  #[test]
  fn history_rejects_bad_link_date() {
    let entry = json!({"LinkPublicationDate": "01/01/2018", "LinkProvider": [{"Name": "P"}]});
    let mut history = RelationshipHistory::default();
    assert!(history.update(&entry, false).is_err());
    assert!(history.is_empty());
  }

  #[test]
  fn concatenation_preserves_order() {
    let e = |d: &str| HistoryEntry {
      link_publication_date: d.into(),
      link_provider:         vec![Provider { name: "P".into() }],
      license_url:           None,
    };
    let a = RelationshipHistory(vec![e("2018-01-01"), e("2018-01-02")]);
    let b = RelationshipHistory(vec![e("2017-05-05")]);
    let fused = RelationshipHistory::concatenated([a, b]);
    let dates: Vec<_> = fused.0.iter().map(|h| h.link_publication_date.as_str()).collect();
    assert_eq!(dates, ["2018-01-01", "2018-01-02", "2017-05-05"]);
  }
}
