//! Persistent identifiers and their normalisation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Identifier schemes accepted at ingestion.
pub const SUPPORTED_SCHEMES: &[&str] = &[
  "ads", "ark", "arxiv", "bioproject", "biosample", "doi", "ensembl", "ean13",
  "genome", "gnd", "handle", "isbn", "issn", "istc", "lsid", "orcid", "pdb",
  "pmcid", "pmid", "purl", "uniprot", "url", "urn",
];

const DOI_PREFIXES: &[&str] = &[
  "https://doi.org/",
  "http://doi.org/",
  "https://dx.doi.org/",
  "http://dx.doi.org/",
  "doi:",
];

/// The natural key of an identifier: a normalised `(value, scheme)` pair.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct IdentifierKey {
  pub value:  String,
  pub scheme: String,
}

impl IdentifierKey {
  /// Build a key from raw wire values, normalising both halves.
  pub fn normalized(value: &str, scheme: &str) -> Result<Self> {
    let scheme = normalize_scheme(scheme);
    if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
      return Err(Error::UnsupportedScheme(scheme));
    }
    let value = normalize_value(&scheme, value);
    if value.trim().is_empty() {
      return Err(Error::EmptyIdentifier(scheme));
    }
    Ok(Self { value, scheme })
  }
}

impl std::fmt::Display for IdentifierKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.scheme, self.value)
  }
}

/// A stored identifier. Created on first mention; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
  pub id:     Uuid,
  pub value:  String,
  pub scheme: String,
}

impl Identifier {
  pub fn key(&self) -> IdentifierKey {
    IdentifierKey { value: self.value.clone(), scheme: self.scheme.clone() }
  }
}

pub fn normalize_scheme(scheme: &str) -> String { scheme.trim().to_lowercase() }

/// Normalise `value` according to its (already normalised) scheme.
///
/// DOIs are stripped of resolver prefixes and case-folded; URLs are left
/// untouched; the remaining schemes go through small per-scheme rules.
pub fn normalize_value(scheme: &str, value: &str) -> String {
  match scheme {
    "doi" => {
      let trimmed = value.trim();
      let lower = trimmed.to_lowercase();
      let stripped = DOI_PREFIXES
        .iter()
        .find_map(|p| lower.strip_prefix(p))
        .unwrap_or(&lower);
      stripped.to_string()
    }
    "url" => value.to_string(),
    "arxiv" => {
      let trimmed = value.trim();
      match trimmed.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("arxiv:") => {
          trimmed[6..].to_string()
        }
        _ => trimmed.to_string(),
      }
    }
    "pmid" => {
      let trimmed = value.trim();
      let digits = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("pmid:") => &trimmed[5..],
        _ => trimmed,
      };
      let without_zeros = digits.trim_start_matches('0');
      if without_zeros.is_empty() { digits.to_string() } else { without_zeros.to_string() }
    }
    "pmcid" => {
      let upper = value.trim().to_uppercase();
      if upper.starts_with("PMC") { upper } else { format!("PMC{upper}") }
    }
    "orcid" | "isbn" | "issn" => value.trim().replace(' ', ""),
    _ => value.trim().to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn doi_is_case_folded_and_unprefixed() {
    let key = IdentifierKey::normalized("https://doi.org/10.1234/ABC", "DOI").unwrap();
    assert_eq!(key.scheme, "doi");
    assert_eq!(key.value, "10.1234/abc");

    let key = IdentifierKey::normalized("doi:10.5555/X", "doi").unwrap();
    assert_eq!(key.value, "10.5555/x");
  }

  #[test]
  fn urls_are_left_intact() {
    let key = IdentifierKey::normalized("https://Example.org/Path", "URL").unwrap();
    assert_eq!(key.value, "https://Example.org/Path");
  }

  #[test]
  fn arxiv_and_pmid_prefixes_are_dropped() {
    assert_eq!(normalize_value("arxiv", "arXiv:1607.00001"), "1607.00001");
    assert_eq!(normalize_value("pmid", "PMID:000123"), "123");
    assert_eq!(normalize_value("pmcid", "12345"), "PMC12345");
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    assert!(matches!(
      IdentifierKey::normalized("x", "carrier-pigeon"),
      Err(Error::UnsupportedScheme(s)) if s == "carrier-pigeon"
    ));
  }

  #[test]
  fn blank_value_is_rejected() {
    assert!(matches!(
      IdentifierKey::normalized("  ", "doi"),
      Err(Error::EmptyIdentifier(_))
    ));
  }
}
