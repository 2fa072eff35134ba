//! Handlers for `GET /relationships` (index-backed) and
//! `GET /db-relationships` (graph-backed).
//!
//! Both take `id`, `scheme` and `relation` (`cites`, `isCitedBy`,
//! `isSupplementTo`, `isSupplementedBy`, `isRelatedTo`). Every parameter
//! problem is a 400.

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use chrono::NaiveDate;
use scholink_core::{
  document::RelationshipDocument,
  graph::GraphStore,
  group::GroupType,
  identifier::IdentifierKey,
  index::SearchIndex,
  query::{DEFAULT_PAGE_SIZE, DocumentPage, DocumentQuery, GraphQuery, MAX_PAGE_SIZE, QueryRelation},
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
  value
    .as_deref()
    .filter(|v| !v.trim().is_empty())
    .ok_or_else(|| ApiError::BadRequest(format!("missing required parameter {name:?}")))
}

fn identifier(id: &Option<String>, scheme: &Option<String>) -> Result<IdentifierKey, ApiError> {
  IdentifierKey::normalized(required(id, "id")?, required(scheme, "scheme")?)
    .map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn relation(value: &Option<String>) -> Result<QueryRelation, ApiError> {
  required(value, "relation")?
    .parse()
    .map_err(|e: scholink_core::Error| ApiError::BadRequest(e.to_string()))
}

fn grouping(value: Option<&str>, default: GroupType) -> Result<GroupType, ApiError> {
  match value {
    None => Ok(default),
    Some(v) => v
      .parse()
      .map_err(|_| ApiError::BadRequest(format!("unknown grouping {v:?}; expected identity or version"))),
  }
}

fn date(value: Option<&str>, name: &str) -> Result<Option<NaiveDate>, ApiError> {
  value
    .map(|v| {
      NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{name} must be YYYY-MM-DD, got {v:?}")))
    })
    .transpose()
}

// ─── Index-backed ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct RelationshipParams {
  pub id:       Option<String>,
  pub scheme:   Option<String>,
  pub relation: Option<String>,
  pub from:     Option<String>,
  pub to:       Option<String>,
  #[serde(rename = "groupBy")]
  pub group_by: Option<String>,
  pub page:     Option<usize>,
  pub size:     Option<usize>,
}

impl RelationshipParams {
  fn into_query(self, default_grouping: GroupType) -> Result<DocumentQuery, ApiError> {
    let page = self.page.unwrap_or(1);
    if page == 0 {
      return Err(ApiError::BadRequest("page is 1-based".into()));
    }
    let size = self.size.unwrap_or(DEFAULT_PAGE_SIZE);
    if size == 0 || size > MAX_PAGE_SIZE {
      return Err(ApiError::BadRequest(format!("size must be between 1 and {MAX_PAGE_SIZE}")));
    }
    let from = date(self.from.as_deref(), "from")?;
    let to = date(self.to.as_deref(), "to")?;
    if let (Some(from), Some(to)) = (from, to)
      && from > to
    {
      return Err(ApiError::BadRequest("from is after to".into()));
    }

    Ok(DocumentQuery {
      identifier: identifier(&self.id, &self.scheme)?,
      relation: relation(&self.relation)?,
      from,
      to,
      grouping: grouping(self.group_by.as_deref(), default_grouping)?,
      page,
      size,
    })
  }
}

/// `GET /relationships?id&scheme&relation[&from][&to][&groupBy][&page][&size]`
pub async fn search<G, I>(
  State(state): State<AppState<G, I>>,
  params: Result<Query<RelationshipParams>, QueryRejection>,
) -> Result<Json<DocumentPage>, ApiError>
where
  G: GraphStore + 'static,
  I: SearchIndex + 'static,
{
  let Query(params) = params?;
  let query = params.into_query(state.settings.default_grouping)?;
  let page = state.index.search(&query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

// ─── Graph-backed ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct DbRelationshipParams {
  pub id:       Option<String>,
  pub scheme:   Option<String>,
  pub relation: Option<String>,
  pub grouping: Option<String>,
}

/// `GET /db-relationships?id&scheme&relation[&grouping]`
pub async fn from_graph<G, I>(
  State(state): State<AppState<G, I>>,
  params: Result<Query<DbRelationshipParams>, QueryRejection>,
) -> Result<Json<Vec<RelationshipDocument>>, ApiError>
where
  G: GraphStore + 'static,
  I: SearchIndex + 'static,
{
  let Query(params) = params?;
  let query = GraphQuery {
    identifier: identifier(&params.id, &params.scheme)?,
    relation:   relation(&params.relation)?,
    grouping:   grouping(params.grouping.as_deref(), state.settings.default_grouping)?,
  };
  let docs = state.graph.db_relationships(&query).await.map_err(ApiError::store)?;
  Ok(Json(docs))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn params(pairs: &[(&str, &str)]) -> RelationshipParams {
    let query = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
    let uri: axum::http::Uri = format!("/relationships?{query}").parse().unwrap();
    Query::try_from_uri(&uri).unwrap().0
  }

  #[test]
  fn defaults_apply() {
    let q = params(&[("id", "10.1/X"), ("scheme", "doi"), ("relation", "isCitedBy")])
      .into_query(GroupType::Identity)
      .unwrap();
    assert_eq!(q.identifier.value, "10.1/x");
    assert_eq!(q.relation, QueryRelation::IsCitedBy);
    assert_eq!((q.page, q.size), (1, DEFAULT_PAGE_SIZE));
    assert_eq!(q.grouping, GroupType::Identity);
  }

  #[test]
  fn group_by_and_dates_are_parsed() {
    let q = params(&[
      ("id", "10.1/x"),
      ("scheme", "doi"),
      ("relation", "cites"),
      ("groupBy", "version"),
      ("from", "2019-01-01"),
      ("to", "2019-12-31"),
    ])
    .into_query(GroupType::Identity)
    .unwrap();
    assert_eq!(q.grouping, GroupType::Version);
    assert_eq!(q.from, NaiveDate::from_ymd_opt(2019, 1, 1));
  }

  #[test]
  fn invalid_parameters_are_rejected() {
    let base = [("id", "10.1/x"), ("scheme", "doi"), ("relation", "cites")];
    let cases: &[&[(&str, &str)]] = &[
      &[("scheme", "doi"), ("relation", "cites")],
      &[("id", "10.1/x"), ("scheme", "foo"), ("relation", "cites")],
      &[("id", "10.1/x"), ("scheme", "doi"), ("relation", "IsCitedBy")],
      &[("id", "10.1/x"), ("scheme", "doi")],
    ];
    for case in cases {
      assert!(matches!(params(case).into_query(GroupType::Identity), Err(ApiError::BadRequest(_))));
    }
    for extra in [("size", "0"), ("size", "101"), ("page", "0"), ("from", "2019"), ("groupBy", "all")] {
      let mut pairs = base.to_vec();
      pairs.push(extra);
      assert!(
        matches!(params(&pairs).into_query(GroupType::Identity), Err(ApiError::BadRequest(_))),
        "{extra:?} accepted"
      );
    }
  }
}
