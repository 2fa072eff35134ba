//! Handler for `GET /citations/{*pid}`.

use axum::{
  Json,
  extract::{Path, Query, State, rejection::QueryRejection},
};
use scholink_core::{
  graph::GraphStore,
  identifier::IdentifierKey,
  index::SearchIndex,
  query::{CitationOptions, Citations},
};

use crate::{AppState, error::ApiError};

/// `GET /citations/{doi}[?with_parents=true][&with_siblings=true][&expand_target=true]`
///
/// The remainder of the path is the DOI value, slashes included.
pub async fn handler<G, I>(
  State(state): State<AppState<G, I>>,
  Path(pid): Path<String>,
  options: Result<Query<CitationOptions>, QueryRejection>,
) -> Result<Json<Citations>, ApiError>
where
  G: GraphStore + 'static,
  I: SearchIndex + 'static,
{
  let Query(options) = options?;
  let key = IdentifierKey::normalized(&pid, "doi").map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let citations = state
    .graph
    .citations(key, options)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("identifier {pid}")))?;
  Ok(Json(citations))
}
