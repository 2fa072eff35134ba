//! Scholink server runtime: configuration, backends, worker pool and
//! janitor, wired around the HTTP API.

pub mod config;
pub mod janitor;
pub mod worker;

use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use scholink_api::{AppState, api_router};
use scholink_core::{graph::GraphStore, index::SearchIndex};
use scholink_store_sqlite::{SqliteIndex, SqliteStore};
use tower_http::trace::TraceLayer;

pub use config::Settings;

/// Open the graph store and the search backend named in `settings`.
pub async fn open_backends(
  settings: &Settings,
) -> anyhow::Result<(Arc<SqliteStore>, Arc<SqliteIndex>)> {
  let graph = SqliteStore::open(&settings.database_path)
    .await
    .with_context(|| format!("failed to open graph store at {:?}", settings.database_path))?;
  let index = SqliteIndex::open(&settings.index_path)
    .await
    .with_context(|| format!("failed to open search index at {:?}", settings.index_path))?;
  Ok((Arc::new(graph), Arc::new(index)))
}

/// The API router with request tracing.
pub fn router<G, I>(state: AppState<G, I>) -> Router
where
  G: GraphStore + 'static,
  I: SearchIndex + 'static,
{
  api_router(state).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{body::Body, http::{Request, StatusCode}};
  use scholink_api::{ApiSettings, AuthConfig};
  use tokio::sync::mpsc;
  use tower::ServiceExt as _;

  use super::*;

  #[tokio::test]
  async fn traced_router_serves_the_api() {
    let settings = Settings {
      database_path: ":memory:".into(),
      index_path: ":memory:".into(),
      ..Settings::default()
    };
    let (graph, index) = open_backends(&settings).await.unwrap();
    let (queue, _jobs) = mpsc::channel(1);
    let state = AppState {
      graph,
      index,
      queue,
      auth: Arc::new(AuthConfig { username: "u".into(), password_hash: String::new() }),
      settings: ApiSettings::default(),
    };

    let req = Request::builder()
      .uri("/relationships?id=10.1/x&scheme=doi&relation=isCitedBy")
      .body(Body::empty())
      .unwrap();
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder().method("POST").uri("/event").body(Body::from("[]")).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }
}
