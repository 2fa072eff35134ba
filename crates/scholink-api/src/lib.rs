//! JSON HTTP API for Scholink.
//!
//! Exposes an axum [`Router`] over any [`GraphStore`] and [`SearchIndex`]:
//! authenticated event ingestion feeding the worker queue, plus the public
//! query endpoints. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = scholink_api::api_router(state).layer(TraceLayer::new_for_http());
//! ```

pub mod auth;
pub mod citations;
pub mod error;
pub mod events;
pub mod relationships;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use scholink_core::{event::EventJob, graph::GraphStore, group::GroupType, index::SearchIndex};
use tokio::sync::mpsc;

pub use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Request-handling knobs taken from the server configuration.
#[derive(Debug, Clone, Copy)]
pub struct ApiSettings {
  /// Upper bound on link packages per submitted event.
  pub event_max_items:  usize,
  /// Grouping used by relationship queries that do not name one.
  pub default_grouping: GroupType,
}

impl Default for ApiSettings {
  fn default() -> Self { Self { event_max_items: 200, default_grouping: GroupType::Identity } }
}

/// Shared state threaded through all handlers.
pub struct AppState<G, I> {
  pub graph:    Arc<G>,
  pub index:    Arc<I>,
  /// Accepted events are handed to the worker pool here.
  pub queue:    mpsc::Sender<EventJob>,
  pub auth:     Arc<AuthConfig>,
  pub settings: ApiSettings,
}

impl<G, I> Clone for AppState<G, I> {
  fn clone(&self) -> Self {
    Self {
      graph:    self.graph.clone(),
      index:    self.index.clone(),
      queue:    self.queue.clone(),
      auth:     self.auth.clone(),
      settings: self.settings,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
pub fn api_router<G, I>(state: AppState<G, I>) -> Router<()>
where
  G: GraphStore + 'static,
  I: SearchIndex + 'static,
{
  Router::new()
    // Ingestion
    .route("/event", post(events::submit::<G, I>))
    .route("/events/{id}", get(events::get_one::<G, I>))
    // Queries
    .route("/relationships", get(relationships::search::<G, I>))
    .route("/db-relationships", get(relationships::from_graph::<G, I>))
    .route("/citations/{*pid}", get(citations::handler::<G, I>))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use rand_core::OsRng;
  use scholink_core::{
    event::{EventKind, EventStatus},
    processor::{EventProcessor, ProcessorSettings},
  };
  use scholink_store_sqlite::{SqliteIndex, SqliteStore};
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  struct TestApp {
    state: AppState<SqliteStore, SqliteIndex>,
    jobs:  mpsc::Receiver<EventJob>,
  }

  async fn make_app(settings: ApiSettings) -> TestApp {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(b"secret", &salt)
      .unwrap()
      .to_string();
    let (queue, jobs) = mpsc::channel(16);
    let state = AppState {
      graph: Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      index: Arc::new(SqliteIndex::open_in_memory().await.unwrap()),
      queue,
      auth: Arc::new(AuthConfig { username: "harvester".into(), password_hash: hash }),
      settings,
    };
    TestApp { state, jobs }
  }

  impl TestApp {
    async fn send(&self, method: &str, uri: &str, auth: Option<&str>, body: &str) -> Response {
      let mut builder = Request::builder().method(method).uri(uri);
      if let Some(password) = auth {
        let creds = B64.encode(format!("harvester:{password}"));
        builder = builder.header(header::AUTHORIZATION, format!("Basic {creds}"));
      }
      let req = builder.body(Body::from(body.to_string())).unwrap();
      api_router(self.state.clone()).oneshot(req).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response { self.send("GET", uri, None, "").await }

    /// Drain the queue through a processor, as the worker pool would.
    async fn process_queued(&mut self) {
      let processor = EventProcessor::new(
        self.state.graph.clone(),
        self.state.index.clone(),
        ProcessorSettings::default(),
      );
      while let Ok(job) = self.jobs.try_recv() {
        processor.process(job, None).await.unwrap();
      }
    }
  }

  async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn cites(source: &str, target: &str) -> Value {
    json!({
      "Source": {"Identifier": {"ID": source, "IDScheme": "doi"}, "Type": {"Name": "literature"}},
      "RelationshipType": {"Name": "Cites"},
      "Target": {"Identifier": {"ID": target, "IDScheme": "doi"}, "Type": {"Name": "dataset"}},
      "LinkPublicationDate": "2018-01-01",
      "LinkProvider": [{"Name": "Zenodo"}]
    })
  }

  // ── POST /event ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn submit_without_credentials_is_401() {
    let app = make_app(ApiSettings::default()).await;
    let body = json!([cites("10.1/a", "10.1/b")]).to_string();
    let resp = app.send("POST", "/event", None, &body).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let resp = app.send("POST", "/event", Some("wrong"), &body).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn submit_accepts_and_enqueues() {
    let mut app = make_app(ApiSettings::default()).await;
    let body = json!([cites("10.1/a", "10.1/b")]).to_string();
    let resp = app.send("POST", "/event", Some("secret"), &body).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let id: Uuid = serde_json::from_value(body_json(resp).await["event_id"].clone()).unwrap();
    let job = app.jobs.try_recv().unwrap();
    assert_eq!(job.event_id, id);
    assert_eq!(job.attempt, 0);

    let event = app.state.graph.get_event(id).await.unwrap().unwrap();
    assert_eq!(event.status, EventStatus::New);
    assert_eq!(event.kind, EventKind::RelationshipCreated);
    assert_eq!(event.user_id.as_deref(), Some("harvester"));
  }

  #[tokio::test]
  async fn submit_with_delete_kind() {
    let mut app = make_app(ApiSettings::default()).await;
    let body = json!([cites("10.1/a", "10.1/b")]).to_string();
    let resp = app
      .send("POST", "/event?kind=relationship_deleted", Some("secret"), &body)
      .await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let job = app.jobs.try_recv().unwrap();
    let event = app.state.graph.get_event(job.event_id).await.unwrap().unwrap();
    assert_eq!(event.kind, EventKind::RelationshipDeleted);

    let resp = app.send("POST", "/event?kind=purge", Some("secret"), &body).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn invalid_payload_is_422_with_field_path_and_not_stored() {
    let mut app = make_app(ApiSettings::default()).await;
    let mut package = cites("10.1/a", "10.1/b");
    package["Target"]["Identifier"]["IDScheme"] = json!("nope");
    let body = json!([cites("10.1/c", "10.1/d"), package]).to_string();

    let resp = app.send("POST", "/event", Some("secret"), &body).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(resp).await;
    assert_eq!(json["path"], "[1].Target.Identifier.IDScheme");
    assert!(app.jobs.try_recv().is_err());
    assert_eq!(app.state.graph.status_report().await.unwrap().events_new, 0);

    for body in ["not json", "{}", "[]"] {
      let resp = app.send("POST", "/event", Some("secret"), body).await;
      assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    }
  }

  #[tokio::test]
  async fn package_limit_is_configurable() {
    let app = make_app(ApiSettings { event_max_items: 2, ..ApiSettings::default() }).await;
    let two = json!([cites("10.1/a", "10.1/b"), cites("10.1/a", "10.1/c")]).to_string();
    let resp = app.send("POST", "/event", Some("secret"), &two).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let three =
      json!([cites("10.1/a", "10.1/b"), cites("10.1/a", "10.1/c"), cites("10.1/a", "10.1/d")])
        .to_string();
    let resp = app.send("POST", "/event", Some("secret"), &three).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }

  // ── GET /events/{id} ────────────────────────────────────────────────────────

  #[tokio::test]
  async fn event_status_reflects_processing() {
    let mut app = make_app(ApiSettings::default()).await;
    let body = json!([cites("10.1/a", "10.1/b")]).to_string();
    let resp = app.send("POST", "/event", Some("secret"), &body).await;
    let id = body_json(resp).await["event_id"].as_str().unwrap().to_string();
    app.process_queued().await;

    let resp = app.send("GET", &format!("/events/{id}"), Some("secret"), "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "done");
    assert_eq!(json["errors"], json!([]));

    let resp = app.send("GET", &format!("/events/{id}"), None, "").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let resp = app
      .send("GET", &format!("/events/{}", Uuid::new_v4()), Some("secret"), "")
      .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Queries ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn relationships_reads_the_index() {
    let mut app = make_app(ApiSettings::default()).await;
    let body = json!([cites("10.1/a", "10.1/b"), cites("10.1/c", "10.1/b")]).to_string();
    app.send("POST", "/event", Some("secret"), &body).await;
    app.process_queued().await;

    let resp = app.get("/relationships?id=10.1/B&scheme=doi&relation=isCitedBy").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["total"], 2);
    assert_eq!(json["hits"][0]["RelationshipType"], "Cites");
    assert_eq!(json["hits"][0]["Target"]["Type"]["Name"], "dataset");

    let resp = app
      .get("/relationships?id=10.1/b&scheme=doi&relation=isCitedBy&size=1&page=2")
      .await;
    let json = body_json(resp).await;
    assert_eq!(json["hits"].as_array().unwrap().len(), 1);

    let resp = app
      .get("/relationships?id=10.1/b&scheme=doi&relation=isCitedBy&from=2019-01-01")
      .await;
    assert_eq!(body_json(resp).await["total"], 0);

    let resp = app.get("/relationships?id=10.1/b&scheme=doi&relation=cites").await;
    assert_eq!(body_json(resp).await["total"], 0);
  }

  #[tokio::test]
  async fn relationships_rejects_bad_parameters() {
    let app = make_app(ApiSettings::default()).await;
    for uri in [
      "/relationships",
      "/relationships?id=10.1/b&scheme=doi",
      "/relationships?id=10.1/b&scheme=doi&relation=isCitedBy&page=x",
      "/relationships?id=10.1/b&scheme=doi&relation=isCitedBy&groupBy=none",
      "/db-relationships?id=10.1/b&relation=isCitedBy",
    ] {
      let resp = app.get(uri).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
  }

  #[tokio::test]
  async fn db_relationships_answer_from_the_graph() {
    let mut app = make_app(ApiSettings::default()).await;
    let body = json!([cites("10.1/a", "10.1/b")]).to_string();
    app.send("POST", "/event", Some("secret"), &body).await;
    app.process_queued().await;

    let indexed = body_json(app.get("/relationships?id=10.1/b&scheme=doi&relation=isCitedBy").await)
      .await;
    let resp = app
      .get("/db-relationships?id=10.1/b&scheme=doi&relation=isCitedBy")
      .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, indexed["hits"]);

    let resp = app
      .get("/db-relationships?id=10.1/b&scheme=doi&relation=isCitedBy&grouping=version")
      .await;
    let json = body_json(resp).await;
    assert_eq!(json[0]["Grouping"], "version");
  }

  #[tokio::test]
  async fn citations_by_doi_path() {
    let mut app = make_app(ApiSettings::default()).await;
    let body = json!([cites("10.1/a", "10.5281/zenodo.1"), cites("10.1/c", "10.5281/zenodo.1")])
      .to_string();
    app.send("POST", "/event", Some("secret"), &body).await;
    app.process_queued().await;

    let resp = app.get("/citations/10.5281/zenodo.1").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["citing"].as_array().unwrap().len(), 2);
    assert_eq!(json["target"][0]["value"], "10.5281/zenodo.1");

    let resp = app.get("/citations/10.5281/zenodo.1?expand_target=true").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.get("/citations/10.9999/unknown").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
