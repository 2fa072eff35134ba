//! Handlers for `/event` and `/events/{id}`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/event` | Basic auth; body is a JSON array of link packages; optional `?kind=relationship_deleted` |
//! | `GET`  | `/events/{id}` | Basic auth; the event with its error-log rows |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::QueryRejection},
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use scholink_core::{
  event::{ErrorRecord, Event, EventJob, EventKind, NewEvent},
  graph::GraphStore,
  index::SearchIndex,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Submit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct SubmitParams {
  pub kind: Option<EventKind>,
}

/// `POST /event[?kind=relationship_created|relationship_deleted]`
///
/// The payload is validated in full before anything is stored. Accepted
/// events are persisted with status `new` and handed to the worker queue;
/// processing is asynchronous.
pub async fn submit<G, I>(
  State(state): State<AppState<G, I>>,
  Authenticated(user): Authenticated,
  params: Result<Query<SubmitParams>, QueryRejection>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  G: GraphStore + 'static,
  I: SearchIndex + 'static,
{
  let Query(params) = params?;
  let (payload, assertions) =
    scholink_scholix::parse_event_slice(&body, Some(state.settings.event_max_items))?;

  let event = state
    .graph
    .append_event(NewEvent {
      kind: params.kind.unwrap_or_default(),
      payload,
      user_id: Some(user),
    })
    .await
    .map_err(ApiError::store)?;
  info!(event_id = %event.id, kind = %event.kind, packages = assertions.len(), "event accepted");

  // A full or closed queue is not fatal: the event stays `new` and is picked
  // up again on the next server start.
  if let Err(e) = state.queue.try_send(EventJob::new(event.id)) {
    warn!(event_id = %event.id, error = %e, "could not enqueue event");
  }

  Ok((StatusCode::ACCEPTED, Json(json!({ "event_id": event.id }))))
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EventStatusBody {
  #[serde(flatten)]
  pub event:  Event,
  pub errors: Vec<ErrorRecord>,
}

/// `GET /events/{id}`
pub async fn get_one<G, I>(
  State(state): State<AppState<G, I>>,
  _: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<EventStatusBody>, ApiError>
where
  G: GraphStore + 'static,
  I: SearchIndex + 'static,
{
  let event = state
    .graph
    .get_event(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("event {id}")))?;
  let errors = state.graph.list_errors(Some(id)).await.map_err(ApiError::store)?;
  Ok(Json(EventStatusBody { event, errors }))
}
