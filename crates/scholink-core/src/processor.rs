//! Event processor: drives one stored event through the graph transaction
//! and the index projection, recording the final status.

use std::{sync::Arc, time::Instant};

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  Failure,
  compact::CompactedGroups,
  event::{ErrorOrigin, Event, EventJob, EventStatus, NewErrorRecord},
  graph::GraphStore,
  index::SearchIndex,
  projector::{Projection, Projector},
};

#[derive(Debug, Clone, Copy)]
pub struct ProcessorSettings {
  /// Project committed changes into the search index.
  pub indexing_enabled: bool,
}

impl Default for ProcessorSettings {
  fn default() -> Self { Self { indexing_enabled: true } }
}

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("event {0} not found")]
  NotFound(Uuid),

  /// The deadline passed before the graph transaction committed. The event
  /// stays `Processing` for the janitor to pick up.
  #[error("event {0} timed out")]
  Timeout(Uuid),

  #[error("{origin} failure on event {event_id}: {message}")]
  Failed {
    event_id:  Uuid,
    origin:    ErrorOrigin,
    message:   String,
    retryable: bool,
  },
}

impl Failure for ProcessError {
  fn is_retryable(&self) -> bool {
    matches!(self, ProcessError::Failed { retryable: true, .. })
  }

  fn is_timeout(&self) -> bool { matches!(self, ProcessError::Timeout(_)) }
}

/// Result of a successfully processed event.
#[derive(Debug, Clone)]
pub struct Processed {
  pub event:      Event,
  pub groups:     CompactedGroups,
  pub projection: Projection,
}

pub struct EventProcessor<G, I> {
  graph:     Arc<G>,
  projector: Projector<G, I>,
  settings:  ProcessorSettings,
}

impl<G, I> Clone for EventProcessor<G, I> {
  fn clone(&self) -> Self {
    Self {
      graph:     self.graph.clone(),
      projector: self.projector.clone(),
      settings:  self.settings,
    }
  }
}

impl<G: GraphStore, I: SearchIndex> EventProcessor<G, I> {
  pub fn new(graph: Arc<G>, index: Arc<I>, settings: ProcessorSettings) -> Self {
    Self {
      projector: Projector::new(graph.clone(), index),
      graph,
      settings,
    }
  }

  pub fn graph(&self) -> &Arc<G> { &self.graph }

  /// The projector events are indexed through. Clones share its write lock.
  pub fn projector(&self) -> &Projector<G, I> { &self.projector }

  /// Process one delivery of an event.
  ///
  /// Status moves `Processing` → `Done` on success and `Processing` →
  /// `Error` on failure, with an error-log row carrying `job.attempt`. A
  /// timeout leaves the status untouched.
  pub async fn process(
    &self,
    job: EventJob,
    deadline: Option<Instant>,
  ) -> Result<Processed, ProcessError> {
    let id = job.event_id;
    let event = self
      .graph
      .get_event(id)
      .await
      .map_err(|e| graph_failure(id, &e))?
      .ok_or(ProcessError::NotFound(id))?;

    self
      .graph
      .set_event_status(id, EventStatus::Processing)
      .await
      .map_err(|e| graph_failure(id, &e))?;

    let groups = match self.graph.apply_event(id, deadline).await {
      Ok(groups) => groups,
      Err(e) if e.is_timeout() => {
        warn!(event_id = %id, attempt = job.attempt, "event processing timed out");
        return Err(ProcessError::Timeout(id));
      }
      Err(e) => {
        let retryable = e.is_retryable();
        return Err(self.fail(&event, job, ErrorOrigin::Graph, format!("{e:?}"), retryable).await);
      }
    };

    let projection = if self.settings.indexing_enabled {
      match self.projector.project(&groups).await {
        Ok(p) => p,
        Err(e) => {
          let retryable = e.is_retryable();
          return Err(
            self.fail(&event, job, ErrorOrigin::Indexer, format!("{e:?}"), retryable).await,
          );
        }
      }
    } else {
      Projection::default()
    };

    self
      .graph
      .set_event_status(id, EventStatus::Done)
      .await
      .map_err(|e| graph_failure(id, &e))?;

    info!(
      event_id = %id,
      identity_groups = groups.idx_ig.len(),
      version_groups = groups.idx_vg.len(),
      documents = projection.written,
      "event processed"
    );
    Ok(Processed { event, groups, projection })
  }

  async fn fail(
    &self,
    event: &Event,
    job: EventJob,
    origin: ErrorOrigin,
    message: String,
    retryable: bool,
  ) -> ProcessError {
    error!(event_id = %event.id, %origin, attempt = job.attempt, error = %message, "event failed");

    if let Err(e) = self.graph.set_event_status(event.id, EventStatus::Error).await {
      error!(event_id = %event.id, error = %e, "could not mark event as failed");
    }
    let record = NewErrorRecord {
      event_id:  event.id,
      origin,
      error:     message.clone(),
      n_retries: job.attempt,
      payload:   event.payload.clone(),
    };
    if let Err(e) = self.graph.record_error(record).await {
      error!(event_id = %event.id, error = %e, "could not write error log");
    }

    ProcessError::Failed { event_id: event.id, origin, message, retryable }
  }
}

fn graph_failure<E: std::error::Error + Failure>(event_id: Uuid, e: &E) -> ProcessError {
  ProcessError::Failed {
    event_id,
    origin: ErrorOrigin::Graph,
    message: e.to_string(),
    retryable: e.is_retryable(),
  }
}
