//! Recovery of events that never reached a final status.

use std::time::Duration;

use chrono::{DateTime, Utc};
use scholink_core::{
  event::{EventFilter, EventJob, EventStatus},
  graph::GraphStore,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Enqueue every event still in `New`, e.g. after a restart. Returns how
/// many jobs reached the queue.
pub async fn enqueue_new<G: GraphStore>(
  graph: &G,
  queue: &mpsc::Sender<EventJob>,
) -> Result<usize, G::Error> {
  let ids = graph.list_event_ids(EventFilter::Status(EventStatus::New)).await?;
  let mut sent = 0;
  for id in ids {
    if queue.send(EventJob::new(id)).await.is_err() {
      warn!(sent, "event queue closed during startup recovery");
      break;
    }
    sent += 1;
  }
  Ok(sent)
}

/// Reset events stuck in `Processing` for longer than `stale_after` and
/// hand them back to the queue. Returns how many were reset.
pub async fn sweep<G: GraphStore>(
  graph: &G,
  queue: &mpsc::Sender<EventJob>,
  stale_after: Duration,
) -> Result<usize, G::Error> {
  let cutoff = chrono::Duration::from_std(stale_after)
    .ok()
    .and_then(|age| Utc::now().checked_sub_signed(age))
    .unwrap_or(DateTime::<Utc>::MIN_UTC);
  let stale = graph.stale_processing_events(cutoff).await?;
  for id in &stale {
    graph.set_event_status(*id, EventStatus::New).await?;
    if queue.send(EventJob::new(*id)).await.is_err() {
      warn!(event_id = %id, "event queue closed; left as new");
    }
  }
  if !stale.is_empty() {
    info!(count = stale.len(), "re-enqueued stale processing events");
  }
  Ok(stale.len())
}

/// Sweep every `interval` until the queue closes.
pub async fn run<G: GraphStore>(
  graph: std::sync::Arc<G>,
  queue: mpsc::Sender<EventJob>,
  interval: Duration,
  stale_after: Duration,
) {
  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  loop {
    ticker.tick().await;
    if queue.is_closed() {
      break;
    }
    if let Err(e) = sweep(graph.as_ref(), &queue, stale_after).await {
      warn!(error = %e, "janitor sweep failed");
    }
  }
}
