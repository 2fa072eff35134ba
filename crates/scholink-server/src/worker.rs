//! Worker pool draining the event queue.
//!
//! Each worker takes one job at a time and runs it through the
//! [`EventProcessor`] under a deadline. Retryable failures are re-queued
//! once the retry delay has elapsed, up to `retry_max` extra attempts;
//! timeouts are left to the janitor.

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use scholink_core::{
  Failure,
  event::EventJob,
  graph::GraphStore,
  index::SearchIndex,
  processor::{EventProcessor, ProcessError},
};
use tokio::{
  sync::{Mutex, mpsc},
  task::JoinHandle,
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
  pub workers:       usize,
  pub event_timeout: Duration,
  pub retry_max:     u32,
  pub retry_delay:   Duration,
  /// Log the identifiers of each processed event for the metadata
  /// harvester.
  pub harvest:       bool,
}

/// The job to schedule after `err`, if any.
pub fn next_attempt(err: &ProcessError, job: EventJob, retry_max: u32) -> Option<EventJob> {
  (err.is_retryable() && job.attempt < retry_max).then(|| job.retry())
}

/// Spawn `settings.workers` tasks sharing `jobs`. `requeue` is where delayed
/// retries are sent; normally the sending half of `jobs`.
pub fn spawn<G, I>(
  processor: EventProcessor<G, I>,
  jobs: mpsc::Receiver<EventJob>,
  requeue: mpsc::Sender<EventJob>,
  settings: WorkerSettings,
) -> Vec<JoinHandle<()>>
where
  G: GraphStore + 'static,
  I: SearchIndex + 'static,
{
  let jobs = Arc::new(Mutex::new(jobs));
  (0..settings.workers)
    .map(|worker| {
      let processor = processor.clone();
      let jobs = jobs.clone();
      let requeue = requeue.clone();
      tokio::spawn(async move {
        loop {
          let next = jobs.lock().await.recv().await;
          let Some(job) = next else { break };
          run_job(&processor, job, &requeue, &settings).await;
        }
        debug!(worker, "event queue closed; worker exiting");
      })
    })
    .collect()
}

async fn run_job<G, I>(
  processor: &EventProcessor<G, I>,
  job: EventJob,
  requeue: &mpsc::Sender<EventJob>,
  settings: &WorkerSettings,
) where
  G: GraphStore + 'static,
  I: SearchIndex + 'static,
{
  let deadline = Instant::now() + settings.event_timeout;
  match processor.process(job, Some(deadline)).await {
    Ok(_) if settings.harvest => log_for_harvest(processor.graph().as_ref(), job).await,
    Ok(_) => {}
    Err(ProcessError::Timeout(id)) => {
      warn!(event_id = %id, "event left in processing for the janitor");
    }
    Err(err) => match next_attempt(&err, job, settings.retry_max) {
      Some(retry) => {
        warn!(
          event_id = %job.event_id,
          attempt = retry.attempt,
          delay_secs = settings.retry_delay.as_secs(),
          "scheduling retry"
        );
        let requeue = requeue.clone();
        let delay = settings.retry_delay;
        tokio::spawn(async move {
          tokio::time::sleep(delay).await;
          if requeue.send(retry).await.is_err() {
            warn!(event_id = %retry.event_id, "queue closed before retry");
          }
        });
      }
      None => error!(event_id = %job.event_id, error = %err, "event failed permanently"),
    },
  }
}

async fn log_for_harvest<G: GraphStore>(graph: &G, job: EventJob) {
  match graph.event_identifiers(job.event_id).await {
    Ok(identifiers) => {
      let ids: Vec<String> = identifiers.iter().map(|i| format!("{}:{}", i.scheme, i.value)).collect();
      info!(event_id = %job.event_id, identifiers = ?ids, "identifiers ready for metadata harvest");
    }
    Err(e) => warn!(event_id = %job.event_id, error = %e, "could not list event identifiers"),
  }
}

#[cfg(test)]
mod tests {
  use scholink_core::{
    event::{ErrorOrigin, EventKind, EventStatus, NewEvent},
    processor::ProcessorSettings,
  };
  use scholink_store_sqlite::{SqliteIndex, SqliteStore};
  use serde_json::json;
  use uuid::Uuid;

  use super::*;

  fn failed(retryable: bool) -> ProcessError {
    ProcessError::Failed {
      event_id: Uuid::new_v4(),
      origin: ErrorOrigin::Indexer,
      message: "boom".into(),
      retryable,
    }
  }

  #[test]
  fn retryable_failures_get_one_more_attempt() {
    let job = EventJob::new(Uuid::new_v4());
    let retry = next_attempt(&failed(true), job, 1).unwrap();
    assert_eq!(retry.attempt, 1);
    assert_eq!(next_attempt(&failed(true), retry, 1), None);
    assert_eq!(next_attempt(&failed(false), job, 1), None);
    assert_eq!(next_attempt(&ProcessError::Timeout(job.event_id), job, 1), None);
    assert_eq!(next_attempt(&failed(true), job, 0), None);
  }

  #[tokio::test]
  async fn pool_processes_queued_events() {
    let graph = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let index = Arc::new(SqliteIndex::open_in_memory().await.unwrap());
    let processor = EventProcessor::new(graph.clone(), index, ProcessorSettings::default());

    let payload = json!([{
      "Source": {"Identifier": {"ID": "10.1/a", "IDScheme": "doi"}},
      "RelationshipType": {"Name": "Cites"},
      "Target": {"Identifier": {"ID": "10.1/b", "IDScheme": "doi"}},
      "LinkPublicationDate": "2020-01-01",
      "LinkProvider": [{"Name": "Zenodo"}]
    }]);
    let event = graph
      .append_event(NewEvent { kind: EventKind::RelationshipCreated, payload, user_id: None })
      .await
      .unwrap();

    let (tx, rx) = mpsc::channel(4);
    let settings = WorkerSettings {
      workers:       2,
      event_timeout: Duration::from_secs(30),
      retry_max:     1,
      retry_delay:   Duration::from_millis(10),
      harvest:       true,
    };
    let handles = spawn(processor, rx, tx.clone(), settings);
    tx.send(EventJob::new(event.id)).await.unwrap();

    let mut status = EventStatus::New;
    for _ in 0..200 {
      status = graph.get_event(event.id).await.unwrap().unwrap().status;
      if status == EventStatus::Done {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, EventStatus::Done);

    // Workers hold the requeue sender, so the channel never closes on its own.
    for handle in handles {
      handle.abort();
    }
  }
}
