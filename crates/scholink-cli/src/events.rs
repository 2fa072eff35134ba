//! `scholink events load|rerun`

use std::path::Path;

use anyhow::{Context, Result};
use scholink_core::{
  event::{EventFilter, EventJob, EventKind, EventStatus, NewEvent},
  graph::GraphStore,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::broker::{Broker, json_files, read_json};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
  pub processed:  usize,
  pub failed:     usize,
  /// Files whose payload was already stored by an earlier event.
  pub duplicates: usize,
}

/// Load every event file under `path` and process it in the foreground.
///
/// All files are validated before the first one is stored, so a bad file
/// leaves the store untouched.
pub async fn load(broker: &Broker, path: &Path, kind: EventKind) -> Result<Summary> {
  let mut payloads = Vec::new();
  for file in json_files(path)? {
    let payload = read_json(&file)?;
    scholink_scholix::parse_event(&payload, Some(broker.settings.event_max_items))
      .with_context(|| format!("invalid event payload in {}", file.display()))?;
    payloads.push((file, payload));
  }

  let mut summary = Summary::default();
  for (file, payload) in payloads {
    let digest = scholink_store_sqlite::payload_digest(&payload)?;
    if !broker.graph.events_with_digest(digest).await?.is_empty() {
      info!(file = %file.display(), "payload already loaded; processing again");
      summary.duplicates += 1;
    }

    let event = broker
      .graph
      .append_event(NewEvent { kind, payload, user_id: None })
      .await?;
    match broker.process(EventJob::new(event.id)).await {
      Ok(_) => summary.processed += 1,
      Err(e) => {
        warn!(file = %file.display(), event_id = %event.id, error = %e, "event failed");
        summary.failed += 1;
      }
    }
  }
  Ok(summary)
}

/// Which stored events to process again.
#[derive(Debug, Clone)]
pub enum Selection {
  Ids(Vec<Uuid>),
  All,
  Errors,
  Processing,
}

pub async fn rerun(broker: &Broker, selection: Selection) -> Result<Summary> {
  let ids = match selection {
    Selection::Ids(ids) => ids,
    Selection::All => broker.graph.list_event_ids(EventFilter::All).await?,
    Selection::Errors => {
      broker.graph.list_event_ids(EventFilter::Status(EventStatus::Error)).await?
    }
    Selection::Processing => {
      broker
        .graph
        .list_event_ids(EventFilter::Status(EventStatus::Processing))
        .await?
    }
  };

  let mut summary = Summary::default();
  for id in ids {
    match broker.process(EventJob::new(id)).await {
      Ok(_) => summary.processed += 1,
      Err(e) => {
        warn!(event_id = %id, error = %e, "rerun failed");
        summary.failed += 1;
      }
    }
  }
  Ok(summary)
}
