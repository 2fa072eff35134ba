//! `scholink search reindex|rollover`

use anyhow::Result;
use scholink_core::{index::{Rollover, SearchIndex}, projector::Projection};
use tracing::info;

use crate::broker::Broker;

/// Version groups per bulk batch when a reindex is split.
pub const SPLIT_BATCH: usize = 500;

#[derive(Debug)]
pub struct Reindexed {
  pub index:      String,
  pub projection: Projection,
  pub rollover:   Option<Rollover>,
}

/// Project every live group into a fresh index. The read alias only moves
/// when `rollover` is set.
pub async fn reindex(broker: &Broker, rollover: bool, split: bool) -> Result<Reindexed> {
  let (index, projection) = broker.projector.reindex(split.then_some(SPLIT_BATCH)).await?;
  info!(%index, written = projection.written, "reindex finished");

  let rollover = if rollover {
    Some(broker.index.rollover(Some(broker.settings.rollover_keep)).await?)
  } else {
    None
  };
  Ok(Reindexed { index, projection, rollover })
}

pub async fn rollover(broker: &Broker, keep_old: Option<usize>) -> Result<Rollover> {
  let rollover = broker.index.rollover(keep_old).await?;
  info!(read_index = %rollover.read_index, deleted = rollover.deleted.len(), "rollover finished");
  Ok(rollover)
}

#[cfg(test)]
mod tests {
  use std::fs;

  use scholink_core::event::EventKind;
  use serde_json::json;

  use super::*;
  use crate::{
    broker::testing::{broker, package, scratch_dir},
    events,
  };

  #[tokio::test]
  async fn reindex_fills_a_new_index_and_rolls_over() {
    let broker = broker().await;
    let dir = scratch_dir("reindex");
    fs::write(
      dir.join("1.json"),
      json!([package("10.1/a", "Cites", "10.1/b"), package("10.1/c", "Cites", "10.1/b")]).to_string(),
    )
    .unwrap();
    events::load(&broker, &dir, EventKind::RelationshipCreated).await.unwrap();
    let first = broker.index.write_index().await.unwrap();

    let plain = reindex(&broker, false, true).await.unwrap();
    assert_ne!(plain.index, first);
    assert_eq!(plain.projection.written, 4);
    assert!(plain.rollover.is_none());

    let rolled = reindex(&broker, true, false).await.unwrap();
    let rollover = rolled.rollover.unwrap();
    assert_eq!(rollover.read_index, rolled.index);
    assert_eq!(broker.index.list_indices().await.unwrap().len(), 2);
    fs::remove_dir_all(dir).unwrap();
  }

  #[tokio::test]
  async fn rollover_without_keep_deletes_nothing() {
    let broker = broker().await;
    broker.index.write_index().await.unwrap();
    let fresh = broker.index.create_index().await.unwrap();

    let result = rollover(&broker, None).await.unwrap();
    assert_eq!(result.read_index, fresh);
    assert!(result.deleted.is_empty());
    assert_eq!(broker.index.list_indices().await.unwrap().len(), 2);
  }
}
