//! `scholink harvester metadata|events`
//!
//! No harvesters are wired in; these commands resolve and print the
//! identifiers a harvest would be scheduled for.

use anyhow::{Context, Result};
use scholink_core::{graph::GraphStore, identifier::{Identifier, IdentifierKey}};
use uuid::Uuid;

use crate::broker::Broker;

pub fn metadata(values: &[String], scheme: &str) -> Result<Vec<IdentifierKey>> {
  values
    .iter()
    .map(|value| {
      IdentifierKey::normalized(value, scheme).with_context(|| format!("cannot harvest {value}"))
    })
    .collect()
}

/// Identifiers touched by each event's payload.
pub async fn events(broker: &Broker, ids: &[Uuid]) -> Result<Vec<(Uuid, Vec<Identifier>)>> {
  let mut out = Vec::with_capacity(ids.len());
  for id in ids {
    out.push((*id, broker.graph.event_identifiers(*id).await?));
  }
  Ok(out)
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

  #[test]
  fn metadata_normalizes_and_rejects() {
    let keys = metadata(&["https://doi.org/10.1/ABC".into()], "DOI").unwrap();
    assert_eq!(keys[0].to_string(), "doi:10.1/abc");
    assert!(metadata(&["x".into()], "foo").is_err());
  }

  #[tokio::test]
  async fn events_lists_payload_identifiers() {
    let broker = broker().await;
    let dir = scratch_dir("harvest");
    fs::write(dir.join("1.json"), json!([package("10.1/a", "Cites", "10.1/b")]).to_string()).unwrap();
    events::load(&broker, &dir, EventKind::RelationshipCreated).await.unwrap();
    let ids = broker
      .graph
      .list_event_ids(scholink_core::event::EventFilter::All)
      .await
      .unwrap();

    let listed = super::events(&broker, &ids).await.unwrap();
    let mut values: Vec<_> = listed[0].1.iter().map(|i| i.value.clone()).collect();
    values.sort();
    assert_eq!(values, ["10.1/a", "10.1/b"]);
    fs::remove_dir_all(dir).unwrap();
  }
}
