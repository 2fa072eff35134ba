//! `scholink metadata load`

use std::path::Path;

use anyhow::{Context, Result};
use scholink_core::{compact::CompactedGroups, graph::GraphStore};
use tracing::info;

use crate::broker::{Broker, json_files, read_json};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
  pub objects:   usize,
  pub documents: usize,
}

/// Fold object metadata files into the stored groups, then re-project
/// every group they touched in one pass.
pub async fn load(broker: &Broker, path: &Path) -> Result<Summary> {
  let mut summary = Summary::default();
  let mut touched = CompactedGroups::default();

  for file in json_files(path)? {
    let payload = read_json(&file)?;
    let objects = scholink_scholix::parse_objects(&payload)
      .with_context(|| format!("invalid object metadata in {}", file.display()))?;
    for object in objects {
      touched.absorb(broker.graph.update_object_metadata(object.key, object.metadata).await?);
      summary.objects += 1;
    }
    info!(file = %file.display(), "loaded object metadata");
  }

  summary.documents = broker.project(&touched).await?;
  Ok(summary)
}
