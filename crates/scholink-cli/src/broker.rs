//! The backends and pipeline pieces every command works against.

use std::{
  fs,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context, Result};
use scholink_core::{
  compact::CompactedGroups,
  event::EventJob,
  processor::{EventProcessor, Processed},
  projector::Projector,
};
use scholink_server::Settings;
use scholink_store_sqlite::{SqliteIndex, SqliteStore};

pub struct Broker {
  pub settings:  Settings,
  pub graph:     Arc<SqliteStore>,
  pub index:     Arc<SqliteIndex>,
  pub processor: EventProcessor<SqliteStore, SqliteIndex>,
  pub projector: Projector<SqliteStore, SqliteIndex>,
}

impl Broker {
  pub async fn open(settings: Settings) -> Result<Self> {
    let (graph, index) = scholink_server::open_backends(&settings).await?;
    Ok(Self::with_backends(settings, graph, index))
  }

  pub fn with_backends(settings: Settings, graph: Arc<SqliteStore>, index: Arc<SqliteIndex>) -> Self {
    let processor =
      EventProcessor::new(graph.clone(), index.clone(), settings.processor_settings());
    Self {
      projector: processor.projector().clone(),
      processor,
      settings,
      graph,
      index,
    }
  }

  /// Process one event in the foreground, without automatic retry.
  pub async fn process(&self, job: EventJob) -> Result<Processed> {
    Ok(self.processor.process(job, None).await?)
  }

  /// Project `groups` unless indexing is disabled.
  pub async fn project(&self, groups: &CompactedGroups) -> Result<usize> {
    if !self.settings.search_indexing_enabled {
      return Ok(0);
    }
    let projection = self.projector.project(groups).await?;
    Ok(projection.written)
  }
}

/// JSON files under `path`: the file itself, or the `.json` files directly
/// inside a directory, sorted by name.
pub fn json_files(path: &Path) -> Result<Vec<PathBuf>> {
  if path.is_file() {
    return Ok(vec![path.to_path_buf()]);
  }
  let mut files = Vec::new();
  for entry in fs::read_dir(path).with_context(|| format!("reading {}", path.display()))? {
    let entry_path = entry?.path();
    if entry_path.is_file() && entry_path.extension().is_some_and(|ext| ext == "json") {
      files.push(entry_path);
    }
  }
  files.sort();
  Ok(files)
}

pub fn read_json(path: &Path) -> Result<serde_json::Value> {
  let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
  serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}
