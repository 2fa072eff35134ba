//! Index projector: keeps the search index in step with the graph at group
//! granularity.

use std::{collections::BTreeSet, sync::Arc};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
  Failure, compact::CompactedGroups, graph::GraphStore, index::SearchIndex,
};

#[derive(Debug, Error)]
pub enum ProjectError<G, I> {
  #[error("graph read failed: {0}")]
  Graph(G),
  #[error("index write failed: {0}")]
  Index(I),
}

impl<G: Failure, I: Failure> ProjectError<G, I> {
  pub fn is_retryable(&self) -> bool {
    match self {
      ProjectError::Graph(e) => e.is_retryable(),
      ProjectError::Index(e) => e.is_retryable(),
    }
  }
}

type ProjectResult<T, G, I> =
  Result<T, ProjectError<<G as GraphStore>::Error, <I as SearchIndex>::Error>>;

/// Counts reported by a projection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Projection {
  pub deleted: u64,
  pub written: usize,
}

/// Writes relationship documents for changed groups into the write index.
///
/// Clones share one write lock, held from the purge through the graph read
/// to the bulk write. Only one projection writes to the index at a time.
pub struct Projector<G, I> {
  graph:      Arc<G>,
  index:      Arc<I>,
  write_lock: Arc<Mutex<()>>,
}

impl<G, I> Clone for Projector<G, I> {
  fn clone(&self) -> Self {
    Self {
      graph:      self.graph.clone(),
      index:      self.index.clone(),
      write_lock: self.write_lock.clone(),
    }
  }
}

impl<G: GraphStore, I: SearchIndex> Projector<G, I> {
  pub fn new(graph: Arc<G>, index: Arc<I>) -> Self {
    Self { graph, index, write_lock: Arc::new(Mutex::new(())) }
  }

  /// Purge every document touching a changed group, then rebuild the
  /// documents of the surviving groups.
  pub async fn project(&self, groups: &CompactedGroups) -> ProjectResult<Projection, G, I> {
    if groups.is_empty() {
      return Ok(Projection::default());
    }

    let _writer = self.write_lock.lock().await;
    let purge = groups.purge_set();
    let deleted = self
      .index
      .delete_for_groups(&purge)
      .await
      .map_err(ProjectError::Index)?;

    let docs = self
      .graph
      .documents_for(groups)
      .await
      .map_err(ProjectError::Graph)?;

    let written = self.index.bulk_index(docs).await.map_err(ProjectError::Index)?;
    debug!(purged = purge.len(), deleted, written, "projected groups");
    Ok(Projection { deleted, written })
  }

  /// Rebuild the whole projection into a freshly created index.
  ///
  /// With `split` set, Version groups are projected in batches of that
  /// size (together with their Identity sub-groups) instead of in a single
  /// bulk write. Returns the new index name.
  pub async fn reindex(&self, split: Option<usize>) -> ProjectResult<(String, Projection), G, I> {
    let name = {
      let _writer = self.write_lock.lock().await;
      self.index.create_index().await.map_err(ProjectError::Index)?
    };
    let all = self.graph.all_groups().await.map_err(ProjectError::Graph)?;

    let batches = match split {
      Some(size) if size > 0 => split_by_version(&all, size),
      _ => vec![all],
    };

    let mut total = Projection::default();
    for (i, batch) in batches.iter().enumerate() {
      let _writer = self.write_lock.lock().await;
      let docs = self
        .graph
        .documents_for(batch)
        .await
        .map_err(ProjectError::Graph)?;
      total.written += self.index.bulk_index(docs).await.map_err(ProjectError::Index)?;
      debug!(batch = i, version_groups = batch.idx_vg.len(), "reindexed batch");
    }

    info!(index = %name, documents = total.written, "reindex complete");
    Ok((name, total))
  }
}

/// Partition a full group set into batches of `size` Version groups, each
/// carrying the Identity groups that live under them.
fn split_by_version(all: &CompactedGroups, size: usize) -> Vec<CompactedGroups> {
  let version_groups: Vec<_> = all.idx_vg.iter().copied().collect();
  version_groups
    .chunks(size)
    .map(|chunk| {
      let vgs: BTreeSet<_> = chunk.iter().copied().collect();
      let ig_to_vg: std::collections::BTreeMap<_, _> = all
        .ig_to_vg
        .iter()
        .filter(|(_, vg)| vgs.contains(vg))
        .map(|(ig, vg)| (*ig, *vg))
        .collect();
      CompactedGroups {
        idx_ig: ig_to_vg.keys().copied().collect(),
        idx_vg: vgs,
        ig_to_vg,
        ..Default::default()
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn split_keeps_identity_groups_with_their_version_group() {
    let mut all = CompactedGroups::default();
    let vgs: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    for vg in &vgs {
      all.idx_vg.insert(*vg);
      for _ in 0..2 {
        let ig = Uuid::new_v4();
        all.idx_ig.insert(ig);
        all.ig_to_vg.insert(ig, *vg);
      }
    }

    let batches = split_by_version(&all, 2);
    assert_eq!(batches.len(), 3);
    assert_eq!(batches.iter().map(|b| b.idx_vg.len()).sum::<usize>(), 5);
    assert_eq!(batches.iter().map(|b| b.idx_ig.len()).sum::<usize>(), 10);
    for batch in &batches {
      for (ig, vg) in &batch.ig_to_vg {
        assert!(batch.idx_vg.contains(vg));
        assert!(batch.idx_ig.contains(ig));
      }
    }
  }
}
