//! Compaction of per-assertion group changes into the set of groups whose
//! index documents must be rebuilt after an event commits.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::group::GroupChange;

/// Group IDs affected by one committed event.
///
/// `idx_*` groups survive and must be re-projected; `del_*` groups were
/// destroyed by merges and only need their documents removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactedGroups {
  pub idx_ig:   BTreeSet<Uuid>,
  pub del_ig:   BTreeSet<Uuid>,
  pub idx_vg:   BTreeSet<Uuid>,
  pub del_vg:   BTreeSet<Uuid>,
  /// Parent Version group of every surviving Identity group in `idx_ig`.
  pub ig_to_vg: BTreeMap<Uuid, Uuid>,
}

impl CompactedGroups {
  /// Fold the changes reported for each link package, in order.
  ///
  /// A group reported by an earlier package and destroyed by a later merge
  /// ends up only in the `del_*` set. The `ig_to_vg` map is left empty; the
  /// store fills it once the final group layout is known.
  pub fn compact(changes: &[GroupChange]) -> Self {
    let mut out = Self::default();
    let mut idx_ig = BTreeSet::new();
    let mut idx_vg = BTreeSet::new();

    for c in changes {
      match c.merged_ig {
        Some(merged) => {
          out.del_ig.insert(c.src_ig);
          out.del_ig.insert(c.trg_ig);
          idx_ig.insert(merged);
        }
        None => {
          idx_ig.insert(c.src_ig);
          idx_ig.insert(c.trg_ig);
        }
      }
      match c.merged_vg {
        Some(merged) => {
          out.del_vg.insert(c.src_vg);
          out.del_vg.insert(c.trg_vg);
          idx_vg.insert(merged);
        }
        None => {
          idx_vg.insert(c.src_vg);
          idx_vg.insert(c.trg_vg);
        }
      }
    }

    out.idx_ig = idx_ig.difference(&out.del_ig).copied().collect();
    out.idx_vg = idx_vg.difference(&out.del_vg).copied().collect();
    out
  }

  /// Every group whose documents must be purged before rebuilding.
  pub fn purge_set(&self) -> BTreeSet<Uuid> {
    self
      .idx_ig
      .iter()
      .chain(&self.del_ig)
      .chain(&self.idx_vg)
      .chain(&self.del_vg)
      .copied()
      .collect()
  }

  pub fn is_empty(&self) -> bool {
    self.idx_ig.is_empty()
      && self.del_ig.is_empty()
      && self.idx_vg.is_empty()
      && self.del_vg.is_empty()
  }

  /// Merge another set into this one, e.g. when batching several events.
  pub fn absorb(&mut self, other: CompactedGroups) {
    self.del_ig.extend(other.del_ig);
    self.del_vg.extend(other.del_vg);
    self.idx_ig.extend(other.idx_ig);
    self.idx_vg.extend(other.idx_vg);
    self.ig_to_vg.extend(other.ig_to_vg);
    let del_ig = &self.del_ig;
    let del_vg = &self.del_vg;
    self.idx_ig.retain(|g| !del_ig.contains(g));
    self.idx_vg.retain(|g| !del_vg.contains(g));
    self.ig_to_vg.retain(|ig, _| !del_ig.contains(ig));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids<const N: usize>() -> [Uuid; N] { std::array::from_fn(|_| Uuid::new_v4()) }

  #[test]
  fn plain_edges_index_both_endpoints() {
    let [a, b, va, vb] = ids();
    let c = CompactedGroups::compact(&[GroupChange {
      src_ig: a, trg_ig: b, merged_ig: None,
      src_vg: va, trg_vg: vb, merged_vg: None,
    }]);
    assert_eq!(c.idx_ig, BTreeSet::from([a, b]));
    assert_eq!(c.idx_vg, BTreeSet::from([va, vb]));
    assert!(c.del_ig.is_empty() && c.del_vg.is_empty());
  }

  #[test]
  fn chained_merges_keep_only_the_last_survivor() {
    let [a, b, c, x, m1, m2, va, vb, vc, vx, vm1, vm2] = ids();
    let changes = [
      GroupChange { src_ig: a, trg_ig: x, merged_ig: None, src_vg: va, trg_vg: vx, merged_vg: None },
      GroupChange { src_ig: a, trg_ig: b, merged_ig: Some(m1), src_vg: va, trg_vg: vb, merged_vg: Some(vm1) },
      GroupChange { src_ig: m1, trg_ig: c, merged_ig: Some(m2), src_vg: vm1, trg_vg: vc, merged_vg: Some(vm2) },
    ];
    let out = CompactedGroups::compact(&changes);
    assert_eq!(out.idx_ig, BTreeSet::from([x, m2]));
    assert_eq!(out.del_ig, BTreeSet::from([a, b, m1, c]));
    assert_eq!(out.idx_vg, BTreeSet::from([vx, vm2]));
    assert_eq!(out.del_vg, BTreeSet::from([va, vb, vm1, vc]));
    assert_eq!(out.purge_set().len(), 12);
  }

  #[test]
  fn version_merge_leaves_identity_groups_indexed() {
    let [a, b, va, vb, vm] = ids();
    let out = CompactedGroups::compact(&[GroupChange {
      src_ig: a, trg_ig: b, merged_ig: None,
      src_vg: va, trg_vg: vb, merged_vg: Some(vm),
    }]);
    assert_eq!(out.idx_ig, BTreeSet::from([a, b]));
    assert_eq!(out.idx_vg, BTreeSet::from([vm]));
    assert_eq!(out.del_vg, BTreeSet::from([va, vb]));
  }

  #[test]
  fn absorb_drops_groups_deleted_later() {
    let [a, b, m, va] = ids();
    let mut first = CompactedGroups::default();
    first.idx_ig.insert(a);
    first.ig_to_vg.insert(a, va);
    let mut second = CompactedGroups::default();
    second.del_ig.extend([a, b]);
    second.idx_ig.insert(m);
    first.absorb(second);
    assert_eq!(first.idx_ig, BTreeSet::from([m]));
    assert!(first.ig_to_vg.is_empty());
  }
}
