//! CellSet: the input/output shape of traversal operations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::CellId;

/// An unordered set of cells. Iteration is by cell ID so output built from
/// a set is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellSet(BTreeSet<CellId>);

/// How `mask` treats cells that fall inside the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskMode {
    /// Keep only cells inside the mask.
    Keep,
    /// Drop cells inside the mask.
    Remove,
}

impl CellSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, cell: &CellId) -> bool {
        self.0.contains(cell)
    }

    /// Returns true if the cell was not already present.
    pub fn insert(&mut self, cell: CellId) -> bool {
        self.0.insert(cell)
    }

    pub fn remove(&mut self, cell: &CellId) -> bool {
        self.0.remove(cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellId> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<CellId> {
        self.0.iter().cloned().collect()
    }

    pub fn is_superset(&self, other: &CellSet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn union(&self, other: &CellSet) -> CellSet {
        CellSet(self.0.union(&other.0).cloned().collect())
    }

    pub fn intersection(&self, other: &CellSet) -> CellSet {
        CellSet(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn difference(&self, other: &CellSet) -> CellSet {
        CellSet(self.0.difference(&other.0).cloned().collect())
    }

    pub fn mask(&self, mask: &CellSet, mode: MaskMode) -> CellSet {
        match mode {
            MaskMode::Keep => self.intersection(mask),
            MaskMode::Remove => self.difference(mask),
        }
    }
}

impl FromIterator<CellId> for CellSet {
    fn from_iter<I: IntoIterator<Item = CellId>>(iter: I) -> Self {
        CellSet(iter.into_iter().collect())
    }
}

impl Extend<CellId> for CellSet {
    fn extend<I: IntoIterator<Item = CellId>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl IntoIterator for CellSet {
    type Item = CellId;
    type IntoIter = std::collections::btree_set::IntoIter<CellId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CellSet {
    type Item = &'a CellId;
    type IntoIter = std::collections::btree_set::Iter<'a, CellId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Result of a capped traversal.
///
/// `truncated` is set when the cell cap stopped the traversal before all
/// requested iterations ran; `cells` then holds the set reached so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalResult {
    pub cells: CellSet,
    pub truncated: bool,
    pub iterations_completed: usize,
}
