//! In-memory item cache keyed by workspace path
//!
//! The cache maps each indexed path to the ordered items extracted from it.
//! The key set doubles as the ordered corpus of known paths. Every mutation
//! replaces or removes whole entries under one write lock, so readers never see
//! a path with half of its items.
//!
//! The cache does not serialize writers itself. All mutations are issued from
//! inside action execution, which the processor runs one at a time.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use everywhere_core::Item;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Plain cache contents, used for snapshots and persistence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheState {
  pub entries: BTreeMap<PathBuf, Vec<Item>>,
  pub item_count: usize,
}

impl CacheState {
  /// Build a state from entries, computing the item count
  pub fn from_entries(entries: BTreeMap<PathBuf, Vec<Item>>) -> Self {
    let item_count = entries.values().map(Vec::len).sum();
    Self { entries, item_count }
  }

  fn insert(&mut self, path: PathBuf, items: Vec<Item>) {
    let added = items.len();
    if let Some(previous) = self.entries.insert(path, items) {
      self.item_count -= previous.len();
    }
    self.item_count += added;
  }

  fn remove(&mut self, path: &Path) -> bool {
    match self.entries.remove(path) {
      Some(previous) => {
        self.item_count -= previous.len();
        true
      }
      None => false,
    }
  }
}

/// Thread-safe item cache
#[derive(Debug, Default)]
pub struct Cache {
  state: RwLock<CacheState>,
}

impl Cache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a cache from a previously persisted snapshot
  pub fn from_state(state: CacheState) -> Self {
    // Recount in case the snapshot was edited by hand
    Self {
      state: RwLock::new(CacheState::from_entries(state.entries)),
    }
  }

  fn read(&self) -> RwLockReadGuard<'_, CacheState> {
    self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
    self.state.write().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn get(&self, path: &Path) -> Option<Vec<Item>> {
    self.read().entries.get(path).cloned()
  }

  pub fn contains(&self, path: &Path) -> bool {
    self.read().entries.contains_key(path)
  }

  /// Replace the entry for `path`
  pub fn set(&self, path: PathBuf, items: Vec<Item>) {
    trace!(path = %path.display(), items = items.len(), "Cache set");
    self.write().insert(path, items);
  }

  /// Remove the entry for `path`, returning whether one existed
  pub fn delete(&self, path: &Path) -> bool {
    let removed = self.write().remove(path);
    trace!(path = %path.display(), removed, "Cache delete");
    removed
  }

  /// Remove every entry whose path lies under `prefix` (component-wise), returning how many were removed
  ///
  /// `/ws/src` matches `/ws/src` and `/ws/src/a.rs` but not `/ws/src2/a.rs`.
  /// Paths order by component, so everything under `prefix` is one contiguous range.
  pub fn delete_prefix(&self, prefix: &Path) -> usize {
    let mut state = self.write();
    let doomed: Vec<PathBuf> = state
      .entries
      .range(prefix.to_path_buf()..)
      .map(|(path, _)| path)
      .take_while(|path| path.starts_with(prefix))
      .cloned()
      .collect();

    for path in &doomed {
      state.remove(path);
    }
    trace!(prefix = %prefix.display(), removed = doomed.len(), "Cache delete prefix");
    doomed.len()
  }

  /// Check whether any entry lies under `prefix` (component-wise)
  pub fn has_entries_under(&self, prefix: &Path) -> bool {
    let state = self.read();
    state
      .entries
      .range(prefix.to_path_buf()..)
      .map(|(path, _)| path)
      .next()
      .is_some_and(|path| path.starts_with(prefix))
  }

  pub fn clear(&self) {
    *self.write() = CacheState::default();
  }

  /// Swap in a freshly built state in one step
  pub fn replace(&self, state: CacheState) {
    *self.write() = CacheState::from_entries(state.entries);
  }

  /// Clone the full contents
  pub fn snapshot(&self) -> CacheState {
    self.read().clone()
  }

  /// All known paths in order
  pub fn paths(&self) -> Vec<PathBuf> {
    self.read().entries.keys().cloned().collect()
  }

  /// Number of indexed paths
  pub fn len(&self) -> usize {
    self.read().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.read().entries.is_empty()
  }

  /// Total number of items across all paths
  pub fn item_count(&self) -> usize {
    self.read().item_count
  }

  /// Visit every entry under a single read lock
  pub fn for_each<F>(&self, mut visit: F)
  where
    F: FnMut(&Path, &[Item]),
  {
    let state = self.read();
    for (path, items) in &state.entries {
      visit(path, items);
    }
  }
}
