//! Workspace roots and the memoized listing of eligible paths
//!
//! Walking every root is the most expensive step of a reindex, so the listing
//! is memoized until a structural change (create, rename, delete, folder
//! change) clears it. A listing only serves the snapshot it was walked under.
//! Walks run on the blocking pool and prune excluded
//! directories before descending into them.

use std::{
  path::{Path, PathBuf},
  sync::{Arc, Mutex, PoisonError, RwLock},
};

use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::{action::ActionError, settings::ConfigSnapshot};

/// Workspace folders plus a memoized eligible-path listing
#[derive(Debug, Default)]
pub struct WorkspacePaths {
  roots: RwLock<Vec<PathBuf>>,
  listing: Mutex<Option<Listing>>,
}

#[derive(Debug)]
struct Listing {
  snapshot: Arc<ConfigSnapshot>,
  paths: Arc<Vec<PathBuf>>,
}

impl WorkspacePaths {
  pub fn new(roots: Vec<PathBuf>) -> Self {
    Self {
      roots: RwLock::new(dedup_roots(roots)),
      listing: Mutex::new(None),
    }
  }

  pub fn roots(&self) -> Vec<PathBuf> {
    self.roots.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// The innermost workspace root containing `path`
  pub fn root_for(&self, path: &Path) -> Option<PathBuf> {
    self
      .roots
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .filter(|root| path.starts_with(root))
      .max_by_key(|root| root.components().count())
      .cloned()
  }

  pub fn is_path_in_workspace(&self, path: &Path) -> bool {
    self.root_for(path).is_some()
  }

  /// Check `path` against the snapshot's filters relative to its root
  pub fn is_eligible(&self, snapshot: &ConfigSnapshot, path: &Path) -> bool {
    self
      .root_for(path)
      .is_some_and(|root| snapshot.filter.is_eligible(&root, path))
  }

  /// Drop the memoized listing so the next [`Self::list`] walks again
  pub fn clear_cached_paths(&self) {
    debug!("Clearing cached workspace paths");
    *self.listing.lock().unwrap_or_else(PoisonError::into_inner) = None;
  }

  /// Apply a workspace folder change, returning whether the root set changed
  pub fn apply_folder_change(&self, added: &[PathBuf], removed: &[PathBuf]) -> bool {
    let mut roots = self.roots.write().unwrap_or_else(PoisonError::into_inner);
    let before = roots.clone();

    roots.retain(|root| !removed.contains(root));
    roots.extend(added.iter().cloned());
    *roots = dedup_roots(std::mem::take(&mut *roots));

    let changed = *roots != before;
    drop(roots);

    if changed {
      self.clear_cached_paths();
    }
    changed
  }

  /// The memoized listing, if one was walked under `snapshot`
  fn memoized(&self, snapshot: &Arc<ConfigSnapshot>) -> Option<Arc<Vec<PathBuf>>> {
    self
      .listing
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .as_ref()
      .filter(|listing| Arc::ptr_eq(&listing.snapshot, snapshot))
      .map(|listing| listing.paths.clone())
  }

  /// Whether the memoized listing for `snapshot` holds `path`
  ///
  /// `None` when no listing for that snapshot is memoized.
  pub fn listing_contains(&self, snapshot: &Arc<ConfigSnapshot>, path: &Path) -> Option<bool> {
    self
      .memoized(snapshot)
      .map(|paths| paths.binary_search_by(|p| p.as_path().cmp(path)).is_ok())
  }

  /// All eligible files under every root, memoized until cleared
  pub async fn list(&self, snapshot: &Arc<ConfigSnapshot>) -> Result<Arc<Vec<PathBuf>>, ActionError> {
    if let Some(paths) = self.memoized(snapshot) {
      return Ok(paths);
    }

    let mut paths = Vec::new();
    for root in self.roots() {
      paths.extend(walk_eligible(snapshot.clone(), root.clone(), root).await?);
    }
    paths.sort();
    paths.dedup();

    let paths = Arc::new(paths);
    debug!(paths = paths.len(), "Listed workspace paths");
    *self.listing.lock().unwrap_or_else(PoisonError::into_inner) = Some(Listing {
      snapshot: snapshot.clone(),
      paths: paths.clone(),
    });
    Ok(paths)
  }

  /// Eligible files under `dir`, which must lie inside a workspace root
  pub async fn walk(&self, snapshot: &Arc<ConfigSnapshot>, dir: &Path) -> Result<Vec<PathBuf>, ActionError> {
    let Some(root) = self.root_for(dir) else {
      debug!(dir = %dir.display(), "Directory outside workspace, nothing to walk");
      return Ok(Vec::new());
    };
    if snapshot.filter.is_excluded_dir(&root, dir) {
      return Ok(Vec::new());
    }
    walk_eligible(snapshot.clone(), root, dir.to_path_buf()).await
  }
}

/// Walk `dir` on the blocking pool, returning eligible files in sorted order
async fn walk_eligible(snapshot: Arc<ConfigSnapshot>, root: PathBuf, dir: PathBuf) -> Result<Vec<PathBuf>, ActionError> {
  tokio::task::spawn_blocking(move || {
    if !dir.exists() {
      debug!(dir = %dir.display(), "Walk target no longer exists");
      return Vec::new();
    }

    let prune_snapshot = snapshot.clone();
    let prune_root = root.clone();
    let walker = WalkBuilder::new(&dir)
      .hidden(false)
      .ignore(false)
      .git_ignore(false)
      .git_global(false)
      .git_exclude(false)
      .parents(false)
      .follow_links(false)
      .sort_by_file_name(|a, b| a.cmp(b))
      .filter_entry(move |entry| {
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
        !(is_dir && entry.depth() > 0 && prune_snapshot.filter.is_excluded_dir(&prune_root, entry.path()))
      })
      .build();

    let mut files = Vec::new();
    for entry in walker {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          warn!(error = %e, "Skipping unreadable entry during walk");
          continue;
        }
      };
      if entry.file_type().is_some_and(|ft| ft.is_file()) && snapshot.filter.is_eligible(&root, entry.path()) {
        files.push(entry.into_path());
      }
    }
    files
  })
  .await
  .map_err(|e| ActionError::Walk(e.to_string()))
}

fn dedup_roots(mut roots: Vec<PathBuf>) -> Vec<PathBuf> {
  roots.sort();
  roots.dedup();
  roots
}
