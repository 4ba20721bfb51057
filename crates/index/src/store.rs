//! On-disk persistence of cache snapshots
//!
//! One JSON file per workspace root, named by a hash of the root path. Writes
//! go to a temporary file that is renamed into place, so a crash mid-save
//! leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::CacheState;

/// Bumped whenever the persisted layout changes; mismatched files are ignored
const STORE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache {
  version: u32,
  root: PathBuf,
  saved_at: DateTime<Utc>,
  state: CacheState,
}

/// Base directory for persisted data
///
/// Respects the following environment variables (in order of precedence):
/// 1. EVERYWHERE_DATA_DIR - explicit data directory override
/// 2. XDG_DATA_HOME - standard XDG data home directory
/// 3. dirs::data_local_dir() - platform default
pub fn default_data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("EVERYWHERE_DATA_DIR") {
    return PathBuf::from(dir);
  }

  if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
    return PathBuf::from(xdg_data).join("everywhere");
  }

  dirs::data_local_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("everywhere")
}

/// Snapshot file for a single workspace root
#[derive(Debug, Clone)]
pub struct CacheStore {
  root: PathBuf,
  path: PathBuf,
}

impl CacheStore {
  /// Store under the default data directory
  pub fn for_root(root: &Path) -> Self {
    Self::in_dir(&default_data_dir(), root)
  }

  /// Store under an explicit data directory
  pub fn in_dir(data_dir: &Path, root: &Path) -> Self {
    let path = data_dir.join("caches").join(format!("{}.json", root_key(root)));
    Self {
      root: root.to_path_buf(),
      path,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Load the persisted snapshot, if there is a usable one
  pub fn load(&self) -> Result<Option<CacheState>, StoreError> {
    let content = match std::fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let persisted: PersistedCache = serde_json::from_str(&content)?;
    if persisted.version != STORE_VERSION || persisted.root != self.root {
      warn!(
        path = %self.path.display(),
        version = persisted.version,
        "Ignoring persisted cache from another version or root"
      );
      return Ok(None);
    }

    debug!(
      path = %self.path.display(),
      files = persisted.state.entries.len(),
      saved_at = %persisted.saved_at,
      "Loaded persisted cache"
    );
    Ok(Some(persisted.state))
  }

  /// Persist a snapshot, replacing any previous one
  pub fn save(&self, state: &CacheState) -> Result<(), StoreError> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let persisted = PersistedCache {
      version: STORE_VERSION,
      root: self.root.clone(),
      saved_at: Utc::now(),
      state: persistable(state),
    };

    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec(&persisted)?)?;
    std::fs::rename(&tmp, &self.path)?;

    info!(
      path = %self.path.display(),
      files = persisted.state.entries.len(),
      "Saved cache snapshot"
    );
    Ok(())
  }
}

/// Copy of `state` without entries whose paths JSON cannot hold
fn persistable(state: &CacheState) -> CacheState {
  let entries = state
    .entries
    .iter()
    .filter(|(path, items)| {
      let utf8 = path.to_str().is_some() && items.iter().all(|item| item.path.to_str().is_some());
      if !utf8 {
        warn!(path = %path.display(), "Skipping non-UTF-8 path in cache snapshot");
      }
      utf8
    })
    .map(|(path, items)| (path.clone(), items.clone()))
    .collect();
  CacheState::from_entries(entries)
}

/// First 16 hex chars of the SHA-256 of the root path
fn root_key(root: &Path) -> String {
  let mut hasher = Sha256::new();
  hasher.update(root.to_string_lossy().as_bytes());
  let digest = hex::encode(hasher.finalize());
  digest[..16].to_string()
}
