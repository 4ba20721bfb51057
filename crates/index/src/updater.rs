//! Cache additions and in-place refreshes
//!
//! | Subtype                 | Effect                                              |
//! |-------------------------|-----------------------------------------------------|
//! | TextChange              | re-extract `path`, replace its entry                |
//! | CreateNewFile           | extract `path` and add it                           |
//! | CreateNewDirectory      | walk `path`, add every eligible file                |
//! | RenameOrMoveFile        | drop `old_path`, extract and add `path`             |
//! | RenameOrMoveDirectory   | drop everything under `old_path`, walk `path`       |
//!
//! Eligibility is evaluated against the snapshot current at execution time.

use std::{path::Path, sync::Arc};

use tracing::{debug, warn};

use crate::{
  action::{ActionError, DetailedActionType},
  common::IndexState,
  extract::ExtractionError,
  remover::Remover,
  settings::ConfigSnapshot,
};

pub struct Updater {
  state: Arc<IndexState>,
}

impl Updater {
  pub fn new(state: Arc<IndexState>) -> Self {
    Self { state }
  }

  pub async fn update_cache_by_path(
    &self,
    path: &Path,
    detail: DetailedActionType,
    old_path: Option<&Path>,
  ) -> Result<(), ActionError> {
    let snapshot = self.state.config.snapshot();

    match detail {
      DetailedActionType::TextChange | DetailedActionType::CreateNewFile => self.update_file(&snapshot, path).await,
      DetailedActionType::CreateNewDirectory => self.add_directory(&snapshot, path).await,
      DetailedActionType::RenameOrMoveFile => {
        if let Some(old_path) = old_path {
          self.state.cache.delete(old_path);
        }
        self.update_file(&snapshot, path).await
      }
      DetailedActionType::RenameOrMoveDirectory => {
        if let Some(old_path) = old_path {
          self.state.cache.delete_prefix(old_path);
        }
        self.add_directory(&snapshot, path).await
      }
      DetailedActionType::RemoveFile | DetailedActionType::RemoveDirectory => {
        Remover::new(self.state.clone()).remove_from_cache_by_path(path, detail);
        Ok(())
      }
    }
  }

  /// Re-extract a single file and replace its entry
  async fn update_file(&self, snapshot: &ConfigSnapshot, path: &Path) -> Result<(), ActionError> {
    if !self.state.paths.is_eligible(snapshot, path) {
      // A path that stopped being eligible must not keep a stale entry
      if self.state.cache.delete(path) {
        debug!(path = %path.display(), "Dropped entry for ineligible path");
      }
      return Ok(());
    }

    match self.state.extractor.extract_items(path).await {
      Ok(items) => {
        debug!(path = %path.display(), items = items.len(), "Updated cache entry");
        self.state.cache.set(path.to_path_buf(), items);
        Ok(())
      }
      Err(ExtractionError::NotFound(_)) => {
        debug!(path = %path.display(), "Path vanished before update, removing");
        self.state.cache.delete(path);
        Ok(())
      }
      Err(e) => Err(e.into()),
    }
  }

  /// Walk a directory and add every eligible file
  ///
  /// Per-file extraction failures are logged and skipped so one bad file does
  /// not drop the rest of the directory.
  async fn add_directory(&self, snapshot: &Arc<ConfigSnapshot>, dir: &Path) -> Result<(), ActionError> {
    let files = self.state.paths.walk(snapshot, dir).await?;
    let mut added = 0usize;

    for file in files {
      match self.state.extractor.extract_items(&file).await {
        Ok(items) => {
          self.state.cache.set(file, items);
          added += 1;
        }
        Err(ExtractionError::NotFound(_)) => {
          self.state.cache.delete(&file);
        }
        Err(e) => warn!(path = %file.display(), error = %e, "Skipping file during directory update"),
      }
    }

    debug!(dir = %dir.display(), added, "Added directory to cache");
    Ok(())
  }
}
