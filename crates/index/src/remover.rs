//! Cache removals
//!
//! Files drop their own entry; directories drop every entry beneath them.

use std::{path::Path, sync::Arc};

use tracing::debug;

use crate::{action::DetailedActionType, common::IndexState};

pub struct Remover {
  state: Arc<IndexState>,
}

impl Remover {
  pub fn new(state: Arc<IndexState>) -> Self {
    Self { state }
  }

  pub fn remove_from_cache_by_path(&self, path: &Path, detail: DetailedActionType) {
    match detail {
      DetailedActionType::RemoveDirectory | DetailedActionType::RenameOrMoveDirectory => {
        let removed = self.state.cache.delete_prefix(path);
        debug!(path = %path.display(), removed, "Removed directory from cache");
      }
      DetailedActionType::RemoveFile
      | DetailedActionType::RenameOrMoveFile
      | DetailedActionType::TextChange
      | DetailedActionType::CreateNewFile
      | DetailedActionType::CreateNewDirectory => {
        let removed = self.state.cache.delete(path);
        debug!(path = %path.display(), removed, "Removed file from cache");
      }
    }
  }
}
