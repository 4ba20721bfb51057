//! CLI command implementations

mod config;
mod index;
mod list;
mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use everywhere_core::Config;
use ::index::{CacheStore, Workspace, WorkspaceOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use self::{
  config::{cmd_config_init, cmd_config_show},
  index::cmd_index,
  list::{ListFilter, cmd_list},
  watch::cmd_watch,
};

/// Resolve the project root from `--path` or the current directory
pub fn project_root(path: Option<&Path>) -> Result<PathBuf> {
  let root = match path {
    Some(path) => path.to_path_buf(),
    None => std::env::current_dir().context("Failed to read current directory")?,
  };
  root
    .canonicalize()
    .with_context(|| format!("Project path does not exist: {}", root.display()))
}

/// A workspace over `root` plus the store its cache persists to
pub(crate) struct OpenWorkspace {
  pub workspace: Workspace,
  pub store: Option<CacheStore>,
  pub config: Config,
  pub cancel: CancellationToken,
}

impl OpenWorkspace {
  /// Load config, restore the persisted cache when enabled and build the workspace
  pub fn open(root: &Path) -> Result<Self> {
    let config = Config::try_load_for_project(root).context("Failed to load configuration")?;
    let store = config.cache.persist.then(|| CacheStore::for_root(root));

    let mut options = WorkspaceOptions::for_root(root);
    if let Some(store) = &store {
      match store.load() {
        Ok(Some(state)) => {
          info!(files = state.entries.len(), "Restored persisted cache");
          options = options.with_cache(state);
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, path = %store.path().display(), "Ignoring unreadable cache snapshot"),
      }
    }

    let cancel = CancellationToken::new();
    let workspace = Workspace::new(options, cancel.clone());
    Ok(Self {
      workspace,
      store,
      config,
      cancel,
    })
  }

  /// Persist the current cache if persistence is enabled
  pub fn save(&self) -> Result<()> {
    if let Some(store) = &self.store {
      store
        .save(&self.workspace.cache().snapshot())
        .context("Failed to save cache snapshot")?;
    }
    Ok(())
  }
}

impl Drop for OpenWorkspace {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}
