//! Configuration snapshots for the index core
//!
//! [`ConfigSource`] memoizes one [`ConfigSnapshot`] (the loaded config plus its
//! compiled path filter) until it is explicitly cleared. Each indexing cycle
//! takes the snapshot once up front and evaluates every eligibility decision
//! against it.

use std::{
  path::{Path, PathBuf},
  sync::{Arc, Mutex, PoisonError},
};

use everywhere_core::{Config, ConfigError};
use tracing::{debug, warn};

use crate::filter::PathFilter;

/// Fetches a fresh configuration
pub trait ConfigLoader: Send + Sync + 'static {
  fn fetch(&self) -> Result<Config, ConfigError>;
}

/// Loads `.everywhere/config.toml` for a project, falling back to the user config
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
  root: PathBuf,
}

impl FileConfigLoader {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }
}

impl ConfigLoader for FileConfigLoader {
  fn fetch(&self) -> Result<Config, ConfigError> {
    Config::try_load_for_project(&self.root)
  }
}

/// Serves a config held in memory, replaceable at runtime
#[derive(Debug, Default)]
pub struct StaticConfigLoader {
  config: Mutex<Config>,
}

impl StaticConfigLoader {
  pub fn new(config: Config) -> Self {
    Self {
      config: Mutex::new(config),
    }
  }

  pub fn set(&self, config: Config) {
    *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config;
  }
}

impl ConfigLoader for StaticConfigLoader {
  fn fetch(&self) -> Result<Config, ConfigError> {
    Ok(self.config.lock().unwrap_or_else(PoisonError::into_inner).clone())
  }
}

impl<L: ConfigLoader> ConfigLoader for Arc<L> {
  fn fetch(&self) -> Result<Config, ConfigError> {
    (**self).fetch()
  }
}

/// An immutable configuration with its compiled eligibility filter
#[derive(Debug)]
pub struct ConfigSnapshot {
  pub config: Config,
  pub filter: PathFilter,
}

impl ConfigSnapshot {
  pub fn new(config: Config) -> Self {
    let filter = PathFilter::new(&config);
    Self { config, filter }
  }
}

/// Memoizing front for a [`ConfigLoader`]
///
/// The last successfully loaded snapshot survives [`ConfigSource::clear`], so a
/// config that stops parsing keeps the previous filters in force.
pub struct ConfigSource {
  loader: Box<dyn ConfigLoader>,
  current: Mutex<Option<Arc<ConfigSnapshot>>>,
  last_good: Mutex<Option<Arc<ConfigSnapshot>>>,
}

impl ConfigSource {
  pub fn new(loader: impl ConfigLoader) -> Self {
    Self {
      loader: Box::new(loader),
      current: Mutex::new(None),
      last_good: Mutex::new(None),
    }
  }

  /// Current snapshot, loading it if needed and surfacing load errors
  pub fn try_snapshot(&self) -> Result<Arc<ConfigSnapshot>, ConfigError> {
    let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(snapshot) = current.as_ref() {
      return Ok(snapshot.clone());
    }

    let snapshot = Arc::new(ConfigSnapshot::new(self.loader.fetch()?));
    debug!(
      include = %snapshot.config.search_everywhere.include,
      exclude_mode = ?snapshot.config.search_everywhere.exclude_mode,
      "Loaded configuration snapshot"
    );
    *current = Some(snapshot.clone());
    *self.last_good.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
    Ok(snapshot)
  }

  /// Current snapshot, falling back to the last good one when loading fails
  ///
  /// Defaults are used only if nothing has loaded yet. The fallback is not
  /// memoized, so the next call retries the load.
  pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
    self.try_snapshot().unwrap_or_else(|e| {
      let last_good = self.last_good.lock().unwrap_or_else(PoisonError::into_inner).clone();
      match last_good {
        Some(snapshot) => {
          warn!(error = %e, "Failed to load configuration, keeping previous settings");
          snapshot
        }
        None => {
          warn!(error = %e, "Failed to load configuration, using defaults");
          Arc::new(ConfigSnapshot::new(Config::default()))
        }
      }
    })
  }

  /// Forget the memoized snapshot so the next read reloads
  pub fn clear(&self) {
    *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
  }
}

impl std::fmt::Debug for ConfigSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ConfigSource").finish_non_exhaustive()
  }
}
