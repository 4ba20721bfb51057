//! Test helpers for workspace scenario tests.
//!
//! Provides `WorkspaceTestContext`, which owns a temporary workspace root, a
//! config source (in memory, or `.everywhere/config.toml` on disk) and a running
//! `Workspace`, plus `FakeExtractor` for
//! tests that must not touch the filesystem (paused-clock tests in particular).

use std::{
  collections::HashSet,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use async_trait::async_trait;
use everywhere_core::{Config, Item};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
  action::{ActionId, ActionType},
  events::IndexEvent,
  extract::{ExtractionError, Extractor},
  settings::{ConfigLoader, StaticConfigLoader},
  workspace::{Workspace, WorkspaceOptions},
};

/// Extractor that never reads the disk
///
/// Every path yields a single file item. Paths marked missing report
/// `NotFound`, paths marked broken report `Unparseable`.
#[derive(Default)]
pub struct FakeExtractor {
  calls: Mutex<Vec<PathBuf>>,
  missing: Mutex<HashSet<PathBuf>>,
  broken: Mutex<HashSet<PathBuf>>,
}

impl FakeExtractor {
  pub fn calls(&self) -> Vec<PathBuf> {
    self.calls.lock().unwrap().clone()
  }

  pub fn mark_missing(&self, path: &Path) {
    self.missing.lock().unwrap().insert(path.to_path_buf());
  }

  pub fn mark_broken(&self, path: &Path) {
    self.broken.lock().unwrap().insert(path.to_path_buf());
  }
}

#[async_trait]
impl Extractor for FakeExtractor {
  async fn extract_items(&self, path: &Path) -> Result<Vec<Item>, ExtractionError> {
    self.calls.lock().unwrap().push(path.to_path_buf());

    if self.missing.lock().unwrap().contains(path) {
      return Err(ExtractionError::NotFound(path.to_path_buf()));
    }
    if self.broken.lock().unwrap().contains(path) {
      return Err(ExtractionError::Unparseable {
        path: path.to_path_buf(),
        reason: "broken on purpose".to_string(),
      });
    }
    Ok(vec![Item::file(path)])
  }
}

/// A running workspace over a temporary directory
pub struct WorkspaceTestContext {
  /// Holds the temporary directory alive
  _dir: TempDir,
  /// Canonical workspace root
  pub root: PathBuf,
  /// In-memory config, `None` when the config file is read instead
  loader: Option<Arc<StaticConfigLoader>>,
  pub workspace: Workspace,
  pub cancel: CancellationToken,
}

impl WorkspaceTestContext {
  /// Workspace with the default symbol extractor and default config
  pub fn new() -> Self {
    Self::build(None, None)
  }

  /// Workspace whose extraction is served by `extractor`
  pub fn with_extractor(extractor: Arc<dyn Extractor>) -> Self {
    Self::build(Some(extractor), None)
  }

  /// Workspace configured from `.everywhere/config.toml`, seeded with `contents`
  pub fn with_config_file(contents: &str) -> Self {
    Self::build(None, Some(contents))
  }

  fn build(extractor: Option<Arc<dyn Extractor>>, config_file: Option<&str>) -> Self {
    let dir = TempDir::new().expect("create workspace temp dir");
    let root = dir.path().canonicalize().expect("canonicalize temp dir");

    let (mut options, loader) = match config_file {
      Some(contents) => {
        write_file(&Config::project_config_path(&root), contents);
        (WorkspaceOptions::for_root(&root), None)
      }
      None => {
        let loader = Arc::new(StaticConfigLoader::new(Config::default()));
        (WorkspaceOptions::new(vec![root.clone()], loader.clone()), Some(loader))
      }
    };
    if let Some(extractor) = extractor {
      options = options.with_extractor(extractor);
    }

    let cancel = CancellationToken::new();
    let workspace = Workspace::new(options, cancel.clone());

    Self {
      _dir: dir,
      root,
      loader,
      workspace,
      cancel,
    }
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.root.join(relative)
  }

  /// Write a file below the root, creating parent directories
  pub fn write(&self, relative: &str, content: &str) -> PathBuf {
    let path = self.path(relative);
    write_file(&path, content);
    path
  }

  /// Overwrite `.everywhere/config.toml` without notifying the workspace
  pub fn write_config(&self, contents: &str) {
    write_file(&Config::project_config_path(&self.root), contents);
  }

  /// Sorted cache keys, relative to the root
  pub fn cached(&self) -> Vec<String> {
    self
      .workspace
      .cache()
      .paths()
      .iter()
      .filter_map(|p| p.strip_prefix(&self.root).ok())
      .map(|p| p.to_string_lossy().replace('\\', "/"))
      .collect()
  }

  /// The config currently served by the in-memory loader
  pub fn config(&self) -> Config {
    self.static_loader().fetch().expect("static loader never fails")
  }

  /// Mutate the served config without notifying the workspace
  pub fn update_config(&self, edit: impl FnOnce(&mut Config)) {
    let mut config = self.config();
    edit(&mut config);
    self.static_loader().set(config);
  }

  fn static_loader(&self) -> &StaticConfigLoader {
    self.loader.as_deref().expect("context uses an in-memory config")
  }
}

fn write_file(path: &Path, content: &str) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).expect("create parent dirs");
  }
  std::fs::write(path, content).expect("write file");
}

impl Drop for WorkspaceTestContext {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}

/// Drain every event currently buffered on `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<IndexEvent>) -> Vec<IndexEvent> {
  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  events
}

/// `(id, kind)` of every executed action, in execution order
pub fn executed(events: &[IndexEvent]) -> Vec<(ActionId, ActionType)> {
  events
    .iter()
    .filter_map(|event| match event {
      IndexEvent::WillExecuteAction(action) => Some((action.id, action.kind)),
      _ => None,
    })
    .collect()
}
