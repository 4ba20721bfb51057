//! Workspace - composition root of the index engine
//!
//! Owns the [`EventBus`], the shared [`IndexState`] and the [`WorkspaceCommon`]
//! orchestrator, and classifies every incoming [`WorkspaceEvent`] into one of:
//!
//! - direct action registrations (create, rename, delete, text change)
//! - a full reindex (reindex-worthy configuration change, folder change)
//! - a lightweight notification or a no-op
//!
//! # Debounce
//!
//! [`Workspace::spawn_listener`] runs the event loop. Every debounced kind has
//! a single timer, so a burst of edits across documents dispatches only the
//! last one. Creates, renames and deletes are handled immediately.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use everywhere_core::{
  ConfigChange, DEBOUNCE_SETTING, ExcludeMode, FILES_EXCLUDE, PRESENTATION_ONLY_SETTINGS, QuickPickItem,
  SEARCH_EXCLUDE, SECTION,
};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
  action::{ActionError, ActionTrigger, ActionType, ActionWork, DetailedActionType},
  cache::{Cache, CacheState},
  common::{IndexState, WorkspaceCommon},
  debounce::{DebounceKind, Debouncer},
  events::{EventBus, IndexEvent},
  extract::{Extractor, SymbolExtractor},
  paths::WorkspacePaths,
  processor::ProcessorConfig,
  settings::{ConfigLoader, ConfigSource, FileConfigLoader},
};

// ============================================================================
// Events
// ============================================================================

/// A workspace-level signal delivered by a watcher or editor adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
  /// Document content changed; `change_count` is the number of content changes
  TextChange { path: PathBuf, change_count: usize },
  Create(Vec<PathBuf>),
  /// `(old, new)` pairs
  Rename(Vec<(PathBuf, PathBuf)>),
  Delete(Vec<PathBuf>),
  ConfigChange(ConfigChange),
  FolderChange { added: Vec<PathBuf>, removed: Vec<PathBuf> },
}

/// Whether a configuration change requires rebuilding the index
///
/// True iff the change touches the search everywhere section without touching
/// any presentation-only setting, or the exclude mode defers to the host maps
/// and one of those maps changed.
pub fn should_reindex_on_configuration_change(change: &ConfigChange, exclude_mode: ExcludeMode) -> bool {
  let own_section = change.affects(SECTION) && !PRESENTATION_ONLY_SETTINGS.iter().any(|s| change.affects(s));
  let host_excludes = exclude_mode == ExcludeMode::FilesAndSearch
    && (change.affects(FILES_EXCLUDE) || change.affects(SEARCH_EXCLUDE));
  own_section || host_excludes
}

// ============================================================================
// Options
// ============================================================================

/// Collaborators a [`Workspace`] is built from
pub struct WorkspaceOptions {
  pub roots: Vec<PathBuf>,
  pub config: ConfigSource,
  pub extractor: Arc<dyn Extractor>,
  /// Initial cache contents, e.g. a persisted snapshot
  pub cache: CacheState,
  /// Processor settings; derived from the `[watcher]` section when `None`
  pub processor: Option<ProcessorConfig>,
}

impl WorkspaceOptions {
  pub fn new(roots: Vec<PathBuf>, loader: impl ConfigLoader) -> Self {
    Self {
      roots,
      config: ConfigSource::new(loader),
      extractor: Arc::new(SymbolExtractor::new()),
      cache: CacheState::default(),
      processor: None,
    }
  }

  /// A single-root workspace configured from `<root>/.everywhere/config.toml`
  pub fn for_root(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    Self::new(vec![root.clone()], FileConfigLoader::new(root))
  }

  pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
    self.extractor = extractor;
    self
  }

  pub fn with_cache(mut self, cache: CacheState) -> Self {
    self.cache = cache;
    self
  }

  pub fn with_processor_config(mut self, config: ProcessorConfig) -> Self {
    self.processor = Some(config);
    self
  }
}

// ============================================================================
// Workspace
// ============================================================================

#[derive(Clone)]
pub struct Workspace {
  common: WorkspaceCommon,
  events: EventBus,
  cancel: CancellationToken,
}

impl Workspace {
  /// Build the workspace and spawn its action processor
  ///
  /// Must be called from within a tokio runtime.
  pub fn new(options: WorkspaceOptions, cancel: CancellationToken) -> Self {
    let processor = options.processor.unwrap_or_else(|| {
      ProcessorConfig::from_timeout_ms(options.config.snapshot().config.watcher.action_timeout_ms)
    });

    let state = Arc::new(IndexState::new(
      Cache::from_state(options.cache),
      options.config,
      WorkspacePaths::new(options.roots),
      options.extractor,
    ));
    let events = EventBus::new();
    let common = WorkspaceCommon::new(state, events.clone(), processor, cancel.clone());

    Self { common, events, cancel }
  }

  pub fn events(&self) -> &EventBus {
    &self.events
  }

  pub fn common(&self) -> &WorkspaceCommon {
    &self.common
  }

  pub fn cache(&self) -> &Cache {
    &self.state().cache
  }

  pub fn roots(&self) -> Vec<PathBuf> {
    self.state().paths.roots()
  }

  fn state(&self) -> &Arc<IndexState> {
    self.common.state()
  }

  /// Run a full reindex and wait for it
  pub async fn index(&self, trigger: ActionTrigger) -> Result<(), ActionError> {
    self.common.index(trigger).await
  }

  pub fn get_data(&self) -> Vec<QuickPickItem> {
    self.common.get_data()
  }

  /// Wait until every registered action has run
  pub async fn wait_idle(&self) {
    self.common.processor().wait_idle().await
  }

  /// Initial index run
  ///
  /// Rebuilds when `should_init_on_startup` is set or nothing was restored;
  /// otherwise the restored cache is served as is.
  pub async fn startup(&self) -> Result<(), ActionError> {
    let snapshot = self.state().config.snapshot();
    if snapshot.config.search_everywhere.should_init_on_startup || self.cache().is_empty() {
      self.index(ActionTrigger::Startup).await
    } else {
      info!(files = self.cache().len(), "Serving restored cache without reindexing");
      Ok(())
    }
  }

  /// Reload configuration and listings, then rebuild the index
  pub async fn reload(&self) -> Result<(), ActionError> {
    self.state().config.clear();
    self.reload_components();
    self.index(ActionTrigger::Reload).await
  }

  fn reload_components(&self) {
    self.state().paths.clear_cached_paths();
  }

  /// Eligible and inside a workspace root, per a fresh configuration snapshot
  pub fn is_path_in_workspace(&self, path: &Path) -> bool {
    let snapshot = self.state().config.snapshot();
    self.state().paths.is_eligible(&snapshot, path)
  }

  // ==========================================================================
  // Classification
  // ==========================================================================

  /// Classify and handle one event without debouncing
  pub fn handle_event(&self, event: WorkspaceEvent) {
    match event {
      WorkspaceEvent::TextChange { path, change_count } => self.handle_did_change_text_document(path, change_count),
      WorkspaceEvent::Create(paths) => self.handle_did_create_files(paths),
      WorkspaceEvent::Rename(pairs) => self.handle_did_rename_files(pairs),
      WorkspaceEvent::Delete(paths) => self.handle_did_delete_files(paths),
      WorkspaceEvent::ConfigChange(change) => self.handle_did_change_configuration(change),
      WorkspaceEvent::FolderChange { added, removed } => {
        if self.state().paths.apply_folder_change(&added, &removed) {
          self.handle_did_change_workspace_folders();
        }
      }
    }
  }

  fn handle_did_change_configuration(&self, change: ConfigChange) {
    self.state().config.clear();
    let exclude_mode = self.state().config.snapshot().config.search_everywhere.exclude_mode;

    if should_reindex_on_configuration_change(&change, exclude_mode) {
      info!(settings = ?change.settings().collect::<Vec<_>>(), "Configuration change requires reindex");
      self.reload_components();
      self.events.publish(IndexEvent::WillReindexOnConfigurationChange);
      self.common.index_in_background(ActionTrigger::ConfigurationChange);
    } else if change.affects(DEBOUNCE_SETTING) {
      debug!("Debounce setting toggled");
      self.events.publish(IndexEvent::DidDebounceConfigToggle);
    }
  }

  fn handle_did_change_workspace_folders(&self) {
    info!(roots = ?self.roots(), "Workspace folders changed");
    self.common.index_in_background(ActionTrigger::WorkspaceFoldersChange);
  }

  /// Listed by the current walk, or eligible when no listing is memoized
  fn is_path_existing_in_workspace(&self, path: &Path) -> bool {
    let snapshot = self.state().config.snapshot();
    let paths = &self.state().paths;
    paths
      .listing_contains(&snapshot, path)
      .unwrap_or_else(|| paths.is_eligible(&snapshot, path))
  }

  fn handle_did_change_text_document(&self, path: PathBuf, change_count: usize) {
    if change_count == 0 || !self.is_path_existing_in_workspace(&path) {
      return;
    }

    let detail = DetailedActionType::TextChange;
    let trigger = ActionTrigger::DidChangeTextDocument;
    self.common.register_action(
      ActionType::Remove,
      ActionWork::Remove {
        path: path.clone(),
        detail,
      },
      trigger,
      Some(path.clone()),
      None,
    );
    self.common.register_action(
      ActionType::Update,
      ActionWork::Update {
        path: path.clone(),
        detail,
        old_path: None,
      },
      trigger,
      Some(path),
      None,
    );
  }

  fn handle_did_rename_files(&self, pairs: Vec<(PathBuf, PathBuf)>) {
    self.state().paths.clear_cached_paths();

    for (old, new) in pairs {
      let is_directory = new.is_dir() || self.was_directory(&old);
      let detail = if is_directory {
        DetailedActionType::RenameOrMoveDirectory
      } else {
        DetailedActionType::RenameOrMoveFile
      };

      self.common.register_action(
        ActionType::Update,
        ActionWork::Update {
          path: new.clone(),
          detail,
          old_path: Some(old.clone()),
        },
        ActionTrigger::DidRenameFiles,
        Some(new),
        Some(old.clone()),
      );

      if !is_directory {
        self.common.register_action(
          ActionType::Remove,
          ActionWork::Remove {
            path: old.clone(),
            detail,
          },
          ActionTrigger::DidRenameFiles,
          Some(old),
          None,
        );
      }
    }
  }

  fn handle_did_create_files(&self, paths: Vec<PathBuf>) {
    self.state().paths.clear_cached_paths();

    for path in paths {
      let detail = if path.is_dir() {
        DetailedActionType::CreateNewDirectory
      } else {
        DetailedActionType::CreateNewFile
      };
      self.common.register_action(
        ActionType::Update,
        ActionWork::Update {
          path: path.clone(),
          detail,
          old_path: None,
        },
        ActionTrigger::DidCreateFiles,
        Some(path),
        None,
      );
    }
  }

  fn handle_did_delete_files(&self, paths: Vec<PathBuf>) {
    self.state().paths.clear_cached_paths();

    for path in paths {
      let detail = if path.is_dir() || self.was_directory(&path) {
        DetailedActionType::RemoveDirectory
      } else {
        DetailedActionType::RemoveFile
      };
      self.common.register_action(
        ActionType::Remove,
        ActionWork::Remove {
          path: path.clone(),
          detail,
        },
        ActionTrigger::DidDeleteFiles,
        Some(path),
        None,
      );
    }
  }

  /// A path that no longer exists was a directory if the cache holds entries below it
  fn was_directory(&self, path: &Path) -> bool {
    let cache = self.cache();
    !cache.contains(path) && cache.has_entries_under(path)
  }

  // ==========================================================================
  // Listener
  // ==========================================================================

  /// Consume events from `rx`, debouncing noisy kinds, until cancelled or the channel closes
  ///
  /// Pending debounced calls are dispatched immediately when the channel closes.
  pub fn spawn_listener(&self, rx: mpsc::Receiver<WorkspaceEvent>) -> JoinHandle<()> {
    let listener = EventListener::new(self.clone());
    tokio::spawn(listener.run(rx))
  }
}

/// Debounce state for the listener loop
struct EventListener {
  workspace: Workspace,
  configuration: Debouncer<ConfigChange>,
  folders: Debouncer<()>,
  text: Debouncer<(PathBuf, usize)>,
}

impl EventListener {
  fn new(workspace: Workspace) -> Self {
    Self {
      workspace,
      configuration: Debouncer::for_kind(DebounceKind::Configuration),
      folders: Debouncer::for_kind(DebounceKind::WorkspaceFolders),
      text: Debouncer::for_kind(DebounceKind::TextDocument),
    }
  }

  async fn run(mut self, mut rx: mpsc::Receiver<WorkspaceEvent>) {
    info!("Workspace event listener started");
    let cancel = self.workspace.cancel.clone();

    loop {
      let deadline = self.next_deadline();

      tokio::select! {
          biased;

          _ = cancel.cancelled() => {
              info!("Workspace event listener shutting down (cancelled)");
              break;
          }

          event = rx.recv() => {
              match event {
                  Some(event) => self.accept(event, Instant::now()),
                  None => {
                      self.flush();
                      info!("Workspace event listener shutting down (channel closed)");
                      break;
                  }
              }
          }

          _ = sleep_until(deadline) => {
              self.fire_due(Instant::now());
          }
      }
    }
  }

  fn accept(&mut self, event: WorkspaceEvent, now: Instant) {
    match event {
      WorkspaceEvent::TextChange { path, change_count } => self.text.call(now, (path, change_count)),
      WorkspaceEvent::ConfigChange(change) => self.configuration.call(now, change),
      WorkspaceEvent::FolderChange { added, removed } => {
        // Roots update right away; only the reindex is debounced
        if self.workspace.state().paths.apply_folder_change(&added, &removed) {
          self.folders.call(now, ());
        }
      }
      other => self.workspace.handle_event(other),
    }
  }

  fn deadlines(&self) -> impl Iterator<Item = Instant> {
    [self.configuration.deadline(), self.folders.deadline(), self.text.deadline()]
      .into_iter()
      .flatten()
  }

  fn next_deadline(&self) -> Option<Instant> {
    self.deadlines().min()
  }

  fn fire_due(&mut self, now: Instant) {
    if let Some(change) = self.configuration.poll(now) {
      self.workspace.handle_did_change_configuration(change);
    }
    if self.folders.poll(now).is_some() {
      self.workspace.handle_did_change_workspace_folders();
    }
    if let Some((path, change_count)) = self.text.poll(now) {
      self.workspace.handle_did_change_text_document(path, change_count);
    }
  }

  /// Dispatch every pending call regardless of its deadline
  fn flush(&mut self) {
    let latest = self.deadlines().max();
    if let Some(latest) = latest {
      self.fire_due(latest);
    }
  }
}

async fn sleep_until(deadline: Option<Instant>) {
  match deadline {
    Some(deadline) => tokio::time::sleep_until(deadline).await,
    None => std::future::pending().await,
  }
}
