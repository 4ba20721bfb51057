//! WatcherTask - notify-backed adapter that produces workspace events
//!
//! The watcher bridges notify's sync callbacks with the async workspace
//! listener:
//! 1. notify's sync callback uses `blocking_send` to forward raw events
//! 2. The async task coalesces raw events per path for `change_debounce_ms`
//! 3. Settled changes are grouped into [`WorkspaceEvent`]s and sent on
//!
//! The project config file is watched as well. When it settles, the new
//! snapshot is diffed against the last one and the difference is forwarded as
//! a [`WorkspaceEvent::ConfigChange`].
//!
//! # Lifecycle
//!
//! The watcher runs until:
//! - The `CancellationToken` is triggered
//! - The notify channel or the outgoing channel closes

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  time::{Duration, Instant},
};

use everywhere_core::Config;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::RenameMode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{filter::PathFilter, workspace::WorkspaceEvent};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct WatcherConfig {
  /// Root directory to watch
  pub root: PathBuf,
  /// Window in which raw events for one path are coalesced
  pub debounce: Duration,
  /// Poll interval for the fallback poll watcher
  pub poll_interval: Duration,
}

impl WatcherConfig {
  pub fn from_config(root: PathBuf, config: &Config) -> Self {
    Self {
      root,
      debounce: Duration::from_millis(config.watcher.change_debounce_ms.max(1)),
      poll_interval: Duration::from_secs(config.watcher.poll_interval_secs.max(1)),
    }
  }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
  #[error("Failed to initialize watcher: {0}")]
  Init(#[source] notify::Error),

  #[error("Failed to watch path: {0}")]
  Watch(#[source] notify::Error),
}

// ============================================================================
// Internal Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChangeKind {
  Created,
  Modified,
  Deleted,
  Renamed { from: PathBuf },
}

/// A change being coalesced until its path goes quiet
#[derive(Debug)]
struct PendingChange {
  kind: ChangeKind,
  last_event: Instant,
}

impl PendingChange {
  fn new(kind: ChangeKind) -> Self {
    Self {
      kind,
      last_event: Instant::now(),
    }
  }

  fn update(&mut self, kind: ChangeKind) {
    self.last_event = Instant::now();

    match (&self.kind, &kind) {
      (ChangeKind::Created, ChangeKind::Modified) => {
        trace!("Coalescing create+modify -> create");
      }
      (ChangeKind::Deleted, ChangeKind::Created) => {
        self.kind = ChangeKind::Modified;
        trace!("Coalescing delete+create -> modified");
      }
      (ChangeKind::Created, ChangeKind::Deleted) => {
        self.kind = ChangeKind::Deleted;
        trace!("Coalescing create+delete -> delete");
      }
      (ChangeKind::Renamed { .. }, ChangeKind::Modified) => {
        trace!("Coalescing rename+modify -> rename");
      }
      _ => {
        self.kind = kind;
      }
    }
  }
}

/// Group settled changes into workspace events, deletes first
fn group_changes(mut settled: Vec<(PathBuf, ChangeKind)>) -> Vec<WorkspaceEvent> {
  settled.sort_by(|a, b| a.0.cmp(&b.0));

  let mut deleted = Vec::new();
  let mut renamed = Vec::new();
  let mut created = Vec::new();
  let mut modified = Vec::new();

  for (path, kind) in settled {
    match kind {
      ChangeKind::Deleted => deleted.push(path),
      ChangeKind::Renamed { from } => renamed.push((from, path)),
      ChangeKind::Created => created.push(path),
      ChangeKind::Modified => modified.push(path),
    }
  }

  let mut events = Vec::new();
  if !deleted.is_empty() {
    events.push(WorkspaceEvent::Delete(deleted));
  }
  if !renamed.is_empty() {
    events.push(WorkspaceEvent::Rename(renamed));
  }
  if !created.is_empty() {
    events.push(WorkspaceEvent::Create(created));
  }
  events.extend(
    modified
      .into_iter()
      .map(|path| WorkspaceEvent::TextChange { path, change_count: 1 }),
  );
  events
}

// ============================================================================
// WatcherTask
// ============================================================================

/// Watches one workspace root and forwards settled changes as [`WorkspaceEvent`]s
pub struct WatcherTask {
  config: WatcherConfig,
  events: mpsc::Sender<WorkspaceEvent>,
  cancel: CancellationToken,
  // The notify watcher must be held to keep it alive
  _watcher: RecommendedWatcher,
  event_rx: mpsc::Receiver<Result<Event, notify::Error>>,
  config_path: PathBuf,
  /// Last known configuration, used to diff config file changes
  current: Config,
  /// Skips changes under excluded directories before they reach the queue
  filter: PathFilter,
  config_dirty: Option<Instant>,
}

impl WatcherTask {
  /// Create the watcher and start watching `config.root`
  ///
  /// `current` is the configuration the workspace was started with.
  pub fn new(
    config: WatcherConfig,
    current: Config,
    events: mpsc::Sender<WorkspaceEvent>,
    cancel: CancellationToken,
  ) -> Result<Self, WatcherError> {
    info!(root = %config.root.display(), "Initializing file watcher");

    let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);
    let notify_config = notify::Config::default().with_poll_interval(config.poll_interval);

    let mut watcher = RecommendedWatcher::new(
      move |res| {
        // Runs on notify's thread
        let _ = event_tx.blocking_send(res);
      },
      notify_config,
    )
    .map_err(WatcherError::Init)?;

    watcher
      .watch(&config.root, RecursiveMode::Recursive)
      .map_err(WatcherError::Watch)?;

    let config_path = Config::project_config_path(&config.root);
    let filter = PathFilter::new(&current);

    info!(root = %config.root.display(), "File watcher initialized");

    Ok(Self {
      config,
      events,
      cancel,
      _watcher: watcher,
      event_rx,
      config_path,
      current,
      filter,
      config_dirty: None,
    })
  }

  /// Spawn the watcher task
  pub fn spawn(
    config: WatcherConfig,
    current: Config,
    events: mpsc::Sender<WorkspaceEvent>,
    cancel: CancellationToken,
  ) -> Result<tokio::task::JoinHandle<()>, WatcherError> {
    let task = Self::new(config, current, events, cancel)?;
    Ok(tokio::spawn(task.run()))
  }

  pub async fn run(mut self) {
    info!(root = %self.config.root.display(), "WatcherTask started");

    let mut pending: HashMap<PathBuf, PendingChange> = HashMap::new();
    let mut debounce_interval = tokio::time::interval(self.config.debounce);

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              info!("WatcherTask shutting down (cancelled)");
              self.flush_remaining(&mut pending).await;
              break;
          }

          event = self.event_rx.recv() => {
              match event {
                  Some(Ok(event)) => self.process_event(&mut pending, event),
                  Some(Err(e)) => warn!(error = %e, "Watcher error"),
                  None => {
                      info!("WatcherTask shutting down (channel closed)");
                      break;
                  }
              }
          }

          _ = debounce_interval.tick() => {
              if !self.flush_settled(&mut pending).await {
                  info!("WatcherTask shutting down (listener gone)");
                  break;
              }
          }
      }
    }

    info!(root = %self.config.root.display(), "WatcherTask stopped");
  }

  /// Changes below an excluded directory never become eligible
  fn is_ignored(&self, path: &Path) -> bool {
    path
      .parent()
      .is_some_and(|parent| self.filter.is_excluded_dir(&self.config.root, parent))
  }

  fn process_event(&mut self, pending: &mut HashMap<PathBuf, PendingChange>, event: Event) {
    if event.paths.iter().any(|p| *p == self.config_path) {
      trace!("Config file changed");
      self.config_dirty = Some(Instant::now());
    }

    if let EventKind::Modify(notify::event::ModifyKind::Name(RenameMode::Both)) = event.kind
      && let [from, to] = event.paths.as_slice()
    {
      if self.is_ignored(to) {
        if !self.is_ignored(from) {
          Self::record(pending, from.clone(), ChangeKind::Deleted);
        }
        return;
      }
      debug!(from = %from.display(), to = %to.display(), "Path renamed");
      pending.remove(from);
      pending.insert(to.clone(), PendingChange::new(ChangeKind::Renamed { from: from.clone() }));
      return;
    }

    for path in &event.paths {
      if *path == self.config_path || self.is_ignored(path) {
        continue;
      }

      let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(notify::event::ModifyKind::Name(mode)) => match mode {
          RenameMode::From => ChangeKind::Deleted,
          RenameMode::To => ChangeKind::Created,
          _ if path.exists() => ChangeKind::Modified,
          _ => ChangeKind::Deleted,
        },
        EventKind::Modify(_) => {
          // Directory metadata changes carry no content
          if path.is_dir() {
            continue;
          }
          ChangeKind::Modified
        }
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => {
          trace!(path = %path.display(), kind = ?event.kind, "Ignoring event");
          continue;
        }
      };

      trace!(path = %path.display(), ?kind, "Raw change");
      Self::record(pending, path.clone(), kind);
    }
  }

  fn record(pending: &mut HashMap<PathBuf, PendingChange>, path: PathBuf, kind: ChangeKind) {
    if let Some(existing) = pending.get_mut(&path) {
      existing.update(kind);
    } else {
      pending.insert(path, PendingChange::new(kind));
    }
  }

  /// Forward settled changes; returns false once the listener is gone
  async fn flush_settled(&mut self, pending: &mut HashMap<PathBuf, PendingChange>) -> bool {
    let now = Instant::now();
    let debounce = self.config.debounce;

    if self
      .config_dirty
      .is_some_and(|at| now.duration_since(at) >= debounce)
    {
      self.config_dirty = None;
      if let Some(change) = self.reload_config()
        && self.events.send(WorkspaceEvent::ConfigChange(change)).await.is_err()
      {
        return false;
      }
    }

    let settled: Vec<PathBuf> = pending
      .iter()
      .filter(|(_, change)| now.duration_since(change.last_event) >= debounce)
      .map(|(path, _)| path.clone())
      .collect();

    if settled.is_empty() {
      return true;
    }

    let settled: Vec<(PathBuf, ChangeKind)> = settled
      .into_iter()
      .filter_map(|path| pending.remove(&path).map(|change| (path, change.kind)))
      .collect();

    debug!(count = settled.len(), "Flushing settled changes");
    for event in group_changes(settled) {
      if self.events.send(event).await.is_err() {
        return false;
      }
    }
    true
  }

  /// Forward everything still pending, settled or not
  async fn flush_remaining(&mut self, pending: &mut HashMap<PathBuf, PendingChange>) {
    if self.config_dirty.take().is_some()
      && let Some(change) = self.reload_config()
    {
      let _ = self.events.send(WorkspaceEvent::ConfigChange(change)).await;
    }

    let remaining: Vec<(PathBuf, ChangeKind)> = pending.drain().map(|(path, change)| (path, change.kind)).collect();
    if remaining.is_empty() {
      return;
    }

    debug!(count = remaining.len(), "Flushing remaining changes on shutdown");
    for event in group_changes(remaining) {
      if self.events.send(event).await.is_err() {
        break;
      }
    }
  }

  /// Re-read the config file and diff it against the last known snapshot
  fn reload_config(&mut self) -> Option<everywhere_core::ConfigChange> {
    let next = match Config::try_load_for_project(&self.config.root) {
      Ok(next) => next,
      Err(e) => {
        warn!(error = %e, "Ignoring unreadable config change");
        return None;
      }
    };

    let change = self.current.changed_settings(&next);
    if change.is_empty() {
      return None;
    }

    info!(settings = ?change.settings().collect::<Vec<_>>(), "Config file changed");
    self.filter = PathFilter::new(&next);
    self.current = next;
    Some(change)
  }
}
