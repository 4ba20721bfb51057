//! Watch a project and keep its index current until interrupted

use std::path::Path;

use anyhow::{Context, Result};
use index::{IndexEvent, WatcherConfig, WatcherTask};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::{OpenWorkspace, project_root};

/// Capacity of the watcher -> listener channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub async fn cmd_watch(path: Option<&Path>) -> Result<()> {
  let root = project_root(path)?;
  let open = OpenWorkspace::open(&root)?;
  let workspace = &open.workspace;

  // Subscribe before startup so the status logger sees every action
  let status = tokio::spawn(log_status(workspace.events().subscribe()));

  workspace.startup().await.context("Initial indexing failed")?;
  open.save()?;
  info!(
    root = %root.display(),
    files = workspace.cache().len(),
    items = workspace.cache().item_count(),
    "Index ready, watching for changes"
  );

  let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
  let listener = workspace.spawn_listener(rx);
  let watcher_cancel = open.cancel.child_token();
  let watcher = WatcherTask::spawn(
    WatcherConfig::from_config(root.clone(), &open.config),
    open.config.clone(),
    tx,
    watcher_cancel.clone(),
  )
  .context("Failed to start file watcher")?;

  tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
  info!("Interrupted, shutting down");

  // Stopping the watcher closes the listener's channel, which flushes
  // debounced calls into the queue; then let the queue drain
  watcher_cancel.cancel();
  let _ = watcher.await;
  let _ = listener.await;
  workspace.wait_idle().await;
  open.cancel.cancel();
  status.abort();

  open.save()?;
  info!("Watcher stopped");
  Ok(())
}

/// Log index lifecycle events as they happen
async fn log_status(mut events: broadcast::Receiver<IndexEvent>) {
  loop {
    match events.recv().await {
      Ok(IndexEvent::WillExecuteAction(action)) => {
        debug!(id = %action.id, kind = ?action.kind, trigger = %action.trigger, "Executing action");
      }
      Ok(IndexEvent::DidProcess) => debug!("Action queue drained"),
      Ok(IndexEvent::WillReindexOnConfigurationChange) => info!("Configuration changed, reindexing"),
      Ok(IndexEvent::DidDebounceConfigToggle) => info!("Debounce setting toggled"),
      Ok(IndexEvent::WillProcess) => {}
      Err(broadcast::error::RecvError::Lagged(skipped)) => warn!(skipped, "Status logger lagged"),
      Err(broadcast::error::RecvError::Closed) => break,
    }
  }
}
