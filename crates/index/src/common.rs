//! Shared index state, the action dispatcher and the registration funnel
//!
//! [`WorkspaceCommon::register_action`] is the only way work reaches the
//! processor. Full reindexing is registered as an action too, so it runs
//! exclusively with respect to every queued update and removal.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc, time::Instant};

use async_trait::async_trait;
use everywhere_core::QuickPickItem;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
  action::{Action, ActionError, ActionId, ActionTrigger, ActionType, ActionWork},
  cache::{Cache, CacheState},
  convert::DataConverter,
  events::EventBus,
  extract::{ExtractionError, Extractor},
  handle::ProcessorHandle,
  paths::WorkspacePaths,
  processor::{ActionExecutor, ActionProcessor, ProcessorConfig},
  remover::Remover,
  settings::ConfigSource,
  updater::Updater,
};

/// Everything actions read and mutate
pub struct IndexState {
  pub cache: Cache,
  pub config: ConfigSource,
  pub paths: WorkspacePaths,
  pub extractor: Arc<dyn Extractor>,
}

impl IndexState {
  pub fn new(cache: Cache, config: ConfigSource, paths: WorkspacePaths, extractor: Arc<dyn Extractor>) -> Self {
    Self {
      cache,
      config,
      paths,
      extractor,
    }
  }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Interprets [`ActionWork`] against the shared [`IndexState`]
pub struct ActionDispatcher {
  state: Arc<IndexState>,
  updater: Updater,
  remover: Remover,
}

impl ActionDispatcher {
  pub fn new(state: Arc<IndexState>) -> Self {
    Self {
      updater: Updater::new(state.clone()),
      remover: Remover::new(state.clone()),
      state,
    }
  }

  /// Rebuild the whole cache from a fresh walk
  ///
  /// The new contents are built aside and swapped in at the end, so readers see
  /// either the previous cache or the complete new one.
  async fn reindex(&self) -> Result<(), ActionError> {
    let start = Instant::now();
    let snapshot = self.state.config.try_snapshot()?;
    let paths = self.state.paths.list(&snapshot).await?;

    let mut entries = BTreeMap::new();
    let mut skipped = 0usize;
    for path in paths.iter() {
      match self.state.extractor.extract_items(path).await {
        Ok(items) => {
          entries.insert(path.clone(), items);
        }
        Err(ExtractionError::NotFound(_)) => {
          debug!(path = %path.display(), "Path vanished during reindex");
          skipped += 1;
        }
        Err(e) => {
          warn!(path = %path.display(), error = %e, "Skipping file during reindex");
          skipped += 1;
        }
      }
    }

    let fresh = CacheState::from_entries(entries);
    let (files, items) = (fresh.entries.len(), fresh.item_count);
    self.state.cache.replace(fresh);

    info!(
      files,
      items,
      skipped,
      elapsed_ms = start.elapsed().as_millis() as u64,
      "Reindex complete"
    );
    Ok(())
  }
}

fn report_index_outcome(trigger: ActionTrigger, result: Result<(), ActionError>) -> Result<(), ActionError> {
  if let Err(e) = &result {
    error!(%trigger, error = %e, "Workspace indexing failed");
  }
  result
}

#[async_trait]
impl ActionExecutor for ActionDispatcher {
  async fn execute(&self, action: &Action) -> Result<(), ActionError> {
    match &action.work {
      ActionWork::Reindex => self.reindex().await,
      ActionWork::Update { path, detail, old_path } => {
        self
          .updater
          .update_cache_by_path(path, *detail, old_path.as_deref())
          .await
      }
      ActionWork::Remove { path, detail } => {
        self.remover.remove_from_cache_by_path(path, *detail);
        Ok(())
      }
    }
  }
}

// ============================================================================
// Workspace Common
// ============================================================================

/// Orchestrates action registration and full index runs
#[derive(Clone)]
pub struct WorkspaceCommon {
  state: Arc<IndexState>,
  processor: ProcessorHandle,
  events: EventBus,
}

impl WorkspaceCommon {
  /// Spawn the processor over `state` and return the orchestrator
  pub fn new(state: Arc<IndexState>, events: EventBus, config: ProcessorConfig, cancel: CancellationToken) -> Self {
    let dispatcher = Arc::new(ActionDispatcher::new(state.clone()));
    let processor = ActionProcessor::spawn(dispatcher, events.clone(), config, cancel);
    Self {
      state,
      processor,
      events,
    }
  }

  pub fn state(&self) -> &Arc<IndexState> {
    &self.state
  }

  pub fn processor(&self) -> &ProcessorHandle {
    &self.processor
  }

  pub fn events(&self) -> &EventBus {
    &self.events
  }

  /// Shape an action and append it to the queue
  pub fn register_action(
    &self,
    kind: ActionType,
    work: ActionWork,
    trigger: ActionTrigger,
    uri: Option<PathBuf>,
    comparison_uri: Option<PathBuf>,
  ) -> ActionId {
    if kind != work.action_type() {
      warn!(?kind, work = ?work.action_type(), "Action type does not match its work");
    }
    let action = Action::new(kind, work, trigger, uri, comparison_uri);
    let id = action.id;
    debug!(id = %id, ?kind, %trigger, "Registering action");
    self.processor.enqueue(action);
    id
  }

  /// Run a full reindex as an exclusive action and wait for it
  pub async fn index(&self, trigger: ActionTrigger) -> Result<(), ActionError> {
    let done = self.queue_reindex(trigger);
    report_index_outcome(trigger, done.await.unwrap_or(Err(ActionError::ProcessorGone)))
  }

  /// Queue a full reindex now without waiting for it; failures are logged
  pub fn index_in_background(&self, trigger: ActionTrigger) {
    let done = self.queue_reindex(trigger);
    tokio::spawn(async move {
      let _ = report_index_outcome(trigger, done.await.unwrap_or(Err(ActionError::ProcessorGone)));
    });
  }

  fn queue_reindex(&self, trigger: ActionTrigger) -> oneshot::Receiver<Result<(), ActionError>> {
    info!(%trigger, "Indexing workspace");
    self.processor.submit(Action::reindex(trigger))
  }

  /// Current presentation view of the cache; never waits on the queue
  pub fn get_data(&self) -> Vec<QuickPickItem> {
    let snapshot = self.state.config.snapshot();
    DataConverter::new(&snapshot.config, &self.state.paths).convert_cache(&self.state.cache)
  }
}
