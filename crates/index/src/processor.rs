//! ActionProcessor - sequential executor for cache-mutating actions
//!
//! Every cache mutation in the system flows through this actor. Actions are
//! appended to an unbounded channel by [`ProcessorHandle::enqueue`] and drained
//! strictly in FIFO order, one at a time. Serial execution is the only thing
//! that keeps two mutations of the same path from racing.
//!
//! # Drain loop
//!
//! ```text
//! recv ─┬─> WillProcess ─> WillExecuteAction(a) ─> execute(a) ─┐
//!       │                                                      │
//!       └────────────── next queued action? <──────────────────┘
//!                              │ none
//!                              └─> DidProcess
//! ```
//!
//! # Failure isolation
//!
//! An action that returns an error, times out or panics is logged and
//! terminal for that action only. The loop continues with the next action and
//! the failing target is not retried.

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
  action::{Action, ActionError},
  events::{EventBus, IndexEvent},
  handle::{ProcessorHandle, ProcessorState},
};

/// Interprets an action's work
#[async_trait]
pub trait ActionExecutor: Send + Sync + 'static {
  async fn execute(&self, action: &Action) -> Result<(), ActionError>;
}

/// Configuration for the ActionProcessor
#[derive(Debug, Clone, Default)]
pub struct ProcessorConfig {
  /// Upper bound for one action's execution (None = unbounded)
  pub action_timeout: Option<Duration>,
}

impl ProcessorConfig {
  /// Build from the `[watcher] action_timeout_ms` setting (0 = unbounded)
  pub fn from_timeout_ms(action_timeout_ms: u64) -> Self {
    Self {
      action_timeout: (action_timeout_ms > 0).then(|| Duration::from_millis(action_timeout_ms)),
    }
  }
}

/// An action waiting in the queue, with an optional completion channel
pub(crate) struct QueuedAction {
  pub action: Action,
  pub done: Option<oneshot::Sender<Result<(), ActionError>>>,
}

/// The processor actor
///
/// # Lifecycle
///
/// The actor runs until one of:
/// - The CancellationToken is triggered
/// - Every [`ProcessorHandle`] has been dropped
pub struct ActionProcessor {
  executor: Arc<dyn ActionExecutor>,
  events: EventBus,
  config: ProcessorConfig,
  rx: mpsc::UnboundedReceiver<QueuedAction>,
  state: Arc<ProcessorState>,
  cancel: CancellationToken,
}

impl ActionProcessor {
  /// Spawn the processor and return a handle for enqueueing actions
  pub fn spawn(
    executor: Arc<dyn ActionExecutor>,
    events: EventBus,
    config: ProcessorConfig,
    cancel: CancellationToken,
  ) -> ProcessorHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = Arc::new(ProcessorState::new());
    let actor = Self {
      executor,
      events,
      config,
      rx,
      state: state.clone(),
      cancel,
    };
    tokio::spawn(actor.run());
    ProcessorHandle::new(tx, state)
  }

  /// Main actor loop
  pub async fn run(mut self) {
    info!(timeout = ?self.config.action_timeout, "ActionProcessor started");

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              info!("ActionProcessor shutting down (cancelled)");
              break;
          }

          queued = self.rx.recv() => {
              match queued {
                  Some(queued) => self.drain(queued).await,
                  None => {
                      info!("ActionProcessor shutting down (channel closed)");
                      break;
                  }
              }
          }
      }
    }

    // Anything still queued will never run; release waiters
    self.rx.close();
    while let Ok(queued) = self.rx.try_recv() {
      self.finish(queued.done, Err(ActionError::ProcessorGone));
    }

    info!("ActionProcessor stopped");
  }

  /// Execute queued actions until the queue is empty
  async fn drain(&mut self, first: QueuedAction) {
    let mut next = Some(first);

    while let Some(queued) = next {
      self.events.publish(IndexEvent::WillProcess);
      self.process(queued).await;

      if self.cancel.is_cancelled() {
        break;
      }
      next = self.rx.try_recv().ok();
    }

    debug!("Action queue drained");
    self.events.publish(IndexEvent::DidProcess);
  }

  /// Execute one action with failure isolation
  async fn process(&self, queued: QueuedAction) {
    let QueuedAction { action, done } = queued;

    self.events.publish(IndexEvent::WillExecuteAction(action.clone()));
    debug!(
      id = %action.id,
      kind = ?action.kind,
      trigger = %action.trigger,
      uri = ?action.uri,
      "Executing action"
    );

    self.state.begin_execution();
    let result = self.execute(&action).await;
    self.state.end_execution();

    match &result {
      Ok(()) => {}
      Err(ActionError::Extraction(e)) => {
        warn!(id = %action.id, uri = ?action.uri, error = %e, "Action skipped unextractable content");
      }
      Err(e) => {
        error!(id = %action.id, kind = ?action.kind, uri = ?action.uri, error = %e, "Action failed");
      }
    }

    self.finish(done, result);
  }

  async fn execute(&self, action: &Action) -> Result<(), ActionError> {
    let work = AssertUnwindSafe(self.executor.execute(action)).catch_unwind();

    let outcome = match self.config.action_timeout {
      Some(limit) => match tokio::time::timeout(limit, work).await {
        Ok(outcome) => outcome,
        Err(_) => return Err(ActionError::Timeout(limit)),
      },
      None => work.await,
    };

    outcome.unwrap_or_else(|panic| Err(ActionError::Panicked(panic_message(panic.as_ref()))))
  }

  fn finish(&self, done: Option<oneshot::Sender<Result<(), ActionError>>>, result: Result<(), ActionError>) {
    if let Some(done) = done {
      let _ = done.send(result);
    }
    self.state.complete_one();
  }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
  if let Some(message) = panic.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = panic.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}
