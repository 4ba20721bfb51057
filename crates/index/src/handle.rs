//! Handle for communicating with the ActionProcessor
//!
//! The handle is cheap to clone and can be shared across tasks. Enqueueing is
//! synchronous and never blocks: the channel is unbounded and the pending
//! counter is published through a `watch` channel so callers can await an idle
//! queue.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{error, trace};

use crate::{
  action::{Action, ActionError},
  processor::QueuedAction,
};

// ============================================================================
// Shared State
// ============================================================================

/// Counters shared between the processor and its handles
#[derive(Debug)]
pub(crate) struct ProcessorState {
  pending: watch::Sender<usize>,
  executing: AtomicUsize,
  max_executing: AtomicUsize,
}

impl ProcessorState {
  pub(crate) fn new() -> Self {
    let (pending, _) = watch::channel(0);
    Self {
      pending,
      executing: AtomicUsize::new(0),
      max_executing: AtomicUsize::new(0),
    }
  }

  fn queued_one(&self) {
    self.pending.send_modify(|n| *n += 1);
  }

  pub(crate) fn complete_one(&self) {
    self.pending.send_modify(|n| *n = n.saturating_sub(1));
  }

  pub(crate) fn begin_execution(&self) {
    let now = self.executing.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_executing.fetch_max(now, Ordering::SeqCst);
  }

  pub(crate) fn end_execution(&self) {
    self.executing.fetch_sub(1, Ordering::SeqCst);
  }
}

// ============================================================================
// Processor Handle
// ============================================================================

/// Handle to communicate with an [`crate::ActionProcessor`]
#[derive(Clone, Debug)]
pub struct ProcessorHandle {
  tx: mpsc::UnboundedSender<QueuedAction>,
  state: Arc<ProcessorState>,
}

impl ProcessorHandle {
  pub(crate) fn new(tx: mpsc::UnboundedSender<QueuedAction>, state: Arc<ProcessorState>) -> Self {
    Self { tx, state }
  }

  /// Append an action to the queue
  ///
  /// Never fails from the caller's perspective. If the processor has already
  /// shut down the action is dropped and logged.
  pub fn enqueue(&self, action: Action) {
    self.push(QueuedAction { action, done: None });
  }

  /// Append an action now and return a receiver for its outcome
  ///
  /// The action takes its queue position immediately, before the receiver is
  /// awaited. A closed receiver means the processor shut down first.
  pub fn submit(&self, action: Action) -> oneshot::Receiver<Result<(), ActionError>> {
    let (done_tx, done_rx) = oneshot::channel();
    self.push(QueuedAction {
      action,
      done: Some(done_tx),
    });
    done_rx
  }

  /// Append an action and wait for its outcome
  pub async fn submit_and_wait(&self, action: Action) -> Result<(), ActionError> {
    self.submit(action).await.unwrap_or(Err(ActionError::ProcessorGone))
  }

  /// Wait until every enqueued action has finished executing
  pub async fn wait_idle(&self) {
    let mut rx = self.state.pending.subscribe();
    // Err means the processor state was dropped, which also means idle
    let _ = rx.wait_for(|pending| *pending == 0).await;
  }

  /// Number of actions enqueued but not yet finished
  pub fn pending(&self) -> usize {
    *self.state.pending.borrow()
  }

  /// Highest number of actions ever observed executing at the same time
  pub fn max_concurrent_executions(&self) -> usize {
    self.state.max_executing.load(Ordering::SeqCst)
  }

  fn push(&self, queued: QueuedAction) {
    let id = queued.action.id;
    self.state.queued_one();
    match self.tx.send(queued) {
      Ok(()) => {
        trace!(id = %id, pending = self.pending(), "Action enqueued");
      }
      Err(_) => {
        self.state.complete_one();
        error!(id = %id, "Action processor has shut down, dropping action");
      }
    }
  }
}
