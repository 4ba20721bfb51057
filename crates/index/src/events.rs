//! Publish/subscribe bus for index lifecycle notifications
//!
//! The bus is owned by the composition root ([`crate::Workspace`]) and handed
//! by clone to every component that publishes or subscribes. Observers such as
//! status indicators and tests subscribe to follow the action queue.

use tokio::sync::broadcast;
use tracing::trace;

use crate::action::Action;

/// Default number of buffered events per subscriber before lagging
const DEFAULT_CAPACITY: usize = 256;

/// Notification published by the index core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
  /// The processor is about to take the next action off the queue
  WillProcess,
  /// The queue has been drained
  DidProcess,
  /// The given action is about to execute
  WillExecuteAction(Action),
  /// A configuration change forces a full reindex
  WillReindexOnConfigurationChange,
  /// Only the debounce toggle changed; no reindex
  DidDebounceConfigToggle,
}

/// Broadcast bus for [`IndexEvent`]s
///
/// Cheap to clone. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
  tx: broadcast::Sender<IndexEvent>,
}

impl EventBus {
  pub fn new() -> Self {
    Self::with_capacity(DEFAULT_CAPACITY)
  }

  pub fn with_capacity(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  /// Subscribe to all events published from now on
  pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
    self.tx.subscribe()
  }

  pub fn publish(&self, event: IndexEvent) {
    trace!(event = ?event, subscribers = self.tx.receiver_count(), "Publishing index event");
    let _ = self.tx.send(event);
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new()
  }
}
