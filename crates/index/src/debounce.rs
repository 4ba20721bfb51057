//! Per-event-kind debounce timers
//!
//! Each noisy event source gets its own [`Debouncer`]: a two-state machine
//! that remembers only the most recent call's arguments and the deadline at
//! which they should be dispatched. Time is always passed in by the caller, so
//! the state machine never reads a clock itself.
//!
//! ```text
//!            call(now, a)                         call(now, b)
//!   Idle ─────────────────> Pending{now+w, a} ────────────────> Pending{now+w, b}
//!     ^                            │
//!     └──── poll(t >= deadline) ───┘  yields the last args
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Event kinds with their own timer and quiescence window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebounceKind {
  Configuration,
  WorkspaceFolders,
  TextDocument,
}

impl DebounceKind {
  pub fn window(self) -> Duration {
    match self {
      DebounceKind::Configuration => Duration::from_millis(250),
      DebounceKind::WorkspaceFolders => Duration::from_millis(250),
      DebounceKind::TextDocument => Duration::from_millis(700),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DebounceState<T> {
  Idle,
  Pending { deadline: Instant, last: T },
}

/// Trailing-edge debouncer keeping the last call's arguments
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
  window: Duration,
  state: DebounceState<T>,
}

impl<T> Debouncer<T> {
  pub fn new(window: Duration) -> Self {
    Self {
      window,
      state: DebounceState::Idle,
    }
  }

  pub fn for_kind(kind: DebounceKind) -> Self {
    Self::new(kind.window())
  }

  pub fn window(&self) -> Duration {
    self.window
  }

  /// Record a call at `now`, replacing any pending arguments and restarting the window
  pub fn call(&mut self, now: Instant, args: T) {
    self.state = DebounceState::Pending {
      deadline: now + self.window,
      last: args,
    };
  }

  /// When the pending call is due, if any
  pub fn deadline(&self) -> Option<Instant> {
    match &self.state {
      DebounceState::Idle => None,
      DebounceState::Pending { deadline, .. } => Some(*deadline),
    }
  }

  /// Take the pending arguments if the window has elapsed by `now`
  pub fn poll(&mut self, now: Instant) -> Option<T> {
    match &self.state {
      DebounceState::Pending { deadline, .. } if now >= *deadline => {
        match std::mem::replace(&mut self.state, DebounceState::Idle) {
          DebounceState::Pending { last, .. } => Some(last),
          DebounceState::Idle => None,
        }
      }
      _ => None,
    }
  }
}
