//! Action types for the index queue
//!
//! An [`Action`] is one unit of pending cache work. Its work is a tagged
//! variant ([`ActionWork`]) interpreted by an [`crate::processor::ActionExecutor`],
//! so queued actions stay inspectable and never capture ambient state.

use std::{
  fmt,
  path::PathBuf,
  sync::atomic::{AtomicU64, Ordering},
  time::Duration,
};

use everywhere_core::ConfigError;

use crate::extract::ExtractionError;

// ============================================================================
// Classification
// ============================================================================

/// Coarse kind of cache work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
  Update,
  Remove,
  Reindex,
}

/// The external event category that caused an action to be registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionTrigger {
  DidChangeTextDocument,
  DidCreateFiles,
  DidRenameFiles,
  DidDeleteFiles,
  WorkspaceFoldersChange,
  ConfigurationChange,
  Startup,
  Reload,
  Manual,
}

impl fmt::Display for ActionTrigger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ActionTrigger::DidChangeTextDocument => "text document change",
      ActionTrigger::DidCreateFiles => "files created",
      ActionTrigger::DidRenameFiles => "files renamed",
      ActionTrigger::DidDeleteFiles => "files deleted",
      ActionTrigger::WorkspaceFoldersChange => "workspace folders change",
      ActionTrigger::ConfigurationChange => "configuration change",
      ActionTrigger::Startup => "startup",
      ActionTrigger::Reload => "reload",
      ActionTrigger::Manual => "manual",
    };
    f.write_str(name)
  }
}

/// Fine-grained mutation subtype used by the updater and remover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailedActionType {
  TextChange,
  CreateNewFile,
  CreateNewDirectory,
  RenameOrMoveFile,
  RenameOrMoveDirectory,
  RemoveFile,
  RemoveDirectory,
}

// ============================================================================
// Action
// ============================================================================

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Registration-ordered action identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(pub u64);

impl ActionId {
  fn next() -> Self {
    Self(NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed))
  }
}

impl fmt::Display for ActionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// The deferred work an action performs when executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionWork {
  /// Rebuild the whole cache from a workspace walk
  Reindex,
  /// Re-extract `path` (and, for renames, drop `old_path`)
  Update {
    path: PathBuf,
    detail: DetailedActionType,
    old_path: Option<PathBuf>,
  },
  /// Drop `path` (a file entry or a directory prefix)
  Remove { path: PathBuf, detail: DetailedActionType },
}

impl ActionWork {
  pub fn action_type(&self) -> ActionType {
    match self {
      ActionWork::Reindex => ActionType::Reindex,
      ActionWork::Update { .. } => ActionType::Update,
      ActionWork::Remove { .. } => ActionType::Remove,
    }
  }
}

/// A queued unit of cache-mutating work. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
  pub id: ActionId,
  pub kind: ActionType,
  pub trigger: ActionTrigger,
  pub uri: Option<PathBuf>,
  pub comparison_uri: Option<PathBuf>,
  pub work: ActionWork,
}

impl Action {
  /// Build an action, assigning the next registration id
  pub fn new(
    kind: ActionType,
    work: ActionWork,
    trigger: ActionTrigger,
    uri: Option<PathBuf>,
    comparison_uri: Option<PathBuf>,
  ) -> Self {
    Self {
      id: ActionId::next(),
      kind,
      trigger,
      uri,
      comparison_uri,
      work,
    }
  }

  pub fn reindex(trigger: ActionTrigger) -> Self {
    Self::new(ActionType::Reindex, ActionWork::Reindex, trigger, None, None)
  }

  pub fn update(trigger: ActionTrigger, path: PathBuf, detail: DetailedActionType, old_path: Option<PathBuf>) -> Self {
    Self::new(
      ActionType::Update,
      ActionWork::Update {
        path: path.clone(),
        detail,
        old_path: old_path.clone(),
      },
      trigger,
      Some(path),
      old_path,
    )
  }

  pub fn remove(trigger: ActionTrigger, path: PathBuf, detail: DetailedActionType) -> Self {
    Self::new(
      ActionType::Remove,
      ActionWork::Remove {
        path: path.clone(),
        detail,
      },
      trigger,
      Some(path),
      None,
    )
  }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while executing an action
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
  #[error("Extraction failed: {0}")]
  Extraction(#[from] ExtractionError),

  #[error("Workspace walk failed: {0}")]
  Walk(String),

  #[error("Configuration error: {0}")]
  Config(#[from] ConfigError),

  #[error("Action timed out after {0:?}")]
  Timeout(Duration),

  #[error("Action panicked: {0}")]
  Panicked(String),

  #[error("Action processor has shut down")]
  ProcessorGone,
}
