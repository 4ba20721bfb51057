//! Index core for the search everywhere workspace
//!
//! Raw workspace signals are classified into [`Action`]s which are executed one
//! at a time, in registration order, by a single [`ActionProcessor`]. Every
//! cache mutation (per-path update, per-path removal, full reindex) goes
//! through that queue.
//!
//! ```text
//! WatcherTask ──► Workspace listener (debounce) ──► register_action ──► ActionProcessor ──► Cache
//!                                                                            │
//!                                                                            └──► EventBus
//! ```

mod action;
mod cache;
mod common;
mod convert;
mod debounce;
mod events;
mod extract;
mod filter;
mod handle;
mod paths;
mod processor;
mod remover;
mod settings;
mod store;
mod updater;
mod watcher;
mod workspace;

#[cfg(test)]
mod __tests__;

pub use action::{Action, ActionError, ActionId, ActionTrigger, ActionType, ActionWork, DetailedActionType};
pub use cache::{Cache, CacheState};
pub use common::{ActionDispatcher, IndexState, WorkspaceCommon};
pub use convert::DataConverter;
pub use debounce::{DebounceKind, Debouncer};
pub use events::{EventBus, IndexEvent};
pub use extract::{ExtractionError, Extractor, SymbolExtractor};
pub use filter::PathFilter;
pub use handle::ProcessorHandle;
pub use paths::WorkspacePaths;
pub use processor::{ActionExecutor, ActionProcessor, ProcessorConfig};
pub use remover::Remover;
pub use settings::{ConfigLoader, ConfigSnapshot, ConfigSource, FileConfigLoader, StaticConfigLoader};
pub use store::{CacheStore, StoreError, default_data_dir};
pub use updater::Updater;
pub use watcher::{WatcherConfig, WatcherError, WatcherTask};
pub use workspace::{Workspace, WorkspaceEvent, WorkspaceOptions, should_reindex_on_configuration_change};
