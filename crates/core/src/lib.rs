pub mod config;
pub mod error;
pub mod item;

pub use config::{
  CacheConfig, Config, ConfigChange, DEBOUNCE_SETTING, ExcludeMode, FILES_EXCLUDE, HostExcludeConfig, ItemsFilter,
  LogConfig, PRESENTATION_ONLY_SETTINGS, SEARCH_EXCLUDE, SECTION, SearchEverywhereConfig, WatcherConfig,
};
pub use error::{ConfigError, Result};
pub use item::{Item, ItemKind, Language, QuickPickItem};
