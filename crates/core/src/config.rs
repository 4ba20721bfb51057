//! Configuration system for Everywhere with per-project overrides.
//!
//! Config priority: project-relative (.everywhere/config.toml) > user (~/.config/everywhere/config.toml)
//!
//! A loaded [`Config`] is treated as an immutable snapshot. Index decisions made
//! during one cycle are evaluated against a single snapshot; a new snapshot is
//! read when the configuration changes.

use std::{
  collections::{BTreeMap, BTreeSet},
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Setting identifier of the extension's own section
pub const SECTION: &str = "searchEverywhere";

/// Setting identifier of the host's file exclude map
pub const FILES_EXCLUDE: &str = "files.exclude";

/// Setting identifier of the host's search exclude map
pub const SEARCH_EXCLUDE: &str = "search.exclude";

/// Settings under [`SECTION`] that only affect presentation or runtime behavior.
///
/// Changing any of these never requires rebuilding the index.
pub const PRESENTATION_ONLY_SETTINGS: &[&str] = &[
  "searchEverywhere.shouldDisplayNotificationInStatusBar",
  "searchEverywhere.shouldInitOnStartup",
  "searchEverywhere.shouldHighlightSymbol",
  "searchEverywhere.shouldUseDebounce",
];

/// Setting identifier of the debounce toggle
pub const DEBOUNCE_SETTING: &str = "searchEverywhere.shouldUseDebounce";

// ============================================================================
// Search Everywhere Section
// ============================================================================

/// Which exclude patterns govern path eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExcludeMode {
  /// Use the `exclude` list of the search everywhere section
  #[default]
  #[serde(rename = "search everywhere")]
  SearchEverywhere,
  /// Defer to the host's `files.exclude` and `search.exclude` maps
  #[serde(rename = "files and search")]
  FilesAndSearch,
}

/// Filter applied to items before they are presented
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ItemsFilter {
  /// Item kinds to keep (empty = all kinds)
  pub allowed_kinds: Vec<u32>,
  /// Item kinds to drop
  pub ignored_kinds: Vec<u32>,
  /// Item names to drop (exact match)
  pub ignored_names: Vec<String>,
}

impl ItemsFilter {
  /// Check whether an item of the given kind and name passes the filter
  pub fn allows(&self, kind: u32, name: &str) -> bool {
    (self.allowed_kinds.is_empty() || self.allowed_kinds.contains(&kind))
      && !self.ignored_kinds.contains(&kind)
      && !self.ignored_names.iter().any(|ignored| ignored == name)
  }
}

/// The extension's own configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchEverywhereConfig {
  /// Glob that a path must match to be indexed
  pub include: String,

  /// Globs that exclude paths from indexing (used in `search everywhere` mode)
  pub exclude: Vec<String>,

  /// Which exclude patterns to honor
  pub exclude_mode: ExcludeMode,

  /// Prefix item descriptions with their kind's filter phrase
  pub should_use_items_filter_phrases: bool,

  /// Phrase that shows the help listing
  pub help_phrase: String,

  // ---- Presentation-only flags ----
  pub should_display_notification_in_status_bar: bool,
  pub should_init_on_startup: bool,
  pub should_highlight_symbol: bool,
  pub should_use_debounce: bool,

  /// Filter applied to presented items
  pub items_filter: ItemsFilter,

  /// Kind number -> filter phrase (e.g. "11" -> "@")
  pub items_filter_phrases: BTreeMap<String, String>,

  /// Kind number -> icon name
  pub icons: BTreeMap<String, String>,
}

impl Default for SearchEverywhereConfig {
  fn default() -> Self {
    Self {
      include: "**/*.{js,jsx,ts,tsx,rs,py,go,java,c,cpp,h,hpp,cs,rb,php,md,json,toml,yaml,yml}".to_string(),
      exclude: vec![
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/.git/**".to_string(),
        "**/.everywhere/**".to_string(),
      ],
      exclude_mode: ExcludeMode::default(),
      should_use_items_filter_phrases: false,
      help_phrase: "?".to_string(),
      should_display_notification_in_status_bar: true,
      should_init_on_startup: true,
      should_highlight_symbol: true,
      should_use_debounce: true,
      items_filter: ItemsFilter::default(),
      items_filter_phrases: BTreeMap::new(),
      icons: BTreeMap::new(),
    }
  }
}

// ============================================================================
// Host Sections
// ============================================================================

/// A host-level exclude map (glob -> enabled)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostExcludeConfig {
  pub exclude: BTreeMap<String, bool>,
}

impl HostExcludeConfig {
  fn enabled(&self) -> impl Iterator<Item = &String> {
    self.exclude.iter().filter(|(_, on)| **on).map(|(glob, _)| glob)
  }
}

// ============================================================================
// Runtime Sections
// ============================================================================

/// File watcher and action processing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
  /// Poll interval for the fallback poll watcher (default: 2)
  pub poll_interval_secs: u64,

  /// Window in which raw notify events for one path are coalesced (default: 100)
  pub change_debounce_ms: u64,

  /// Upper bound for a single action's execution (0 = unbounded, default: 0)
  pub action_timeout_ms: u64,
}

impl Default for WatcherConfig {
  fn default() -> Self {
    Self {
      poll_interval_secs: 2,
      change_debounce_ms: 100,
      action_timeout_ms: 0,
    }
  }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Log level: "off", "error", "warn", "info", "debug", "trace"
  pub level: String,

  /// Log file rotation: "daily", "hourly", "never"
  pub rotation: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      rotation: "daily".to_string(),
    }
  }
}

/// Cache persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Persist the index cache between runs (default: true)
  pub persist: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self { persist: true }
  }
}

// ============================================================================
// Config
// ============================================================================

/// Full configuration snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
  #[serde(default)]
  pub search_everywhere: SearchEverywhereConfig,

  /// Host `files.exclude` map
  #[serde(default)]
  pub files: HostExcludeConfig,

  /// Host `search.exclude` map
  #[serde(default)]
  pub search: HostExcludeConfig,

  #[serde(default)]
  pub watcher: WatcherConfig,

  #[serde(default)]
  pub log: LogConfig,

  #[serde(default)]
  pub cache: CacheConfig,
}

impl Config {
  /// Load config for a project, with fallback to user config
  pub fn load_for_project(project_path: &Path) -> Self {
    let project_config = Self::project_config_path(project_path);
    if project_config.exists()
      && let Ok(config) = Self::load(&project_config)
    {
      return config;
    }

    if let Some(user_config_path) = Self::user_config_path()
      && user_config_path.exists()
      && let Ok(config) = Self::load(&user_config_path)
    {
      return config;
    }

    Self::default()
  }

  /// Load config for a project, surfacing read and parse errors
  ///
  /// Missing files fall through to the next location; a file that exists but
  /// cannot be read or parsed is an error.
  pub fn try_load_for_project(project_path: &Path) -> Result<Self> {
    let project_config = Self::project_config_path(project_path);
    if project_config.exists() {
      return Self::load(&project_config);
    }

    if let Some(user_config_path) = Self::user_config_path()
      && user_config_path.exists()
    {
      return Self::load(&user_config_path);
    }

    Ok(Self::default())
  }

  /// Load a single config file
  pub fn load(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }

    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("everywhere").join("config.toml"));
    }

    dirs::config_dir().map(|p: PathBuf| p.join("everywhere").join("config.toml"))
  }

  /// Get the project-relative config path
  pub fn project_config_path(project_path: &Path) -> PathBuf {
    project_path.join(".everywhere").join("config.toml")
  }

  /// Enabled globs of the host's files and search exclude maps, sorted and de-duplicated
  pub fn files_and_search_exclude(&self) -> Vec<String> {
    let merged: BTreeSet<&String> = self.files.enabled().chain(self.search.enabled()).collect();
    merged.into_iter().cloned().collect()
  }

  /// Exclude globs in effect for the current exclude mode
  pub fn effective_exclude(&self) -> Vec<String> {
    match self.search_everywhere.exclude_mode {
      ExcludeMode::SearchEverywhere => self.search_everywhere.exclude.clone(),
      ExcludeMode::FilesAndSearch => self.files_and_search_exclude(),
    }
  }

  /// Compute which settings differ between two snapshots
  pub fn changed_settings(&self, new: &Config) -> ConfigChange {
    let old = serde_json::to_value(self).unwrap_or_default();
    let new = serde_json::to_value(new).unwrap_or_default();

    let mut changed = BTreeSet::new();
    let (Some(old), Some(new)) = (old.as_object(), new.as_object()) else {
      return ConfigChange::default();
    };

    for (section, old_section) in old {
      let new_section = new.get(section).cloned().unwrap_or_default();
      let (Some(old_fields), Some(new_fields)) = (old_section.as_object(), new_section.as_object()) else {
        continue;
      };

      let keys: BTreeSet<&String> = old_fields.keys().chain(new_fields.keys()).collect();
      for key in keys {
        if old_fields.get(key) != new_fields.get(key) {
          changed.insert(format!("{}.{}", camel_case(section), camel_case(key)));
        }
      }
    }

    ConfigChange { changed }
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    r#"# Everywhere Configuration
# Place in .everywhere/config.toml (project) or ~/.config/everywhere/config.toml (user)

# ============================================================================
# Indexing
# ============================================================================

[search_everywhere]
# Glob a path must match to be indexed
include = "**/*.{js,jsx,ts,tsx,rs,py,go,java,c,cpp,h,hpp,cs,rb,php,md,json,toml,yaml,yml}"

# Globs excluded from indexing (used when exclude_mode = "search everywhere")
exclude = ["**/node_modules/**", "**/target/**", "**/.git/**", "**/.everywhere/**"]

# "search everywhere" uses `exclude` above,
# "files and search" uses the [files] and [search] exclude maps below
exclude_mode = "search everywhere"

# Presentation flags (changing these never triggers a reindex)
should_display_notification_in_status_bar = true
should_init_on_startup = true
should_highlight_symbol = true
should_use_debounce = true

[search_everywhere.items_filter]
allowed_kinds = []
ignored_kinds = []
ignored_names = []

# ============================================================================
# Host Exclude Maps
# ============================================================================

[files.exclude]
"**/.git" = true

[search.exclude]
"**/node_modules" = true

# ============================================================================
# Runtime
# ============================================================================

[watcher]
poll_interval_secs = 2
change_debounce_ms = 100
# 0 = actions run without a time bound
action_timeout_ms = 0

[log]
level = "info"
rotation = "daily"

[cache]
persist = true
"#
    .to_string()
  }
}

/// Convert a snake_case key to its camelCase setting identifier
fn camel_case(key: &str) -> String {
  let mut out = String::with_capacity(key.len());
  let mut upper = false;
  for ch in key.chars() {
    if ch == '_' {
      upper = true;
    } else if upper {
      out.extend(ch.to_uppercase());
      upper = false;
    } else {
      out.push(ch);
    }
  }
  out
}

// ============================================================================
// Config Change
// ============================================================================

/// The set of setting identifiers touched by a configuration change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigChange {
  changed: BTreeSet<String>,
}

impl ConfigChange {
  /// Build a change from explicit setting identifiers
  pub fn from_settings<I, S>(settings: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      changed: settings.into_iter().map(Into::into).collect(),
    }
  }

  /// Check whether the change touches `section` or anything below it
  pub fn affects(&self, section: &str) -> bool {
    self.changed.iter().any(|setting| {
      setting == section
        || setting
          .strip_prefix(section)
          .is_some_and(|rest| rest.starts_with('.'))
    })
  }

  pub fn is_empty(&self) -> bool {
    self.changed.is_empty()
  }

  pub fn settings(&self) -> impl Iterator<Item = &str> {
    self.changed.iter().map(String::as_str)
  }
}
