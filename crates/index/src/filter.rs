//! Include/exclude eligibility matching
//!
//! A [`PathFilter`] is compiled once per configuration snapshot. Patterns are
//! matched against workspace-relative paths with `/` as a literal separator,
//! so `*` never crosses a directory boundary and `**` must be spelled out.
//!
//! A path is eligible iff it matches the include glob and neither it nor any
//! of its ancestor directories matches an exclude glob. Which exclude list is
//! used depends on the snapshot's exclude mode.

use std::path::{Component, Path, PathBuf};

use everywhere_core::Config;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::warn;

/// Name joined onto a directory so `dir/**` style excludes can match the directory itself
const SAMPLE_CHILD: &str = "__everywhere_child__";

/// Compiled include/exclude matchers for one configuration snapshot
#[derive(Debug, Clone)]
pub struct PathFilter {
  include: GlobSet,
  exclude: GlobSet,
}

impl PathFilter {
  /// Compile the matchers in effect for `config`
  ///
  /// Invalid patterns are logged and skipped rather than failing the whole snapshot.
  pub fn new(config: &Config) -> Self {
    let include = build_set(std::slice::from_ref(&config.search_everywhere.include));
    let exclude = build_set(&config.effective_exclude());
    Self { include, exclude }
  }

  /// Check whether `path` should be indexed under `root`
  pub fn is_eligible(&self, root: &Path, path: &Path) -> bool {
    let Some(relative) = relative_to(root, path) else {
      return false;
    };
    if relative.as_os_str().is_empty() {
      return false;
    }
    self.include.is_match(&relative) && !self.is_excluded_relative(&relative)
  }

  /// Check whether a directory (and so everything below it) is excluded
  pub fn is_excluded_dir(&self, root: &Path, dir: &Path) -> bool {
    let Some(relative) = relative_to(root, dir) else {
      return true;
    };
    if relative.as_os_str().is_empty() {
      return false;
    }
    self.is_excluded_relative(&relative) || self.exclude.is_match(relative.join(SAMPLE_CHILD))
  }

  fn is_excluded_relative(&self, relative: &Path) -> bool {
    relative
      .ancestors()
      .filter(|ancestor| !ancestor.as_os_str().is_empty())
      .any(|ancestor| self.exclude.is_match(ancestor))
  }
}

fn build_set(patterns: &[String]) -> GlobSet {
  let mut builder = GlobSetBuilder::new();
  for pattern in patterns {
    match GlobBuilder::new(pattern).literal_separator(true).build() {
      Ok(glob) => {
        builder.add(glob);
      }
      Err(e) => warn!(pattern = %pattern, error = %e, "Skipping invalid glob pattern"),
    }
  }
  builder.build().unwrap_or_else(|e| {
    warn!(error = %e, "Failed to compile glob set, matching nothing");
    GlobSet::empty()
  })
}

/// Strip `root` from `path`, keeping only normal components
fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
  let relative = path.strip_prefix(root).ok()?;
  Some(
    relative
      .components()
      .filter(|c| matches!(c, Component::Normal(_)))
      .collect(),
  )
}
