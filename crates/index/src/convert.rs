//! Presentation conversion for cached items

use std::path::Path;

use everywhere_core::{Config, Item, QuickPickItem};

use crate::{cache::Cache, paths::WorkspacePaths};

/// Converts cached items to [`QuickPickItem`]s using one configuration snapshot
pub struct DataConverter<'a> {
  config: &'a Config,
  paths: &'a WorkspacePaths,
}

impl<'a> DataConverter<'a> {
  pub fn new(config: &'a Config, paths: &'a WorkspacePaths) -> Self {
    Self { config, paths }
  }

  /// Convert every cached item that passes the items filter, in path order
  pub fn convert_cache(&self, cache: &Cache) -> Vec<QuickPickItem> {
    let mut out = Vec::with_capacity(cache.item_count());
    cache.for_each(|_, items| {
      out.extend(items.iter().filter_map(|item| self.convert(item)));
    });
    out
  }

  /// Convert one item, or `None` if the items filter drops it
  pub fn convert(&self, item: &Item) -> Option<QuickPickItem> {
    let section = &self.config.search_everywhere;
    let kind = item.kind.as_u32();
    if !section.items_filter.allows(kind, &item.name) {
      return None;
    }

    let key = kind.to_string();
    let label = match section.icons.get(&key) {
      Some(icon) => format!("$({icon})  {}", item.name),
      None => item.name.clone(),
    };

    let mut description = match section.items_filter_phrases.get(&key) {
      Some(phrase) if section.should_use_items_filter_phrases => format!("[{phrase}] {}", item.kind.label()),
      _ => item.kind.label().to_string(),
    };
    if let Some(container) = &item.container {
      description.push_str(" in ");
      description.push_str(container);
    }

    Some(QuickPickItem {
      label,
      description,
      detail: self.detail(&item.path, item.line),
      path: item.path.clone(),
      kind: item.kind,
      line: item.line,
      column: item.column,
    })
  }

  fn detail(&self, path: &Path, line: u32) -> String {
    let shown = self
      .paths
      .root_for(path)
      .and_then(|root| path.strip_prefix(&root).ok().map(Path::to_path_buf))
      .unwrap_or_else(|| path.to_path_buf());
    format!("{}:{}", shown.display(), line + 1)
  }
}
