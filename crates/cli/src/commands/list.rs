//! List indexed items the way a picker would present them

use std::path::Path;

use anyhow::{Context, Result, bail};
use everywhere_core::QuickPickItem;
use index::ActionTrigger;
use tracing::info;

use super::{OpenWorkspace, project_root};

/// Options for `everywhere list`
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
  /// Case-insensitive substring matched against item names
  pub query: Option<String>,
  /// Item kind label (function, struct, ...)
  pub kind: Option<String>,
  pub limit: usize,
  pub json: bool,
  /// Rebuild the index before listing
  pub refresh: bool,
}

impl ListFilter {
  fn matches(&self, item: &QuickPickItem) -> bool {
    let kind_ok = self
      .kind
      .as_deref()
      .is_none_or(|kind| item.kind.label().eq_ignore_ascii_case(kind));
    let query_ok = self
      .query
      .as_deref()
      .is_none_or(|query| item.label.to_lowercase().contains(&query.to_lowercase()));
    kind_ok && query_ok
  }
}

pub async fn cmd_list(path: Option<&Path>, filter: ListFilter) -> Result<()> {
  let root = project_root(path)?;
  let open = OpenWorkspace::open(&root)?;

  if filter.refresh || open.workspace.cache().is_empty() {
    info!(root = %root.display(), "Building index before listing");
    open
      .workspace
      .index(ActionTrigger::Manual)
      .await
      .context("Indexing failed")?;
    open.save()?;
  }

  let items: Vec<QuickPickItem> = open
    .workspace
    .get_data()
    .into_iter()
    .filter(|item| filter.matches(item))
    .take(if filter.limit == 0 { usize::MAX } else { filter.limit })
    .collect();

  if filter.json {
    println!("{}", serde_json::to_string_pretty(&items)?);
    return Ok(());
  }

  if items.is_empty() {
    if filter.query.is_some() || filter.kind.is_some() {
      bail!("No items matched");
    }
    println!("No items indexed");
    return Ok(());
  }

  for item in &items {
    println!("{}", item.label);
    println!("    {}  {}", item.description, item.detail);
  }
  println!();
  println!("{} items", items.len());

  Ok(())
}
