//! Full reindex of a project

use std::{path::Path, time::Instant};

use anyhow::{Context, Result};
use ::index::ActionTrigger;

use super::{OpenWorkspace, project_root};

/// Rebuild the index for a project and persist it
pub async fn cmd_index(path: Option<&Path>, stats: bool) -> Result<()> {
  let root = project_root(path)?;
  let open = OpenWorkspace::open(&root)?;

  let start = Instant::now();
  open
    .workspace
    .index(ActionTrigger::Manual)
    .await
    .context("Indexing failed")?;
  open.save()?;

  let cache = open.workspace.cache();
  println!(
    "Indexed {} files ({} items) in {:.2}s",
    cache.len(),
    cache.item_count(),
    start.elapsed().as_secs_f64()
  );

  if stats {
    println!();
    println!("Root:      {}", root.display());
    println!("Include:   {}", open.config.search_everywhere.include);
    println!("Exclude:   {}", open.config.effective_exclude().join(", "));
    if let Some(store) = &open.store {
      println!("Snapshot:  {}", store.path().display());
    }
  }

  Ok(())
}
