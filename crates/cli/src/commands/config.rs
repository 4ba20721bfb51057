//! Configuration inspection and scaffolding

use std::path::Path;

use anyhow::{Context, Result};
use everywhere_core::Config;
use tracing::error;

use super::project_root;

/// Show the effective configuration and where it came from
pub async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
  let root = project_root(path)?;
  let config = Config::try_load_for_project(&root).context("Failed to load configuration")?;

  let project_config = Config::project_config_path(&root);
  let user_config = Config::user_config_path();

  println!("Effective configuration for: {}", root.display());
  println!();

  if project_config.exists() {
    println!("Using project config: {}", project_config.display());
  } else if let Some(user_path) = user_config.filter(|p| p.exists()) {
    println!("Using user config: {}", user_path.display());
  } else {
    println!("Using default configuration (no config file found)");
  }
  println!();

  let toml_str = toml::to_string_pretty(&config).context("Failed to render configuration")?;
  println!("{}", toml_str);

  Ok(())
}

/// Write a commented default config into the project
pub async fn cmd_config_init(path: Option<&Path>) -> Result<()> {
  let root = project_root(path)?;
  let config_path = Config::project_config_path(&root);

  if config_path.exists() {
    error!("Config file already exists: {}", config_path.display());
    println!("Delete it first if you want to regenerate");
    std::process::exit(1);
  }

  if let Some(parent) = config_path.parent() {
    std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
  }
  std::fs::write(&config_path, Config::generate_template())
    .with_context(|| format!("Failed to write {}", config_path.display()))?;

  println!("Created project config: {}", config_path.display());
  println!("Edit the file to customize settings.");

  Ok(())
}
