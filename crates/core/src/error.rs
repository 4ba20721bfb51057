use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading configuration files
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
