//! Everywhere CLI - workspace symbol index with a serialized update queue

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use everywhere_core::Config;

mod commands;
mod logging;

use commands::{ListFilter, cmd_config_init, cmd_config_show, cmd_index, cmd_list, cmd_watch};
use logging::{init_cli_logging, init_watch_logging};

#[derive(Parser)]
#[command(name = "everywhere")]
#[command(about = "Index workspace files and symbols, and keep the index current")]
#[command(after_help = "\
QUICK START:
  everywhere config init          # Initialize project config
  everywhere index                # Build the index
  everywhere list greet           # Find items by name

COMMON WORKFLOWS:
  everywhere watch --foreground   # Re-index on file changes
  everywhere list --kind function --json")]
struct Cli {
  /// Project root (default: current directory)
  #[arg(short, long, global = true)]
  path: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
  /// Show the effective configuration
  #[command(long_about = "Show the current effective configuration.\n\n\
    Displays which config file is being used and its contents as TOML.")]
  Show,

  /// Create .everywhere/config.toml with defaults
  Init,
}

#[derive(Subcommand)]
enum Commands {
  /// Rebuild the index for the project
  Index {
    /// Show index statistics
    #[arg(long)]
    stats: bool,
  },
  /// Index the project, then keep the index current as files change
  #[command(after_help = "\
NOTE:
  Without --foreground logs go to a rolling file in the data directory
  ($EVERYWHERE_DATA_DIR, $XDG_DATA_HOME/everywhere or the platform default).")]
  Watch {
    /// Log to the console instead of the log file
    #[arg(long)]
    foreground: bool,
  },
  /// List indexed items
  List {
    /// Only items whose name contains this text
    query: Option<String>,
    /// Only items of this kind (file, function, struct, class, ...)
    #[arg(long)]
    kind: Option<String>,
    #[arg(short, long, default_value = "50")]
    limit: usize,
    /// Rebuild the index first
    #[arg(long)]
    refresh: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Inspect or create configuration
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // Log settings come from whatever config applies; errors surface later
  let log_root = cli
    .path
    .clone()
    .or_else(|| std::env::current_dir().ok())
    .unwrap_or_else(|| PathBuf::from("."));
  let log_config = Config::load_for_project(&log_root).log;

  // File logging for background watch, console for everything else
  let _guard = match &cli.command {
    Commands::Watch { foreground } => init_watch_logging(&log_config, *foreground),
    _ => {
      init_cli_logging(&log_config);
      None
    }
  };

  let path = cli.path.as_deref();
  match cli.command {
    Commands::Index { stats } => cmd_index(path, stats).await,
    Commands::Watch { foreground: _ } => cmd_watch(path).await,
    Commands::List {
      query,
      kind,
      limit,
      refresh,
      json,
    } => {
      cmd_list(
        path,
        ListFilter {
          query,
          kind,
          limit,
          json,
          refresh,
        },
      )
      .await
    }
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(path).await,
      ConfigCommand::Init => cmd_config_init(path).await,
    },
  }
}
