//! bioid CLI - batched, cancellable biometric identification

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

use commands::{cmd_config_init, cmd_config_show, cmd_identify, cmd_worker};
use logging::init_logging;

#[derive(Parser)]
#[command(name = "bioid")]
#[command(about = "Batched, cancellable biometric identification worker")]
#[command(after_help = "\
QUICK START:
  bioid config init                          # Write .bioid/bioid.toml
  bioid identify --db db.hex --feature ab12  # Search a template file
  bioid worker                               # Serve JSON commands on stdin/stdout

PROTOCOL (bioid worker):
  in:  {\"cmd\":\"do\",\"work\":{...},\"start\":0,\"end\":99}
  in:  {\"cmd\":\"stop\"} | {\"cmd\":\"shutdown\"}
  out: {\"cmd\":\"done\",\"work\":{...},\"matched\":5,\"worker\":\"...\",...}")]
struct Cli {
  /// Config file (default: .bioid/bioid.toml, then user config)
  #[arg(long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

/// Subcommands for `bioid config`
#[derive(Subcommand)]
pub enum ConfigCommand {
  /// Show current effective configuration
  #[command(long_about = "Show the current effective configuration.\n\n\
    Displays which config file is being used and its contents as TOML.")]
  Show,

  /// Initialize project config file (.bioid/bioid.toml)
  Init {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Serve one worker over line-delimited JSON on stdin/stdout
  Worker {
    /// Worker id echoed in every report (default: generated)
    #[arg(long)]
    id: Option<String>,
    /// Preferred batch size of the reference engine
    #[arg(long)]
    batch_size: Option<usize>,
  },
  /// Identify a feature against a template database file
  Identify {
    /// Database file: one hex-encoded template per line
    #[arg(long, value_name = "FILE")]
    db: PathBuf,
    /// Hex-encoded feature to search for
    #[arg(long)]
    feature: String,
    /// Number of workers (default: [pool] workers)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Preferred batch size of the reference engine
    #[arg(long)]
    batch_size: Option<usize>,
  },
  /// Configuration management
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let config = commands::load_config(cli.config.as_deref())?;

  let _guard = init_logging(&config.logging);

  match cli.command {
    Commands::Worker { id, batch_size } => cmd_worker(config, id, batch_size).await,
    Commands::Identify {
      db,
      feature,
      workers,
      batch_size,
    } => cmd_identify(config, &db, &feature, workers, batch_size).await,
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(cli.config.as_deref(), &config),
      ConfigCommand::Init { force } => cmd_config_init(force),
    },
  }
}
