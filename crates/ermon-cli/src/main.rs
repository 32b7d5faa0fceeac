mod commands;
mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ermon_config::ConfigLoader;

#[derive(Parser)]
#[command(name = "ermon", version, about = "Record emergency room wait times")]
struct Cli {
    /// Path to config.yml or config.toml
    #[arg(long, global = true, env = "ERMON_CONFIG", default_value = "config.yml")]
    config: PathBuf,

    /// Log file to append to, or `-` for stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch current wait times and append them to the database (default)
    Fetch {
        /// Location code to fetch; repeat for several. Defaults to the configured list.
        #[arg(long = "location", short = 'l')]
        locations: Vec<String>,
    },
    /// Apply pending schema migrations and exit
    Migrate,
    /// Show applied migrations and the latest reading per location
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new(Some(cli.config.clone()))
        .load()
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let log_file = cli.log_file.clone().unwrap_or_else(|| config.log_file());
    logging::init(&log_file)?;

    match cli.command.unwrap_or(Command::Fetch {
        locations: Vec::new(),
    }) {
        Command::Fetch { locations } => commands::fetch(&config, locations).await,
        Command::Migrate => commands::migrate(&config).map(|_| ()),
        Command::Status => commands::status(&config),
    }
}
