use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use xbridge_channel::Duplex;
use xbridge_config::logging::{init_logging, LogLevel};
use xbridge_config::{log_server_info, Config};
use xbridge_server::{DispatchLoop, NullRenderer};

#[derive(Parser)]
#[command(name = "xbridged")]
#[command(version, about = "xbridge render bridge daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the channel regions and serve commands (default)
    Start {
        /// Channel directory, overriding configuration
        #[arg(long, env = "XBRIDGE_CHANNEL_DIR")]
        dir: Option<PathBuf>,
        /// Ring capacity in bytes per direction
        #[arg(long)]
        capacity: Option<usize>,
    },
    /// Print the default configuration as TOML
    Config,
}

fn main() -> Result<()> {
    init_logging(LogLevel::Info);

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Start {
        dir: None,
        capacity: None,
    }) {
        Commands::Start { dir, capacity } => start(dir, capacity)?,
        Commands::Config => print!("{}", Config::default_toml()),
    }

    Ok(())
}

fn start(dir: Option<PathBuf>, capacity: Option<usize>) -> Result<()> {
    let config = xbridge_config::config().clone();
    let dir = dir.unwrap_or_else(|| config.bridge.channel_dir.clone());
    let capacity = capacity.unwrap_or(config.server.channel_capacity);

    log_server_info!(
        "creating channel regions",
        dir = dir.display().to_string(),
        capacity = capacity,
    );
    let channels = Duplex::create(&dir, capacity)?;

    DispatchLoop::new(NullRenderer::default(), channels).run()?;
    Ok(())
}
