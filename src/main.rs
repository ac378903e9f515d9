//! reelgen CLI
//!
//! Renders layered video compositions with ffmpeg and publishes the results.
//!
//! # Usage
//!
//! ```bash
//! reelgen render --composition birthday.json --profile preview
//! reelgen compile --composition birthday.yaml --json
//! reelgen check
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use reelgen_cli::adapters::tracing_log;
use reelgen_cli::app::DefaultAppContainer;
use reelgen_cli::cli::{commands, Cli, Commands};
use reelgen_cli::config_initialization::initialize_configuration;

/// Main entry point for the reelgen CLI application
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = initialize_configuration(cli.config.as_deref(), &cli.overrides())?;
    let config = loaded.config;
    tracing_log::init(&config.log_options())?;

    match &loaded.source {
        Some(path) => debug!("Loaded configuration from {}", path.display()),
        None => debug!("No configuration file found, using defaults"),
    }

    let container = DefaultAppContainer::new(&config)?;

    match cli.command {
        Commands::Render(args) => {
            info!("Executing render command");
            commands::render(&container, args, config.poll_interval()).await?;
        }
        Commands::Compile(args) => {
            info!("Executing compile command");
            commands::compile(&container, &config.engine.binary, args)?;
        }
        Commands::Check => {
            info!("Executing check command");
            commands::check(&container).await?;
        }
    }

    Ok(())
}
