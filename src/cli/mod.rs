//! CLI module for reelgen
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config_initialization::CliOverrides;

pub mod args;
pub mod commands;

/// reelgen - Render layered video compositions
///
/// Compiles a declarative composition (background, text and overlay layers,
/// audio) into an ffmpeg filter graph, renders it and publishes the result to
/// object storage.
#[derive(Parser, Debug)]
#[command(name = "reelgen")]
#[command(about = "reelgen - Render layered video compositions and publish them")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (default: reelgen.toml, then config/reelgen.toml)
    #[arg(long, env = "REELGEN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level or filter directive
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Flags that take precedence over file and environment configuration
    pub fn overrides(&self) -> CliOverrides {
        let timeout_secs = match &self.command {
            Commands::Render(args) => args.timeout,
            _ => None,
        };
        CliOverrides {
            log_level: self.log_level.clone(),
            json_logs: self.json_logs,
            timeout_secs,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a composition and print the public URL of the result
    Render(args::RenderArgs),
    /// Print the engine command line for a composition without rendering
    Compile(args::CompileArgs),
    /// Check that the encoding engine is installed
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_timeout_becomes_override() {
        let cli = Cli::parse_from([
            "reelgen",
            "--log-level",
            "debug",
            "render",
            "--composition",
            "birthday.json",
            "--timeout",
            "30",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.timeout_secs, Some(30));
        assert_eq!(overrides.log_level.as_deref(), Some("debug"));
        assert!(!overrides.json_logs);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["reelgen", "check", "--json-logs"]);
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Check));
    }
}
