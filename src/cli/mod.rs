//! Command Line Interface module
//!
//! Implements the CLI commands and argument parsing for ezpocket.

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::session::DisplayMode;

#[derive(Parser, Debug, Clone)]
#[command(name = "ezpocket")]
#[command(about = "Interactive terminal client for the ezpocket job orchestrator")]
#[command(
    long_about = "Ask questions, approve plans and rate answers produced by the ezpocket pipeline over a persistent Socket.IO channel"
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    #[arg(long, default_value = "config.toml")]
    pub config_file: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Dry-run mode: show welcome page and configuration without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Display mode for pipeline output
    #[arg(long, value_enum)]
    pub mode: Option<DisplayMode>,

    /// Orchestrator URL, e.g. http://localhost:5008
    #[arg(long)]
    pub url: Option<String>,

    /// Username sent with every request
    #[arg(long)]
    pub username: Option<String>,

    /// Project sent with every request
    #[arg(long)]
    pub projeto: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start interactive terminal session
    #[command(hide = true)]
    Interactive,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Interactive
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default configuration to the config file
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the actual command, using default if none provided
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }

    /// Check if we're running in interactive mode
    pub fn is_interactive_mode(&self) -> bool {
        matches!(self.command(), Commands::Interactive)
    }

    /// Adjust log level based on verbose flag, falling back to the configured level
    pub fn effective_log_level(&self, configured: &str) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| configured.to_string())
        }
    }

    /// Check if we're running in dry-run mode
    pub fn is_dry_run_mode(&self) -> bool {
        self.dry_run
    }

    /// Apply flag overrides on top of file and environment configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        config.log_level = self.effective_log_level(&config.log_level);
        if let Some(mode) = self.mode {
            config.display_mode = mode;
        }
        if let Some(url) = &self.url {
            config.server.url = url.clone();
        }
        if let Some(username) = &self.username {
            config.identity.username = username.clone();
        }
        if let Some(projeto) = &self.projeto {
            config.identity.projeto = projeto.clone();
        }
    }
}
