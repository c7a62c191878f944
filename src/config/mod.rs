//! Configuration management module
//!
//! Handles loading, validation, and management of application configuration.
//! Precedence: TOML file, then `EZPOCKET_*` environment variables, then CLI flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::protocol::client::endpoint_for;
use crate::protocol::{DEFAULT_PROJETO, DEFAULT_START_MODULE, DEFAULT_USERNAME};
use crate::session::{DisplayMode, ReconnectPolicy};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Logging level
    pub log_level: String,

    /// How much pipeline detail reaches the chat
    pub display_mode: DisplayMode,

    /// Orchestrator connection settings
    pub server: ServerConfig,

    /// Who requests are sent as
    pub identity: IdentityConfig,

    /// Session behaviour on reconnects and terminal events
    pub session: SessionConfig,

    /// File-based logging configuration
    pub log: LogConfig,

    /// Console-specific configuration
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Orchestrator base URL (http, https, ws or wss)
    pub url: String,

    /// Connect timeout per attempt in seconds
    pub timeout_seconds: u64,

    /// Initial reconnect interval in milliseconds
    pub reconnect_interval_ms: u64,

    /// Maximum connection attempts before giving up
    pub max_reconnect_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub username: String,
    pub projeto: String,

    /// Pipeline module every new job starts at
    pub start_module: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `keep` leaves an in-flight job alone after a reconnect, `abandon` drops it
    pub reconnect_policy: ReconnectPolicy,

    /// Clear the pending interaction when a job completes or fails
    pub clear_pending_on_terminal: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Absolute or relative path to the log file
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UiConfig {
    /// Enable colored console output
    pub enable_colors: bool,

    /// Require `yes` before /flush and /cleanup
    pub confirm_destructive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            display_mode: DisplayMode::default(),
            server: ServerConfig::default(),
            identity: IdentityConfig::default(),
            session: SessionConfig::default(),
            log: LogConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5008".to_string(),
            timeout_seconds: 10,
            reconnect_interval_ms: 1000,
            max_reconnect_attempts: 10,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            projeto: DEFAULT_PROJETO.to_string(),
            start_module: DEFAULT_START_MODULE.to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: "logs/ezpocket.log".to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enable_colors: true,
            confirm_destructive: true,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Apply `EZPOCKET_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup; unparsable values are ignored
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(level) = text("EZPOCKET_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(mode) = text("EZPOCKET_DISPLAY_MODE").and_then(|v| v.parse().ok()) {
            self.display_mode = mode;
        }

        // Server
        if let Some(url) = text("EZPOCKET_SERVER_URL") {
            self.server.url = url;
        }
        if let Some(value) = text("EZPOCKET_SERVER_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            self.server.timeout_seconds = value;
        }
        if let Some(value) =
            text("EZPOCKET_SERVER_RECONNECT_INTERVAL_MS").and_then(|v| v.parse().ok())
        {
            self.server.reconnect_interval_ms = value;
        }
        if let Some(value) =
            text("EZPOCKET_SERVER_MAX_RECONNECT_ATTEMPTS").and_then(|v| v.parse().ok())
        {
            self.server.max_reconnect_attempts = value;
        }

        // Identity
        if let Some(username) = text("EZPOCKET_USERNAME") {
            self.identity.username = username;
        }
        if let Some(projeto) = text("EZPOCKET_PROJETO") {
            self.identity.projeto = projeto;
        }
        if let Some(module) = text("EZPOCKET_START_MODULE") {
            self.identity.start_module = module;
        }

        // Session
        if let Some(policy) = text("EZPOCKET_RECONNECT_POLICY") {
            match policy.trim().to_ascii_lowercase().as_str() {
                "keep" => self.session.reconnect_policy = ReconnectPolicy::Keep,
                "abandon" => self.session.reconnect_policy = ReconnectPolicy::Abandon,
                _ => {}
            }
        }
        if let Some(value) =
            text("EZPOCKET_CLEAR_PENDING_ON_TERMINAL").and_then(|v| v.parse().ok())
        {
            self.session.clear_pending_on_terminal = value;
        }

        if let Some(file_path) = text("EZPOCKET_LOG_FILE_PATH") {
            self.log.file_path = file_path;
        }

        // UI
        if let Some(value) = text("EZPOCKET_UI_ENABLE_COLORS").and_then(|v| v.parse().ok()) {
            self.ui.enable_colors = value;
        }
        if let Some(value) = text("EZPOCKET_UI_CONFIRM_DESTRUCTIVE").and_then(|v| v.parse().ok()) {
            self.ui.confirm_destructive = value;
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Load configuration with fallback to environment-adjusted defaults
    ///
    /// The load error is returned alongside so the caller can log it once
    /// logging is up.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_file(path) {
            Ok(config) => (config, None),
            Err(err) => {
                let mut config = Self::default();
                config.apply_env_overrides();
                (config, Some(err))
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level '{}', expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            );
        }

        if self.server.url.trim().is_empty() {
            anyhow::bail!("server.url must not be empty");
        }

        endpoint_for(&self.server.url)
            .map_err(|e| anyhow::anyhow!("server.url is not usable: {}", e))?;

        if self.server.timeout_seconds == 0 {
            anyhow::bail!("Timeout must be greater than 0");
        }

        if self.server.max_reconnect_attempts == 0 {
            anyhow::bail!("server.max_reconnect_attempts must be greater than 0");
        }

        if self.identity.start_module.trim().is_empty() {
            anyhow::bail!("identity.start_module must not be empty");
        }

        if self.log.file_path.trim().is_empty() {
            anyhow::bail!("Log file path must not be empty");
        }

        Ok(())
    }

    /// Display formatted configuration
    pub fn display(&self) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        println!("Current configuration:");
        println!("{}", content);
        Ok(())
    }

    /// Display configuration summary
    pub fn display_summary(&self) -> Result<()> {
        println!("Server: {}", self.server.url);
        println!("Display mode: {}", self.display_mode);
        println!(
            "Identity: {} / {} (start module {})",
            self.identity.username, self.identity.projeto, self.identity.start_module
        );
        println!("Log file: {}", self.log.file_path);
        Ok(())
    }

    /// Display configuration management help
    pub fn display_help() -> Result<()> {
        println!("Configuration management commands:");
        println!("  ezpocket config show    - Show current configuration");
        println!("  ezpocket config reset   - Write the default configuration file");
        Ok(())
    }

    /// Handle configuration command
    pub fn handle_command<P: AsRef<Path>>(
        &self,
        action: &Option<crate::cli::ConfigAction>,
        path: P,
    ) -> Result<()> {
        match action {
            Some(crate::cli::ConfigAction::Show) => self.display()?,
            Some(crate::cli::ConfigAction::Reset) => {
                let default_config = Config::default();
                default_config.save_to_file(&path)?;
                println!(
                    "Default configuration written to {}",
                    path.as_ref().display()
                );
                default_config.display()?;
            }
            None => Config::display_help()?,
        }
        Ok(())
    }
}
