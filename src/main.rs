use ezpocket::{
    cli::{Cli, Commands},
    config::Config,
    init_logging,
    session::SessionManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    // Load configuration: file, then environment, then flags
    let (mut config, load_error) = Config::load_or_default(&cli.config_file);
    cli.apply_overrides(&mut config);
    config.validate()?;

    // Initialize logging
    let _guard = init_logging(&config.log_level, &config.log.file_path)?;

    tracing::info!("ezpocket client starting...");
    tracing::debug!("CLI arguments: {:?}", cli);
    if let Some(err) = load_error {
        tracing::warn!("Failed to load config: {:#}, using defaults", err);
    }

    if !config.ui.enable_colors {
        colored::control::set_override(false);
    }

    if let Commands::Config { action } = cli.command() {
        return config.handle_command(&action, &cli.config_file);
    }

    let mut session_manager = SessionManager::new(&cli, config)?;
    session_manager.start().await?;

    tracing::info!("ezpocket client exited");
    Ok(())
}
