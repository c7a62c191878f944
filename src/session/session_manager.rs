//! Session Manager for interactive terminal session lifecycle management
//!
//! Owns the [`Session`] and is the only task that touches it. Inbound channel
//! events and typed lines are processed one at a time in a single select loop.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cli::Cli;
use crate::config::Config;
use crate::protocol::{
    ChannelError, ClientRequest, ConnectionStatus, InboundEvent, ReconnectSettings,
    SocketIoClient,
};
use crate::ui::{ConsoleSink, LineKind, OutputSink};

use super::action_channel::{ActionChannel, SessionEvent};
use super::command_router::{CommandOutcome, CommandRouter};
use super::controller::{SessionController, Submission, set_input};
use super::dispatcher::{DispatchOptions, EventDispatcher};
use super::display::DisplayPolicy;
use super::state::{Session, SessionIdentity};

/// Session state tracking
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Starting,
    Running,
    ShuttingDown,
    Terminated,
}

/// Session statistics for monitoring
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    pub lines_submitted: u64,
    pub requests_sent: u64,
    pub events_received: u64,
    pub errors_count: u64,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            lines_submitted: 0,
            requests_sent: 0,
            events_received: 0,
            errors_count: 0,
        }
    }
}

impl SessionStats {
    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

/// Main session manager for the interactive terminal
pub struct SessionManager {
    /// Application configuration
    config: Config,
    /// CLI arguments
    cli: Cli,
    state: SessionState,
    stats: SessionStats,
    session: Session,
    controller: SessionController,
    dispatcher: EventDispatcher,
    command_router: CommandRouter,
    /// Typed lines and shutdown requests
    action_channel: ActionChannel,
    client: Option<SocketIoClient>,
    inbound_rx: Option<mpsc::Receiver<InboundEvent>>,
    sink: Box<dyn OutputSink + Send>,
}

impl SessionManager {
    /// Create a new SessionManager writing to the console
    pub fn new(cli: &Cli, config: Config) -> Result<Self> {
        let sink = ConsoleSink::new();
        Self::with_sink(cli, config, Box::new(sink))
    }

    /// Create a new SessionManager with a custom output sink
    pub fn with_sink(cli: &Cli, config: Config, sink: Box<dyn OutputSink + Send>) -> Result<Self> {
        info!("Creating new SessionManager");

        let policy = DisplayPolicy::new(config.display_mode);
        let identity = SessionIdentity::new(&config.identity.username, &config.identity.projeto);
        let options = DispatchOptions {
            reconnect_policy: config.session.reconnect_policy,
            clear_pending_on_terminal: config.session.clear_pending_on_terminal,
        };

        Ok(Self {
            controller: SessionController::new(policy, config.identity.start_module.clone()),
            dispatcher: EventDispatcher::new(policy, options),
            command_router: CommandRouter::new(policy, config.ui.confirm_destructive),
            action_channel: ActionChannel::new(),
            session: Session::new(identity),
            state: SessionState::Starting,
            stats: SessionStats::default(),
            client: None,
            inbound_rx: None,
            cli: cli.clone(),
            config,
            sink,
        })
    }

    /// Start the session using the appropriate execution mode
    pub async fn start(&mut self) -> Result<()> {
        if self.cli.is_dry_run_mode() {
            return self.run_dry_run_mode();
        }

        crate::ui::cli::display_welcome_page(&self.config);
        self.initialize()?;
        self.run().await
    }

    fn run_dry_run_mode(&mut self) -> Result<()> {
        info!("Running in dry-run mode - showing welcome page and configuration");

        self.state = SessionState::Running;
        crate::ui::cli::display_welcome_page(&self.config);

        println!("Dry-run mode configuration:");
        println!("Config file: {}", self.cli.config_file);
        println!("Log level: {}", self.config.log_level);
        self.config.display_summary()?;

        self.state = SessionState::Terminated;
        info!("Dry-run mode completed");
        Ok(())
    }

    /// Open the channel to the orchestrator
    pub fn initialize(&mut self) -> Result<()> {
        info!("Initializing interactive session");

        let settings = ReconnectSettings::from(&self.config.server);
        let (mut client, inbound_rx) = SocketIoClient::new(&self.config.server.url, settings)
            .map_err(|e| anyhow::anyhow!("Failed to create channel: {}", e))?;
        client.start();

        self.sink.set_status(Some(&format!(
            "Connecting to {}...",
            self.config.server.url
        )));
        self.client = Some(client);
        self.inbound_rx = Some(inbound_rx);
        self.state = SessionState::Running;

        info!("Session initialized successfully");
        Ok(())
    }

    /// Run the main session loop
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting interactive session loop");

        self.spawn_input_reader();
        self.spawn_signal_handler();

        while self.state != SessionState::Terminated {
            tokio::select! {
                inbound = next_inbound(&mut self.inbound_rx) => {
                    match inbound {
                        Some(event) => self.handle_inbound(event),
                        None => {
                            warn!("Inbound channel closed");
                            self.inbound_rx = None;
                        }
                    }
                }

                event = self.action_channel.next_event() => {
                    match event {
                        Some(event) => self.handle_event(event).await?,
                        None => self.shutdown().await?,
                    }
                }
            }
        }

        info!("Session loop terminated");
        Ok(())
    }

    /// Read stdin on a plain thread so a blocked read never holds the runtime open
    fn spawn_input_reader(&self) {
        let event_tx = self.action_channel.event_tx();

        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let event = match line {
                    Ok(text) => SessionEvent::UserLine { text },
                    Err(e) => SessionEvent::Error {
                        message: format!("Failed to read input: {}", e),
                    },
                };
                if event_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = event_tx.send(SessionEvent::InputClosed);
        });
    }

    fn spawn_signal_handler(&self) {
        let channel = self.action_channel.clone();

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Ctrl+C received");
            if let Err(e) = channel.request_shutdown() {
                debug!("Shutdown request dropped: {}", e);
            }
        });
    }

    /// Feed one inbound channel event through the dispatcher
    pub fn handle_inbound(&mut self, event: InboundEvent) {
        self.stats.events_received += 1;
        if matches!(event, InboundEvent::Rejected(_)) {
            self.stats.errors_count += 1;
        }
        let gave_up = matches!(event, InboundEvent::Disconnect { .. });

        self.dispatcher
            .dispatch(&mut self.session, event, self.sink.as_mut());

        if gave_up {
            let status = self.client.as_ref().map(|c| c.status());
            if let Some(ConnectionStatus::Error(reason)) = status {
                self.sink.set_status(None);
                self.sink.append(
                    LineKind::Error,
                    &format!(
                        "❌ Could not reach {}: {}. Type /quit to exit.",
                        self.config.server.url, reason
                    ),
                );
            }
        }
    }

    /// Handle session events from input sources
    async fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::UserLine { text } => self.handle_line(&text).await?,
            SessionEvent::InputClosed => {
                info!("Input closed");
                self.shutdown().await?;
            }
            SessionEvent::ShutdownRequested => self.shutdown().await?,
            SessionEvent::Error { message } => {
                error!("{}", message);
                self.stats.errors_count += 1;
                self.sink.append(LineKind::Error, &format!("❌ {}", message));
            }
        }
        Ok(())
    }

    /// Route a typed line to the command router or the session controller
    pub async fn handle_line(&mut self, text: &str) -> Result<()> {
        self.stats.lines_submitted += 1;

        match self.command_router.parse_interactive_command(text) {
            Ok(Some(command)) => {
                let outcome = self.command_router.execute(
                    command,
                    &mut self.session,
                    &self.stats,
                    self.sink.as_mut(),
                );
                match outcome {
                    CommandOutcome::Handled => {}
                    CommandOutcome::Send(request) => {
                        self.send(request).await;
                    }
                    CommandOutcome::Quit => self.shutdown().await?,
                }
            }
            Ok(None) => {
                let pending = self.session.pending();
                let submission = self
                    .controller
                    .submit(&mut self.session, text, self.sink.as_mut());
                debug!("Submission result: {:?}", submission);
                if let Submission::Send(request) = submission {
                    if !self.send(request).await {
                        // The server never saw the answer, so it is still waiting for it
                        self.session.enter(pending);
                    }
                }
            }
            Err(e) => {
                self.sink.append(LineKind::Error, &format!("❌ {}", e));
            }
        }

        Ok(())
    }

    /// Emit a request; on failure report it and re-enable input
    async fn send(&mut self, request: ClientRequest) -> bool {
        let result = match &self.client {
            Some(client) => client.emit(&request).await,
            None => Err(ChannelError::NotConnected),
        };

        match result {
            Ok(()) => {
                self.stats.requests_sent += 1;
                info!("Sent {}", request.event_name());
                true
            }
            Err(e) => {
                error!("Failed to send {}: {}", request.event_name(), e);
                self.stats.errors_count += 1;
                self.sink.set_status(None);
                self.sink.append(
                    LineKind::Error,
                    &format!("❌ Failed to send {}: {}", request.event_name(), e),
                );
                set_input(&mut self.session, self.sink.as_mut(), true);
                false
            }
        }
    }

    /// Graceful shutdown
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state == SessionState::Terminated {
            return Ok(());
        }
        info!("Initiating graceful shutdown");

        self.state = SessionState::ShuttingDown;
        self.sink.set_status(None);
        self.sink.set_input_enabled(false);

        if let Some(mut client) = self.client.take() {
            if let Err(e) = client.shutdown().await {
                error!("Failed to close channel: {}", e);
            }
        }
        self.inbound_rx = None;

        self.state = SessionState::Terminated;
        info!(
            "Shutdown completed after {}s ({} requests, {} events)",
            self.stats.uptime().num_seconds(),
            self.stats.requests_sent,
            self.stats.events_received
        );

        Ok(())
    }

    /// Get session statistics
    pub fn get_stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Get session state
    pub fn get_state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Request shutdown
    pub fn request_shutdown(&self) -> Result<()> {
        self.action_channel.request_shutdown()
    }
}

async fn next_inbound(rx: &mut Option<mpsc::Receiver<InboundEvent>>) -> Option<InboundEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if self.state != SessionState::Terminated && self.state != SessionState::Starting {
            warn!("SessionManager dropped without proper shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        FeedbackRequest, JobStarted, NeedInput, PlanProposal, ServerEvent, SuggestionRequest,
    };
    use crate::session::state::PendingInteraction;
    use crate::ui::MemorySink;
    use clap::Parser;

    fn manager() -> SessionManager {
        let cli = Cli::try_parse_from(["ezpocket"]).unwrap();
        SessionManager::with_sink(&cli, Config::default(), Box::new(MemorySink::new())).unwrap()
    }

    #[tokio::test]
    async fn test_line_without_connection_keeps_state() {
        let mut manager = manager();
        manager.handle_line("quantas vendas?").await.unwrap();

        assert!(manager.session().job().is_none());
        assert_eq!(manager.get_stats().lines_submitted, 1);
        assert_eq!(manager.get_stats().requests_sent, 0);
    }

    #[tokio::test]
    async fn test_send_failure_reenables_input() {
        let mut manager = manager();
        manager.handle_inbound(InboundEvent::Connect);
        assert!(manager.session().input_enabled());

        // Connected according to the session, but there is no live client
        manager.handle_line("quantas vendas?").await.unwrap();
        assert!(manager.session().input_enabled());
        assert_eq!(manager.get_stats().errors_count, 1);
    }

    #[tokio::test]
    async fn test_failed_confirmation_keeps_prompt() {
        let mut manager = manager();
        manager.handle_inbound(InboundEvent::Connect);
        manager.handle_inbound(InboundEvent::Server(ServerEvent::NeedInput(
            NeedInput::PlanConfirmation(PlanProposal {
                plan: "Somar vendas".to_string(),
                plan_steps: Vec::new(),
            }),
        )));

        manager.handle_line("s").await.unwrap();
        assert_eq!(
            manager.session().pending(),
            PendingInteraction::AwaitingPlanConfirmation
        );
        assert!(manager.session().input_enabled());

        // Retyping the answer is still a confirmation, not a new question
        manager.handle_line("s").await.unwrap();
        assert_eq!(
            manager.session().pending(),
            PendingInteraction::AwaitingPlanConfirmation
        );
        assert!(manager.session().job().is_none());
        assert_eq!(manager.get_stats().errors_count, 2);
        assert_eq!(manager.get_stats().requests_sent, 0);
    }

    #[tokio::test]
    async fn test_failed_rating_keeps_prompt() {
        let mut manager = manager();
        manager.handle_inbound(InboundEvent::Connect);
        manager.handle_inbound(InboundEvent::Server(ServerEvent::NeedInput(
            NeedInput::UserFeedback(FeedbackRequest {
                pergunta: "vendas?".to_string(),
                response_text: "Foram 42 vendas".to_string(),
            }),
        )));

        manager.handle_line("4").await.unwrap();
        assert_eq!(
            manager.session().pending(),
            PendingInteraction::AwaitingFeedbackRating
        );
        assert_eq!(manager.get_stats().errors_count, 1);
    }

    #[tokio::test]
    async fn test_inbound_events_update_session() {
        let mut manager = manager();
        manager.handle_inbound(InboundEvent::Connect);
        manager.handle_inbound(InboundEvent::Server(ServerEvent::JobStarted(JobStarted {
            job_id: "j1".to_string(),
            module: "intent_validator".to_string(),
            expected_flow: "intent_validator -> plan_builder".to_string(),
            pergunta: None,
        })));
        manager.handle_inbound(InboundEvent::Server(ServerEvent::NeedInput(
            NeedInput::UserProposedPlan(SuggestionRequest {
                pergunta: "vendas?".to_string(),
                rejected_plan: String::new(),
            }),
        )));

        assert_eq!(manager.session().current_job_id().as_deref(), Some("j1"));
        assert_eq!(
            manager.session().pending(),
            PendingInteraction::AwaitingUserSuggestion
        );
        assert_eq!(manager.get_stats().events_received, 3);
    }

    #[tokio::test]
    async fn test_commands_are_not_classified() {
        let mut manager = manager();
        manager.handle_inbound(InboundEvent::Connect);
        manager.handle_line("/user ana").await.unwrap();
        manager.handle_line("/status").await.unwrap();

        assert_eq!(manager.session().identity().username(), "ana");
        assert!(manager.session().job().is_none());
        assert_eq!(manager.get_stats().errors_count, 0);
    }

    #[tokio::test]
    async fn test_quit_terminates() {
        let mut manager = manager();
        manager.handle_line("/quit").await.unwrap();
        assert_eq!(manager.get_state(), &SessionState::Terminated);
    }
}
