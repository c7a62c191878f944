//! Command Router for local slash commands
//!
//! Lines that name a known `/command` are handled here and never reach the
//! session controller.

use anyhow::Result;
use tracing::{debug, info};

use super::display::DisplayPolicy;
use super::session_manager::SessionStats;
use super::state::Session;
use crate::protocol::ClientRequest;
use crate::ui::{LineKind, OutputSink};

/// Interactive commands for the terminal session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractiveCommand {
    /// Flush cached interaction data for the current user/project
    Flush { confirmed: bool },
    /// Remove completed jobs for the current user/project
    Cleanup { confirmed: bool },
    /// Show connection, job and session statistics
    Status,
    /// Change the username sent with requests
    User { name: String },
    /// Change the project sent with requests
    Project { name: String },
    Help,
    /// Quit the application
    Quit,
}

/// Result of executing a command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Handled,
    Send(ClientRequest),
    Quit,
}

/// Command router for processing interactive commands
#[derive(Debug, Clone)]
pub struct CommandRouter {
    policy: DisplayPolicy,
    /// Ask for an explicit `yes` before maintenance requests
    confirm_destructive: bool,
}

impl CommandRouter {
    /// Create a new CommandRouter
    pub fn new(policy: DisplayPolicy, confirm_destructive: bool) -> Self {
        Self {
            policy,
            confirm_destructive,
        }
    }

    /// Parse a slash command; `Ok(None)` means the line is not a command
    pub fn parse_interactive_command(&self, input: &str) -> Result<Option<InteractiveCommand>> {
        let input = input.trim();
        if !input.starts_with('/') {
            return Ok(None);
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let confirmed = matches!(parts.get(1), Some(arg) if arg.eq_ignore_ascii_case("yes"));

        match parts[0] {
            "/flush" => Ok(Some(InteractiveCommand::Flush { confirmed })),
            "/cleanup" => Ok(Some(InteractiveCommand::Cleanup { confirmed })),
            "/status" => Ok(Some(InteractiveCommand::Status)),
            "/user" => {
                if parts.len() < 2 {
                    return Err(anyhow::anyhow!("Usage: /user <name>"));
                }
                Ok(Some(InteractiveCommand::User {
                    name: parts[1..].join(" "),
                }))
            }
            "/project" | "/projeto" => {
                if parts.len() < 2 {
                    return Err(anyhow::anyhow!("Usage: /project <name>"));
                }
                Ok(Some(InteractiveCommand::Project {
                    name: parts[1..].join(" "),
                }))
            }
            "/help" | "/?" => Ok(Some(InteractiveCommand::Help)),
            "/quit" | "/exit" | "/q" => Ok(Some(InteractiveCommand::Quit)),
            _ => Err(anyhow::anyhow!(
                "Unknown command: {}. Type /help for available commands.",
                parts[0]
            )),
        }
    }

    /// Execute a parsed command against the session
    pub fn execute(
        &self,
        command: InteractiveCommand,
        session: &mut Session,
        stats: &SessionStats,
        sink: &mut dyn OutputSink,
    ) -> CommandOutcome {
        debug!("Executing command: {:?}", command);

        match command {
            InteractiveCommand::Flush { confirmed } => {
                let what = "delete cached interaction data";
                if !self.is_confirmed(confirmed, "/flush", what, session, sink) {
                    return CommandOutcome::Handled;
                }
                if !Self::require_connection(session, sink) {
                    return CommandOutcome::Handled;
                }
                sink.append(LineKind::System, "🗑️ Requesting cache cleanup...");
                CommandOutcome::Send(ClientRequest::FlushRedis(session.identity().scope()))
            }
            InteractiveCommand::Cleanup { confirmed } => {
                let what = "remove completed jobs";
                if !self.is_confirmed(confirmed, "/cleanup", what, session, sink) {
                    return CommandOutcome::Handled;
                }
                if !Self::require_connection(session, sink) {
                    return CommandOutcome::Handled;
                }
                sink.append(LineKind::System, "🧹 Cleaning job history...");
                CommandOutcome::Send(ClientRequest::CleanupCompletedJobs(
                    session.identity().scope(),
                ))
            }
            InteractiveCommand::Status => {
                for line in self.status_lines(session, stats) {
                    sink.append(LineKind::System, &line);
                }
                CommandOutcome::Handled
            }
            InteractiveCommand::User { name } => {
                session.identity_mut().set_username(&name);
                info!("Username set to {}", session.identity().username());
                sink.append(
                    LineKind::System,
                    &format!("User set to {}", session.identity().username()),
                );
                CommandOutcome::Handled
            }
            InteractiveCommand::Project { name } => {
                session.identity_mut().set_projeto(&name);
                info!("Project set to {}", session.identity().projeto());
                sink.append(
                    LineKind::System,
                    &format!("Project set to {}", session.identity().projeto()),
                );
                CommandOutcome::Handled
            }
            InteractiveCommand::Help => {
                sink.append(LineKind::System, &Self::help_messages().join("\n"));
                CommandOutcome::Handled
            }
            InteractiveCommand::Quit => CommandOutcome::Quit,
        }
    }

    fn is_confirmed(
        &self,
        confirmed: bool,
        command: &str,
        action: &str,
        session: &Session,
        sink: &mut dyn OutputSink,
    ) -> bool {
        if confirmed || !self.confirm_destructive {
            return true;
        }
        let identity = session.identity();
        sink.append(
            LineKind::System,
            &format!(
                "This will {} for user {} and project {}. Type `{} yes` to confirm.",
                action,
                identity.username(),
                identity.projeto(),
                command
            ),
        );
        false
    }

    fn require_connection(session: &Session, sink: &mut dyn OutputSink) -> bool {
        if !session.is_connected() {
            sink.append(LineKind::Error, "❌ Not connected to the server");
            return false;
        }
        true
    }

    fn status_lines(&self, session: &Session, stats: &SessionStats) -> Vec<String> {
        let identity = session.identity();
        let mut lines = vec![
            format!(
                "Connection: {}",
                if session.is_connected() {
                    "connected"
                } else {
                    "disconnected"
                }
            ),
            format!("User: {} / project: {}", identity.username(), identity.projeto()),
            format!("Display mode: {}", self.policy.mode()),
        ];

        match session.job() {
            Some(job) => lines.push(format!(
                "Job: {} ({}, module: {})",
                job.short_id().unwrap_or("-"),
                job.status,
                job.module.as_deref().unwrap_or("-")
            )),
            None => lines.push("Job: none".to_string()),
        }

        lines.push(format!("Pending: {}", session.pending().describe()));
        lines.push(format!(
            "Input: {}",
            if session.input_enabled() {
                "ready"
            } else {
                "waiting for the server"
            }
        ));
        lines.push(format!(
            "Uptime: {}s, lines: {}, requests: {}, events: {}, errors: {}",
            stats.uptime().num_seconds(),
            stats.lines_submitted,
            stats.requests_sent,
            stats.events_received,
            stats.errors_count
        ));
        lines
    }

    /// Interactive command help
    pub fn help_messages() -> Vec<String> {
        vec![
            "Commands:".to_string(),
            "  /flush [yes]          - Flush cached data for the current user/project".to_string(),
            "  /cleanup [yes]        - Remove completed jobs for the current user/project".to_string(),
            "  /status               - Show connection, job and session statistics".to_string(),
            "  /user <name>          - Set the username sent with requests".to_string(),
            "  /project <name>       - Set the project sent with requests".to_string(),
            "  /help                 - Show this help".to_string(),
            "  /quit                 - Exit the application".to_string(),
            "Anything else is sent as a question or as the answer to the current prompt.".to_string(),
        ]
    }
}
