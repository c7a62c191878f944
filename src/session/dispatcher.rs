//! Event dispatcher
//!
//! Turns each inbound channel event into a session update plus output for
//! the sink, filtered by the display policy.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::controller::set_input;
use super::display::{DisplayPolicy, ModuleDisposition, module_emoji, module_label};
use super::state::{PendingInteraction, Session};
use crate::protocol::{
    CleanupReport, FlushReport, InboundEvent, InputReceived, JobCompleted, JobStarted, JobStatus,
    ModuleUpdate, NeedInput, ServerError, ServerEvent, StatusUpdate,
};
use crate::ui::{LineKind, OutputSink};

/// What a reconnect does to a job that was in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectPolicy {
    /// Leave job and pending interaction as they were
    #[default]
    Keep,
    /// Discard them and tell the user
    Abandon,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    pub reconnect_policy: ReconnectPolicy,
    /// Clear the pending interaction on `job_completed` and `error`
    pub clear_pending_on_terminal: bool,
}

/// Stateless router from inbound events to handlers
#[derive(Debug, Clone, Copy)]
pub struct EventDispatcher {
    policy: DisplayPolicy,
    options: DispatchOptions,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    pub fn new(policy: DisplayPolicy, options: DispatchOptions) -> Self {
        Self { policy, options }
    }

    pub fn dispatch(&self, session: &mut Session, event: InboundEvent, sink: &mut dyn OutputSink) {
        match event {
            InboundEvent::Connect => self.on_connect(session, sink),
            InboundEvent::Disconnect { reason } => self.on_disconnect(session, &reason, sink),
            InboundEvent::Server(event) => {
                debug!("Dispatching {}", event.name());
                self.dispatch_server(session, event, sink);
            }
            InboundEvent::Rejected(e) => {
                warn!("Ignoring server message: {}", e);
                sink.append(LineKind::Error, &format!("⚠️ Ignored server message: {}", e));
            }
        }
    }

    fn dispatch_server(
        &self,
        session: &mut Session,
        event: ServerEvent,
        sink: &mut dyn OutputSink,
    ) {
        match event {
            ServerEvent::Connected(notice) => debug!("Server says: {}", notice.message),
            ServerEvent::JobStarted(started) => self.on_job_started(session, started, sink),
            ServerEvent::ModuleUpdate(update) => self.on_module_update(session, update, sink),
            ServerEvent::StatusUpdate(update) => self.on_status_update(update, sink),
            ServerEvent::NeedInput(request) => self.on_need_input(session, request, sink),
            ServerEvent::InputReceived(ack) => self.on_input_received(ack, sink),
            ServerEvent::JobCompleted(done) => self.on_job_completed(session, done, sink),
            ServerEvent::Error(error) => self.on_error(session, error, sink),
            ServerEvent::RedisFlushed(report) => self.on_redis_flushed(session, report, sink),
            ServerEvent::JobsCleaned(report) => self.on_jobs_cleaned(report, sink),
        }
    }

    fn on_connect(&self, session: &mut Session, sink: &mut dyn OutputSink) {
        let reconnect = session.mark_connected();
        info!("Connected to server (reconnect: {})", reconnect);
        sink.set_connection(true);
        if self.policy.shows_chrome() {
            sink.append(LineKind::System, "✅ Connected to the server");
        }

        let in_flight = session.current_job_id().is_some() || !session.pending().is_none();
        if reconnect && in_flight && self.options.reconnect_policy == ReconnectPolicy::Abandon {
            session.reset();
            sink.set_status(None);
            sink.append(
                LineKind::System,
                "🔄 Reconnected: the previous job was abandoned",
            );
        }

        set_input(session, sink, true);
    }

    fn on_disconnect(&self, session: &mut Session, reason: &str, sink: &mut dyn OutputSink) {
        info!("Disconnected from server: {}", reason);
        session.mark_disconnected();
        sink.set_connection(false);
        set_input(session, sink, false);
        if self.policy.shows_chrome() {
            sink.append(LineKind::System, "🔴 Disconnected from the server");
        }
    }

    fn on_job_started(
        &self,
        session: &mut Session,
        started: JobStarted,
        sink: &mut dyn OutputSink,
    ) {
        session.start_job(started.job_id, started.module);
        if self.policy.shows_technical_detail() {
            if let Some(job) = session.job() {
                let id = job.short_id().unwrap_or_default();
                let module = job.module.as_deref().unwrap_or_default();
                sink.append(LineKind::System, &format!("🚀 Job started: {}...", id));
                sink.append(LineKind::System, &format!("📋 Start module: {}", module));
            }
            sink.append(
                LineKind::System,
                &format!("🔀 Expected flow: {}", started.expected_flow),
            );
        }
        sink.set_status(Some("Processing..."));
    }

    fn on_module_update(
        &self,
        session: &mut Session,
        update: ModuleUpdate,
        sink: &mut dyn OutputSink,
    ) {
        session.note_module(&update.module);
        if update.success == Some(false) {
            debug!("Module {} reported failure", update.module);
        }

        match self.policy.module_disposition(&update.module) {
            ModuleDisposition::Verbatim => {
                let text = format!(
                    "{} {}\n\n{}",
                    module_emoji(&update.module),
                    update.module.to_uppercase(),
                    update.message
                );
                sink.append(LineKind::Assistant, &text);
            }
            ModuleDisposition::StatusOnly(label) => {
                sink.set_status(Some(&format!("{}...", label)));
            }
        }
    }

    fn on_status_update(&self, update: StatusUpdate, sink: &mut dyn OutputSink) {
        if !self.policy.shows_technical_detail() {
            return;
        }
        let status = if update.branches_count > 0 {
            format!("Status: {} ({} branches)", update.status, update.branches_count)
        } else {
            format!("Status: {}", update.status)
        };
        sink.set_status(Some(&status));
    }

    fn on_need_input(&self, session: &mut Session, request: NeedInput, sink: &mut dyn OutputSink) {
        info!("Server needs input: {}", request.kind());
        sink.set_status(None);

        match request {
            NeedInput::PlanConfirmation(proposal) => {
                session.enter(PendingInteraction::AwaitingPlanConfirmation);
                if self.policy.shows_technical_detail() {
                    let steps = proposal
                        .steps()
                        .enumerate()
                        .map(|(i, step)| format!("{}. {}", i + 1, step))
                        .collect::<Vec<_>>()
                        .join("\n");
                    let block = format!(
                        "📋 PLAN CREATED\n\nPlan:\n{}\n\nSteps:\n{}",
                        proposal.plan, steps
                    );
                    sink.append(LineKind::Confirmation, &block);
                }
                sink.append(LineKind::Assistant, "🤔 Proceed with this plan? (s/n)");
            }
            NeedInput::UserFeedback(feedback) => {
                session.enter(PendingInteraction::AwaitingFeedbackRating);
                sink.append(
                    LineKind::Assistant,
                    &format!("💬 ANSWER:\n\n{}", feedback.response_text),
                );
                sink.append(
                    LineKind::Assistant,
                    "⭐ Rating (1-5):\n  1 = Terrible\n  2 = Poor\n  3 = Fair\n  4 = Good\n  5 = Excellent",
                );
                sink.append(LineKind::Assistant, "Type the rating (1-5):");
            }
            NeedInput::UserProposedPlan(request) => {
                session.enter(PendingInteraction::AwaitingUserSuggestion);
                if self.policy.shows_chrome() {
                    sink.append(LineKind::System, "❌ The previous plan was rejected");
                }
                sink.append(
                    LineKind::Assistant,
                    &format!("📝 Original question: {}", request.pergunta),
                );
                if self.policy.shows_technical_detail() && !request.rejected_plan.is_empty() {
                    sink.append(
                        LineKind::System,
                        &format!("Rejected plan: {}", request.rejected_plan),
                    );
                }
                sink.append(LineKind::Assistant, "💬 What should the assistant do instead?");
            }
        }

        set_input(session, sink, true);
    }

    fn on_input_received(&self, ack: InputReceived, sink: &mut dyn OutputSink) {
        if self.policy.shows_chrome() {
            sink.append(LineKind::System, &format!("✓ {}", ack.message));
        }
        if let Some(next) = ack.next_module.as_deref() {
            let name = if self.policy.shows_technical_detail() {
                next.to_string()
            } else {
                module_label(next)
            };
            sink.set_status(Some(&format!("Next module: {}", name)));
        }
    }

    fn on_job_completed(
        &self,
        session: &mut Session,
        done: JobCompleted,
        sink: &mut dyn OutputSink,
    ) {
        info!(
            "Job finished with status {} after {} steps",
            done.status, done.execution_chain_length
        );
        session.complete_job(done.status);

        let emoji = match done.status {
            JobStatus::Completed => "✅",
            JobStatus::PartialFailure => "⚠️",
            JobStatus::Running | JobStatus::Failed => "❌",
        };
        sink.append(
            LineKind::System,
            &format!("{} JOB {}", emoji, done.status.as_str().to_uppercase()),
        );
        sink.append(
            LineKind::System,
            &format!("📊 Total steps: {}", done.execution_chain_length),
        );

        self.finish_turn(session, sink);
    }

    fn on_error(&self, session: &mut Session, error: ServerError, sink: &mut dyn OutputSink) {
        warn!("Server error: {}", error.message);
        let text = match (&error.kind, self.policy.shows_technical_detail()) {
            (Some(kind), true) => format!("❌ Error [{}]: {}", kind, error.message),
            _ => format!("❌ Error: {}", error.message),
        };
        sink.append(LineKind::Error, &text);
        self.finish_turn(session, sink);
    }

    fn finish_turn(&self, session: &mut Session, sink: &mut dyn OutputSink) {
        sink.set_status(None);
        if self.options.clear_pending_on_terminal {
            session.clear_pending();
        }
        set_input(session, sink, true);
    }

    fn on_redis_flushed(
        &self,
        session: &mut Session,
        report: FlushReport,
        sink: &mut dyn OutputSink,
    ) {
        info!("Redis flushed: {} items", report.total_deleted);
        sink.append(LineKind::System, "✅ Cleanup complete!");

        if !report.removed_anything() {
            sink.append(LineKind::System, "ℹ️ Nothing found to remove");
            return;
        }

        if report.keys_deleted > 0 {
            sink.append(
                LineKind::System,
                &format!("🗑️ {} interaction key(s)", report.keys_deleted),
            );
        }
        if report.jobs_deleted > 0 {
            sink.append(LineKind::System, &format!("🗑️ {} job(s)", report.jobs_deleted));
        }
        if report.sessions_closed > 0 {
            sink.append(
                LineKind::System,
                &format!("🔌 {} session(s) closed", report.sessions_closed),
            );
        }
        sink.append(
            LineKind::System,
            &format!("📊 Total: {} item(s) deleted", report.total_deleted),
        );

        session.reset();
        sink.set_status(None);
        set_input(session, sink, true);
    }

    fn on_jobs_cleaned(&self, report: CleanupReport, sink: &mut dyn OutputSink) {
        sink.append(LineKind::System, "✅ Job history cleaned");
        if report.jobs_deleted > 0 {
            sink.append(
                LineKind::System,
                &format!("🗑️ {} completed job(s) removed", report.jobs_deleted),
            );
        } else {
            sink.append(LineKind::System, "ℹ️ No completed jobs found");
        }
        if report.jobs_kept > 0 {
            sink.append(
                LineKind::System,
                &format!("📌 {} active job(s) kept", report.jobs_kept),
            );
        }
    }
}
