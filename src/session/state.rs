//! Session state owned by the session manager
//!
//! A single [`Session`] holds the job, the pending interaction, the connection
//! flags and the identity. The controller and the dispatcher receive it by
//! mutable reference and are the only code that changes it.

use std::fmt;

use crate::protocol::{DEFAULT_PROJETO, DEFAULT_USERNAME, JobStatus, Scope};

/// Satisfaction rating in the inclusive range 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Create a rating, rejecting values outside 1..=5
    pub fn new(value: i64) -> Option<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// Parse the leading integer of a line, so `" 4 "` and `"4.5"` both give 4
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (sign, digits) = match text.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, text.strip_prefix('+').unwrap_or(text)),
        };

        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        if end == 0 {
            return None;
        }

        let value: i64 = digits[..end].parse().ok()?;
        Self::new(sign * value)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The one interaction the session is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingInteraction {
    #[default]
    None,
    AwaitingPlanConfirmation,
    AwaitingUserSuggestion,
    AwaitingFeedbackRating,
    AwaitingFeedbackComment { rating: Rating },
}

/// Discriminant of a non-empty pending interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    UserSuggestion,
    PlanConfirmation,
    FeedbackRating,
    FeedbackComment,
}

impl PendingInteraction {
    pub fn kind(&self) -> Option<InteractionKind> {
        match self {
            PendingInteraction::None => None,
            PendingInteraction::AwaitingPlanConfirmation => Some(InteractionKind::PlanConfirmation),
            PendingInteraction::AwaitingUserSuggestion => Some(InteractionKind::UserSuggestion),
            PendingInteraction::AwaitingFeedbackRating => Some(InteractionKind::FeedbackRating),
            PendingInteraction::AwaitingFeedbackComment { .. } => {
                Some(InteractionKind::FeedbackComment)
            }
        }
    }

    /// Rating already accepted, when a comment is pending
    pub fn pending_rating(&self) -> Option<Rating> {
        match self {
            PendingInteraction::AwaitingFeedbackComment { rating } => Some(*rating),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PendingInteraction::None)
    }

    /// Short human-readable description for `/status`
    pub fn describe(&self) -> String {
        match self {
            PendingInteraction::None => "nothing pending".to_string(),
            PendingInteraction::AwaitingPlanConfirmation => {
                "awaiting plan confirmation".to_string()
            }
            PendingInteraction::AwaitingUserSuggestion => "awaiting a plan suggestion".to_string(),
            PendingInteraction::AwaitingFeedbackRating => "awaiting a rating (1-5)".to_string(),
            PendingInteraction::AwaitingFeedbackComment { rating } => {
                format!("awaiting an optional comment (rated {})", rating)
            }
        }
    }
}

/// Job tracked by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: Option<String>,
    pub status: JobStatus,
    pub module: Option<String>,
}

impl Job {
    /// First eight characters of the id, for compact display
    pub fn short_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(|id| id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i]))
    }
}

/// User/project pair sent with requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    username: String,
    projeto: String,
}

impl SessionIdentity {
    pub fn new(username: &str, projeto: &str) -> Self {
        let mut identity = Self {
            username: String::new(),
            projeto: String::new(),
        };
        identity.set_username(username);
        identity.set_projeto(projeto);
        identity
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn projeto(&self) -> &str {
        &self.projeto
    }

    /// Blank names fall back to the default user
    pub fn set_username(&mut self, username: &str) {
        self.username = or_default(username, DEFAULT_USERNAME);
    }

    /// Blank names fall back to the default project
    pub fn set_projeto(&mut self, projeto: &str) {
        self.projeto = or_default(projeto, DEFAULT_PROJETO);
    }

    pub fn scope(&self) -> Scope {
        Scope {
            username: self.username.clone(),
            projeto: self.projeto.clone(),
        }
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PROJETO)
    }
}

fn or_default(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Single source of truth for one interactive session
#[derive(Debug, Clone, Default)]
pub struct Session {
    job: Option<Job>,
    pending: PendingInteraction,
    connected: bool,
    connected_once: bool,
    input_enabled: bool,
    identity: SessionIdentity,
}

impl Session {
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    /// Identifier of the job that `send_input` targets
    pub fn current_job_id(&self) -> Option<String> {
        self.job.as_ref().and_then(|job| job.id.clone())
    }

    /// Replace any previous job with a freshly started one
    pub fn start_job(&mut self, id: String, module: String) {
        self.job = Some(Job {
            id: Some(id),
            status: JobStatus::Running,
            module: Some(module),
        });
    }

    /// Record a terminal status; the id is dropped so later input cannot target it
    pub fn complete_job(&mut self, status: JobStatus) {
        match self.job.as_mut() {
            Some(job) => {
                job.status = status;
                job.id = None;
            }
            None => {
                self.job = Some(Job {
                    id: None,
                    status,
                    module: None,
                });
            }
        }
    }

    /// Remember the module most recently announced for the job
    pub fn note_module(&mut self, module: &str) {
        if let Some(job) = self.job.as_mut() {
            job.module = Some(module.to_string());
        }
    }

    pub fn pending(&self) -> PendingInteraction {
        self.pending
    }

    /// Enter a pending interaction, replacing whatever was pending
    pub fn enter(&mut self, pending: PendingInteraction) {
        self.pending = pending;
    }

    pub fn clear_pending(&mut self) {
        self.pending = PendingInteraction::None;
    }

    /// Drop the job and the pending interaction; connection and identity survive
    pub fn reset(&mut self) {
        self.job = None;
        self.pending = PendingInteraction::None;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns true when this connect follows an earlier one
    pub fn mark_connected(&mut self) -> bool {
        let reconnect = self.connected_once;
        self.connected = true;
        self.connected_once = true;
        reconnect
    }

    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut SessionIdentity {
        &mut self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_none());
        assert_eq!(Rating::new(1).map(|r| r.value()), Some(1));
        assert_eq!(Rating::new(5).map(|r| r.value()), Some(5));
        assert!(Rating::new(6).is_none());
        assert!(Rating::new(-3).is_none());
    }

    #[test]
    fn test_rating_parse_leading_integer() {
        assert_eq!(Rating::parse("4"), Rating::new(4));
        assert_eq!(Rating::parse(" 4 "), Rating::new(4));
        assert_eq!(Rating::parse("4.5"), Rating::new(4));
        assert_eq!(Rating::parse("3 stars"), Rating::new(3));
        assert_eq!(Rating::parse("+2"), Rating::new(2));
        assert_eq!(Rating::parse("7"), None);
        assert_eq!(Rating::parse("abc"), None);
        assert_eq!(Rating::parse("-1"), None);
        assert_eq!(Rating::parse(""), None);
        assert_eq!(Rating::parse("99999999999999999999"), None);
    }

    #[test]
    fn test_pending_helpers() {
        let rating = Rating::new(4).unwrap();
        let pending = PendingInteraction::AwaitingFeedbackComment { rating };
        assert_eq!(pending.kind(), Some(InteractionKind::FeedbackComment));
        assert_eq!(pending.pending_rating(), Some(rating));
        assert!(PendingInteraction::default().is_none());
        assert_eq!(PendingInteraction::None.kind(), None);
    }

    #[test]
    fn test_identity_defaults_for_blank_values() {
        let identity = SessionIdentity::new("  ", "");
        assert_eq!(identity.username(), DEFAULT_USERNAME);
        assert_eq!(identity.projeto(), DEFAULT_PROJETO);

        let identity = SessionIdentity::new(" ana ", "vendas");
        assert_eq!(identity.username(), "ana");
        assert_eq!(identity.scope().projeto, "vendas");
    }

    #[test]
    fn test_job_lifecycle() {
        let mut session = Session::default();
        assert!(session.job().is_none());
        assert!(!session.input_enabled());

        session.start_job("abcdef123456".to_string(), "intent_validator".to_string());
        assert_eq!(session.current_job_id().as_deref(), Some("abcdef123456"));
        assert_eq!(session.job().and_then(|j| j.short_id()), Some("abcdef12"));

        session.note_module("router");
        assert_eq!(
            session.job().and_then(|j| j.module.as_deref()),
            Some("router")
        );

        session.complete_job(JobStatus::PartialFailure);
        let job = session.job().unwrap();
        assert_eq!(job.status, JobStatus::PartialFailure);
        assert!(job.id.is_none());
        assert!(session.current_job_id().is_none());
    }

    #[test]
    fn test_reset_keeps_connection_and_identity() {
        let mut session = Session::new(SessionIdentity::new("ana", "vendas"));
        session.mark_connected();
        session.start_job("j1".to_string(), "router".to_string());
        session.enter(PendingInteraction::AwaitingFeedbackRating);

        session.reset();
        assert!(session.job().is_none());
        assert!(session.pending().is_none());
        assert!(session.is_connected());
        assert_eq!(session.identity().username(), "ana");
    }

    #[test]
    fn test_mark_connected_reports_reconnect() {
        let mut session = Session::default();
        assert!(!session.mark_connected());
        session.mark_disconnected();
        assert!(!session.is_connected());
        assert!(session.mark_connected());
    }
}
