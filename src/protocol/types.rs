//! Orchestrator protocol data types and structures

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity values the orchestrator falls back to when a field is blank
pub const DEFAULT_USERNAME: &str = "test_user";
pub const DEFAULT_PROJETO: &str = "test_project";

/// First pipeline module for a brand-new question
pub const DEFAULT_START_MODULE: &str = "intent_validator";

/// Connection status for the Socket.IO channel
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error(String),
}

/// Everything the event dispatcher can receive from the channel
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Namespace connection acknowledged by the server
    Connect,
    /// Transport lost or closed
    Disconnect { reason: String },
    /// A decoded server event
    Server(ServerEvent),
    /// A frame or event the client refused to decode
    Rejected(ProtocolError),
}

/// Named server events with typed payloads
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected(ConnectedNotice),
    JobStarted(JobStarted),
    ModuleUpdate(ModuleUpdate),
    StatusUpdate(StatusUpdate),
    NeedInput(NeedInput),
    InputReceived(InputReceived),
    JobCompleted(JobCompleted),
    Error(ServerError),
    RedisFlushed(FlushReport),
    JobsCleaned(CleanupReport),
}

impl ServerEvent {
    /// Decode a named event and its first argument into a typed event
    pub fn decode(name: &str, payload: Value) -> Result<Self, ProtocolError> {
        match name {
            "connected" => parse_payload(name, payload).map(ServerEvent::Connected),
            "job_started" => parse_payload(name, payload).map(ServerEvent::JobStarted),
            "module_update" => parse_payload(name, payload).map(ServerEvent::ModuleUpdate),
            "status_update" => parse_payload(name, payload).map(ServerEvent::StatusUpdate),
            "need_input" => NeedInput::decode(payload).map(ServerEvent::NeedInput),
            "input_received" => parse_payload(name, payload).map(ServerEvent::InputReceived),
            "job_completed" => parse_payload(name, payload).map(ServerEvent::JobCompleted),
            "error" => parse_payload(name, payload).map(ServerEvent::Error),
            "redis_flushed" => parse_payload(name, payload).map(ServerEvent::RedisFlushed),
            "jobs_cleaned" => parse_payload(name, payload).map(ServerEvent::JobsCleaned),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => "connected",
            ServerEvent::JobStarted(_) => "job_started",
            ServerEvent::ModuleUpdate(_) => "module_update",
            ServerEvent::StatusUpdate(_) => "status_update",
            ServerEvent::NeedInput(_) => "need_input",
            ServerEvent::InputReceived(_) => "input_received",
            ServerEvent::JobCompleted(_) => "job_completed",
            ServerEvent::Error(_) => "error",
            ServerEvent::RedisFlushed(_) => "redis_flushed",
            ServerEvent::JobsCleaned(_) => "jobs_cleaned",
        }
    }
}

fn parse_payload<T: DeserializeOwned>(event: &str, payload: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

/// Greeting sent right after the namespace connects
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectedNotice {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStarted {
    pub job_id: String,
    pub module: String,
    pub expected_flow: String,
    #[serde(default)]
    pub pergunta: Option<String>,
}

/// Progress report from one pipeline module
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleUpdate {
    pub module: String,
    pub message: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub branches_count: u64,
}

/// The pipeline is suspended until the user answers
#[derive(Debug, Clone, PartialEq)]
pub enum NeedInput {
    PlanConfirmation(PlanProposal),
    UserFeedback(FeedbackRequest),
    UserProposedPlan(SuggestionRequest),
}

#[derive(Deserialize)]
struct RawNeedInput {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl NeedInput {
    fn decode(payload: Value) -> Result<Self, ProtocolError> {
        let raw: RawNeedInput = parse_payload("need_input", payload)?;
        match raw.kind.as_str() {
            "plan_confirmation" => {
                parse_payload("need_input", raw.data).map(NeedInput::PlanConfirmation)
            }
            "user_feedback" => parse_payload("need_input", raw.data).map(NeedInput::UserFeedback),
            "user_proposed_plan" => {
                parse_payload("need_input", raw.data).map(NeedInput::UserProposedPlan)
            }
            _ => Err(ProtocolError::UnknownInputType(raw.kind)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NeedInput::PlanConfirmation(_) => "plan_confirmation",
            NeedInput::UserFeedback(_) => "user_feedback",
            NeedInput::UserProposedPlan(_) => "user_proposed_plan",
        }
    }
}

/// Plan awaiting approval
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanProposal {
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub plan_steps: Vec<Value>,
}

impl PlanProposal {
    /// Steps as display text; non-string steps are shown as compact JSON
    pub fn steps(&self) -> impl Iterator<Item = String> + '_ {
        self.plan_steps.iter().map(|step| match step {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }
}

/// Generated answer awaiting a rating
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub pergunta: String,
    pub response_text: String,
}

/// A rejected plan; the user is asked what to do instead
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuggestionRequest {
    #[serde(default)]
    pub pergunta: String,
    #[serde(default)]
    pub rejected_plan: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputReceived {
    pub message: String,
    #[serde(default)]
    pub next_module: Option<String>,
    #[serde(default)]
    pub approved: Option<bool>,
}

/// Final job status reported by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    PartialFailure,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::PartialFailure => "partial_failure",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobCompleted {
    pub status: JobStatus,
    pub execution_chain_length: u64,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerError {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Result of a `flush_redis` request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlushReport {
    pub keys_deleted: u64,
    pub jobs_deleted: u64,
    pub sessions_closed: u64,
    pub total_deleted: u64,
    #[serde(default)]
    pub message: Option<String>,
}

impl FlushReport {
    /// Whether the server actually removed anything tied to this session
    pub fn removed_anything(&self) -> bool {
        self.total_deleted > 0 || self.sessions_closed > 0
    }
}

/// Result of a `cleanup_completed_jobs` request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CleanupReport {
    pub jobs_deleted: u64,
    pub jobs_kept: u64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Requests the client emits to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    StartJob(StartJob),
    SendInput(SendInput),
    FlushRedis(Scope),
    CleanupCompletedJobs(Scope),
}

impl ClientRequest {
    /// Build a `send_input` request
    pub fn input(job_id: Option<String>, input_type: InputType, input_value: InputValue) -> Self {
        ClientRequest::SendInput(SendInput {
            job_id,
            input_type,
            input_value,
        })
    }

    /// Wire name of the request
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientRequest::StartJob(_) => "start_job",
            ClientRequest::SendInput(_) => "send_input",
            ClientRequest::FlushRedis(_) => "flush_redis",
            ClientRequest::CleanupCompletedJobs(_) => "cleanup_completed_jobs",
        }
    }

    /// JSON payload sent as the event argument
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            ClientRequest::StartJob(request) => serde_json::to_value(request),
            ClientRequest::SendInput(request) => serde_json::to_value(request),
            ClientRequest::FlushRedis(scope) | ClientRequest::CleanupCompletedJobs(scope) => {
                serde_json::to_value(scope)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartJob {
    pub pergunta: String,
    pub username: String,
    pub projeto: String,
    pub module: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendInput {
    pub job_id: Option<String>,
    pub input_type: InputType,
    pub input_value: InputValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    PlanConfirmation,
    UserFeedbackRating,
    UserFeedbackComment,
    UserProposedPlan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InputValue {
    Flag(bool),
    Rating(u8),
    Text(String),
}

/// User/project pair that scopes maintenance requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub username: String,
    pub projeto: String,
}

/// Error types for protocol decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("unknown need_input type: {0}")]
    UnknownInputType(String),
    #[error("invalid payload for {event}: {reason}")]
    InvalidPayload { event: String, reason: String },
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("packet for foreign namespace {0}")]
    ForeignNamespace(String),
}
