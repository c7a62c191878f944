//! Session controller
//!
//! Interprets each submitted line against the pending interaction. A line
//! produces at most one outbound request; rejected lines never reach the
//! channel.

use tracing::debug;

use super::display::DisplayPolicy;
use super::state::{InteractionKind, PendingInteraction, Rating, Session};
use crate::protocol::{ClientRequest, InputType, InputValue, StartJob};
use crate::ui::{LineKind, OutputSink};

/// Order in which pending interactions claim a submitted line
pub const CLASSIFICATION_ORDER: [InteractionKind; 4] = [
    InteractionKind::UserSuggestion,
    InteractionKind::PlanConfirmation,
    InteractionKind::FeedbackRating,
    InteractionKind::FeedbackComment,
];

const AFFIRMATIVE: [&str; 4] = ["s", "sim", "y", "yes"];
const NEGATIVE: [&str; 4] = ["n", "nao", "não", "no"];

/// Meaning of a line given the pending interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Suggest(String),
    Confirm(bool),
    InvalidConfirmation,
    Rate(Rating),
    InvalidRating,
    Comment { rating: Rating, text: String },
    StartJob(String),
    Empty,
}

/// Classify a line without touching any state
pub fn classify(pending: PendingInteraction, text: &str) -> Decision {
    let text = text.trim();

    for kind in CLASSIFICATION_ORDER {
        if pending.kind() != Some(kind) {
            continue;
        }

        return match kind {
            InteractionKind::FeedbackComment => match pending.pending_rating() {
                Some(rating) => Decision::Comment {
                    rating,
                    text: text.to_string(),
                },
                None => Decision::Empty,
            },
            _ if text.is_empty() => Decision::Empty,
            InteractionKind::UserSuggestion => Decision::Suggest(text.to_string()),
            InteractionKind::PlanConfirmation => {
                let answer = text.to_lowercase();
                if AFFIRMATIVE.contains(&answer.as_str()) {
                    Decision::Confirm(true)
                } else if NEGATIVE.contains(&answer.as_str()) {
                    Decision::Confirm(false)
                } else {
                    Decision::InvalidConfirmation
                }
            }
            InteractionKind::FeedbackRating => match Rating::parse(text) {
                Some(rating) => Decision::Rate(rating),
                None => Decision::InvalidRating,
            },
        };
    }

    if text.is_empty() {
        Decision::Empty
    } else {
        Decision::StartJob(text.to_string())
    }
}

/// What happened to a submitted line
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Emit this request on the channel
    Send(ClientRequest),
    /// Invalid answer; the user was asked again
    Reprompt,
    /// Blank line outside the comment step
    Ignored,
    /// A previous request is still being processed
    Busy,
    /// No live channel
    NotConnected,
}

/// Keep the session flag and the visible input state in step
pub(crate) fn set_input(session: &mut Session, sink: &mut dyn OutputSink, enabled: bool) {
    session.set_input_enabled(enabled);
    sink.set_input_enabled(enabled);
}

/// Turns user lines into session transitions and requests
#[derive(Debug, Clone)]
pub struct SessionController {
    policy: DisplayPolicy,
    start_module: String,
}

impl SessionController {
    /// Create a new session controller
    pub fn new(policy: DisplayPolicy, start_module: impl Into<String>) -> Self {
        Self {
            policy,
            start_module: start_module.into(),
        }
    }

    pub fn start_module(&self) -> &str {
        &self.start_module
    }

    /// Handle one submitted line
    pub fn submit(
        &self,
        session: &mut Session,
        text: &str,
        sink: &mut dyn OutputSink,
    ) -> Submission {
        let decision = classify(session.pending(), text);
        if decision == Decision::Empty {
            return Submission::Ignored;
        }

        if !session.is_connected() {
            sink.append(LineKind::Error, "Not connected to the server");
            return Submission::NotConnected;
        }

        if !session.input_enabled() {
            sink.append(
                LineKind::System,
                "Still processing the previous request, please wait",
            );
            return Submission::Busy;
        }

        let echo = text.trim();
        if !echo.is_empty() {
            sink.append(LineKind::User, echo);
        }

        debug!("Submission classified as {:?}", decision);
        let job_id = session.current_job_id();

        match decision {
            Decision::Suggest(suggestion) => {
                session.clear_pending();
                set_input(session, sink, false);
                sink.set_status(Some("Sending suggestion..."));
                if self.policy.shows_chrome() {
                    sink.append(LineKind::System, "📤 Suggestion sent");
                }
                Submission::Send(ClientRequest::input(
                    job_id,
                    InputType::UserProposedPlan,
                    InputValue::Text(suggestion),
                ))
            }
            Decision::Confirm(approved) => {
                session.clear_pending();
                set_input(session, sink, false);
                if approved {
                    sink.set_status(Some("Sending confirmation..."));
                } else {
                    sink.set_status(Some("Sending rejection..."));
                }
                if self.policy.shows_chrome() {
                    let ack = if approved {
                        "✅ Plan approved"
                    } else {
                        "❌ Plan rejected"
                    };
                    sink.append(LineKind::System, ack);
                }
                Submission::Send(ClientRequest::input(
                    job_id,
                    InputType::PlanConfirmation,
                    InputValue::Flag(approved),
                ))
            }
            Decision::InvalidConfirmation => {
                sink.append(LineKind::System, "❌ Invalid answer. Type \"s\" or \"n\"");
                Submission::Reprompt
            }
            Decision::Rate(rating) => {
                session.enter(PendingInteraction::AwaitingFeedbackComment { rating });
                sink.append(LineKind::Assistant, "💭 Comment (press Enter to skip):");
                Submission::Send(ClientRequest::input(
                    job_id,
                    InputType::UserFeedbackRating,
                    InputValue::Rating(rating.value()),
                ))
            }
            Decision::InvalidRating => {
                sink.append(
                    LineKind::System,
                    "❌ Invalid rating. Type a number from 1 to 5",
                );
                Submission::Reprompt
            }
            Decision::Comment { rating, text } => {
                session.clear_pending();
                set_input(session, sink, false);
                sink.set_status(Some("Sending feedback..."));
                sink.append(
                    LineKind::System,
                    &format!("✅ Feedback sent: {} stars", rating),
                );
                Submission::Send(ClientRequest::input(
                    job_id,
                    InputType::UserFeedbackComment,
                    InputValue::Text(text),
                ))
            }
            Decision::StartJob(pergunta) => {
                set_input(session, sink, false);
                sink.set_status(Some("Sending question..."));
                let identity = session.identity();
                Submission::Send(ClientRequest::StartJob(StartJob {
                    pergunta,
                    username: identity.username().to_string(),
                    projeto: identity.projeto().to_string(),
                    module: self.start_module.clone(),
                }))
            }
            Decision::Empty => Submission::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DEFAULT_PROJETO, DEFAULT_START_MODULE, DEFAULT_USERNAME};
    use crate::session::display::DisplayMode;
    use crate::ui::MemorySink;

    fn rating(value: i64) -> Rating {
        Rating::new(value).unwrap()
    }

    fn ready_session(pending: PendingInteraction) -> Session {
        let mut session = Session::default();
        session.mark_connected();
        session.set_input_enabled(true);
        session.start_job("job-1".to_string(), "router".to_string());
        session.enter(pending);
        session
    }

    fn controller(mode: DisplayMode) -> SessionController {
        SessionController::new(DisplayPolicy::new(mode), DEFAULT_START_MODULE)
    }

    #[test]
    fn test_classification_order_is_fixed() {
        assert_eq!(CLASSIFICATION_ORDER[0], InteractionKind::UserSuggestion);
        assert_eq!(CLASSIFICATION_ORDER[3], InteractionKind::FeedbackComment);
    }

    #[test]
    fn test_classify_confirmation_tokens() {
        let pending = PendingInteraction::AwaitingPlanConfirmation;
        for token in ["s", "SIM", " y ", "Yes"] {
            assert_eq!(classify(pending, token), Decision::Confirm(true), "{}", token);
        }
        for token in ["n", "nao", "Não", "NO"] {
            assert_eq!(classify(pending, token), Decision::Confirm(false), "{}", token);
        }
        assert_eq!(classify(pending, "talvez"), Decision::InvalidConfirmation);
        assert_eq!(classify(pending, "   "), Decision::Empty);
    }

    #[test]
    fn test_classify_rating_and_comment() {
        let pending = PendingInteraction::AwaitingFeedbackRating;
        assert_eq!(classify(pending, "4"), Decision::Rate(rating(4)));
        assert_eq!(classify(pending, "7"), Decision::InvalidRating);
        assert_eq!(classify(pending, "abc"), Decision::InvalidRating);

        let pending = PendingInteraction::AwaitingFeedbackComment { rating: rating(4) };
        assert_eq!(
            classify(pending, ""),
            Decision::Comment {
                rating: rating(4),
                text: String::new()
            }
        );
    }

    #[test]
    fn test_classify_without_pending() {
        assert_eq!(
            classify(PendingInteraction::None, "  vendas por mês "),
            Decision::StartJob("vendas por mês".to_string())
        );
        assert_eq!(classify(PendingInteraction::None, ""), Decision::Empty);
        assert_eq!(
            classify(PendingInteraction::AwaitingUserSuggestion, "s"),
            Decision::Suggest("s".to_string())
        );
    }

    #[test]
    fn test_confirmation_accept_and_reject() {
        let controller = controller(DisplayMode::Development);
        let mut sink = MemorySink::new();

        let mut session = ready_session(PendingInteraction::AwaitingPlanConfirmation);
        let result = controller.submit(&mut session, "sim", &mut sink);
        assert_eq!(
            result,
            Submission::Send(ClientRequest::input(
                Some("job-1".to_string()),
                InputType::PlanConfirmation,
                InputValue::Flag(true)
            ))
        );
        assert!(session.pending().is_none());
        assert!(!session.input_enabled());
        assert!(sink.contains("Plan approved"));

        let mut session = ready_session(PendingInteraction::AwaitingPlanConfirmation);
        let result = controller.submit(&mut session, "não", &mut sink);
        assert!(matches!(
            result,
            Submission::Send(ClientRequest::SendInput(ref input))
                if input.input_value == InputValue::Flag(false)
        ));
        assert!(session.pending().is_none());
    }

    #[test]
    fn test_invalid_confirmation_reprompts() {
        let controller = controller(DisplayMode::Production);
        let mut sink = MemorySink::new();
        let mut session = ready_session(PendingInteraction::AwaitingPlanConfirmation);

        let result = controller.submit(&mut session, "talvez", &mut sink);
        assert_eq!(result, Submission::Reprompt);
        assert_eq!(session.pending(), PendingInteraction::AwaitingPlanConfirmation);
        assert!(session.input_enabled());
        assert!(sink.contains("Type \"s\" or \"n\""));
    }

    #[test]
    fn test_rating_flow() {
        let controller = controller(DisplayMode::Production);
        let mut sink = MemorySink::new();
        let mut session = ready_session(PendingInteraction::AwaitingFeedbackRating);

        for bad in ["7", "abc", "0"] {
            assert_eq!(controller.submit(&mut session, bad, &mut sink), Submission::Reprompt);
            assert_eq!(session.pending(), PendingInteraction::AwaitingFeedbackRating);
        }

        let result = controller.submit(&mut session, "4", &mut sink);
        assert_eq!(
            result,
            Submission::Send(ClientRequest::input(
                Some("job-1".to_string()),
                InputType::UserFeedbackRating,
                InputValue::Rating(4)
            ))
        );
        assert_eq!(
            session.pending(),
            PendingInteraction::AwaitingFeedbackComment { rating: rating(4) }
        );
        assert!(session.input_enabled());
    }

    #[test]
    fn test_empty_comment_is_sent() {
        let controller = controller(DisplayMode::Production);
        let mut sink = MemorySink::new();
        let mut session =
            ready_session(PendingInteraction::AwaitingFeedbackComment { rating: rating(4) });

        let result = controller.submit(&mut session, "", &mut sink);
        assert_eq!(
            result,
            Submission::Send(ClientRequest::input(
                Some("job-1".to_string()),
                InputType::UserFeedbackComment,
                InputValue::Text(String::new())
            ))
        );
        assert!(session.pending().is_none());
        assert!(sink.contains("Feedback sent: 4 stars"));
        assert!(sink.texts(LineKind::User).is_empty());
    }

    #[test]
    fn test_suggestion_is_sent_verbatim() {
        let controller = controller(DisplayMode::Production);
        let mut sink = MemorySink::new();
        let mut session = ready_session(PendingInteraction::AwaitingUserSuggestion);

        let result = controller.submit(&mut session, " use a tabela de vendas ", &mut sink);
        assert_eq!(
            result,
            Submission::Send(ClientRequest::input(
                Some("job-1".to_string()),
                InputType::UserProposedPlan,
                InputValue::Text("use a tabela de vendas".to_string())
            ))
        );
        assert!(session.pending().is_none());
        assert!(!sink.contains("Suggestion sent"));
    }

    #[test]
    fn test_new_question_starts_job() {
        let controller = controller(DisplayMode::Production);
        let mut sink = MemorySink::new();
        let mut session = ready_session(PendingInteraction::None);

        let result = controller.submit(&mut session, "quantas vendas?", &mut sink);
        assert_eq!(
            result,
            Submission::Send(ClientRequest::StartJob(StartJob {
                pergunta: "quantas vendas?".to_string(),
                username: DEFAULT_USERNAME.to_string(),
                projeto: DEFAULT_PROJETO.to_string(),
                module: DEFAULT_START_MODULE.to_string(),
            }))
        );
        assert!(!session.input_enabled());
        assert_eq!(sink.texts(LineKind::User), vec!["quantas vendas?"]);
    }

    #[test]
    fn test_refused_without_connection() {
        let controller = controller(DisplayMode::Production);
        let mut sink = MemorySink::new();
        let mut session = ready_session(PendingInteraction::AwaitingFeedbackRating);
        session.mark_disconnected();

        assert_eq!(
            controller.submit(&mut session, "5", &mut sink),
            Submission::NotConnected
        );
        assert_eq!(session.pending(), PendingInteraction::AwaitingFeedbackRating);
        assert_eq!(sink.texts(LineKind::Error).len(), 1);
    }

    #[test]
    fn test_refused_while_busy() {
        let controller = controller(DisplayMode::Production);
        let mut sink = MemorySink::new();
        let mut session = ready_session(PendingInteraction::None);
        session.set_input_enabled(false);

        assert_eq!(
            controller.submit(&mut session, "outra pergunta", &mut sink),
            Submission::Busy
        );
        assert!(sink.texts(LineKind::User).is_empty());
    }

    #[test]
    fn test_blank_line_ignored() {
        let controller = controller(DisplayMode::Production);
        let mut sink = MemorySink::new();
        let mut session = ready_session(PendingInteraction::None);
        session.mark_disconnected();

        assert_eq!(controller.submit(&mut session, "   ", &mut sink), Submission::Ignored);
        assert!(sink.lines.is_empty());
    }
}
