//! Scripted session flows through the controller and dispatcher

use ezpocket::protocol::codec::{EnginePacket, SocketPacket};
use ezpocket::protocol::{
    ClientRequest, InboundEvent, InputType, InputValue, JobStatus, ServerEvent,
};
use ezpocket::session::{
    DispatchOptions, DisplayMode, DisplayPolicy, EventDispatcher, PendingInteraction, Rating,
    Session, SessionController, Submission,
};
use ezpocket::ui::{LineKind, MemorySink};

/// Decode a raw WebSocket text frame the way the channel does
fn frame(text: &str) -> InboundEvent {
    let body = match EnginePacket::decode(text).unwrap() {
        EnginePacket::Message(body) => body,
        other => panic!("expected a message frame, got {:?}", other),
    };
    match SocketPacket::decode(&body).unwrap() {
        SocketPacket::Event { name, payload } => match ServerEvent::decode(&name, payload) {
            Ok(event) => InboundEvent::Server(event),
            Err(e) => InboundEvent::Rejected(e),
        },
        SocketPacket::Connect(_) => InboundEvent::Connect,
        other => panic!("unexpected socket packet {:?}", other),
    }
}

struct Harness {
    session: Session,
    controller: SessionController,
    dispatcher: EventDispatcher,
    sink: MemorySink,
}

impl Harness {
    fn new(mode: DisplayMode) -> Self {
        let policy = DisplayPolicy::new(mode);
        Self {
            session: Session::default(),
            controller: SessionController::new(policy, "intent_validator"),
            dispatcher: EventDispatcher::new(policy, DispatchOptions::default()),
            sink: MemorySink::new(),
        }
    }

    fn receive(&mut self, text: &str) {
        let event = frame(text);
        self.dispatcher
            .dispatch(&mut self.session, event, &mut self.sink);
    }

    fn submit(&mut self, text: &str) -> Submission {
        self.controller
            .submit(&mut self.session, text, &mut self.sink)
    }

    fn expect_send(&mut self, text: &str) -> ClientRequest {
        match self.submit(text) {
            Submission::Send(request) => request,
            other => panic!("expected a request for {:?}, got {:?}", text, other),
        }
    }
}

fn input_of(request: &ClientRequest) -> (InputType, InputValue) {
    match request {
        ClientRequest::SendInput(input) => (input.input_type, input.input_value.clone()),
        other => panic!("expected send_input, got {:?}", other),
    }
}

#[test]
fn test_feedback_scenario() {
    let mut h = Harness::new(DisplayMode::Production);
    h.receive(r#"40{"sid":"abc"}"#);

    let request = h.expect_send("quantas vendas em março?");
    assert_eq!(request.event_name(), "start_job");

    h.receive(r#"42["job_started",{"job_id":"J1","module":"intent_validator","expected_flow":"intent_validator -> response_composer"}]"#);
    h.receive(r#"42["module_update",{"module":"response_composer","message":"compondo","success":true}]"#);
    h.receive(r#"42["need_input",{"type":"user_feedback","data":{"pergunta":"quantas vendas em março?","response_text":"Foram 128 vendas."}}]"#);
    assert_eq!(h.session.pending(), PendingInteraction::AwaitingFeedbackRating);
    assert!(h.sink.contains("Foram 128 vendas."));

    let rating = h.expect_send("5");
    assert_eq!(
        input_of(&rating),
        (InputType::UserFeedbackRating, InputValue::Rating(5))
    );
    assert_eq!(
        h.session.pending(),
        PendingInteraction::AwaitingFeedbackComment {
            rating: Rating::new(5).unwrap()
        }
    );

    let comment = h.expect_send("ótimo");
    assert_eq!(
        input_of(&comment),
        (
            InputType::UserFeedbackComment,
            InputValue::Text("ótimo".to_string())
        )
    );
    assert_eq!(h.session.pending(), PendingInteraction::None);

    let payload = comment.payload().unwrap();
    assert_eq!(payload["job_id"], "J1");
    assert_eq!(payload["input_type"], "user_feedback_comment");

    h.receive(r#"42["job_completed",{"status":"completed","execution_chain_length":9}]"#);
    assert_eq!(h.session.job().map(|j| j.status), Some(JobStatus::Completed));
    assert!(h.session.current_job_id().is_none());
    assert!(h.session.input_enabled());
}

#[test]
fn test_plan_rejection_and_suggestion() {
    let mut h = Harness::new(DisplayMode::Development);
    h.receive("40");
    h.expect_send("top 10 clientes");
    h.receive(r#"42["job_started",{"job_id":"J2","module":"intent_validator","expected_flow":"a -> b"}]"#);
    h.receive(r#"42["need_input",{"type":"plan_confirmation","data":{"plan":"Ordenar clientes por receita","plan_steps":["consultar","ordenar"]}}]"#);
    assert!(!h.sink.texts(LineKind::Confirmation).is_empty());

    assert_eq!(h.submit("talvez"), Submission::Reprompt);
    assert_eq!(h.session.pending(), PendingInteraction::AwaitingPlanConfirmation);

    let rejection = h.expect_send("n");
    assert_eq!(
        input_of(&rejection),
        (InputType::PlanConfirmation, InputValue::Flag(false))
    );
    assert!(h.sink.contains("Plan rejected"));

    // Input is disabled until the server asks for something again
    assert_eq!(h.submit("mais uma"), Submission::Busy);

    h.receive(r#"42["input_received",{"message":"Plano rejeitado","next_module":"user_proposed_plan","approved":false}]"#);
    h.receive(r#"42["need_input",{"type":"user_proposed_plan","data":{"pergunta":"top 10 clientes","rejected_plan":"Ordenar clientes por receita"}}]"#);
    assert_eq!(h.session.pending(), PendingInteraction::AwaitingUserSuggestion);

    let suggestion = h.expect_send("use apenas 2024");
    assert_eq!(
        input_of(&suggestion),
        (
            InputType::UserProposedPlan,
            InputValue::Text("use apenas 2024".to_string())
        )
    );
}

#[test]
fn test_disconnect_suspends_without_losing_state() {
    let mut h = Harness::new(DisplayMode::Production);
    h.receive("40");
    h.expect_send("pergunta");
    h.receive(r#"42["job_started",{"job_id":"J3","module":"intent_validator","expected_flow":"x"}]"#);
    h.receive(r#"42["need_input",{"type":"user_feedback","data":{"pergunta":"pergunta","response_text":"resposta"}}]"#);

    h.dispatcher.dispatch(
        &mut h.session,
        InboundEvent::Disconnect {
            reason: "transport close".to_string(),
        },
        &mut h.sink,
    );
    assert_eq!(h.submit("4"), Submission::NotConnected);
    assert_eq!(h.session.pending(), PendingInteraction::AwaitingFeedbackRating);

    h.receive("40");
    let rating = h.expect_send("4");
    assert_eq!(
        input_of(&rating),
        (InputType::UserFeedbackRating, InputValue::Rating(4))
    );
}

#[test]
fn test_flush_resets_and_unknown_input_is_reported() {
    let mut h = Harness::new(DisplayMode::Production);
    h.receive("40");
    h.expect_send("pergunta");
    h.receive(r#"42["job_started",{"job_id":"J4","module":"intent_validator","expected_flow":"x"}]"#);

    h.receive(r#"42["need_input",{"type":"survey","data":{}}]"#);
    assert_eq!(h.session.pending(), PendingInteraction::None);
    assert_eq!(h.sink.texts(LineKind::Error).len(), 1);

    h.receive(r#"42["redis_flushed",{"keys_deleted":2,"jobs_deleted":1,"sessions_closed":1,"total_deleted":3,"message":"ok","username":"test_user","projeto":"test_project"}]"#);
    assert!(h.session.job().is_none());
    assert!(h.session.input_enabled());
}
