//! Turn processor behavior against a scripted transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{call_block, recording_sink, response, test_registry, Script, ScriptedTransport};
use toolcode::agent_loop::feedback::{LAST_CYCLE_WARNING, NO_RESPONSE_INFO};
use toolcode::agent_loop::{AgentEvent, CycleBudget, TurnProcessor};
use toolcode::config::{AgentConfig, SegmentMarkers};
use toolcode::error::ToolcodeError;
use toolcode::types::{Role, Turn};

fn processor(transport: Arc<ScriptedTransport>, config: AgentConfig) -> TurnProcessor {
    TurnProcessor::new(transport, Arc::new(test_registry()), config).unwrap()
}

fn markers() -> SegmentMarkers {
    SegmentMarkers::default()
}

fn user_text(text: &str) -> String {
    format!("{}\n{text}", markers().user_header.unwrap())
}

fn continue_line() -> String {
    let m = markers();
    format!(
        "{}\ncontinue ReAct processing by using `{}`",
        m.feedback_header, m.think_header
    )
}

#[tokio::test]
async fn tool_call_result_is_fed_back_before_final_answer() {
    let call = call_block("print(capability.add(a=1, b=2))");
    let transport = ScriptedTransport::new([
        Script::chunks([
            "Let me add.\n".to_string(),
            call[..20].to_string(),
            call[20..].to_string(),
            " trailing".to_string(),
        ]),
        Script::chunks([response("It is 3.")]),
    ]);
    let config = AgentConfig::builder().system_prompt("you add numbers").build();
    let mut processor = processor(Arc::clone(&transport), config);
    let (sink, events) = recording_sink();

    let trajectory = processor
        .process_turn("What is 1+2?", Some(sink), CycleBudget::new(3).unwrap(), Duration::from_secs(1))
        .await
        .unwrap();

    let head = format!("Let me add.\n{call}");
    let feedback = format!("{}\nTool Result:\n3", markers().feedback_header);
    assert_eq!(trajectory, format!("{head}\n{feedback}{}", response("It is 3.")));

    let history = processor.get_history();
    let texts: Vec<(Role, String)> = history.iter().map(|t| (t.role, t.text.clone())).collect();
    assert_eq!(
        texts,
        vec![
            (Role::User, user_text("What is 1+2?")),
            (Role::Assistant, format!("{head}\n{feedback}")),
            (Role::User, continue_line()),
            (Role::Assistant, response("It is 3.")),
        ]
    );

    let events = events.lock().unwrap().clone();
    assert!(events.contains(&AgentEvent::ToolCallStarted(
        "print(capability.add(a=1, b=2))".into()
    )));
    assert!(events.contains(&AgentEvent::ToolResult("3".into())));
    assert!(!events.contains(&AgentEvent::TextChunk(" trailing".into())));

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].history.len(), 1);
    assert_eq!(requests[1].history.len(), 3);
    assert_eq!(requests[1].system_prompt.as_deref(), Some("you add numbers"));
}

#[tokio::test]
async fn exhausts_budget_after_exactly_max_cycles() {
    let transport = ScriptedTransport::new(
        (0..5).map(|i| Script::chunks([format!("still thinking {i}")])),
    );
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());
    let (sink, events) = recording_sink();

    let err = processor
        .process_turn("loop forever", Some(sink), CycleBudget::new(3).unwrap(), Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolcodeError::CycleBudgetExceeded { max: 3 }));
    assert_eq!(transport.request_count(), 3);
    let infos = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, AgentEvent::Info(_)))
        .count();
    assert_eq!(infos, 3);
}

#[tokio::test]
async fn tool_calls_also_consume_budget() {
    let call = call_block("print(capability.add(a=1, b=1))");
    let transport = ScriptedTransport::new((0..4).map(|_| Script::chunks([call.clone()])));
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());

    let err = processor
        .process_turn("go", None, CycleBudget::new(2).unwrap(), Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolcodeError::CycleBudgetExceeded { max: 2 }));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn chunks_after_the_call_are_never_forwarded() {
    let call = call_block("print(capability.add(a=2, b=2))");
    let transport = ScriptedTransport::new([
        Script::chunks([
            "pre ".to_string(),
            call.clone(),
            "LATE".to_string(),
            "LATER".to_string(),
        ]),
        Script::chunks([response("4")]),
    ]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());
    let (sink, events) = recording_sink();

    processor
        .process_turn("2+2", Some(sink), CycleBudget::new(3).unwrap(), Duration::from_secs(1))
        .await
        .unwrap();

    let chunks: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            AgentEvent::TextChunk(text) => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["pre ".to_string(), call.clone(), response("4")]);
    let assistant = &processor.get_history()[1].text;
    assert!(assistant.starts_with(&format!("pre {call}\n")));
    assert!(!assistant.contains("LATE"));
    assert!(transport.signals()[0].is_cancelled());
    assert!(!transport.signals()[1].is_cancelled());
    // the cancelled stream is dropped before its third chunk is pulled
    assert_eq!(transport.chunks_pulled(), 3);
}

#[tokio::test]
async fn sandbox_failures_become_feedback() {
    let transport = ScriptedTransport::new([
        Script::chunks([call_block("import os")]),
        Script::chunks([call_block("print(capability.fail())")]),
        Script::chunks([response("gave up")]),
    ]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());
    let (sink, events) = recording_sink();

    let trajectory = processor
        .process_turn("try", Some(sink), CycleBudget::new(5).unwrap(), Duration::from_secs(1))
        .await
        .unwrap();

    let history = processor.get_history();
    assert!(history[1].text.contains("Tool Error:\nUnsafe tool code:"));
    assert!(history[3].text.contains("backend unavailable"));
    assert_eq!(history[2].text, continue_line());
    assert!(trajectory.contains("Tool Error:"));

    let errors = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, AgentEvent::ToolError(_)))
        .count();
    assert_eq!(errors, 2);
}

#[tokio::test]
async fn final_cycle_feedback_carries_warning() {
    let transport = ScriptedTransport::new([
        Script::chunks([call_block("print(capability.add(a=1, b=2))")]),
        Script::chunks([response("3")]),
    ]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());

    processor
        .process_turn("add", None, CycleBudget::new(2).unwrap(), Duration::from_secs(1))
        .await
        .unwrap();

    let feedback = &processor.get_history()[1].text;
    assert!(feedback.contains(LAST_CYCLE_WARNING));
    assert!(feedback.contains(&markers().alert_header));
}

#[tokio::test]
async fn missing_response_marker_gets_corrective_turn() {
    let transport = ScriptedTransport::new([
        Script::chunks(["The answer is 3."]),
        Script::chunks([response("The answer is 3.")]),
    ]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());
    let (sink, events) = recording_sink();

    let trajectory = processor
        .process_turn("q", Some(sink), CycleBudget::new(3).unwrap(), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(trajectory, format!("The answer is 3.{}", response("The answer is 3.")));
    let history = processor.get_history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[1].role, Role::Assistant);
    assert!(history[2].text.starts_with(&markers().alert_header));
    assert!(events
        .lock()
        .unwrap()
        .contains(&AgentEvent::Info(NO_RESPONSE_INFO.into())));
}

#[tokio::test]
async fn response_marker_from_an_earlier_cycle_ends_the_turn() {
    let call = call_block("print(capability.add(a=1, b=2))");
    let first = format!("{} Let me check first.\n{call}", markers().response_header);
    let transport = ScriptedTransport::new([
        Script::chunks([first]),
        Script::chunks(["It is 3."]),
        Script::chunks([response("unused")]),
    ]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());
    let (sink, events) = recording_sink();

    let trajectory = processor
        .process_turn("1+2?", Some(sink), CycleBudget::new(5).unwrap(), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(transport.request_count(), 2);
    assert!(trajectory.ends_with("It is 3."));
    let history = processor.get_history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].role, Role::Assistant);
    assert_eq!(history[3].text, "It is 3.");
    assert!(!events
        .lock()
        .unwrap()
        .contains(&AgentEvent::Info(NO_RESPONSE_INFO.into())));
}

#[tokio::test]
async fn empty_generations_do_not_consume_budget() {
    let transport = ScriptedTransport::new([
        Script::chunks(Vec::<String>::new()),
        Script::chunks([""]),
        Script::chunks([response("ok")]),
    ]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());

    let trajectory = processor
        .process_turn("q", None, CycleBudget::new(1).unwrap(), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(trajectory, response("ok"));
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn repeated_empty_generations_fail_the_turn() {
    let transport = ScriptedTransport::new(Vec::new());
    let config = AgentConfig::builder().max_empty_generations(2).build();
    let mut processor = processor(Arc::clone(&transport), config);

    let err = processor
        .process_turn("q", None, CycleBudget::new(3).unwrap(), Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolcodeError::Generation(_)));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn transport_failures_propagate() {
    let transport = ScriptedTransport::new([Script::Fail("503 from upstream".into())]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());

    let err = processor.process("q", None).await.unwrap_err();
    assert!(matches!(err, ToolcodeError::Generation(ref m) if m == "503 from upstream"));
    assert!(err.is_fatal_to_turn());
    assert_eq!(processor.get_history().len(), 1);
}

#[tokio::test]
async fn mid_stream_failures_propagate() {
    let transport = ScriptedTransport::new([Script::ChunksThenError(
        vec!["partial".into()],
        "connection reset".into(),
    )]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());
    let (sink, events) = recording_sink();

    let err = processor.process("q", Some(sink)).await.unwrap_err();
    assert!(matches!(err, ToolcodeError::Generation(_)));
    assert_eq!(
        events.lock().unwrap().clone(),
        vec![AgentEvent::TextChunk("partial".into())]
    );
}

#[tokio::test]
async fn rejects_non_user_input() {
    let transport = ScriptedTransport::new(Vec::new());
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());

    let err = processor
        .process(Turn::assistant("not me"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ToolcodeError::InvalidArgument(_)));
    assert_eq!(transport.request_count(), 0);
    assert!(processor.get_history().is_empty());
}

#[tokio::test]
async fn user_header_is_not_duplicated() {
    let transport = ScriptedTransport::new([Script::chunks([response("hi")])]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());

    processor.process(user_text("hello"), None).await.unwrap();
    assert_eq!(processor.get_history()[0].text, user_text("hello"));
}

#[tokio::test]
async fn history_accessors_and_reader() {
    let transport = ScriptedTransport::new([Script::chunks([response("again")])]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());
    let reader = processor.history_reader();

    processor.load_history(vec![Turn::user("earlier"), Turn::assistant("reply")]);
    assert_eq!(reader.len(), 2);

    processor.process("next", None).await.unwrap();
    assert_eq!(reader.len(), 4);
    assert_eq!(transport.requests()[0].history[0].text, "earlier");

    processor.clear_history();
    assert!(reader.is_empty());
}

#[tokio::test]
async fn system_prompt_can_be_replaced() {
    let transport = ScriptedTransport::new([Script::chunks([response("ok")])]);
    let mut processor = processor(Arc::clone(&transport), AgentConfig::default());
    assert_eq!(processor.system_prompt(), None);

    processor.set_system_prompt("be terse");
    processor.process("q", None).await.unwrap();
    assert_eq!(transport.requests()[0].system_prompt.as_deref(), Some("be terse"));
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let transport = ScriptedTransport::new(Vec::new());
    let config = AgentConfig::builder().max_cycles(0).build();
    let err = TurnProcessor::new(transport, Arc::new(test_registry()), config).unwrap_err();
    assert!(matches!(err, ToolcodeError::Configuration(_)));
}
