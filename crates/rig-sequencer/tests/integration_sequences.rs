//! Integration Tests for Sequence Execution
//!
//! 설정 로드부터 최종 상태까지 전체 실행 경로를 검증합니다:
//! - 스킵 조건, 결과 병합, 의존성 기본값
//! - 하위 에이전트 순환 검출
//! - 도구 세션 해제 (성공/실패/취소)
//! - 데모 카탈로그 전체 실행
//! - 파일 카탈로그 로더
//!
//! 에이전트는 `StubAgentRuntime`으로 대체하므로 네트워크를 쓰지 않습니다.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use rig_sequencer::testing::StubAgentRuntime;
use rig_sequencer::{
    handle, AgentDefinition, CallableTool, ConfigLoader, Dependency, FileConfigLoader, HandlerDeps,
    InMemoryConfigLoader, PromptMessage, RunRequest, Sequence, SequenceError, SequenceRunner,
    SequenceRunnerPayload, SessionState, StaticToolTransport, Step, ToolDefinition,
};

fn fixed_tool(name: &str, output: Value) -> CallableTool {
    CallableTool::from_async_fn(
        ToolDefinition::new(name, format!("{name} fixture"), json!({"type": "object", "properties": {}})),
        move |_| {
            let output = output.clone();
            async move { Ok(output) }
        },
    )
}

fn state(value: Value) -> SessionState {
    SessionState::from_value(value).unwrap()
}

async fn run(
    loader: InMemoryConfigLoader,
    transport: StaticToolTransport,
    runtime: StubAgentRuntime,
    request: RunRequest,
) -> Result<SessionState, SequenceError> {
    let mut runner = SequenceRunner::new(request, Arc::new(loader), Arc::new(transport), Arc::new(runtime));
    runner.load_configurations().await?;
    runner.run().await
}

#[tokio::test]
async fn test_opt_out_skips_agent() {
    let loader = InMemoryConfigLoader::new()
        .with_sequence(
            Sequence::new("opt-out-seq")
                .step(Step::tool("demo-detect_opt_out"))
                .step(Step::agent("reply_agent").skip_when("opt_out", true)),
        )
        .with_agent(AgentDefinition::new("reply_agent", "openai:gpt-4.1"));
    let runtime = StubAgentRuntime::new().with_response("reply_agent", json!({"reply": "should not run"}));
    let transport = StaticToolTransport::new(vec![fixed_tool("demo-detect_opt_out", json!({"opt_out": true}))]);

    let final_state = run(loader, transport, runtime.clone(), RunRequest::new("opt-out-seq", "client-123", "p"))
        .await
        .unwrap();

    assert_eq!(final_state.into_value(), json!({"opt_out": true, "client_id": "client-123"}));
    assert!(runtime.runs().is_empty());
    assert!(runtime.builds().is_empty());
}

#[tokio::test]
async fn test_optional_tone_default_reaches_agent() {
    let loader = InMemoryConfigLoader::new()
        .with_sequence(Sequence::new("tone-seq").step(Step::agent("toned")))
        .with_agent(
            AgentDefinition::new("toned", "openai:gpt-4.1")
                .with_prompt(PromptMessage::system("Answer in a {tone} tone."))
                .with_dependency(Dependency::new("tone").with_default(json!("polite"))),
        )
        .with_client("client-123", json!({"signature": "Waterloo Honda"}));
    let runtime = StubAgentRuntime::new().with_response("toned", json!({"done": true}));

    run(loader, StaticToolTransport::default(), runtime.clone(), RunRequest::new("tone-seq", "client-123", "p"))
        .await
        .unwrap();

    let recorded = &runtime.runs_of("toned")[0];
    assert_eq!(recorded.context["tone"], json!("polite"));
    assert_eq!(recorded.context["signature"], json!("Waterloo Honda"));
    assert_eq!(recorded.messages[0].content, "Answer in a polite tone.");
}

#[tokio::test]
async fn test_output_merge_rules() {
    let loader = InMemoryConfigLoader::new().with_sequence(
        Sequence::new("merge-seq")
            .step(Step::tool("demo-keyed").with_output_key("x"))
            .step(Step::tool("demo-mapping"))
            .step(Step::tool("demo-scalar")),
    );
    let transport = StaticToolTransport::new(vec![
        fixed_tool("demo-keyed", json!({"nested": 1})),
        fixed_tool("demo-mapping", json!({"a": 1, "b": 2})),
        fixed_tool("demo-scalar", json!(42)),
    ]);

    let final_state = run(loader, transport, StubAgentRuntime::new(), RunRequest::new("merge-seq", "c", "p"))
        .await
        .unwrap();

    assert_eq!(
        final_state.into_value(),
        json!({"client_id": "c", "x": {"nested": 1}, "a": 1, "b": 2, "demo-scalar_result": 42})
    );
}

#[tokio::test]
async fn test_cyclic_sub_agents_fail_the_run() {
    let loader = InMemoryConfigLoader::new()
        .with_sequence(Sequence::new("cycle-seq").step(Step::agent("a")))
        .with_agent(AgentDefinition::new("a", "openai:gpt-4.1").with_sub_agent("b"))
        .with_agent(AgentDefinition::new("b", "openai:gpt-4.1").with_sub_agent("a"));
    let transport = StaticToolTransport::default();

    let err = run(loader, transport.clone(), StubAgentRuntime::new(), RunRequest::new("cycle-seq", "c", "p"))
        .await
        .unwrap_err();

    match err {
        SequenceError::CyclicAgentDependency(chain) => assert_eq!(chain, vec!["a", "b", "a"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.active_sessions(), 0);
}

#[tokio::test]
async fn test_session_released_when_agent_fails() {
    let loader = InMemoryConfigLoader::new()
        .with_sequence(Sequence::new("fail-seq").step(Step::agent("silent")))
        .with_agent(AgentDefinition::new("silent", "openai:gpt-4.1"));
    let transport = StaticToolTransport::default();

    // 응답이 등록되지 않은 에이전트는 실패합니다
    let err = run(loader, transport.clone(), StubAgentRuntime::new(), RunRequest::new("fail-seq", "c", "p"))
        .await
        .unwrap_err();

    assert!(matches!(err, SequenceError::AgentExecution { .. }));
    assert_eq!(transport.opened_sessions(), 1);
    assert_eq!(transport.active_sessions(), 0);
}

#[tokio::test]
async fn test_cancellation_between_steps() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let second_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&second_calls);

    let first = CallableTool::from_async_fn(ToolDefinition::new("demo-first", "", json!({})), move |_| {
        trigger.cancel();
        async { Ok(json!({"first": "done"})) }
    });
    let second = CallableTool::from_async_fn(ToolDefinition::new("demo-second", "", json!({})), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(json!({"second": "done"})) }
    });

    let loader = InMemoryConfigLoader::new().with_sequence(
        Sequence::new("cancel-seq")
            .step(Step::tool("demo-first"))
            .step(Step::tool("demo-second")),
    );
    let transport = StaticToolTransport::new(vec![first, second]);

    let mut runner = SequenceRunner::new(
        RunRequest::new("cancel-seq", "c", "p"),
        Arc::new(loader),
        Arc::new(transport.clone()),
        Arc::new(StubAgentRuntime::new()),
    );
    runner.load_configurations().await.unwrap();
    let err = runner.run_with_cancellation(&token).await.unwrap_err();

    assert!(matches!(err, SequenceError::Cancelled(step) if step == "demo-second"));
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.active_sessions(), 0);
}

#[tokio::test]
async fn test_repeated_step_ids_run_twice() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let tool = CallableTool::from_async_fn(ToolDefinition::new("demo-send_reply", "", json!({})), move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok(json!(n)) }
    });
    let loader = InMemoryConfigLoader::new().with_sequence(
        Sequence::new("twice")
            .step(Step::tool("demo-send_reply"))
            .step(Step::tool("demo-send_reply")),
    );

    let final_state = run(loader, StaticToolTransport::new(vec![tool]), StubAgentRuntime::new(), RunRequest::new("twice", "c", "p"))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(final_state.get("demo-send_reply_result"), Some(&json!(2)));
}

/// 데모 카탈로그가 참조하는 모든 도구
fn demo_tools(opt_out: bool) -> Vec<CallableTool> {
    vec![
        fixed_tool("demo-detect_opt_out", json!(opt_out)),
        fixed_tool("demo-get_journey_instruction", json!("Mention the spring sales event")),
        fixed_tool("demo-append_signature", json!("Best regards, Waterloo Honda")),
        fixed_tool("demo-send_reply", json!({"sent": true})),
        fixed_tool("demo-get_conversation_history", json!([])),
        fixed_tool("demo-get_appointment_hours", json!({"weekdays": "9-6"})),
        CallableTool::from_async_fn(
            ToolDefinition::new(
                "demo-get_inventory_information",
                "Inventory lookup",
                json!({"type": "object", "properties": {"model": {}, "client_id": {}}}),
            ),
            |input| async move { Ok(json!({"query": input, "in_stock": 3})) },
        ),
        fixed_tool("demo-schedule_appointment", json!({"booked": false})),
        fixed_tool("demo-get_current_time", json!("10:30")),
    ]
}

fn demo_runtime() -> StubAgentRuntime {
    StubAgentRuntime::new()
        .with_response("detect_unsubscribe", json!({"unsubscribe": false, "reply": ""}))
        .with_tool_call("reply_agent", "demo-get_inventory_information", json!({"model": "Civic"}))
        .with_response(
            "reply_agent",
            json!({
                "channel": "email",
                "content": {"greeting": "Hi!", "body": "<span>We have 3 Civics.</span>"},
                "missing_information": ["price"]
            }),
        )
        .with_response("assess_human_takeover", json!({"hto_required": true}))
}

fn demo_request() -> RunRequest {
    RunRequest::new("test-seq", "client-123", "product-1")
        .with_initial_state(state(json!({"incoming_message": {"content": "Do you have a Civic?"}})))
}

#[tokio::test]
async fn test_demo_sequence_full_path() {
    let runtime = demo_runtime();
    let final_state = run(
        InMemoryConfigLoader::demo().unwrap(),
        StaticToolTransport::new(demo_tools(false)),
        runtime.clone(),
        demo_request(),
    )
    .await
    .unwrap();

    assert_eq!(final_state.get("unsubscribe_result"), Some(&json!({"unsubscribe": false, "reply": ""})));
    assert_eq!(final_state.get("demo-detect_opt_out_result"), Some(&json!(false)));
    assert_eq!(final_state.get("journey_instructions"), Some(&json!("Mention the spring sales event")));
    assert_eq!(final_state.lookup("reply[channel]"), Some(&json!("email")));
    assert_eq!(final_state.get("hto_required"), Some(&json!(true)));
    assert_eq!(final_state.get("demo-append_signature_result"), Some(&json!("Best regards, Waterloo Honda")));
    assert_eq!(final_state.get("sent"), Some(&json!(true)));

    // required default가 클라이언트 설정(angelic)을 이깁니다
    let reply_run = &runtime.runs_of("reply_agent")[0];
    assert_eq!(reply_run.context["preferred_tone"], json!("polite"));
    assert!(reply_run.messages[0].content.contains("a tone close to polite"));
    assert!(reply_run.messages[0].content.contains("- Mention the spring sales event."));
    assert_eq!(reply_run.messages[1].content, "Do you have a Civic?");

    // 바인딩된 컨텍스트가 선언된 인자만큼 도구에 전달됩니다
    let (tool_name, result) = &reply_run.tool_results[0];
    assert_eq!(tool_name, "demo-get_inventory_information");
    assert_eq!(
        result.as_ref().unwrap(),
        &json!({"query": {"model": "Civic", "client_id": "client-123"}, "in_stock": 3})
    );

    let assess_run = &runtime.runs_of("assess_human_takeover")[0];
    assert_eq!(assess_run.messages[1].content, "Missing information: [\"price\"]");
}

#[tokio::test]
async fn test_demo_sequence_opt_out_path() {
    let runtime = demo_runtime();
    let final_state = run(
        InMemoryConfigLoader::demo().unwrap(),
        StaticToolTransport::new(demo_tools(true)),
        runtime.clone(),
        demo_request(),
    )
    .await
    .unwrap();

    assert_eq!(final_state.get("demo-detect_opt_out_result"), Some(&json!(true)));
    assert!(!final_state.contains_key("journey_instructions"));
    assert!(!final_state.contains_key("reply"));
    assert!(!final_state.contains_key("hto_required"));
    assert_eq!(final_state.get("sent"), Some(&json!(true)));
    assert!(runtime.runs_of("reply_agent").is_empty());
    assert_eq!(runtime.runs_of("detect_unsubscribe").len(), 1);
}

#[tokio::test]
async fn test_agent_as_tool_sequence() {
    let runtime = StubAgentRuntime::new()
        .with_tool_call("mock-customer", "detect-tone", json!({"incoming_message": "This is ridiculous!"}))
        .with_response("mock-customer", json!({"reply": "Oh, is it *ridiculous*?"}))
        .with_response("detect-tone", json!({"tone": "Annoyed"}));

    let final_state = run(
        InMemoryConfigLoader::demo().unwrap(),
        StaticToolTransport::default(),
        runtime.clone(),
        RunRequest::new("agent-as-tool-seq", "client-123", "p")
            .with_initial_state(state(json!({"incoming_message": {"content": "This is ridiculous!"}}))),
    )
    .await
    .unwrap();

    assert_eq!(final_state.get("reply"), Some(&json!("Oh, is it *ridiculous*?")));

    let parent_build = runtime.builds().into_iter().find(|b| b.agent_id == "mock-customer").unwrap();
    assert_eq!(parent_build.tools[0].name, "detect-tone");
    assert_eq!(parent_build.tools[0].parameters["properties"], json!({"incoming_message": {}}));

    let parent_run = &runtime.runs_of("mock-customer")[0];
    assert_eq!(parent_run.tool_results[0].1.as_ref().unwrap(), &json!({"tone": "Annoyed"}));
}

#[tokio::test]
async fn test_handler_reports_missing_prompt_key() {
    let deps = HandlerDeps::new(
        Arc::new(InMemoryConfigLoader::demo().unwrap()),
        Arc::new(StaticToolTransport::new(demo_tools(false))),
        Arc::new(demo_runtime()),
    );
    // incoming_message 없음 → 첫 스텝의 동적 인자 해석 실패
    let payload: SequenceRunnerPayload = serde_json::from_value(json!({
        "sequence_id": "test-seq",
        "client_id": "client-123",
        "product_id": "product-1"
    }))
    .unwrap();

    let response = handle(payload, &deps).await;

    assert_eq!(response.status_code, 500);
    assert_eq!(
        response.body_json().unwrap(),
        json!({"message": "Missing key 'incoming_message' in state for argument 'incoming_message'"})
    );
}

const CATALOG_YAML: &str = r#"
sequences:
  greet:
    id: greet
    steps:
      - type: tool
        id: demo-greet
        arguments:
          name: { type: dynamic, value: "customer.name" }
          greeting: { type: static, value: Hello }
        output_key: greeting
clients:
  client-9:
    locale: en-CA
"#;

#[tokio::test]
async fn test_file_loader_runs_yaml_catalog() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(CATALOG_YAML.as_bytes()).unwrap();

    let loader = FileConfigLoader::from_path(file.path()).await.unwrap();
    assert_eq!(loader.load_client_config("client-9").await.unwrap()["locale"], json!("en-CA"));

    let greet = CallableTool::from_async_fn(
        ToolDefinition::new(
            "demo-greet",
            "Greets",
            json!({"type": "object", "properties": {"name": {}, "greeting": {}}}),
        ),
        |input| async move {
            let greeting = input.get("greeting").and_then(Value::as_str).unwrap_or_default().to_string();
            let name = input.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            Ok(Value::String(format!("{greeting}, {name}")))
        },
    );

    let mut runner = SequenceRunner::new(
        RunRequest::new("greet", "client-9", "p").with_initial_state(state(json!({"customer": {"name": "Sam"}}))),
        Arc::new(loader),
        Arc::new(StaticToolTransport::new(vec![greet])),
        Arc::new(StubAgentRuntime::new()),
    );
    runner.load_configurations().await.unwrap();
    let final_state = runner.run().await.unwrap();

    assert_eq!(final_state.get("greeting"), Some(&json!("Hello, Sam")));
}

#[tokio::test]
async fn test_file_loader_rejects_invalid_json() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(b"{\"sequences\": [").unwrap();

    let err = FileConfigLoader::from_path(file.path()).await.unwrap_err();
    assert!(err.is_configuration_error());
}
