//! End-to-end scenarios exercising the runtime through the public
//! `Dispatcher`/`SessionManager` surface, the way a gateway client would
//! drive it over JSON-RPC. Plain `#[test]`/`#[tokio::test]` functions
//! grouped by scenario, no shared test harness crate.

use std::sync::Arc;

use mindmesh::agent::AgentConfig;
use mindmesh::mailbox::Mailbox;
use mindmesh::model::mock::MockModelProvider;
use mindmesh::model::{ContinuationDirective, ContinuationStatus, ModelTurnResult, ToolCall};
use mindmesh::rpc::{Dispatcher, JsonRpcRequest};
use mindmesh::session::{AgentCatalog, AgentTemplate, SessionManager};
use mindmesh::tools::{CheckMailTool, SendMailWithSwitchTool, ToolFilterSpec, ToolRegistry};
use mindmesh::async_agent::AsyncAgentManager;

use serde_json::{Value, json};

fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
    serde_json::from_value(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})).unwrap()
}

fn single_agent_dispatcher(script: Vec<ModelTurnResult>) -> Dispatcher {
    let catalog = Arc::new(
        AgentCatalog::new("assistant").with_agent(AgentTemplate::new(
            AgentConfig::new("assistant", "Assistant")
                .with_description("the default conversational agent")
                .with_role("default")
                .with_system_prompt("You are a helpful assistant.")
                .with_model("mock", "mock-1"),
        )),
    );
    let registry = Arc::new(ToolRegistry::new());
    let provider: Arc<dyn mindmesh::model::ModelProvider> = Arc::new(MockModelProvider::new(script));
    let sessions = Arc::new(SessionManager::new(
        catalog,
        registry.clone(),
        Arc::new(Mailbox::new()),
        provider.clone(),
        None,
        std::env::temp_dir(),
        3,
        5,
    ));
    let async_agents = Arc::new(AsyncAgentManager::new(registry, provider));
    Dispatcher::new(sessions, async_agents)
}

/// Scenario 1 (§8): a session starts with no prior history and its default
/// agent becomes active without driving a model turn.
#[tokio::test]
async fn scenario_1_default_start_activates_default_agent_with_no_turn() {
    let dispatcher = single_agent_dispatcher(vec![]);

    let start = dispatcher.dispatch(request(1, "startSession", json!({"userId": "u1"}))).await;
    let result = start.result.expect("startSession should succeed");
    let session_id = result["sessionId"].as_str().unwrap().to_string();
    assert_eq!(result["status"], json!(1));

    let current = dispatcher
        .dispatch(request(2, "session.current_agent", json!({"sessionId": session_id})))
        .await;
    assert_eq!(current.result.unwrap()["current_agent"], json!("assistant"));
}

/// Scenario 2 (§8): a plain-text turn round-trips the model's response
/// back to the caller untouched.
#[tokio::test]
async fn scenario_2_simple_turn_returns_model_text() {
    let dispatcher = single_agent_dispatcher(vec![ModelTurnResult::Text("General Kenobi.".into())]);

    let start = dispatcher.dispatch(request(1, "startSession", json!({"userId": "u1"}))).await;
    let session_id = start.result.unwrap()["sessionId"].as_str().unwrap().to_string();

    let sent = dispatcher
        .dispatch(request(2, "sendUserMessage", json!({"sessionId": session_id, "message": "Hello there"})))
        .await;
    let result = sent.result.unwrap();
    assert_eq!(result["ai_response"], json!("General Kenobi."));
    assert_eq!(result["tool_calls"], json!([]));
}

/// Scenario 3 (§8): a structured `{analysis, commentary, final}` turn with
/// an immediate `TERMINATE` directive surfaces only the `final` fragment as
/// the visible reply, and `channel.history` retains all three channels.
#[tokio::test]
async fn scenario_3_structured_turn_surfaces_final_and_retains_channel_history() {
    let dispatcher = single_agent_dispatcher(vec![ModelTurnResult::Structured {
        analysis: "the user wants a greeting".into(),
        commentary: "keeping this brief".into(),
        r#final: "Hello!".into(),
        continuation: Some(ContinuationDirective { status: ContinuationStatus::Terminate, reason: None }),
    }]);

    let start = dispatcher.dispatch(request(1, "startSession", json!({"userId": "u1"}))).await;
    let session_id = start.result.unwrap()["sessionId"].as_str().unwrap().to_string();

    let sent = dispatcher
        .dispatch(request(2, "sendUserMessage", json!({"sessionId": session_id, "message": "hi"})))
        .await;
    assert_eq!(sent.result.unwrap()["ai_response"], json!("Hello!"));

    let history = dispatcher
        .dispatch(request(
            3,
            "channel.history",
            json!({"sessionId": session_id, "channels": ["analysis", "commentary", "final"]}),
        ))
        .await;
    let messages = history.result.unwrap()["messages"].as_array().unwrap().clone();
    assert_eq!(messages.len(), 3);
}

/// Scenario 4 (§8): a `CONTINUE` directive re-enters the model loop until a
/// later turn declares `TERMINATE`, and the reported continuation depth
/// reflects how many re-entries happened (capped back to 0 once the
/// terminal turn lands, per `TurnReport`'s depth-at-completion contract).
#[tokio::test]
async fn scenario_4_continuation_directive_drives_a_multi_turn_reply() {
    let dispatcher = single_agent_dispatcher(vec![
        ModelTurnResult::Structured {
            analysis: String::new(),
            commentary: String::new(),
            r#final: "working on it".into(),
            continuation: Some(ContinuationDirective {
                status: ContinuationStatus::Continue,
                reason: Some("need another pass".into()),
            }),
        },
        ModelTurnResult::Structured {
            analysis: String::new(),
            commentary: String::new(),
            r#final: "done".into(),
            continuation: Some(ContinuationDirective { status: ContinuationStatus::Terminate, reason: None }),
        },
    ]);

    let start = dispatcher.dispatch(request(1, "startSession", json!({"userId": "u1"}))).await;
    let session_id = start.result.unwrap()["sessionId"].as_str().unwrap().to_string();

    let sent = dispatcher
        .dispatch(request(2, "sendUserMessage", json!({"sessionId": session_id, "message": "go"})))
        .await;
    let result = sent.result.unwrap();
    assert_eq!(result["ai_response"], json!("done"));
    assert_eq!(result["status"], json!(0));
}

/// Scenario 5 (§8): one agent hands a task to another via
/// `send_mail_with_switch`; the callee runs a nested turn, its reply is
/// appended to the caller's response, and the caller's agent is restored as
/// active once the nested turn returns.
#[tokio::test]
async fn scenario_5_agent_switch_via_mail_runs_nested_turn_and_restores_caller() {
    let catalog = Arc::new(
        AgentCatalog::new("planner")
            .with_agent(AgentTemplate::new(
                AgentConfig::new("planner", "Planner")
                    .with_system_prompt("plans work")
                    .with_tool_filter(ToolFilterSpec { allow: vec!["send_mail_with_switch".into()], ..Default::default() }),
            ))
            .with_agent(AgentTemplate::new(
                AgentConfig::new("worker", "Worker")
                    .with_system_prompt("executes tasks")
                    .with_tool_filter(ToolFilterSpec { allow: vec!["check_mail".into()], ..Default::default() }),
            )),
    );

    let mailbox = Arc::new(Mailbox::new());
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(SendMailWithSwitchTool::new(mailbox.clone())));
    registry.register(Arc::new(CheckMailTool::new(mailbox.clone())));

    let call = ToolCall {
        id: "call-1".to_string(),
        name: "send_mail_with_switch".to_string(),
        arguments: json!({"to_agent": "worker", "subject": "task", "body": "please build the report"}),
    };
    let provider: Arc<dyn mindmesh::model::ModelProvider> = Arc::new(MockModelProvider::new(vec![
        ModelTurnResult::ToolCalls { content: String::new(), calls: vec![call] },
        ModelTurnResult::Text("mail sent".into()),
        ModelTurnResult::Text("report built".into()),
    ]));

    let sessions = Arc::new(SessionManager::new(
        catalog,
        registry.clone(),
        mailbox,
        provider.clone(),
        None,
        std::env::temp_dir(),
        3,
        5,
    ));
    let async_agents = Arc::new(AsyncAgentManager::new(registry, provider));
    let dispatcher = Dispatcher::new(sessions, async_agents);

    let start = dispatcher.dispatch(request(1, "startSession", json!({"userId": "u1"}))).await;
    let session_id = start.result.unwrap()["sessionId"].as_str().unwrap().to_string();

    let sent = dispatcher
        .dispatch(request(2, "sendUserMessage", json!({"sessionId": session_id, "message": "hand this to worker"})))
        .await;
    let response = sent.result.unwrap()["ai_response"].as_str().unwrap().to_string();
    assert!(response.contains("mail sent"));
    assert!(response.contains("report built"));

    let current = dispatcher
        .dispatch(request(3, "session.current_agent", json!({"sessionId": session_id})))
        .await;
    assert_eq!(current.result.unwrap()["current_agent"], json!("planner"));
}

/// Scenario 6 (§8): an agent that mails a target already on the active
/// switch stack is rejected with a circular-mail warning instead of
/// recursing forever, and the caller keeps control.
#[tokio::test]
async fn scenario_6_circular_mail_is_rejected_without_recursing() {
    let catalog = Arc::new(
        AgentCatalog::new("a")
            .with_agent(AgentTemplate::new(
                AgentConfig::new("a", "A")
                    .with_system_prompt("a prompt")
                    .with_tool_filter(ToolFilterSpec { allow: vec!["send_mail_with_switch".into()], ..Default::default() }),
            ))
            .with_agent(AgentTemplate::new(
                AgentConfig::new("b", "B")
                    .with_system_prompt("b prompt")
                    .with_tool_filter(ToolFilterSpec { allow: vec!["send_mail_with_switch".into()], ..Default::default() }),
            )),
    );

    let mailbox = Arc::new(Mailbox::new());
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(SendMailWithSwitchTool::new(mailbox.clone())));

    let a_to_b = ToolCall {
        id: "call-1".to_string(),
        name: "send_mail_with_switch".to_string(),
        arguments: json!({"to_agent": "b", "subject": "s", "body": "please handle"}),
    };
    let b_to_a = ToolCall {
        id: "call-2".to_string(),
        name: "send_mail_with_switch".to_string(),
        arguments: json!({"to_agent": "a", "subject": "s", "body": "back to you"}),
    };
    let provider: Arc<dyn mindmesh::model::ModelProvider> = Arc::new(MockModelProvider::new(vec![
        // a's round 1: request the mail-and-switch tool call.
        ModelTurnResult::ToolCalls { content: String::new(), calls: vec![a_to_b] },
        // a's round 2, after the tool result is appended: plain text, then
        // the session performs the nested switch into b.
        ModelTurnResult::Text("mail sent".into()),
        // b's round 1: mail a back, which is already on the switch stack.
        ModelTurnResult::ToolCalls { content: String::new(), calls: vec![b_to_a] },
        // b's round 2, after its own tool result (the rejected switch) is
        // appended.
        ModelTurnResult::Text("noted".into()),
    ]));

    let sessions = Arc::new(SessionManager::new(
        catalog,
        registry.clone(),
        mailbox,
        provider.clone(),
        None,
        std::env::temp_dir(),
        3,
        5,
    ));
    let async_agents = Arc::new(AsyncAgentManager::new(registry, provider));
    let dispatcher = Dispatcher::new(sessions, async_agents);

    let start = dispatcher.dispatch(request(1, "startSession", json!({"userId": "u1"}))).await;
    let session_id = start.result.unwrap()["sessionId"].as_str().unwrap().to_string();

    let sent = dispatcher
        .dispatch(request(2, "sendUserMessage", json!({"sessionId": session_id, "message": "hand this to b"})))
        .await;
    let response = sent.result.unwrap()["ai_response"].as_str().unwrap().to_string();
    assert!(response.contains("Circular mail detected"));

    let current = dispatcher
        .dispatch(request(3, "session.current_agent", json!({"sessionId": session_id})))
        .await;
    assert_eq!(current.result.unwrap()["current_agent"], json!("a"));
}
