//! JSON-RPC 2.0 envelope types and the method dispatcher (§6).
//!
//! `Dispatcher` owns the long-lived [`SessionManager`] and
//! [`AsyncAgentManager`] and routes each inbound `JsonRpcRequest` to the
//! matching runtime operation, mapping [`RuntimeError`] onto the JSON-RPC
//! error codes §7 assigns them. Shares `gateway/{routes,ws}.rs`'s
//! request/response shape, generalized from a REST route table to a
//! single `method` dispatch since the wire contract here is JSON-RPC
//! rather than per-route HTTP handlers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::async_agent::{AsyncAgentManager, WorkerState};
use crate::channel::ChannelKind;
use crate::error::{RuntimeError, rpc_code};
use crate::session::SessionManager;

/// A JSON-RPC 2.0 request (§6: "requests (id present, response expected)").
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_jsonrpc_version")]
    pub jsonrpc: String,
    /// Absent on notifications; this dispatcher always produces a response,
    /// so callers that send a notification (no `id`) should discard it.
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

fn default_jsonrpc_version() -> String {
    "2.0".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// A JSON-RPC 2.0 response. Exactly one of `result`/`error` is set, per
/// the protocol's mutual exclusivity rule.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    fn err(id: Value, error: RuntimeError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code: error.to_rpc_code(), message: error.to_string() }),
        }
    }
}

/// Routes JSON-RPC requests onto [`SessionManager`] / [`AsyncAgentManager`]
/// calls (§6 method table). One instance per running gateway; shared
/// across all connections.
pub struct Dispatcher {
    sessions: Arc<SessionManager>,
    async_agents: Arc<AsyncAgentManager>,
}

impl Dispatcher {
    pub fn new(sessions: Arc<SessionManager>, async_agents: Arc<AsyncAgentManager>) -> Self {
        Self { sessions, async_agents }
    }

    /// The session registry this dispatcher routes to — exposed so the
    /// gateway's WebSocket handler can subscribe to a newly started
    /// session's notification bus without duplicating lookup logic.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Parse and dispatch a raw inbound text frame, returning the reply
    /// frame text (`None` when `raw` carried no `id`, i.e. a notification
    /// — the core §6 table names no client-to-server notifications, but
    /// the envelope stays symmetric per §6).
    pub async fn handle_text(&self, raw: &str) -> Option<String> {
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(r) => r,
            Err(e) => {
                let response = JsonRpcResponse::err(Value::Null, RuntimeError::TransportParse(e.to_string()));
                return Some(serde_json::to_string(&response).unwrap_or_default());
            }
        };
        let id = request.id.clone();
        let response = self.dispatch(request).await;
        id.map(|_| serde_json::to_string(&response).unwrap_or_default())
    }

    /// Dispatch one parsed request to its handler (§6 method table).
    pub async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);
        let result = self.route(&request.method, request.params).await;
        match result {
            Ok(value) => JsonRpcResponse::ok(id, value),
            Err(error) => JsonRpcResponse::err(id, error),
        }
    }

    async fn route(&self, method: &str, params: Value) -> Result<Value, RuntimeError> {
        match method {
            "startSession" => self.start_session(params).await,
            "sendUserMessage" => self.send_user_message(params).await,
            "provideToolResult" => self.provide_tool_result(params),
            "stopSession" => self.stop_session(params).await,
            "agent.list" => self.agent_list(),
            "session.switch_agent" => self.session_switch_agent(params).await,
            "session.current_agent" => self.session_current_agent(params).await,
            "session.handoff" => self.session_handoff(params).await,
            "channel.history" => self.channel_history(params).await,
            "channel.updateVisibility" => self.channel_update_visibility(params).await,
            "channel.stats" => self.channel_stats(params).await,
            "async.createAgent" => self.async_create_agent(params),
            "async.startAgent" => self.async_start_agent(params),
            "async.stopAgent" => self.async_stop_agent(params),
            "async.sleepAgent" => self.async_sleep_agent(params),
            "async.wakeAgent" => self.async_wake_agent(params),
            "async.sendTask" => self.async_send_task(params),
            "async.getAgentStates" => self.async_get_agent_states(),
            "async.broadcastEvent" => self.async_broadcast_event(params),
            other => Err(RuntimeError::MethodNotFound(other.to_string())),
        }
    }

    fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, RuntimeError> {
        params
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| RuntimeError::InvalidRequest(format!("missing field '{field}'")))
    }

    fn optional_session_id(&self, params: &Value) -> Result<String, RuntimeError> {
        match params.get("sessionId").and_then(Value::as_str) {
            Some(s) => Ok(s.to_string()),
            None => Err(RuntimeError::InvalidRequest("missing field 'sessionId'".to_string())),
        }
    }

    async fn start_session(&self, params: Value) -> Result<Value, RuntimeError> {
        let _user_id = Self::require_str(&params, "userId")?;
        let handle = self.sessions.create();
        let status = handle.start().await.map(|_| 1u8).unwrap_or(3u8);
        Ok(json!({"sessionId": handle.id, "status": status}))
    }

    async fn send_user_message(&self, params: Value) -> Result<Value, RuntimeError> {
        let session_id = self.optional_session_id(&params)?;
        let message = Self::require_str(&params, "message")?;
        let handle = self.sessions.find(&session_id)?;
        let report = handle.send_user_message(message).await?;
        Ok(json!({
            "messageId": uuid::Uuid::new_v4().to_string(),
            "status": 0,
            "ai_response": report.ai_response,
            "tool_calls": report.tool_calls,
        }))
    }

    /// Tool results submitted asynchronously by a client-side tool
    /// implementation (§1: leaf tools are out of scope). The core's
    /// built-in tools run entirely server-side inside the agent loop, so
    /// this endpoint only acknowledges receipt; a deployment with genuine
    /// client-executed tools would route `result` back into the awaiting
    /// tool call, which this crate does not implement.
    fn provide_tool_result(&self, params: Value) -> Result<Value, RuntimeError> {
        let _session_id = self.optional_session_id(&params)?;
        let _tool_call_id = Self::require_str(&params, "toolCallId")?;
        Ok(json!({"status": 0}))
    }

    async fn stop_session(&self, params: Value) -> Result<Value, RuntimeError> {
        let session_id = self.optional_session_id(&params)?;
        let handle = self.sessions.find(&session_id)?;
        handle.stop().await;
        self.sessions.destroy(&session_id);
        Ok(json!({"status": 2}))
    }

    fn agent_list(&self) -> Result<Value, RuntimeError> {
        let catalog = self.sessions.catalog();
        let agents: Vec<Value> = catalog
            .ids()
            .into_iter()
            .filter_map(|id| catalog.get(&id).map(|t| (id, t)))
            .map(|(id, template)| {
                json!({
                    "agent_id": id,
                    "name": template.config.name,
                    "role": template.config.role,
                    "description": template.config.description,
                    "color": template.config.color,
                    "shortcut": template.config.shortcut,
                    "icon": template.config.icon,
                })
            })
            .collect();
        Ok(json!({"agents": agents}))
    }

    async fn session_switch_agent(&self, params: Value) -> Result<Value, RuntimeError> {
        let agent_id = Self::require_str(&params, "agent_id")?;
        let session_id = self.optional_session_id(&params)?;
        let handle = self.sessions.find(&session_id)?;
        match handle.switch_agent(agent_id).await {
            Ok(()) => Ok(json!({"success": true, "current_agent": agent_id})),
            Err(_) => Ok(json!({"success": false, "current_agent": handle.current_agent().await})),
        }
    }

    async fn session_current_agent(&self, params: Value) -> Result<Value, RuntimeError> {
        let session_id = self.optional_session_id(&params)?;
        let handle = self.sessions.find(&session_id)?;
        Ok(json!({"current_agent": handle.current_agent().await}))
    }

    async fn session_handoff(&self, params: Value) -> Result<Value, RuntimeError> {
        let to_agent = Self::require_str(&params, "to_agent")?;
        let session_id = self.optional_session_id(&params)?;
        let handle = self.sessions.find(&session_id)?;
        let from_agent = handle.current_agent().await;
        let success = handle.switch_agent(to_agent).await.is_ok();
        Ok(json!({"success": success, "from_agent": from_agent, "to_agent": to_agent}))
    }

    async fn channel_history(&self, params: Value) -> Result<Value, RuntimeError> {
        let session_id = self.optional_session_id(&params)?;
        let handle = self.sessions.find(&session_id)?;
        let channels: Vec<ChannelKind> = params
            .get("channels")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .filter_map(|s| match s {
                        "analysis" => Some(ChannelKind::Analysis),
                        "commentary" => Some(ChannelKind::Commentary),
                        "final" => Some(ChannelKind::Final),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let since = params.get("sinceSequence").and_then(Value::as_u64).unwrap_or(0);
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(u64::MAX) as usize;
        let (messages, total) = handle.channel_history(&channels, since, limit).await;
        Ok(json!({"messages": messages, "totalCount": total}))
    }

    async fn channel_update_visibility(&self, params: Value) -> Result<Value, RuntimeError> {
        let session_id = self.optional_session_id(&params)?;
        let handle = self.sessions.find(&session_id)?;
        let show_commentary = params.get("showCommentary").and_then(Value::as_bool).unwrap_or(false);
        let show_analysis = params.get("showAnalysis").and_then(Value::as_bool).unwrap_or(false);
        handle.update_visibility(show_commentary, show_analysis).await;
        Ok(json!({"success": true, "sessionId": session_id}))
    }

    async fn channel_stats(&self, params: Value) -> Result<Value, RuntimeError> {
        let session_id = self.optional_session_id(&params)?;
        let handle = self.sessions.find(&session_id)?;
        let stats = handle.channel_stats().await;
        serde_json::to_value(stats).map_err(|e| RuntimeError::Internal(e.to_string()))
    }

    fn async_create_agent(&self, params: Value) -> Result<Value, RuntimeError> {
        let id = Self::require_str(&params, "agent_id")?;
        let name = params.get("name").and_then(Value::as_str).unwrap_or(id);
        let system_prompt = params.get("system_prompt").and_then(Value::as_str).unwrap_or("");
        let config = crate::agent::AgentConfig::new(id, name).with_system_prompt(system_prompt);
        let handle = self.async_agents.create_agent(config);
        Ok(json!({"agent_id": handle.id, "state": worker_state_name(handle.state())}))
    }

    fn async_start_agent(&self, params: Value) -> Result<Value, RuntimeError> {
        let id = Self::require_str(&params, "agent_id")?;
        let handle = self.async_agents.find(id)?;
        handle.start();
        Ok(json!({"agent_id": id, "state": worker_state_name(handle.state())}))
    }

    fn async_stop_agent(&self, params: Value) -> Result<Value, RuntimeError> {
        let id = Self::require_str(&params, "agent_id")?;
        let handle = self.async_agents.find(id)?;
        handle.stop();
        Ok(json!({"agent_id": id, "state": worker_state_name(handle.state())}))
    }

    fn async_sleep_agent(&self, params: Value) -> Result<Value, RuntimeError> {
        let id = Self::require_str(&params, "agent_id")?;
        let handle = self.async_agents.find(id)?;
        let wake_events: Vec<String> = params
            .get("wake_events")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        handle.sleep(wake_events);
        Ok(json!({"agent_id": id, "state": "sleeping"}))
    }

    fn async_wake_agent(&self, params: Value) -> Result<Value, RuntimeError> {
        let id = Self::require_str(&params, "agent_id")?;
        let handle = self.async_agents.find(id)?;
        handle.wake();
        Ok(json!({"agent_id": id, "state": worker_state_name(handle.state())}))
    }

    fn async_send_task(&self, params: Value) -> Result<Value, RuntimeError> {
        let id = Self::require_str(&params, "agent_id")?;
        let prompt = Self::require_str(&params, "prompt")?;
        let handle = self.async_agents.find(id)?;
        handle.send_task(prompt);
        Ok(json!({"agent_id": id, "accepted": true}))
    }

    fn async_get_agent_states(&self) -> Result<Value, RuntimeError> {
        let states: Vec<Value> = self
            .async_agents
            .states()
            .into_iter()
            .map(|(id, state)| json!({"agent_id": id, "state": worker_state_name(state)}))
            .collect();
        Ok(json!({"agents": states}))
    }

    fn async_broadcast_event(&self, params: Value) -> Result<Value, RuntimeError> {
        let event = Self::require_str(&params, "event")?;
        self.async_agents.broadcast_event(event);
        Ok(json!({"success": true}))
    }
}

fn worker_state_name(state: WorkerState) -> &'static str {
    match state {
        WorkerState::Idle => "idle",
        WorkerState::Busy => "busy",
        WorkerState::Sleeping => "sleeping",
        WorkerState::Stopped => "stopped",
    }
}
