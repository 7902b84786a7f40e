//! Wire-neutral message and turn types shared between the agent loop, the
//! channel router, and model provider adapters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single message role, following the common chat-completion convention
/// (§3 Context: `role ∈ {system, user, assistant, tool}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in an agent's [`crate::agent::context::Context`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Present on an assistant message that requested tool calls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Present on a `tool` role message — must reference a prior assistant
    /// tool-call id (§3 Context invariant).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A request to a [`crate::model::ModelProvider`].
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<crate::tools::ToolInfo>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// A JSON schema the response must conform to (§4.10 structured-output
    /// policy) — `None` means plain-text/tool-call mode.
    pub response_schema: Option<Value>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            temperature: None,
            max_tokens: None,
            response_schema: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<crate::tools::ToolInfo>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn with_max_tokens(mut self, m: u32) -> Self {
        self.max_tokens = Some(m);
        self
    }

    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// One chunk of a streaming response, forwarded to the channel router as it
/// arrives (§4.4, §5 "Streaming chunks are delivered ... on a background
/// task").
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub delta: String,
}

/// The tagged union a model turn normalizes to (§9 Design Notes: "a tagged
/// union `ModelTurnResult`"), replacing the source's duck-typed dict.
#[derive(Debug, Clone)]
pub enum ModelTurnResult {
    /// Plain, unstructured text.
    Text(String),
    /// The model requested one or more tool calls instead of (or alongside)
    /// text.
    ToolCalls {
        content: String,
        calls: Vec<ToolCall>,
    },
    /// A structured `{analysis, commentary, final}` response, optionally
    /// carrying a continuation directive.
    Structured {
        analysis: String,
        commentary: String,
        r#final: String,
        continuation: Option<ContinuationDirective>,
    },
    /// An upstream provider error (§7 ModelError) — recorded, never raised.
    Error { message: String },
}

impl ModelTurnResult {
    /// The user-visible text for this turn, independent of its shape.
    pub fn visible_text(&self) -> &str {
        match self {
            ModelTurnResult::Text(t) => t,
            ModelTurnResult::ToolCalls { content, .. } => content,
            ModelTurnResult::Structured { r#final, .. } => r#final,
            ModelTurnResult::Error { message } => message,
        }
    }
}

/// `continuation.status` as the model declares it (§3 ContinuationState, §8
/// scenario 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContinuationStatus {
    Continue,
    Terminate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationDirective {
    pub status: ContinuationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
