//! The [`Tool`] capability trait and its invocation result (§3 Data Model:
//! Tool). Generalized with a
//! `category`/`tags`/`tool_sets` membership surface for the [`super::filter`]
//! module and an optional `_switch_to_agent` hint the Switch Handler (C8)
//! interprets (§3: "A tool MAY declare permissions...").

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The result of executing a [`Tool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Human-readable output surfaced to the model as a tool-role message.
    pub output: String,
    pub success: bool,
    /// Set when `success` is false; appended to the tool-role message's
    /// `error` field (§4.7 step 5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set by tools that trigger a synchronous agent switch
    /// (`send_mail_with_switch`); interpreted by the Switch Handler (C8).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_to_agent: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            error: None,
            switch_to_agent: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            output: message.clone(),
            success: false,
            error: Some(message),
            switch_to_agent: None,
        }
    }

    pub fn with_switch_to_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.switch_to_agent = Some(agent_id.into());
        self
    }
}

/// Metadata surfaced to the model describing an available tool (the
/// `tools` array of a [`crate::model::CompletionRequest`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// The calling agent's identity, passed to every tool invocation (§3:
/// "invoke(args, caller-ctx) → result"). Tools that need to know who is
/// calling them — `send_mail` populating its `from_agent` field being the
/// prototypical example — read this instead of taking it as an argument.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub agent_id: String,
    pub session_id: String,
}

/// A capability the agent loop can invoke. Tools are shared singletons;
/// invocation is stateless per call (§3: "invocation is stateless per
/// call").
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable, unique machine identifier (snake_case), e.g. `"send_mail"`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema object describing accepted arguments.
    fn parameters_schema(&self) -> Value;

    /// Category used by `describe_for_model` grouping and by the project's
    /// prompt instructions block.
    fn category(&self) -> &str {
        "general"
    }

    /// Tags this tool belongs to, consulted by [`super::filter::ToolFilter`]
    /// for `tags` membership.
    fn tags(&self) -> &[&str] {
        &[]
    }

    /// Named tool-sets this tool belongs to, consulted for `tool_sets`
    /// membership.
    fn tool_sets(&self) -> &[&str] {
        &[]
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult;

    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            schema: self.parameters_schema(),
        }
    }
}
