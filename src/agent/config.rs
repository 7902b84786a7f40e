//! [`AgentConfig`] (§3 Data Model: AgentConfig).

use serde::{Deserialize, Serialize};

use crate::tools::ToolFilterSpec;

/// Generation parameters merged per-call over agent defaults (§4.6: "Compose
/// generation parameters by merging per-call options over agent defaults").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationParams {
    /// Merge `overrides` onto `self`, overrides winning where set.
    pub fn merged(&self, overrides: &GenerationParams) -> GenerationParams {
        GenerationParams {
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
        }
    }
}

/// Per-agent context retention setting (§3: "context settings (max retained
/// messages)").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSettings {
    pub max_messages: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { max_messages: 100 }
    }
}

/// Static configuration for one agent (§3 Data Model: AgentConfig).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Short persona label (`agent.list`, §6), e.g. "planner" or "scribe".
    /// Distinct from `description`, which is the longer blurb.
    #[serde(default)]
    pub role: String,
    /// Resolved system prompt text (already assembled by C3; see
    /// `Session::switch_agent`).
    pub system_prompt: String,
    pub model: String,
    pub provider: String,
    pub generation: GenerationParams,
    pub tool_filter: ToolFilterSpec,
    pub context: ContextSettings,
    /// Display hints surfaced verbatim by `agent.list` (§6); the core
    /// doesn't interpret these, a client does.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub shortcut: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let name = name.into();
        Self {
            id,
            name,
            description: String::new(),
            role: String::new(),
            system_prompt: String::new(),
            model: String::new(),
            provider: String::new(),
            generation: GenerationParams::default(),
            tool_filter: ToolFilterSpec::default(),
            context: ContextSettings::default(),
            color: None,
            shortcut: None,
            icon: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_display(mut self, color: impl Into<String>, shortcut: impl Into<String>, icon: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self.shortcut = Some(shortcut.into());
        self.icon = Some(icon.into());
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = provider.into();
        self.model = model.into();
        self
    }

    pub fn with_tool_filter(mut self, filter: ToolFilterSpec) -> Self {
        self.tool_filter = filter;
        self
    }

    pub fn with_context_max_messages(mut self, max_messages: usize) -> Self {
        self.context.max_messages = max_messages;
        self
    }
}
