//! C6: Agent Instance (§4.6).
//!
//! Holds a context, config, and resolved tool view. The actual turn is
//! delegated to [`super::loop_::AgentLoop`]; this struct is the per-agent
//! state [`crate::session::Session`] drives it with.

use super::config::{AgentConfig, GenerationParams};
use super::context::Context;
use crate::tools::{ToolRegistry, ToolView};

/// One live agent within a session (§3 Data Model: Agent).
pub struct AgentInstance {
    pub config: AgentConfig,
    pub context: Context,
    pub tool_view: ToolView,
}

impl AgentInstance {
    /// Construct an agent, resolving its tool view once against `registry`
    /// (§4.6: "Resolve tool view once at construction"; §3 ToolView:
    /// "immutable after agent creation").
    pub fn new(config: AgentConfig, registry: &ToolRegistry) -> Self {
        let tool_view = ToolView::resolve(registry, &config.tool_filter);
        let context = Context::with_system_prompt(config.system_prompt.clone());
        Self {
            config,
            context,
            tool_view,
        }
    }

    /// Compose this call's generation params over the agent's defaults
    /// (§4.6).
    pub fn generation_params(&self, overrides: &GenerationParams) -> GenerationParams {
        self.config.generation.merged(overrides)
    }

    /// Snapshot the context for `/save` (§4.9, §6 persisted state layout).
    pub fn snapshot_messages(&self) -> Vec<crate::model::Message> {
        self.context.messages().to_vec()
    }

    /// Restore context from a `/load`ed snapshot.
    pub fn restore_messages(&mut self, messages: Vec<crate::model::Message>) {
        self.context = Context::new();
        for message in messages {
            self.context.push(message);
        }
    }
}
