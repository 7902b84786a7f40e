//! Per-agent `ToolView` (§3 Data Model: ToolView) — the deterministic,
//! filtered subset of the global catalog an agent may invoke. Immutable
//! after agent creation for the duration of that agent's life.

use std::sync::Arc;

use super::registry::ToolRegistry;
use super::traits::Tool;

/// The filter configuration an [`crate::agent::config::AgentConfig`] carries
/// (§3: "tool filters (tool-sets, tags, allow, deny)").
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolFilterSpec {
    pub tool_sets: Vec<String>,
    pub tags: Vec<String>,
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// The resolved, immutable set of tools visible to one agent.
#[derive(Clone)]
pub struct ToolView {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolView {
    /// Resolve a [`ToolFilterSpec`] against `registry` once, at agent
    /// construction time (§3: "immutable after agent creation").
    pub fn resolve(registry: &ToolRegistry, spec: &ToolFilterSpec) -> Self {
        let tools = registry.filter(&spec.tool_sets, &spec.tags, &spec.allow, &spec.deny);
        Self { tools }
    }

    /// An empty view — used for agents with no tool access.
    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn instructions_block(&self) -> String {
        ToolRegistry::describe_for_model(&self.tools)
    }
}
