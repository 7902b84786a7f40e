//! Agent template registry (§4.9: "switchAgent creates the agent from
//! registry if absent, resolving its prompt via C3").
//!
//! A [`Session`](super::Session) is handed an [`AgentCatalog`] at
//! construction: one entry per persona it may instantiate, keyed by agent
//! id. Entries carry an already-resolved [`AgentConfig`] (the common case —
//! most deployments resolve prompts once at startup) plus an optional
//! [`PromptRef`] so `/debug` can re-assemble that persona's system prompt
//! in place without the session needing to know how prompts are resolved.

use std::collections::{BTreeMap, HashMap};

use crate::agent::AgentConfig;

/// Where a catalog entry's system prompt came from, kept around so
/// `/debug on|off` can ask the Prompt Assembler (C3) to re-assemble it with
/// a different set of debug sections enabled.
#[derive(Debug, Clone)]
pub struct PromptRef {
    pub category: String,
    pub name: String,
    pub enabled_components: Vec<String>,
    pub substitutions: BTreeMap<String, String>,
}

/// One persona a session can instantiate.
#[derive(Debug, Clone)]
pub struct AgentTemplate {
    pub config: AgentConfig,
    pub prompt_ref: Option<PromptRef>,
}

impl AgentTemplate {
    pub fn new(config: AgentConfig) -> Self {
        Self { config, prompt_ref: None }
    }

    pub fn with_prompt_ref(mut self, prompt_ref: PromptRef) -> Self {
        self.prompt_ref = Some(prompt_ref);
        self
    }
}

/// The set of personas a session may create agents from.
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    templates: HashMap<String, AgentTemplate>,
    default_agent_id: String,
}

impl AgentCatalog {
    pub fn new(default_agent_id: impl Into<String>) -> Self {
        Self {
            templates: HashMap::new(),
            default_agent_id: default_agent_id.into(),
        }
    }

    pub fn with_agent(mut self, template: AgentTemplate) -> Self {
        self.templates.insert(template.config.id.clone(), template);
        self
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentTemplate> {
        self.templates.get(agent_id)
    }

    pub fn default_agent_id(&self) -> &str {
        &self.default_agent_id
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.templates.contains_key(agent_id)
    }

    /// `{agent_id: display_name}` for [`crate::switch::resolve_target_id`].
    pub fn name_map(&self) -> HashMap<String, String> {
        self.templates
            .iter()
            .map(|(id, t)| (id.clone(), t.config.name.clone()))
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.templates.keys().cloned().collect();
        ids.sort();
        ids
    }
}
