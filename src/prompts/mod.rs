//! C3: Prompt Assembler (§4.3).
//!
//! Prompt *authoring* (the markdown assets themselves) is out of scope
//! (§1); this module is the resolver: given `(category, name)` it finds the
//! right file on disk, layers in shared protocol components and the tool
//! instructions block, and substitutes `{{{key}}}` template markers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt not found for category '{category}' name '{name}'")]
    NotFound { category: String, name: String },
}

/// A named block of shared prompt text (e.g. the channel or continuation
/// protocol description), enabled per-assembly and concatenated in
/// sorted-name order for stability (§4.3 step 2).
#[derive(Debug, Clone)]
pub struct SharedComponent {
    pub name: String,
    pub text: String,
}

/// The ordered list of locations searched for a `(category, name)` prompt,
/// highest priority first (§4.3: "project override → project prompts dir →
/// app prompts dir → category default").
pub struct PromptResolver {
    pub project_override_dir: Option<PathBuf>,
    pub project_prompts_dir: Option<PathBuf>,
    pub app_prompts_dir: PathBuf,
}

impl PromptResolver {
    fn candidate_paths(&self, category: &str, name: &str) -> Vec<PathBuf> {
        let filename = format!("{name}.md");
        let mut paths = Vec::new();
        if let Some(dir) = &self.project_override_dir {
            paths.push(dir.join(category).join(&filename));
        }
        if let Some(dir) = &self.project_prompts_dir {
            paths.push(dir.join(category).join(&filename));
        }
        paths.push(self.app_prompts_dir.join(category).join(&filename));
        paths.push(self.app_prompts_dir.join("defaults").join(format!("{category}.md")));
        paths
    }

    fn resolve(&self, category: &str, name: &str) -> Result<String, PromptError> {
        for path in self.candidate_paths(category, name) {
            if let Ok(content) = std::fs::read_to_string(&path) {
                return Ok(content);
            }
        }
        Err(PromptError::NotFound {
            category: category.to_string(),
            name: name.to_string(),
        })
    }
}

/// Resolves and assembles system prompts from on-disk assets (§4.3).
pub struct PromptAssembler {
    resolver: PromptResolver,
    shared_components: Vec<SharedComponent>,
    debug_sections: BTreeMap<String, String>,
}

impl PromptAssembler {
    pub fn new(resolver: PromptResolver) -> Self {
        Self {
            resolver,
            shared_components: Vec::new(),
            debug_sections: BTreeMap::new(),
        }
    }

    /// Register a shared component, available to be enabled per assembly.
    pub fn with_shared_component(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.shared_components.push(SharedComponent {
            name: name.into(),
            text: text.into(),
        });
        self
    }

    /// Register a debug-option section (`/debug on <option>` toggles these
    /// on, §4.9 `/debug`).
    pub fn with_debug_section(mut self, option: impl Into<String>, text: impl Into<String>) -> Self {
        self.debug_sections.insert(option.into(), text.into());
        self
    }

    /// Assemble a final system prompt for `(category, name)`.
    ///
    /// `enabled_components` selects which registered shared components are
    /// layered in (by name); `tool_instructions` is the optional C1 tool
    /// block; `active_debug_options` selects which debug sections fire;
    /// `substitutions` replaces `{{{key}}}` markers (unmatched markers are
    /// left verbatim, never an error, §4.3).
    pub fn assemble(
        &self,
        category: &str,
        name: &str,
        enabled_components: &[String],
        tool_instructions: Option<&str>,
        active_debug_options: &[String],
        substitutions: &BTreeMap<String, String>,
    ) -> Result<String, PromptError> {
        let base = self.resolver.resolve(category, name)?;
        let mut sections = vec![base];

        let mut components: Vec<&SharedComponent> = self
            .shared_components
            .iter()
            .filter(|c| enabled_components.iter().any(|n| n == &c.name))
            .collect();
        components.sort_by(|a, b| a.name.cmp(&b.name));
        for component in components {
            sections.push(component.text.clone());
        }

        if let Some(instructions) = tool_instructions
            && !instructions.is_empty()
        {
            sections.push(instructions.to_string());
        }

        let mut debug_names: Vec<&String> = self
            .debug_sections
            .keys()
            .filter(|k| active_debug_options.iter().any(|o| &o == k))
            .collect();
        debug_names.sort();
        for option in debug_names {
            sections.push(self.debug_sections[option].clone());
        }

        let assembled = sections.join("\n\n");
        Ok(substitute_template(&assembled, substitutions))
    }
}

/// Replace `{{{key}}}` markers with values from `substitutions`; markers
/// with no matching key are left verbatim (§4.3: "never an error").
pub fn substitute_template(template: &str, substitutions: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if template[i..].starts_with("{{{")
            && let Some(end) = template[i + 3..].find("}}}")
        {
            let key = &template[i + 3..i + 3 + end];
            if let Some(value) = substitutions.get(key) {
                out.push_str(value);
            } else {
                out.push_str(&template[i..i + 3 + end + 3]);
            }
            i += 3 + end + 3;
            continue;
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// A fallback persona prompt used when no prompt asset resolves at any
/// location (§7: PromptNotFound → "falls back to a generic persona prompt
/// and logs a warning; turn proceeds").
pub fn generic_fallback_prompt(agent_name: &str) -> String {
    format!(
        "You are {agent_name}, a helpful AI assistant. Respond clearly and \
         concisely, and use the tools available to you when they help answer \
         the user's request."
    )
}

pub fn default_app_prompts_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".mindmesh").join("prompts"))
        .unwrap_or_else(|| PathBuf::from("prompts"))
}
