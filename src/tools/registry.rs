//! C1: the process-wide lazy tool catalog (§4.1).
//!
//! An instantiated-tool map with a `get`/`register`/`list` shape, supplemented
//! per `original_source/tools/tool_registry_lazy.py` with a lazy
//! `{module, class, category}` declaration table (`register_spec`/`ToolSpec`):
//! a tool can be declared without being constructed, and is only
//! instantiated on first `get`/`filter` call.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::traits::{Tool, ToolInfo};

/// A lazy tool declaration: metadata sufficient for filtering plus a
/// constructor invoked at most once, on first reference.
pub struct ToolSpec {
    pub name: String,
    pub category: String,
    pub tags: Vec<String>,
    pub tool_sets: Vec<String>,
    constructor: Box<dyn Fn() -> std::result::Result<Arc<dyn Tool>, String> + Send + Sync>,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        constructor: impl Fn() -> std::result::Result<Arc<dyn Tool>, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            tags: Vec::new(),
            tool_sets: Vec::new(),
            constructor: Box::new(constructor),
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tool_sets(mut self, sets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tool_sets = sets.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Default)]
struct Inner {
    /// Instantiated singletons, keyed by name.
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Declared-but-not-yet-constructed tools, keyed by name.
    specs: HashMap<String, ToolSpec>,
}

/// The process-wide tool catalog. Cheap to clone (wrap in `Arc` at the call
/// site); internally guarded by a coarse `RwLock` since the registry is not
/// a hot path (§5).
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Inner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-built singleton. Idempotent by name: if a tool with
    /// this name is already registered (instantiated or as a spec), the
    /// call is a silent no-op and a warning is logged (§4.1).
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut inner = self.inner.write().expect("tool registry lock poisoned");
        if inner.tools.contains_key(&name) || inner.specs.contains_key(&name) {
            tracing::warn!(tool = %name, "duplicate tool registration ignored");
            return;
        }
        inner.tools.insert(name, tool);
    }

    /// Register a pre-built singleton, replacing any existing entry for the
    /// same name. Used explicitly when later registration is intended to
    /// win (§4.1: "replaces earlier entry only if explicitly allowed").
    pub fn register_replacing(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut inner = self.inner.write().expect("tool registry lock poisoned");
        inner.specs.remove(&name);
        inner.tools.insert(name, tool);
    }

    /// Declare a tool lazily; it is not constructed until first `get`
    /// or `filter` reference.
    pub fn register_spec(&self, spec: ToolSpec) {
        let mut inner = self.inner.write().expect("tool registry lock poisoned");
        if inner.tools.contains_key(&spec.name) || inner.specs.contains_key(&spec.name) {
            tracing::warn!(tool = %spec.name, "duplicate tool spec ignored");
            return;
        }
        inner.specs.insert(spec.name.clone(), spec);
    }

    /// Fetch a tool by name, instantiating it from its spec if needed.
    /// Fails soft: a missing tool or a construction error both yield
    /// `None`, and construction errors are logged (§4.1).
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        {
            let inner = self.inner.read().expect("tool registry lock poisoned");
            if let Some(tool) = inner.tools.get(name) {
                return Some(tool.clone());
            }
        }

        let mut inner = self.inner.write().expect("tool registry lock poisoned");
        // Re-check under the write lock in case of a race with another
        // caller's instantiation.
        if let Some(tool) = inner.tools.get(name) {
            return Some(tool.clone());
        }
        let spec = inner.specs.remove(name)?;
        match (spec.constructor)() {
            Ok(tool) => {
                inner.tools.insert(name.to_string(), tool.clone());
                Some(tool)
            }
            Err(e) => {
                tracing::error!(tool = name, error = %e, "tool instantiation failed");
                None
            }
        }
    }

    /// `(tool_sets ∪ tagged(tags) ∪ allow) \ deny`, sorted by name for a
    /// stable model-facing catalog (§4.1).
    pub fn filter(
        &self,
        tool_sets: &[String],
        tags: &[String],
        allow: &[String],
        deny: &[String],
    ) -> Vec<Arc<dyn Tool>> {
        let mut names: Vec<String> = Vec::new();

        {
            let inner = self.inner.read().expect("tool registry lock poisoned");
            for (name, tool) in inner.tools.iter() {
                if tool.tool_sets().iter().any(|s| tool_sets.iter().any(|x| x == s))
                    || tool.tags().iter().any(|t| tags.iter().any(|x| x == t))
                {
                    names.push(name.clone());
                }
            }
            for (name, spec) in inner.specs.iter() {
                if spec.tool_sets.iter().any(|s| tool_sets.contains(s))
                    || spec.tags.iter().any(|t| tags.contains(t))
                {
                    names.push(name.clone());
                }
            }
        }

        names.extend(allow.iter().cloned());

        let denied: std::collections::HashSet<&str> = deny.iter().map(String::as_str).collect();
        let mut uniq: std::collections::BTreeSet<String> = names
            .into_iter()
            .filter(|n| !denied.contains(n.as_str()))
            .collect();
        // `allow` names may not be deny-listed, per step order in §4.1.
        uniq.retain(|n| !denied.contains(n.as_str()));

        uniq.into_iter().filter_map(|n| self.get(&n)).collect()
    }

    /// A tool-instructions prompt fragment for the given tools (C1
    /// `describe_for_model`), grouped by category.
    pub fn describe_for_model(tools: &[Arc<dyn Tool>]) -> String {
        if tools.is_empty() {
            return String::new();
        }
        let mut by_category: std::collections::BTreeMap<&str, Vec<&Arc<dyn Tool>>> =
            std::collections::BTreeMap::new();
        for tool in tools {
            by_category.entry(tool.category()).or_default().push(tool);
        }
        let mut out = String::from("Available tools:\n");
        for (category, tools) in by_category {
            out.push_str(&format!("\n[{category}]\n"));
            for tool in tools {
                out.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
            }
        }
        out
    }

    pub fn list_info(&self) -> Vec<ToolInfo> {
        let inner = self.inner.read().expect("tool registry lock poisoned");
        let mut infos: Vec<ToolInfo> = inner.tools.values().map(|t| t.info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().expect("tool registry lock poisoned");
        inner.tools.len() + inner.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::tools::traits::ToolResult;

    struct DummyTool {
        name: &'static str,
        tags: Vec<&'static str>,
    }

    #[async_trait]
    impl Tool for DummyTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "a dummy tool"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        fn tags(&self) -> &[&str] {
            &self.tags
        }
        async fn execute(&self, _args: Value, _ctx: &crate::tools::traits::ToolContext) -> ToolResult {
            ToolResult::ok("dummy")
        }
    }

    #[test]
    fn register_is_idempotent_by_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool { name: "a", tags: vec![] }));
        registry.register(Arc::new(DummyTool { name: "a", tags: vec!["x"] }));
        let tool = registry.get("a").unwrap();
        assert!(tool.tags().is_empty(), "second registration should be ignored");
    }

    #[test]
    fn lazy_spec_is_instantiated_on_first_get() {
        let registry = ToolRegistry::new();
        registry.register_spec(ToolSpec::new("lazy", "test", || {
            Ok(Arc::new(DummyTool { name: "lazy", tags: vec![] }) as Arc<dyn Tool>)
        }));
        assert!(registry.get("lazy").is_some());
        // Second get returns the same cached singleton, not a fresh spec call.
        assert!(registry.get("lazy").is_some());
    }

    #[test]
    fn missing_tool_fails_soft() {
        let registry = ToolRegistry::new();
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn construction_error_fails_soft() {
        let registry = ToolRegistry::new();
        registry.register_spec(ToolSpec::new("broken", "test", || {
            Err("boom".to_string())
        }));
        assert!(registry.get("broken").is_none());
    }

    #[test]
    fn filter_is_deterministic_and_respects_deny_last() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool { name: "b_tool", tags: vec!["fs"] }));
        registry.register(Arc::new(DummyTool { name: "a_tool", tags: vec!["fs"] }));
        registry.register(Arc::new(DummyTool { name: "c_tool", tags: vec![] }));

        let filtered = registry.filter(&[], &["fs".to_string()], &["c_tool".to_string()], &["a_tool".to_string()]);
        let names: Vec<&str> = filtered.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["b_tool", "c_tool"]);
    }
}
