//! C10: Session Manager (§4.9/§6) — a registry of live sessions, each
//! behind its own [`SessionHandle`]. A coarse `RwLock<HashMap>` guards
//! session lookup, since session creation/destruction is not a hot path
//! (§5).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::{AgentCatalog, Session, SessionDeps, SessionHandle};
use crate::error::{Result, RuntimeError};
use crate::mailbox::SharedMailbox;
use crate::model::ModelProvider;
use crate::prompts::PromptAssembler;
use crate::tools::ToolRegistry;

/// Shared wiring every session created by this manager is built from.
pub struct SessionManager {
    catalog: Arc<AgentCatalog>,
    tool_registry: Arc<ToolRegistry>,
    mailbox: SharedMailbox,
    provider: Arc<dyn ModelProvider>,
    prompt_assembler: Option<Arc<PromptAssembler>>,
    workspace_root: PathBuf,
    continuation_max_depth: usize,
    switch_max_depth: usize,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<AgentCatalog>,
        tool_registry: Arc<ToolRegistry>,
        mailbox: SharedMailbox,
        provider: Arc<dyn ModelProvider>,
        prompt_assembler: Option<Arc<PromptAssembler>>,
        workspace_root: PathBuf,
        continuation_max_depth: usize,
        switch_max_depth: usize,
    ) -> Self {
        Self {
            catalog,
            tool_registry,
            mailbox,
            provider,
            prompt_assembler,
            workspace_root,
            continuation_max_depth,
            switch_max_depth,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<AgentCatalog> {
        &self.catalog
    }

    fn deps(&self) -> SessionDeps {
        SessionDeps {
            catalog: self.catalog.clone(),
            tool_registry: self.tool_registry.clone(),
            mailbox: self.mailbox.clone(),
            provider: self.provider.clone(),
            prompt_assembler: self.prompt_assembler.clone(),
            workspace_root: self.workspace_root.clone(),
            continuation_max_depth: self.continuation_max_depth,
            switch_max_depth: self.switch_max_depth,
        }
    }

    /// Create a session with a freshly generated id (`startSession`, §6).
    pub fn create(&self) -> Arc<SessionHandle> {
        self.create_with_id(Uuid::new_v4().to_string())
    }

    pub fn create_with_id(&self, id: impl Into<String>) -> Arc<SessionHandle> {
        let id = id.into();
        let session = Session::new(id.clone(), self.deps());
        let handle = Arc::new(SessionHandle::new(session));
        self.sessions
            .write()
            .expect("session registry lock poisoned")
            .insert(id, handle.clone());
        handle
    }

    pub fn find(&self, id: &str) -> Result<Arc<SessionHandle>> {
        self.sessions
            .read()
            .expect("session registry lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::SessionNotFound(id.to_string()))
    }

    /// Remove a session from the registry (`stopSession` teardown, §6).
    /// Returns whether a session with that id existed.
    pub fn destroy(&self, id: &str) -> bool {
        self.sessions.write().expect("session registry lock poisoned").remove(id).is_some()
    }

    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> =
            self.sessions.read().expect("session registry lock poisoned").keys().cloned().collect();
        ids.sort();
        ids
    }
}
