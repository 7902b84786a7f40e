//! C9: Session (§4.9) — the stateful conductor that owns a set of live
//! [`AgentInstance`]s and drives [`AgentLoop`] turns across continuation
//! (C5) and agent-switch (C8) re-entry.
//!
//! A coarse registry id/ownership shape plus, from
//! `original_source/api/agent_switch_handler.py`, the nested-turn call
//! pattern this module performs (`switch_agent` then a recursive
//! `send_user_message`, §4.8 steps 4-8).

pub mod catalog;
pub mod commands;
pub mod manager;
mod structured_output;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex as AsyncMutex;

pub use catalog::{AgentCatalog, AgentTemplate, PromptRef};
pub use manager::SessionManager;

use crate::agent::{AgentInstance, AgentLoop, GenerationParams, TurnDeps};
use crate::channel::{ChannelKind, ChannelMessage, ChannelRouter, VisibilityFilteredSink, VisibilityPrefs};
use crate::continuation::{self, ContinuationDecision};
use crate::error::{Result, RuntimeError};
use crate::mailbox::SharedMailbox;
use crate::model::{Message, ModelProvider, ModelTurnResult, ToolCall};
use crate::prompts::PromptAssembler;
use crate::rpc::notifications::{ServerNotification, SessionBus};
use crate::switch::{self, SwitchDecision, SwitchFrame};
use crate::tools::ToolRegistry;

use commands::{DEBUG_OPTION_NAMES, HELP_TEXT, SavedAgent, SavedSession, splice_file_references};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// `channel.stats` result payload (§6: "stats blob").
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total: usize,
    pub analysis_count: usize,
    pub commentary_count: usize,
    pub final_count: usize,
    pub last_sequence: Option<u64>,
}

/// The outcome of one `sendUserMessage` call (§6 JSON-RPC result shape).
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub ai_response: String,
    pub tool_calls: Vec<ToolCall>,
    pub continuation_depth: usize,
}

/// Wiring every session needs at construction, gathered so
/// [`SessionManager::create`] has one parameter instead of seven.
pub struct SessionDeps {
    pub catalog: Arc<AgentCatalog>,
    pub tool_registry: Arc<ToolRegistry>,
    pub mailbox: SharedMailbox,
    pub provider: Arc<dyn ModelProvider>,
    pub prompt_assembler: Option<Arc<PromptAssembler>>,
    pub workspace_root: PathBuf,
    pub continuation_max_depth: usize,
    pub switch_max_depth: usize,
}

/// One active conversation (§3 Data Model: Session). Not `Clone`; shared
/// via [`SessionHandle`].
pub struct Session {
    pub id: String,
    catalog: Arc<AgentCatalog>,
    tool_registry: Arc<ToolRegistry>,
    mailbox: SharedMailbox,
    provider: Arc<dyn ModelProvider>,
    prompt_assembler: Option<Arc<PromptAssembler>>,
    workspace_root: PathBuf,

    agents: HashMap<String, AgentInstance>,
    active_agent_id: Option<String>,
    introduced_agents: HashSet<String>,
    continuation_depth: usize,
    continuation_max_depth: usize,
    switch_stack: Vec<SwitchFrame>,
    switch_max_depth: usize,
    debug_options: HashSet<String>,

    router: ChannelRouter,
    visibility: VisibilityPrefs,
    /// Every non-partial channel message emitted this session, in sequence
    /// order (`channel.history`, `channel.stats`, §6). Unbounded for now —
    /// a long-lived session trims this the way it trims agent context, but
    /// no retention policy is specified (§9 Open Questions has no entry for
    /// this; keeping the full history is the simplest correct choice).
    history: Vec<ChannelMessage>,
    bus: SessionBus,
    cancel_flag: Arc<AtomicBool>,
    started: bool,
}

impl Session {
    fn new(id: String, deps: SessionDeps) -> Self {
        Self {
            router: ChannelRouter::new(id.clone()),
            id,
            catalog: deps.catalog,
            tool_registry: deps.tool_registry,
            mailbox: deps.mailbox,
            provider: deps.provider,
            prompt_assembler: deps.prompt_assembler,
            workspace_root: deps.workspace_root,
            agents: HashMap::new(),
            active_agent_id: None,
            introduced_agents: HashSet::new(),
            continuation_depth: 0,
            continuation_max_depth: deps.continuation_max_depth,
            switch_stack: Vec::new(),
            switch_max_depth: deps.switch_max_depth,
            debug_options: HashSet::new(),
            visibility: VisibilityPrefs::default(),
            history: Vec::new(),
            bus: SessionBus::new(),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            started: false,
        }
    }

    pub fn bus(&self) -> &SessionBus {
        &self.bus
    }

    pub fn visibility(&self) -> &VisibilityPrefs {
        &self.visibility
    }

    pub fn visibility_mut(&mut self) -> &mut VisibilityPrefs {
        &mut self.visibility
    }

    pub fn current_agent(&self) -> Option<&str> {
        self.active_agent_id.as_deref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.catalog.ids()
    }

    /// `channel.history` (§6): messages whose channel is in `channels` (all,
    /// if empty), with `sequence > since_sequence`, newest `limit` kept.
    pub fn channel_history(&self, channels: &[ChannelKind], since_sequence: u64, limit: usize) -> Vec<ChannelMessage> {
        let filtered: Vec<ChannelMessage> = self
            .history
            .iter()
            .filter(|m| m.sequence > since_sequence)
            .filter(|m| channels.is_empty() || channels.contains(&m.channel))
            .cloned()
            .collect();
        if filtered.len() > limit {
            filtered[filtered.len() - limit..].to_vec()
        } else {
            filtered
        }
    }

    pub fn channel_history_total_count(&self) -> usize {
        self.history.len()
    }

    /// `channel.stats` (§6): a small per-channel count breakdown.
    pub fn channel_stats(&self) -> ChannelStats {
        let mut stats = ChannelStats::default();
        for message in &self.history {
            match message.channel {
                ChannelKind::Analysis => stats.analysis_count += 1,
                ChannelKind::Commentary => stats.commentary_count += 1,
                ChannelKind::Final => stats.final_count += 1,
            }
        }
        stats.total = self.history.len();
        stats.last_sequence = self.history.last().map(|m| m.sequence);
        stats
    }

    /// Start the session on the catalog's default agent, creating it if
    /// this is the first reference (§4.9: a session "starts" on a default
    /// agent before any message is processed).
    pub fn start(&mut self) -> Result<String> {
        let default_id = self.catalog.default_agent_id().to_string();
        self.ensure_agent(&default_id)?;
        self.active_agent_id = Some(default_id.clone());
        self.started = true;
        self.bus
            .publish(ServerNotification::AgentCreated { session_id: self.id.clone(), agent_id: default_id.clone() });
        Ok(default_id)
    }

    /// Activate `agent_id`, creating it from the catalog if this session
    /// hasn't seen it before (§4.9: "switchAgent creates the agent from
    /// registry if absent, resolving its prompt via C3").
    pub fn switch_agent(&mut self, agent_id: &str) -> Result<()> {
        self.ensure_agent(agent_id)?;
        let from = self.active_agent_id.clone();
        self.active_agent_id = Some(agent_id.to_string());
        if from.as_deref() != Some(agent_id) {
            self.bus.publish(ServerNotification::AgentSwitched {
                session_id: self.id.clone(),
                from_agent: from,
                to_agent: agent_id.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_agent(&mut self, agent_id: &str) -> Result<()> {
        if self.agents.contains_key(agent_id) {
            return Ok(());
        }
        let template = self
            .catalog
            .get(agent_id)
            .ok_or_else(|| RuntimeError::AgentNotFound(agent_id.to_string()))?;
        let instance = AgentInstance::new(template.config.clone(), &self.tool_registry);
        self.agents.insert(agent_id.to_string(), instance);
        self.introduced_agents.insert(agent_id.to_string());
        Ok(())
    }

    /// Cooperatively cancel the in-flight turn, if any (§4.9 `stop`: "sets
    /// a flag the Agent Loop observes at its next suspension point").
    pub fn request_cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn stop(&mut self) {
        self.request_cancel();
        self.started = false;
    }

    /// Process one inbound user message: slash commands and `@path`
    /// references first, then the turn-driving core (§4.9).
    pub async fn send_user_message(&mut self, message: &str) -> Result<TurnReport> {
        self.cancel_flag.store(false, Ordering::SeqCst);

        if let Some(report) = self.handle_slash_command(message).await? {
            return Ok(report);
        }

        let (spliced, any_spliced) = splice_file_references(message, &self.workspace_root);
        if any_spliced && let Some(agent_id) = self.active_agent_id.clone() {
            self.bus
                .publish(ServerNotification::ContextUpdated { session_id: self.id.clone(), agent_id });
        }

        self.drive_turn(spliced).await
    }

    /// The recursive turn core, reused directly by the Switch Handler's
    /// nested call (§4.8 step 5: "invokes `sendUserMessage` on the
    /// activated agent without re-running slash-command/`@path`
    /// preprocessing").
    fn drive_turn(&mut self, initial_message: String) -> BoxFuture<'_, Result<TurnReport>> {
        Box::pin(async move {
            let mut pending_message = Some(initial_message);
            let mut tool_calls_acc: Vec<ToolCall> = Vec::new();
            let mut final_text = String::new();

            loop {
                let agent_id = self
                    .active_agent_id
                    .clone()
                    .ok_or_else(|| RuntimeError::Internal("no active agent".to_string()))?;

                if let Some(message) = pending_message.take() {
                    let agent = self
                        .agents
                        .get_mut(&agent_id)
                        .expect("active agent was created by switch_agent/start");
                    agent.context.push(Message::user(message.clone()));
                    let schema = {
                        let has_tools = !agent.tool_view.is_empty();
                        let is_planner = agent.config.role == "planner";
                        structured_output::select_response_schema(is_planner, &message, has_tools, true)
                    };
                    let outcome = {
                        let agent = self.agents.get_mut(&agent_id).expect("agent present");
                        let tool_view = agent.tool_view.clone();
                        let generation = agent.generation_params(&GenerationParams::default());
                        let model = agent.config.model.clone();
                        // Live delivery respects the client's visibility prefs
                        // (§4.4); `self.history` below still records every
                        // channel regardless (§6 channel.history is not
                        // retroactively filtered).
                        let filtered_sink = VisibilityFilteredSink::new(&self.bus, self.visibility);
                        let deps = TurnDeps {
                            provider: self.provider.as_ref(),
                            tool_view: &tool_view,
                            router: &self.router,
                            sink: &filtered_sink,
                            agent_id: &agent_id,
                            session_id: &self.id,
                            model: &model,
                            generation,
                            response_schema: schema,
                            continuation_depth: Some(self.continuation_depth),
                            cancel_flag: &self.cancel_flag,
                        };
                        AgentLoop::run_turn(&mut agent.context, deps).await
                    };

                    if outcome.cancelled {
                        self.bus
                            .publish(ServerNotification::Cancelled { session_id: self.id.clone(), agent_id: agent_id.clone() });
                        self.continuation_depth = 0;
                        return Ok(TurnReport { ai_response: final_text, tool_calls: tool_calls_acc, continuation_depth: 0 });
                    }

                    tool_calls_acc.extend(outcome.executed_tool_calls.clone());
                    self.history.extend(outcome.emitted.iter().cloned());
                    let mut round_text = outcome.turn.visible_text().to_string();

                    // §4.8 Supplement (`original_source/agents/mail_notification.py`):
                    // every response an agent produces gets a short
                    // unread-count notice appended when its own mailbox has
                    // unread mail waiting, independent of what this turn did.
                    round_text = crate::mailbox::annotate(&round_text, &self.mailbox, &agent_id);

                    // Enforce the agent's configured context cap (§3 AgentConfig:
                    // "context settings (max retained messages)") now that this
                    // round's messages are in context.
                    {
                        let agent = self.agents.get_mut(&agent_id).expect("agent present");
                        let max_messages = agent.config.context.max_messages;
                        agent.context.truncate(max_messages);
                    }

                    if let Some(requested) = &outcome.switch_requested {
                        round_text.push_str(&self.handle_switch_request(&agent_id, requested).await?);
                    }

                    final_text = round_text;

                    let directive = match &outcome.turn {
                        ModelTurnResult::Structured { continuation, .. } => continuation.clone(),
                        _ => None,
                    };
                    let is_error_finish = matches!(outcome.turn, ModelTurnResult::Error { .. });
                    let decision = continuation::decide(
                        outcome.turn.visible_text(),
                        directive.as_ref(),
                        is_error_finish,
                        self.continuation_depth,
                        self.continuation_max_depth,
                    );

                    match decision {
                        ContinuationDecision::Reenter { message, new_depth } => {
                            self.continuation_depth = new_depth;
                            self.bus.publish(ServerNotification::ContinuationProgress {
                                session_id: self.id.clone(),
                                agent_id: agent_id.clone(),
                                iteration: new_depth,
                                max_iterations: self.continuation_max_depth,
                            });
                            pending_message = Some(message);
                            continue;
                        }
                        ContinuationDecision::Done => {
                            self.continuation_depth = 0;
                            break;
                        }
                    }
                } else {
                    break;
                }
            }

            Ok(TurnReport { ai_response: final_text, tool_calls: tool_calls_acc, continuation_depth: 0 })
        })
    }

    /// Validate and, if accepted, perform an agent switch requested by a
    /// tool call this turn (§4.8 steps 2-8). Returns the bracketed text to
    /// append to the caller's visible response either way.
    async fn handle_switch_request(&mut self, current_agent_id: &str, requested: &str) -> Result<String> {
        let target_id = switch::resolve_target_id(requested, &self.catalog.name_map());
        let decision = switch::decide(
            &self.switch_stack,
            current_agent_id,
            &target_id,
            self.continuation_depth,
            self.switch_max_depth,
        );

        match decision {
            SwitchDecision::Rejected { message } => Ok(message),
            SwitchDecision::Activate { frame, target_agent_id } => {
                self.switch_stack.push(frame);
                let restore_depth = self.continuation_depth;
                self.switch_agent(&target_agent_id)?;

                let notice = switch::activation_notice(current_agent_id);
                let nested = self.drive_turn(notice).await?;

                self.switch_stack.pop();
                self.continuation_depth = restore_depth;
                self.switch_agent(current_agent_id)?;

                Ok(switch::format_switch_reply(&target_agent_id, &nested.ai_response))
            }
        }
    }

    async fn handle_slash_command(&mut self, message: &str) -> Result<Option<TurnReport>> {
        let trimmed = message.trim();
        if !trimmed.starts_with('/') {
            return Ok(None);
        }
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        let reply = match command {
            "/clear" => self.cmd_clear(rest)?,
            "/save" => self.cmd_save(rest)?,
            "/load" => self.cmd_load(rest)?,
            "/debug" => self.cmd_debug(rest),
            "/help" => HELP_TEXT.to_string(),
            _ => return Ok(None),
        };

        Ok(Some(TurnReport {
            ai_response: reply,
            tool_calls: Vec::new(),
            continuation_depth: self.continuation_depth,
        }))
    }

    fn cmd_clear(&mut self, rest: &str) -> Result<String> {
        if rest.is_empty() {
            let agent_id = self
                .active_agent_id
                .clone()
                .ok_or_else(|| RuntimeError::Internal("no active agent".to_string()))?;
            self.clear_agent(&agent_id);
            return Ok(format!("Cleared context for {agent_id}."));
        }
        if rest == "all" {
            let ids: Vec<String> = self.agents.keys().cloned().collect();
            for id in &ids {
                self.clear_agent(id);
            }
            return Ok(format!("Cleared context for {} agent(s).", ids.len()));
        }
        if !self.agents.contains_key(rest) {
            return Err(RuntimeError::AgentNotFound(rest.to_string()));
        }
        self.clear_agent(rest);
        Ok(format!("Cleared context for {rest}."))
    }

    fn clear_agent(&mut self, agent_id: &str) {
        if let Some(agent) = self.agents.get_mut(agent_id) {
            agent.context.clear();
            self.bus
                .publish(ServerNotification::ContextCleared { session_id: self.id.clone(), agent_id: agent_id.to_string() });
        }
    }

    fn cmd_save(&mut self, rest: &str) -> Result<String> {
        let path = self.resolve_save_path(rest);
        let agents: std::collections::BTreeMap<String, SavedAgent> = self
            .agents
            .iter()
            .map(|(id, agent)| {
                (
                    id.clone(),
                    SavedAgent { config: agent.config.clone(), messages: agent.snapshot_messages() },
                )
            })
            .collect();
        let document = SavedSession {
            session_id: self.id.clone(),
            is_started: self.started,
            active_agent: self.active_agent_id.clone(),
            introduced_agents: {
                let mut v: Vec<String> = self.introduced_agents.iter().cloned().collect();
                v.sort();
                v
            },
            agents,
            saved_at: chrono::Utc::now(),
            version: "1.0".to_string(),
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| RuntimeError::Internal(format!("failed to serialize session: {e}")))?;
        std::fs::write(&path, json).map_err(|e| RuntimeError::Internal(format!("failed to write {}: {e}", path.display())))?;

        self.bus.publish(ServerNotification::SessionSaved {
            session_id: self.id.clone(),
            path: path.display().to_string(),
        });
        Ok(format!("Session saved to {}.", path.display()))
    }

    fn cmd_load(&mut self, rest: &str) -> Result<String> {
        if rest.is_empty() {
            return Err(RuntimeError::InvalidRequest("/load requires a path".to_string()));
        }
        let path = self.resolve_path(rest);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| RuntimeError::Internal(format!("failed to read {}: {e}", path.display())))?;
        let document: SavedSession = serde_json::from_str(&content)
            .map_err(|e| RuntimeError::Internal(format!("malformed session snapshot: {e}")))?;

        self.agents.clear();
        self.introduced_agents.clear();
        for (id, saved) in document.agents {
            let mut instance = AgentInstance::new(saved.config, &self.tool_registry);
            instance.restore_messages(saved.messages);
            self.agents.insert(id.clone(), instance);
            self.introduced_agents.insert(id);
        }
        self.active_agent_id = document.active_agent;
        self.started = document.is_started;

        self.bus.publish(ServerNotification::SessionLoaded {
            session_id: self.id.clone(),
            path: path.display().to_string(),
        });
        Ok(format!("Session loaded from {}.", path.display()))
    }

    fn cmd_debug(&mut self, rest: &str) -> String {
        let mut tokens = rest.split_whitespace();
        let mode = tokens.next().unwrap_or("");
        let requested: Vec<String> = tokens
            .filter(|t| DEBUG_OPTION_NAMES.contains(t))
            .map(str::to_string)
            .collect();

        match mode {
            "on" => {
                if requested.is_empty() {
                    self.debug_options.extend(DEBUG_OPTION_NAMES.iter().map(|s| s.to_string()));
                } else {
                    self.debug_options.extend(requested);
                }
            }
            "off" => {
                if requested.is_empty() {
                    self.debug_options.clear();
                } else {
                    for opt in requested {
                        self.debug_options.remove(&opt);
                    }
                }
            }
            _ => {
                let mut options: Vec<&String> = self.debug_options.iter().collect();
                options.sort();
                let active = if options.is_empty() {
                    "none".to_string()
                } else {
                    options.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                };
                return format!("Usage: /debug on|off [options…]. Active: {active}.");
            }
        }

        self.rebuild_active_agent_prompt();

        let mut options: Vec<&String> = self.debug_options.iter().collect();
        options.sort();
        let active = if options.is_empty() {
            "none".to_string()
        } else {
            options.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        };
        format!("Debug options active: {active}.")
    }

    /// Re-assemble the active agent's system prompt with the current debug
    /// set (§4.9: "rebuilds the active agent's system prompt in-place").
    /// A no-op, fail-soft, when either the assembler or a prompt reference
    /// for this agent is unavailable — not every deployment resolves
    /// prompts dynamically.
    fn rebuild_active_agent_prompt(&mut self) {
        let Some(agent_id) = self.active_agent_id.clone() else { return };
        let Some(assembler) = self.prompt_assembler.as_ref() else { return };
        let Some(template) = self.catalog.get(&agent_id) else { return };
        let Some(prompt_ref) = template.prompt_ref.as_ref() else { return };

        let active_debug: Vec<String> = self.debug_options.iter().cloned().collect();
        let tool_instructions = self.agents.get(&agent_id).map(|a| a.tool_view.instructions_block());

        if let Ok(assembled) = assembler.assemble(
            &prompt_ref.category,
            &prompt_ref.name,
            &prompt_ref.enabled_components,
            tool_instructions.as_deref(),
            &active_debug,
            &prompt_ref.substitutions,
        ) && let Some(agent) = self.agents.get_mut(&agent_id)
        {
            agent.context.set_system_prompt(assembled);
            self.bus
                .publish(ServerNotification::ContextUpdated { session_id: self.id.clone(), agent_id });
        }
    }

    fn resolve_path(&self, raw: &str) -> PathBuf {
        let candidate = PathBuf::from(raw);
        if candidate.is_absolute() { candidate } else { self.workspace_root.join(candidate) }
    }

    fn resolve_save_path(&self, raw: &str) -> PathBuf {
        if raw.is_empty() {
            self.workspace_root.join(format!("session-{}.json", self.id))
        } else {
            self.resolve_path(raw)
        }
    }
}

/// Owns the [`Session`]'s turn-driving state behind a lock, while keeping
/// the cancel flag reachable without acquiring it (§4.9 `stop`: "cancels
/// in-flight work cooperatively" even while another call holds the turn
/// lock), keeping the cancellation flag outside the lock its command
/// handlers take.
pub struct SessionHandle {
    pub id: String,
    cancel_flag: Arc<AtomicBool>,
    inner: AsyncMutex<Session>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self { id: session.id.clone(), cancel_flag: session.cancel_flag.clone(), inner: AsyncMutex::new(session) }
    }

    pub fn request_cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub async fn start(&self) -> Result<String> {
        self.inner.lock().await.start()
    }

    pub async fn switch_agent(&self, agent_id: &str) -> Result<()> {
        self.inner.lock().await.switch_agent(agent_id)
    }

    pub async fn current_agent(&self) -> Option<String> {
        self.inner.lock().await.current_agent().map(str::to_string)
    }

    pub async fn send_user_message(&self, message: &str) -> Result<TurnReport> {
        self.inner.lock().await.send_user_message(message).await
    }

    pub async fn stop(&self) {
        self.request_cancel();
        self.inner.lock().await.stop();
    }

    pub async fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ServerNotification> {
        self.inner.lock().await.bus().subscribe()
    }

    pub async fn agent_ids(&self) -> Vec<String> {
        self.inner.lock().await.agent_ids()
    }

    pub async fn is_started(&self) -> bool {
        self.inner.lock().await.is_started()
    }

    pub async fn channel_history(
        &self,
        channels: &[crate::channel::ChannelKind],
        since_sequence: u64,
        limit: usize,
    ) -> (Vec<crate::channel::ChannelMessage>, usize) {
        let session = self.inner.lock().await;
        (session.channel_history(channels, since_sequence, limit), session.channel_history_total_count())
    }

    pub async fn channel_stats(&self) -> ChannelStats {
        self.inner.lock().await.channel_stats()
    }

    pub async fn update_visibility(&self, show_commentary: bool, show_analysis: bool) {
        let mut session = self.inner.lock().await;
        let prefs = session.visibility_mut();
        prefs.show_commentary = show_commentary;
        prefs.show_analysis = show_analysis;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::mailbox::Mailbox;
    use crate::model::mock::MockModelProvider;
    use crate::model::{MessageRole, ModelTurnResult};
    use crate::tools::builtin::{CheckMailTool, SendMailWithSwitchTool};
    use crate::tools::ToolFilterSpec;

    fn deps_with(catalog: AgentCatalog, provider: MockModelProvider, registry: ToolRegistry) -> SessionDeps {
        SessionDeps {
            catalog: Arc::new(catalog),
            tool_registry: Arc::new(registry),
            mailbox: Arc::new(Mailbox::new()),
            provider: Arc::new(provider),
            prompt_assembler: None,
            workspace_root: std::env::temp_dir(),
            continuation_max_depth: 3,
            switch_max_depth: 5,
        }
    }

    #[tokio::test]
    async fn start_creates_default_agent_and_activates_it() {
        let catalog = AgentCatalog::new("a").with_agent(AgentTemplate::new(
            AgentConfig::new("a", "Alice").with_system_prompt("be helpful"),
        ));
        let provider = MockModelProvider::new(vec![]);
        let deps = deps_with(catalog, provider, ToolRegistry::new());
        let mut session = Session::new("s1".to_string(), deps);

        let started = session.start().unwrap();
        assert_eq!(started, "a");
        assert_eq!(session.current_agent(), Some("a"));
        assert!(session.is_started());
    }

    #[tokio::test]
    async fn plain_message_drives_one_turn() {
        let catalog = AgentCatalog::new("a").with_agent(AgentTemplate::new(
            AgentConfig::new("a", "Alice").with_system_prompt("be helpful"),
        ));
        let provider = MockModelProvider::new(vec![ModelTurnResult::Text("hello there".into())]);
        let deps = deps_with(catalog, provider, ToolRegistry::new());
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();

        let report = session.send_user_message("hi").await.unwrap();
        assert_eq!(report.ai_response, "hello there");
        assert!(report.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn clear_slash_command_resets_context_without_a_turn() {
        let catalog = AgentCatalog::new("a").with_agent(AgentTemplate::new(
            AgentConfig::new("a", "Alice").with_system_prompt("be helpful"),
        ));
        let provider = MockModelProvider::new(vec![ModelTurnResult::Text("should not be used".into())]);
        let deps = deps_with(catalog, provider, ToolRegistry::new());
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();
        session.agents.get_mut("a").unwrap().context.push(Message::user("remember this"));

        let report = session.send_user_message("/clear").await.unwrap();
        assert!(report.ai_response.contains("Cleared"));
        assert_eq!(session.agents.get("a").unwrap().context.len(), 1); // just the system prompt
    }

    #[tokio::test]
    async fn help_command_returns_fixed_text() {
        let catalog = AgentCatalog::new("a").with_agent(AgentTemplate::new(AgentConfig::new("a", "Alice")));
        let provider = MockModelProvider::new(vec![]);
        let deps = deps_with(catalog, provider, ToolRegistry::new());
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();

        let report = session.send_user_message("/help").await.unwrap();
        assert_eq!(report.ai_response, HELP_TEXT);
    }

    #[tokio::test]
    async fn continuation_directive_reenters_until_terminate() {
        let catalog = AgentCatalog::new("a").with_agent(AgentTemplate::new(
            AgentConfig::new("a", "Alice").with_system_prompt("be helpful"),
        ));
        let provider = MockModelProvider::new(vec![
            ModelTurnResult::Structured {
                analysis: String::new(),
                commentary: String::new(),
                r#final: "still working".into(),
                continuation: Some(crate::model::ContinuationDirective {
                    status: crate::model::ContinuationStatus::Continue,
                    reason: Some("more to do".into()),
                }),
            },
            ModelTurnResult::Structured {
                analysis: String::new(),
                commentary: String::new(),
                r#final: "all done".into(),
                continuation: Some(crate::model::ContinuationDirective {
                    status: crate::model::ContinuationStatus::Terminate,
                    reason: None,
                }),
            },
        ]);
        let deps = deps_with(catalog, provider, ToolRegistry::new());
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();

        let report = session.send_user_message("go").await.unwrap();
        assert_eq!(report.ai_response, "all done");
        assert_eq!(report.continuation_depth, 0);
    }

    #[tokio::test]
    async fn agent_switch_via_tool_runs_nested_turn_and_restores_caller() {
        let catalog = AgentCatalog::new("a")
            .with_agent(AgentTemplate::new(AgentConfig::new("a", "Alice").with_system_prompt("alice prompt").with_tool_filter(
                ToolFilterSpec { allow: vec!["send_mail_with_switch".into()], ..Default::default() },
            )))
            .with_agent(AgentTemplate::new(
                AgentConfig::new("b", "Bob").with_system_prompt("bob prompt").with_tool_filter(ToolFilterSpec {
                    allow: vec!["check_mail".into()],
                    ..Default::default()
                }),
            ));

        let mailbox = Arc::new(Mailbox::new());
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SendMailWithSwitchTool::new(mailbox.clone())));
        registry.register(Arc::new(CheckMailTool::new(mailbox.clone())));

        let call = ToolCall {
            id: "call-1".to_string(),
            name: "send_mail_with_switch".to_string(),
            arguments: serde_json::json!({"to_agent": "b", "subject": "s", "body": "please handle this"}),
        };
        let provider = MockModelProvider::new(vec![
            ModelTurnResult::ToolCalls { content: String::new(), calls: vec![call] },
            ModelTurnResult::Text("mail sent".into()),
            ModelTurnResult::Text("got it, handled".into()),
        ]);

        let mut deps = deps_with(catalog, provider, registry);
        deps.mailbox = mailbox;
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();

        let report = session.send_user_message("hand this to bob").await.unwrap();
        assert!(report.ai_response.contains("mail sent"));
        assert!(report.ai_response.contains("got it, handled"));
        assert_eq!(session.current_agent(), Some("a"));
        assert!(session.switch_stack.is_empty());
    }

    #[tokio::test]
    async fn response_is_annotated_with_unread_mail_count() {
        let catalog = AgentCatalog::new("a")
            .with_agent(AgentTemplate::new(AgentConfig::new("a", "Alice").with_system_prompt("alice prompt")))
            .with_agent(AgentTemplate::new(AgentConfig::new("b", "Bob").with_system_prompt("bob prompt")));

        let mailbox = Arc::new(Mailbox::new());
        mailbox.send(crate::mailbox::MailDraft {
            from_agent: "user".to_string(),
            to_agent: "b".to_string(),
            subject: "hi".to_string(),
            body: "are you there?".to_string(),
            priority: Default::default(),
            metadata: serde_json::Value::Null,
        });

        let mut deps = deps_with(catalog, MockModelProvider::new(vec![ModelTurnResult::Text("all good".into())]), ToolRegistry::new());
        deps.mailbox = mailbox;
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();
        session.switch_agent("b").unwrap();

        let report = session.send_user_message("status?").await.unwrap();
        assert_eq!(report.ai_response, "all good\n\nYou have 1 unread message in your mailbox.");
    }

    #[tokio::test]
    async fn default_visibility_hides_analysis_and_commentary_from_the_live_bus() {
        let catalog = AgentCatalog::new("a").with_agent(AgentTemplate::new(
            AgentConfig::new("a", "Alice").with_system_prompt("be helpful"),
        ));
        let provider = MockModelProvider::new(vec![ModelTurnResult::Structured {
            analysis: "thinking it over".into(),
            commentary: "narrating progress".into(),
            r#final: "here is the answer".into(),
            continuation: None,
        }]);
        let deps = deps_with(catalog, provider, ToolRegistry::new());
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();
        let mut rx = session.bus().subscribe();

        session.send_user_message("hi").await.unwrap();

        // Every channel still lands in history regardless of visibility.
        let stats = session.channel_stats();
        assert_eq!(stats.analysis_count, 1);
        assert_eq!(stats.commentary_count, 1);
        assert_eq!(stats.final_count, 1);

        // But the live bus, with default visibility (both hidden), only
        // ever saw the final channel notification (plus the AgentCreated
        // notification from start()).
        let mut saw_channel_kinds = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            if let ServerNotification::ChannelMessage { message } = notification {
                saw_channel_kinds.push(message.channel);
            }
        }
        assert_eq!(saw_channel_kinds, vec![ChannelKind::Final]);
    }

    #[tokio::test]
    async fn enabling_visibility_lets_analysis_and_commentary_reach_the_bus() {
        let catalog = AgentCatalog::new("a").with_agent(AgentTemplate::new(
            AgentConfig::new("a", "Alice").with_system_prompt("be helpful"),
        ));
        let provider = MockModelProvider::new(vec![ModelTurnResult::Structured {
            analysis: "thinking it over".into(),
            commentary: "narrating progress".into(),
            r#final: "here is the answer".into(),
            continuation: None,
        }]);
        let deps = deps_with(catalog, provider, ToolRegistry::new());
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();
        session.visibility_mut().show_commentary = true;
        session.visibility_mut().show_analysis = true;
        let mut rx = session.bus().subscribe();

        session.send_user_message("hi").await.unwrap();

        let mut saw_channel_kinds = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            if let ServerNotification::ChannelMessage { message } = notification {
                saw_channel_kinds.push(message.channel);
            }
        }
        assert_eq!(saw_channel_kinds.len(), 3);
        assert!(saw_channel_kinds.contains(&ChannelKind::Final));
        assert!(saw_channel_kinds.contains(&ChannelKind::Commentary));
        assert!(saw_channel_kinds.contains(&ChannelKind::Analysis));
    }

    /// Delegates to a [`MockModelProvider`] while recording the
    /// `response_schema` each request carried, so tests can assert on
    /// which schema `select_response_schema` actually picked.
    struct RecordingProvider {
        inner: MockModelProvider,
        schemas: std::sync::Mutex<Vec<Option<serde_json::Value>>>,
    }

    impl RecordingProvider {
        fn new(script: Vec<ModelTurnResult>) -> Self {
            Self { inner: MockModelProvider::new(script), schemas: std::sync::Mutex::new(Vec::new()) }
        }
    }

    #[async_trait::async_trait]
    impl crate::model::ModelProvider for RecordingProvider {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            request: crate::model::CompletionRequest,
        ) -> crate::model::Result<ModelTurnResult> {
            self.schemas.lock().expect("schemas lock poisoned").push(request.response_schema.clone());
            self.inner.complete(request).await
        }

        async fn stream(
            &self,
            request: crate::model::CompletionRequest,
            tx: tokio::sync::mpsc::Sender<crate::model::StreamChunk>,
        ) -> crate::model::Result<ModelTurnResult> {
            self.schemas.lock().expect("schemas lock poisoned").push(request.response_schema.clone());
            self.inner.stream(request, tx).await
        }
    }

    #[tokio::test]
    async fn planner_role_requesting_a_plan_gets_the_plan_schema() {
        let catalog = AgentCatalog::new("a").with_agent(AgentTemplate::new(
            AgentConfig::new("a", "Planner").with_role("planner").with_system_prompt("plan things"),
        ));
        let provider = Arc::new(RecordingProvider::new(vec![ModelTurnResult::Text("ok".into())]));
        let deps = SessionDeps {
            catalog: Arc::new(catalog),
            tool_registry: Arc::new(ToolRegistry::new()),
            mailbox: Arc::new(Mailbox::new()),
            provider: provider.clone(),
            prompt_assembler: None,
            workspace_root: std::env::temp_dir(),
            continuation_max_depth: 3,
            switch_max_depth: 5,
        };
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();

        session.send_user_message("please create a plan for the release").await.unwrap();

        let schemas = provider.schemas.lock().expect("schemas lock poisoned");
        assert_eq!(schemas.len(), 1);
        let schema = schemas[0].as_ref().expect("planner turn should carry a response schema");
        assert_eq!(schema["required"], serde_json::json!(["steps", "final"]));
    }

    #[tokio::test]
    async fn non_planner_role_never_gets_the_plan_schema() {
        let catalog = AgentCatalog::new("a").with_agent(AgentTemplate::new(
            AgentConfig::new("a", "Alice").with_system_prompt("be helpful"),
        ));
        let provider = Arc::new(RecordingProvider::new(vec![ModelTurnResult::Text("ok".into())]));
        let deps = SessionDeps {
            catalog: Arc::new(catalog),
            tool_registry: Arc::new(ToolRegistry::new()),
            mailbox: Arc::new(Mailbox::new()),
            provider: provider.clone(),
            prompt_assembler: None,
            workspace_root: std::env::temp_dir(),
            continuation_max_depth: 3,
            switch_max_depth: 5,
        };
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();

        session.send_user_message("please create a plan for the release").await.unwrap();

        let schemas = provider.schemas.lock().expect("schemas lock poisoned");
        assert_eq!(schemas.len(), 1);
        assert!(schemas[0].is_none(), "a non-planner, tool-free agent should get no schema");
    }

    #[tokio::test]
    async fn context_is_truncated_to_the_agent_configured_cap_after_each_turn() {
        let catalog = AgentCatalog::new("a").with_agent(AgentTemplate::new(
            AgentConfig::new("a", "Alice").with_system_prompt("be helpful").with_context_max_messages(3),
        ));
        let provider = MockModelProvider::new(vec![
            ModelTurnResult::Text("first".into()),
            ModelTurnResult::Text("second".into()),
        ]);
        let deps = deps_with(catalog, provider, ToolRegistry::new());
        let mut session = Session::new("s1".to_string(), deps);
        session.start().unwrap();

        session.send_user_message("one").await.unwrap();
        session.send_user_message("two").await.unwrap();

        let context_len = session.agents.get("a").unwrap().context.len();
        assert_eq!(context_len, 3);
        // The system prompt always survives truncation.
        assert_eq!(session.agents.get("a").unwrap().context.messages()[0].role, MessageRole::System);
    }
}
