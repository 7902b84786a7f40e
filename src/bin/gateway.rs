//! `mindmesh-gateway` — the JSON-RPC/WebSocket daemon binary.
//!
//! The outbound model client is out of scope (§1): this binary
//! wires up [`mindmesh::model::mock::MockModelProvider`] unless a real
//! adapter is supplied by an embedding application, matching the crate's
//! stance that provider adapters live outside this repository.

use std::path::PathBuf;
use std::sync::Arc;

use mindmesh::agent::AgentConfig;
use mindmesh::async_agent::AsyncAgentManager;
use mindmesh::config;
use mindmesh::logging;
use mindmesh::mailbox::Mailbox;
use mindmesh::model::mock::MockModelProvider;
use mindmesh::rpc::Dispatcher;
use mindmesh::session::{AgentCatalog, AgentTemplate, SessionManager};
use mindmesh::tools::{self, ToolRegistry};

#[tokio::main]
async fn main() {
    logging::init();

    let runtime_config = config::load_default_config();

    let workspace_root: PathBuf = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mailbox = Arc::new(Mailbox::new());
    let tool_registry = Arc::new(ToolRegistry::new());
    tools::register_builtin_tools(&tool_registry, mailbox.clone(), workspace_root.clone());

    let catalog = Arc::new(
        AgentCatalog::new("a").with_agent(AgentTemplate::new(
            AgentConfig::new("a", "Assistant")
                .with_description("the default conversational agent")
                .with_role("default")
                .with_system_prompt("You are a helpful assistant.")
                .with_model(runtime_config.provider.default_id.clone(), runtime_config.provider.default_model.clone()),
        )),
    );

    let provider = Arc::new(MockModelProvider::new(Vec::new()));

    let sessions = Arc::new(SessionManager::new(
        catalog,
        tool_registry.clone(),
        mailbox,
        provider.clone(),
        None,
        workspace_root,
        runtime_config.continuation.max_depth,
        runtime_config.switch.max_depth,
    ));
    let async_agents = Arc::new(AsyncAgentManager::new(tool_registry, provider));
    let dispatcher = Arc::new(Dispatcher::new(sessions, async_agents));

    if let Err(e) = mindmesh::gateway::run(dispatcher, &runtime_config.gateway).await {
        tracing::error!(error = %e, "gateway exited with an error");
        std::process::exit(1);
    }
}
