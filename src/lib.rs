//! mindmesh — a multi-agent conversational runtime.
//!
//! The `core` module tree (always compiled) implements the session/agent
//! runtime described by components C1-C11: a tool registry, a mailbox, a
//! prompt assembler, a channel router, a continuation controller, agent
//! instances and their loop, an agent-switch handler, sessions, a session
//! manager, and an async agent manager. `rpc` wraps that runtime in a
//! JSON-RPC 2.0 dispatcher; the `gateway` feature exposes it over a
//! WebSocket, and the `cli` feature provides a client for it.

pub mod agent;
pub mod async_agent;
pub mod channel;
pub mod config;
pub mod continuation;
pub mod error;
pub mod logging;
pub mod mailbox;
pub mod model;
pub mod prompts;
pub mod rpc;
pub mod session;
pub mod switch;
pub mod tools;

#[cfg(feature = "gateway")]
pub mod gateway;

/// Re-exports of the types most callers wiring up a runtime need, a
/// top-level prelude module.
pub mod prelude {
    pub use crate::agent::{AgentConfig, AgentInstance};
    pub use crate::error::{Result, RuntimeError};
    pub use crate::mailbox::{Mailbox, SharedMailbox};
    pub use crate::model::{ModelProvider, ModelTurnResult};
    pub use crate::rpc::Dispatcher;
    pub use crate::session::{AgentCatalog, AgentTemplate, SessionDeps, SessionManager};
    pub use crate::tools::ToolRegistry;
}
