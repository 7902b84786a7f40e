//! C6/C7: Agent Instance and Agent Loop (§4.6, §4.7).

pub mod config;
pub mod context;
pub mod instance;
pub mod loop_;

pub use config::{AgentConfig, ContextSettings, GenerationParams};
pub use context::Context;
pub use instance::AgentInstance;
pub use loop_::{AgentLoop, TurnDeps, TurnOutcome};
