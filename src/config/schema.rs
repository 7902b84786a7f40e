//! TOML configuration schema for mindmesh.
//!
//! All fields have `#[serde(default)]` so a partially-filled `config.toml`
//! works correctly. Missing sections fall back to their `Default` impl.
//!
//! Example `~/.mindmesh/config.toml`:
//! ```toml
//! [provider]
//! default_id = "mock"
//! default_model = "mock-1"
//!
//! [gateway]
//! bind_port = 8780
//!
//! [continuation]
//! max_depth = 3
//!
//! [switch]
//! max_depth = 5
//! ```

use serde::{Deserialize, Serialize};

/// Default model provider/model selection (§4.10, §1: model client is out
/// of scope — this only names which adapter + model id a session defaults
/// to when a client does not override `sessionParams.model`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub default_id: String,
    pub default_model: String,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default_id: "mock".to_owned(),
            default_model: "mock-1".to_owned(),
            request_timeout_secs: 60,
        }
    }
}

/// JSON-RPC/WebSocket gateway bind settings (§6 "Transport implementation").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_host: String,
    pub bind_port: u16,
    /// Number of sequential ports to try if `bind_port` is already in use.
    pub max_port_attempts: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_owned(),
            bind_port: 8780,
            max_port_attempts: 10,
        }
    }
}

/// Continuation Controller (C5) depth override (§4.5: "Max (default 3)").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContinuationConfig {
    pub max_depth: usize,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self { max_depth: 3 }
    }
}

/// Agent-Switch Handler (C8) depth override (§4.8: "MaxSwitchDepth = 5").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SwitchConfig {
    pub max_depth: usize,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self { max_depth: 5 }
    }
}

/// Mailbox (C2) defaults (§3 Mail: `priority` default when a tool call omits
/// one).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MailboxConfig {
    pub default_priority: String,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            default_priority: "normal".to_owned(),
        }
    }
}

/// Prompt Assembler (C3) search-path configuration (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PromptsConfig {
    /// Overrides the resolver's app-wide prompts directory
    /// (default: `~/.mindmesh/prompts`).
    pub app_dir: Option<String>,
    /// Project-local prompts directory, searched before `app_dir`.
    pub project_dir: Option<String>,
    /// Highest-priority override directory, searched before `project_dir`.
    pub override_dir: Option<String>,
}

/// Top-level runtime configuration, loaded from `~/.mindmesh/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderConfig,
    pub gateway: GatewayConfig,
    pub continuation: ContinuationConfig,
    pub switch: SwitchConfig,
    pub mailbox: MailboxConfig,
    pub prompts: PromptsConfig,
}
