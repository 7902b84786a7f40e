//! [AMBIENT] TOML configuration schema + loader (§9): all fields
//! carry `#[serde(default)]` so a partially-filled `config.toml` works.
//! This is process configuration, not session state, so it is not touched
//! by `/save`-adjacent tooling.

pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_config, load_default_config, save_config};
pub use schema::{
    ContinuationConfig, GatewayConfig, MailboxConfig, PromptsConfig, ProviderConfig, RuntimeConfig,
    SwitchConfig,
};
