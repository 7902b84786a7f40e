//! TOML configuration loading and env-var overrides.
//!
//! # Loading order
//! 1. Parse `~/.mindmesh/config.toml` (or the path in `MINDMESH_CONFIG`)
//! 2. Apply `MINDMESH_*` environment variable overrides
//! 3. Fall back to [`RuntimeConfig::default()`] if the file is missing
//!
//! Loads in that order, and saves atomically (write to a temp path, then
//! rename over the target).

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use super::schema::RuntimeConfig;

/// Return the default config file path: `~/.mindmesh/config.toml`.
pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::home_dir()
        .map(|h| h.join(".mindmesh").join("config.toml"))
        .ok_or_else(|| "could not determine home directory".to_string())
}

/// Load [`RuntimeConfig`] from `path`, falling back to defaults if the file
/// does not exist, then applying environment variable overrides.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, String> {
    let mut config = match fs::read_to_string(path) {
        Ok(content) => toml::from_str::<RuntimeConfig>(&content)
            .map_err(|e| format!("failed to parse config at {path:?}: {e}"))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => RuntimeConfig::default(),
        Err(e) => return Err(format!("failed to read config at {path:?}: {e}")),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load config from the default path (or `MINDMESH_CONFIG` if set),
/// returning defaults on any error.
pub fn load_default_config() -> RuntimeConfig {
    let path = env::var("MINDMESH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path().unwrap_or_else(|_| PathBuf::from("config.toml")));
    load_config(&path).unwrap_or_default()
}

/// Apply `MINDMESH_*` environment variable overrides to `config`.
///
/// - `MINDMESH_PROVIDER_ID`    -> `provider.default_id`
/// - `MINDMESH_PROVIDER_MODEL` -> `provider.default_model`
/// - `MINDMESH_GATEWAY_PORT`   -> `gateway.bind_port`
/// - `MINDMESH_CONTINUATION_MAX_DEPTH` -> `continuation.max_depth`
/// - `MINDMESH_SWITCH_MAX_DEPTH`       -> `switch.max_depth`
fn apply_env_overrides(config: &mut RuntimeConfig) {
    if let Ok(v) = env::var("MINDMESH_PROVIDER_ID") {
        config.provider.default_id = v;
    }
    if let Ok(v) = env::var("MINDMESH_PROVIDER_MODEL") {
        config.provider.default_model = v;
    }
    if let Ok(v) = env::var("MINDMESH_GATEWAY_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        config.gateway.bind_port = port;
    }
    if let Ok(v) = env::var("MINDMESH_CONTINUATION_MAX_DEPTH")
        && let Ok(n) = v.parse::<usize>()
    {
        config.continuation.max_depth = n;
    }
    if let Ok(v) = env::var("MINDMESH_SWITCH_MAX_DEPTH")
        && let Ok(n) = v.parse::<usize>()
    {
        config.switch.max_depth = n;
    }
}

/// Atomically save `config` to `path`: write to `<path>.tmp`, then rename.
pub fn save_config(path: &Path, config: &RuntimeConfig) -> Result<(), String> {
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("failed to serialise config: {e}"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("failed to create config dir: {e}"))?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &content).map_err(|e| format!("failed to write temp config: {e}"))?;
    fs::rename(&tmp_path, path).map_err(|e| format!("failed to replace config file: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nonexistent.toml");
        let config = load_config(&path).expect("defaults on missing file");
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn load_partial_config_fills_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[provider]\ndefault_id = \"anthropic\"\n").expect("write");
        let config = load_config(&path).expect("load");
        assert_eq!(config.provider.default_id, "anthropic");
        assert_eq!(config.switch.max_depth, 5);
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut original = RuntimeConfig::default();
        original.provider.default_model = "mock-2".to_owned();
        save_config(&path, &original).expect("save");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, original);
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "not valid toml :::").expect("write");
        assert!(load_config(&path).is_err());
    }
}
