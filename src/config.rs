//! Arena Configuration
//!
//! Loads and saves the agent's configuration from `~/.arena/arena.json`,
//! with environment-variable fallbacks for API credentials.

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::types::{default_config, ArenaConfig};

/// Config file name within the arena directory.
const CONFIG_FILENAME: &str = "arena.json";

/// Returns the arena state directory: `~/.arena`.
pub fn get_arena_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
    home.join(".arena")
}

/// Returns the full path to the config file: `~/.arena/arena.json`.
pub fn get_config_path() -> PathBuf {
    get_arena_dir().join(CONFIG_FILENAME)
}

/// Load the agent config from disk, merging missing fields with defaults and
/// falling back to environment variables for credentials.
///
/// Returns the defaults (plus environment credentials) if the config file
/// does not exist, so a fresh checkout can run against a local Ollama with
/// nothing but a `.env`-style environment.
pub fn load_config() -> ArenaConfig {
    let config_path = get_config_path();

    let mut config = if config_path.exists() {
        fs::read_to_string(&config_path)
            .ok()
            .and_then(|contents| serde_json::from_str::<ArenaConfig>(&contents).ok())
            .unwrap_or_else(default_config)
    } else {
        default_config()
    };

    let defaults = default_config();

    if config.model.is_empty() {
        config.model = defaults.model;
    }
    if config.ollama_url.is_empty() {
        config.ollama_url = defaults.ollama_url;
    }
    if config.interval_seconds == 0 {
        config.interval_seconds = defaults.interval_seconds;
    }
    if config.max_tool_iterations == 0 {
        config.max_tool_iterations = defaults.max_tool_iterations;
    }
    if config.max_context_turns == 0 {
        config.max_context_turns = defaults.max_context_turns;
    }
    if config.db_path.is_empty() {
        config.db_path = defaults.db_path;
    }

    apply_env_overrides(&mut config);
    config
}

/// Fill in credentials and endpoint overrides from the environment. The
/// process environment is the source of truth when the config file leaves
/// them blank.
fn apply_env_overrides(config: &mut ArenaConfig) {
    if config.alpaca_api_key.is_empty() {
        if let Ok(key) = env::var("ALPACA_API_KEY") {
            config.alpaca_api_key = key;
        }
    }
    if config.alpaca_secret_key.is_empty() {
        if let Ok(key) = env::var("ALPACA_SECRET_KEY") {
            config.alpaca_secret_key = key;
        }
    }
    if let Ok(live) = env::var("ALPACA_LIVE_TRADING") {
        config.alpaca_live_trading = live.eq_ignore_ascii_case("true");
    }
    if config.tavily_api_key.is_empty() {
        if let Ok(key) = env::var("TAVILY_API_KEY") {
            config.tavily_api_key = key;
        }
    }
    if let Ok(url) = env::var("OLLAMA_URL") {
        if !url.is_empty() {
            config.ollama_url = url;
        }
    }
}

/// Save the config to disk at `~/.arena/arena.json`.
///
/// Creates the arena directory with mode 0o700 if it does not exist. The
/// config file is written with mode 0o600 since it may contain API keys.
pub fn save_config(config: &ArenaConfig) -> Result<()> {
    let dir = get_arena_dir();
    if !dir.exists() {
        fs::create_dir_all(&dir).context("Failed to create arena directory")?;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
    }

    let config_path = get_config_path();
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(&config_path, &json).context("Failed to write config file")?;
    fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

/// Resolve a path that may start with `~` to an absolute path.
pub fn resolve_path(p: &str) -> String {
    if let Some(rest) = p.strip_prefix('~') {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        home.join(rest).to_string_lossy().to_string()
    } else {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path_with_tilde() {
        let resolved = resolve_path("~/some/path");
        assert!(!resolved.starts_with('~'));
        assert!(resolved.ends_with("some/path"));
    }

    #[test]
    fn test_resolve_path_without_tilde() {
        let path = "/absolute/path/to/file";
        assert_eq!(resolve_path(path), path);
    }

    #[test]
    fn test_default_config_values() {
        let config = default_config();
        assert_eq!(config.model, "qwen2.5:latest");
        assert_eq!(config.interval_seconds, 300);
        assert_eq!(config.max_cycles, 0);
        assert_eq!(config.max_tool_iterations, 10);
        assert_eq!(config.max_context_turns, 50);
        assert!(!config.alpaca_live_trading);
    }
}
