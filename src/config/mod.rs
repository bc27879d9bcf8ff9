//! Simulation configuration
//! TOML file with per-field serde defaults plus CREWSIM_* environment
//! variable overrides. Loading never fails: a missing or malformed file
//! logs a warning and falls back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Periodic driver interval in milliseconds.
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,
    /// Advisory cap; not separately enforced by the core.
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    /// Whether the host should auto-start the scheduler.
    #[serde(default)]
    pub enabled: bool,
}

fn default_tick_rate_ms() -> u64 {
    1000
}
fn default_max_concurrent_agents() -> usize {
    5
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: default_tick_rate_ms(),
            max_concurrent_agents: default_max_concurrent_agents(),
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
            enabled: false,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("crewsim");
    path.push("config.toml");
    path
}

/// Load configuration from `path` (or the default location), then apply
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> SimulationConfig {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    let mut config = if path.exists() {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<SimulationConfig>(&contents) {
                Ok(config) => {
                    tracing::info!("loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("malformed config at {:?} ({}), using defaults", path, e);
                    SimulationConfig::default()
                }
            },
            Err(e) => {
                tracing::warn!("unreadable config at {:?} ({}), using defaults", path, e);
                SimulationConfig::default()
            }
        }
    } else {
        SimulationConfig::default()
    };

    apply_env_overrides(&mut config);
    config
}

/// Serialize and write atomically via a temp file.
pub fn save_config(config: &SimulationConfig, path: Option<&Path>) -> anyhow::Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    let temp_path = path.with_extension("toml.tmp");
    fs::write(&temp_path, &contents)?;
    fs::rename(&temp_path, &path)?;

    tracing::info!("saved config to {:?}", path);
    Ok(())
}

fn apply_env_overrides(config: &mut SimulationConfig) {
    if let Ok(url) = std::env::var("CREWSIM_OLLAMA_URL") {
        if !url.is_empty() {
            config.ollama_url = url;
        }
    }

    if let Ok(model) = std::env::var("CREWSIM_OLLAMA_MODEL") {
        if !model.is_empty() {
            config.ollama_model = model;
        }
    }

    if let Ok(rate) = std::env::var("CREWSIM_TICK_RATE_MS") {
        if let Ok(ms) = rate.parse::<u64>() {
            config.tick_rate_ms = ms;
        }
    }

    if let Ok(cap) = std::env::var("CREWSIM_MAX_CONCURRENT_AGENTS") {
        if let Ok(n) = cap.parse::<usize>() {
            config.max_concurrent_agents = n;
        }
    }

    if let Ok(enabled) = std::env::var("CREWSIM_ENABLED") {
        config.enabled = enabled == "true";
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env mutations and load_config must not interleave across tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert_eq!(config.tick_rate_ms, 1000);
        assert_eq!(config.max_concurrent_agents, 5);
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert_eq!(config.ollama_model, "llama3.2");
        assert!(!config.enabled);
    }

    #[test]
    fn test_partial_toml_uses_field_defaults() {
        let config: SimulationConfig = toml::from_str("tick_rate_ms = 250").unwrap();
        assert_eq!(config.tick_rate_ms, 250);
        assert_eq!(config.ollama_model, "llama3.2");
    }

    #[test]
    fn test_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("CREWSIM_OLLAMA_MODEL", "mistral");
        std::env::set_var("CREWSIM_TICK_RATE_MS", "500");

        let mut config = SimulationConfig::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.ollama_model, "mistral");
        assert_eq!(config.tick_rate_ms, 500);

        std::env::remove_var("CREWSIM_OLLAMA_MODEL");
        std::env::remove_var("CREWSIM_TICK_RATE_MS");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = SimulationConfig {
            tick_rate_ms: 2000,
            max_concurrent_agents: 9,
            ollama_url: "http://inference.internal:11434".to_string(),
            ollama_model: "qwen2.5".to_string(),
            enabled: true,
        };
        save_config(&config, Some(&path)).unwrap();
        let loaded = load_config(Some(&path));
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not toml {{{").unwrap();
        let loaded = load_config(Some(&path));
        assert_eq!(loaded, SimulationConfig::default());
    }
}
