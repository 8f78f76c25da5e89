//! Configuration for moshterm.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.moshterm/config.toml`
//! - Paths for the log file and the settings file in the same directory
//!
//! # Configuration File
//!
//! ```toml
//! # trace, debug, info, warn, error
//! log_level = "info"
//!
//! # portable (shows load progress) or native
//! engine_variant = "native"
//!
//! # File whose contents name an available update version (optional)
//! update_marker = "/var/lib/moshterm/update"
//!
//! [engine]
//! command = "mosh-engine"
//! args = ["--stdio"]
//!
//! [agent]
//! app_id = "beknehfpfkghjoafdifaflglpjkojoco"
//! command = "mosh-agent-bridge"
//!
//! [settings]
//! retry_attempts = 3
//! ```
//!
//! Missing or unparsable files fall back to the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::agent::DEFAULT_AGENT_ID;
use crate::engine::EngineVariant;
use crate::settings::DEFAULT_RETRY_ATTEMPTS;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level name
    pub log_level: String,
    /// Which engine build is launched
    pub engine_variant: EngineVariant,
    /// Update marker file, polled while running
    pub update_marker: Option<PathBuf>,
    pub engine: EngineConfig,
    pub agent: AgentConfig,
    pub settings: SettingsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            engine_variant: EngineVariant::default(),
            update_marker: None,
            engine: EngineConfig::default(),
            agent: AgentConfig::default(),
            settings: SettingsConfig::default(),
        }
    }
}

/// Engine process settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "mosh-engine".to_string(),
            args: Vec::new(),
        }
    }
}

/// Credential agent settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent endpoint id sent to the bridge
    pub app_id: String,
    /// Bridge command; no agent is probed when unset
    pub command: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_AGENT_ID.to_string(),
            command: None,
        }
    }
}

/// Settings store behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub retry_attempts: u32,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Self {
        match data_dir() {
            Some(dir) => Self::load_from(&dir.join("config.toml")),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                if let Ok(config) = toml::from_str(&content) {
                    return config;
                }
            }
        }
        Self::default()
    }

    /// Parsed log level; unknown names mean `info`
    pub fn level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

/// `~/.moshterm`, created on first use
pub fn data_dir() -> Option<PathBuf> {
    let dir = home_dir()?.join(".moshterm");
    if !dir.exists() {
        let _ = fs::create_dir_all(&dir);
    }
    Some(dir)
}

pub fn log_path() -> PathBuf {
    data_dir()
        .map(|d| d.join("moshterm.log"))
        .unwrap_or_else(|| PathBuf::from("moshterm.log"))
}

pub fn settings_path() -> PathBuf {
    data_dir()
        .map(|d| d.join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from("settings.toml"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml"));
        assert_eq!(config, Config::default());
        assert_eq!(config.agent.app_id, DEFAULT_AGENT_ID);
        assert_eq!(config.settings.retry_attempts, 3);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "engine_variant = \"native\"\n[engine]\ncommand = \"/opt/engine\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.engine_variant, EngineVariant::Native);
        assert_eq!(config.engine.command, "/opt/engine");
        assert!(config.engine.args.is_empty());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_level = [").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_agent_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[agent]\ncommand = \"bridge\"\n").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.agent.command.as_deref(), Some("bridge"));
        assert_eq!(config.agent.app_id, DEFAULT_AGENT_ID);
    }

    #[test]
    fn test_level() {
        let mut config = Config::default();
        assert_eq!(config.level(), Level::INFO);
        config.log_level = "debug".to_string();
        assert_eq!(config.level(), Level::DEBUG);
        config.log_level = "loud".to_string();
        assert_eq!(config.level(), Level::INFO);
    }
}
