//! Configuration module for luarray.

use serde::Deserialize;
use std::path::Path;

use crate::{LuarrayError, Result};

/// Script engine resource configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of Lua instructions per run (0 = unlimited).
    #[serde(default = "default_max_instructions")]
    pub max_instructions: u64,
    /// Maximum script memory in megabytes (0 = unlimited).
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: usize,
    /// Maximum wall-clock execution time in seconds (0 = unlimited).
    #[serde(default = "default_max_execution_seconds")]
    pub max_execution_seconds: u32,
}

fn default_max_instructions() -> u64 {
    1_000_000
}

fn default_max_memory_mb() -> usize {
    10
}

fn default_max_execution_seconds() -> u32 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_instructions: default_max_instructions(),
            max_memory_mb: default_max_memory_mb(),
            max_execution_seconds: default_max_execution_seconds(),
        }
    }
}

/// Scripts directory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptsConfig {
    /// Directory scanned for .lua files.
    #[serde(default = "default_scripts_dir")]
    pub dir: String,
    /// Global function called after a script chunk runs, if the script
    /// defines it (empty = never call).
    #[serde(default = "default_entry")]
    pub entry: String,
}

fn default_scripts_dir() -> String {
    "scripts".to_string()
}

fn default_entry() -> String {
    "main".to_string()
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dir: default_scripts_dir(),
            entry: default_entry(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file (empty = console only).
    #[serde(default)]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Engine resource limits.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Scripts directory configuration.
    #[serde(default)]
    pub scripts: ScriptsConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(LuarrayError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| LuarrayError::Config(format!("config parse error: {e}")))
    }
}
