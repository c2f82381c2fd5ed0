//! Configuration module
//!
//! Handles loading and saving the bot host configuration. Per-plugin
//! options live in free-form `[plugin.<name>]` tables; the typed accessors
//! on [`PluginConfig`] belong here, not in the plugins themselves.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::protocol::{DEFAULT_LOG_PORT, DEFAULT_RCON_PORT};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Missing required option: {0}")]
    Missing(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Host process settings
    #[serde(default)]
    pub server: ServerConfig,

    /// RCON connection settings
    #[serde(default)]
    pub rcon: RconConfig,

    /// Log listener settings
    #[serde(default)]
    pub log: LogConfig,

    /// Per-plugin option tables
    #[serde(default)]
    pub plugin: HashMap<String, PluginConfig>,
}

/// Host process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log level filter for console output
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Plugins to initialize at startup, in order
    #[serde(default)]
    pub plugins: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            plugins: Vec::new(),
        }
    }
}

/// RCON connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconConfig {
    /// Game server hostname or address
    #[serde(default)]
    pub host: String,

    /// Game server RCON port
    #[serde(default = "default_rcon_port")]
    pub port: u16,

    /// RCON password
    #[serde(default)]
    pub password: String,
}

fn default_rcon_port() -> u16 {
    DEFAULT_RCON_PORT
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_rcon_port(),
            password: String::new(),
        }
    }
}

/// Log listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Local port the game server forwards log datagrams to
    #[serde(default = "default_log_port")]
    pub port: u16,
}

fn default_log_port() -> u16 {
    DEFAULT_LOG_PORT
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            port: default_log_port(),
        }
    }
}

/// Free-form options from a `[plugin.<name>]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginConfig(HashMap<String, String>);

impl PluginConfig {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// String value with a fallback
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    /// Integer value, if present and numeric
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_str(key)?.trim().parse().ok()
    }
}

impl From<HashMap<String, String>> for PluginConfig {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("rconbot/config.toml")),
            Some(PathBuf::from("./rconbot.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check that everything the bot host needs is present
    pub fn validate(&self) -> ConfigResult<()> {
        if self.rcon.host.is_empty() {
            return Err(ConfigError::Missing("rcon.host"));
        }
        if self.rcon.password.is_empty() {
            return Err(ConfigError::Missing("rcon.password"));
        }
        Ok(())
    }

    /// Options for the named plugin, empty when no table was given
    pub fn plugin_config(&self, name: &str) -> PluginConfig {
        self.plugin.get(name).cloned().unwrap_or_default()
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> String {
    let config = Config {
        server: ServerConfig {
            log_level: "info".to_string(),
            plugins: vec!["log".to_string(), "headshot".to_string()],
        },
        rcon: RconConfig {
            host: "game.example.com".to_string(),
            port: DEFAULT_RCON_PORT,
            password: "changeme".to_string(),
        },
        plugin: {
            let mut tables = HashMap::new();
            tables.insert(
                "log".to_string(),
                PluginConfig::from(HashMap::from([(
                    "filename".to_string(),
                    "server.log".to_string(),
                )])),
            );
            tables
        },
        ..Default::default()
    };

    toml::to_string_pretty(&config).unwrap()
}
