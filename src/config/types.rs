//! Core configuration types and loading.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot identity and behavior.
    pub bot: BotConfig,
    /// Server connection and outbound pacing.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Admin credentials. Missing section disables admin features.
    pub admin: Option<AdminConfig>,
    /// Plugin discovery.
    #[serde(default)]
    pub plugins: PluginsConfig,
    /// Settings storage backend.
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Relational storage for plugins. Missing section disables it.
    pub persistence: Option<PersistenceConfig>,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Nickname the bot asks for on connect.
    pub nick: String,
    /// Channels joined on connect (merged with the persisted channel list).
    #[serde(default)]
    pub default_channels: Vec<String>,
    /// Text returned by the `info` command. Supports `{nick}` and `{command_prefix}`.
    #[serde(default = "default_info")]
    pub info: String,
    /// Seconds the bot stays quiet after `shutup`.
    #[serde(default = "default_shutup_duration")]
    pub shutup_duration: u64,
    /// Characters allowed between the bot's nick and a command (`slbot: help`).
    #[serde(default = "default_nick_delimiters")]
    pub nick_command_delimiters: String,
}

/// Connection and outbound pacing configuration.
///
/// Durations are in seconds and may be fractional.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Server host, also the target of keep-alive probes.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Prefix marking a channel line as a command (e.g. `!`).
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Idle time before a keep-alive probe is sent.
    #[serde(default = "default_keepalive_delay")]
    pub keepalive_delay: f64,
    /// Number of sends allowed inside `flood_interval`.
    #[serde(default = "default_max_flood")]
    pub max_flood: usize,
    /// Window over which `max_flood` sends are counted.
    #[serde(default = "default_flood_interval")]
    pub flood_interval: f64,
    /// Delay before a deferred send is retried.
    #[serde(default = "default_flood_wait")]
    pub flood_wait: f64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            command_prefix: default_command_prefix(),
            keepalive_delay: default_keepalive_delay(),
            max_flood: default_max_flood(),
            flood_interval: default_flood_interval(),
            flood_wait: default_flood_wait(),
        }
    }
}

/// Admin credential configuration.
///
/// `scheme` selects how `login` secrets are checked:
/// - `shared` (alias `stupid`): one `password` valid for any nick
/// - `per_nick` (alias `simple`): the `admins` table maps nick to password
/// - `test`: every user is an admin, for local development only
///
/// A missing scheme means `per_nick`. Any inconsistency disables admin features.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminConfig {
    /// Explicit opt-in.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub scheme: Option<String>,
    /// Shared secret for the `shared` scheme.
    #[serde(default)]
    pub password: Option<String>,
    /// Nick to secret table for the `per_nick` scheme.
    #[serde(default)]
    pub admins: HashMap<String, String>,
    /// Seconds a session lasts between admin commands.
    #[serde(default = "default_admin_timeout")]
    pub timeout: u64,
}

/// Plugin discovery configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PluginsConfig {
    /// Directory holding one sub-directory per plugin (with an optional `plugin.toml`).
    pub root: Option<PathBuf>,
    /// Plugins to load when no root is configured. Defaults to the whole catalog.
    pub enabled: Option<Vec<String>>,
}

/// Settings storage backend selection.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettingsBackend {
    #[default]
    Memory,
    Json,
}

/// Settings storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    #[serde(default)]
    pub backend: SettingsBackend,
    /// File used by the `json` backend.
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            backend: SettingsBackend::default(),
            path: default_settings_path(),
        }
    }
}

/// Plugin database configuration.
///
/// `connection` is an SQLite URL such as `sqlite://slbot.db`, or `:memory:`
/// for a private in-memory database. Without it persistence stays disabled.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PersistenceConfig {
    pub connection: Option<String>,
    /// Log every SQL statement at debug level.
    #[serde(default)]
    pub log_statements: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}
