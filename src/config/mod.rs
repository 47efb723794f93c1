//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, BotConfig, ConnectionConfig, AdminConfig, ...)
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup validation of loaded configuration

pub(crate) mod defaults;
mod types;
pub mod validation;

pub use types::{
    AdminConfig, BotConfig, Config, ConfigError, ConnectionConfig, LogFormat, LoggingConfig,
    PersistenceConfig, PluginsConfig, SettingsBackend, SettingsConfig,
};
pub use validation::{ValidationError, validate};
