//! Unified error handling for slbot.
//!
//! This module provides the error hierarchy for the bot runtime, with
//! automatic conversions and static codes for log labelling.

use crate::event::EventKind;
use thiserror::Error;

// ============================================================================
// Plugin Errors (loading, construction, callbacks)
// ============================================================================

/// Errors raised while loading a plugin or running one of its handlers.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("plugin {plugin} failed to initialize: {reason}")]
    Init { plugin: String, reason: String },

    #[error("invalid plugin configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read plugin files: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("no handler for {tier} command {command}")]
    MissingHandler { tier: &'static str, command: String },

    /// A handler reported a failure of its own.
    #[error("{0}")]
    Failed(String),

    #[error("plugin panicked: {0}")]
    Panicked(String),
}

impl PluginError {
    /// Convenience constructor for handler-reported failures.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Get a static error code string for log labelling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownPlugin(_) => "unknown_plugin",
            Self::Init { .. } => "init_failed",
            Self::Config(_) => "bad_plugin_config",
            Self::Io(_) => "plugin_io",
            Self::Settings(_) => "plugin_settings",
            Self::Persistence(e) => e.error_code(),
            Self::MissingHandler { .. } => "missing_handler",
            Self::Failed(_) => "handler_failed",
            Self::Panicked(_) => "panicked",
        }
    }
}

// ============================================================================
// Connection Errors (adapter writes)
// ============================================================================

/// Errors reported by the connection adapter.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Io(_) => "io",
        }
    }
}

// ============================================================================
// Settings Errors
// ============================================================================

/// Errors from a settings backend.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed settings document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings root must be a JSON object")]
    NotAnObject,

    #[error("empty settings key")]
    EmptyKey,
}

impl SettingsError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "settings_io",
            Self::Json(_) => "settings_json",
            Self::NotAnObject => "settings_not_object",
            Self::EmptyKey => "settings_empty_key",
        }
    }
}

// ============================================================================
// Persistence Errors
// ============================================================================

/// Errors from the plugin database.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence.connection is not set")]
    NotConfigured,

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("database worker has stopped")]
    WorkerStopped,
}

impl PersistenceError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "db_not_configured",
            Self::Sqlx(_) => "db",
            Self::WorkerStopped => "db_worker_stopped",
        }
    }
}

// ============================================================================
// Bus Errors
// ============================================================================

/// A subscriber failed while an event was being published.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("subscriber for {topic} failed: {source}")]
    Subscriber {
        topic: EventKind,
        #[source]
        source: Box<BotError>,
    },
}

// ============================================================================
// Bot Errors (umbrella)
// ============================================================================

/// Top-level error for core operations.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("event bus error: {0}")]
    Bus(#[from] BusError),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl BotError {
    /// Get a static error code string for log labelling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Plugin(e) => e.error_code(),
            Self::Settings(e) => e.error_code(),
            Self::Bus(_) => "bus_subscriber",
            Self::Config(_) => "config",
        }
    }
}

/// Result type for core operations.
pub type BotResult<T = ()> = Result<T, BotError>;
