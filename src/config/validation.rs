//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early. Admin
//! credential problems are not checked here: they disable the admin subsystem
//! instead of stopping the bot.

use super::Config;
use crate::clock::MAX_DELAY;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("bot.nick is required")]
    MissingNick,
    #[error("bot.nick must not contain whitespace, got '{0}'")]
    InvalidNick(String),
    #[error("connection.command_prefix must not be empty")]
    EmptyCommandPrefix,
    #[error("connection.max_flood must be at least 1")]
    ZeroFloodBudget,
    #[error("connection.{field} must be a positive number of seconds, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("{field} must be at most {max} seconds, got {value}")]
    DelayTooLong { field: &'static str, value: f64, max: u64 },
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let nick = &config.bot.nick;
    if nick.is_empty() {
        errors.push(ValidationError::MissingNick);
    } else if nick.chars().any(char::is_whitespace) {
        errors.push(ValidationError::InvalidNick(nick.clone()));
    }

    let conn = &config.connection;
    if conn.command_prefix.is_empty() {
        errors.push(ValidationError::EmptyCommandPrefix);
    }
    if conn.max_flood == 0 {
        errors.push(ValidationError::ZeroFloodBudget);
    }

    // A zero flood_wait would retry deferred sends in the same tick forever.
    for (field, value) in [
        ("keepalive_delay", conn.keepalive_delay),
        ("flood_interval", conn.flood_interval),
        ("flood_wait", conn.flood_wait),
    ] {
        if !value.is_finite() || value <= 0.0 {
            errors.push(ValidationError::InvalidDuration { field, value });
        }
    }

    let max = MAX_DELAY.as_secs();
    let mut bounded = vec![
        ("connection.keepalive_delay", conn.keepalive_delay),
        ("connection.flood_interval", conn.flood_interval),
        ("connection.flood_wait", conn.flood_wait),
        ("bot.shutup_duration", config.bot.shutup_duration as f64),
    ];
    if let Some(admin) = &config.admin {
        bounded.push(("admin.timeout", admin.timeout as f64));
    }
    for (field, value) in bounded {
        if value.is_finite() && value > max as f64 {
            errors.push(ValidationError::DelayTooLong { field, value, max });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
