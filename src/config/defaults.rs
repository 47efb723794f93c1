//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::path::PathBuf;

// =============================================================================
// Bot Defaults
// =============================================================================

pub fn default_info() -> String {
    "Hi, my name is {nick} and I'm an IRC bot. Try {command_prefix}help for the commands I \
     currently support."
        .to_string()
}

pub fn default_shutup_duration() -> u64 {
    30
}

pub fn default_nick_delimiters() -> String {
    ":,".to_string()
}

// =============================================================================
// Connection Defaults
// =============================================================================

pub fn default_host() -> String {
    "localhost".to_string()
}

pub fn default_port() -> u16 {
    6667
}

pub fn default_command_prefix() -> String {
    "!".to_string()
}

pub fn default_keepalive_delay() -> f64 {
    60.0
}

pub fn default_max_flood() -> usize {
    4
}

pub fn default_flood_interval() -> f64 {
    8.0
}

pub fn default_flood_wait() -> f64 {
    2.0
}

// =============================================================================
// Admin Defaults
// =============================================================================

/// Seconds an admin session lasts between admin commands.
pub fn default_admin_timeout() -> u64 {
    600
}

// =============================================================================
// Settings Defaults
// =============================================================================

pub fn default_settings_path() -> PathBuf {
    PathBuf::from("settings.json")
}
