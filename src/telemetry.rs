//! Tracing setup and standard spans.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Standardized span constructors for bot observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for a command execution.
    pub fn command(name: &str, nick: &str, channel: &str) -> Span {
        info_span!("command", name = %name, nick = %nick, channel = %channel)
    }

    /// Create a span for a plugin callback or command handler.
    pub fn plugin(plugin: &str, callback: &str) -> Span {
        info_span!("plugin", plugin = %plugin, callback = %callback)
    }
}
