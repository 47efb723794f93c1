//! Integration test common infrastructure.
//!
//! Provides a [`TestBot`] harness around `BotCore` driven by a manual clock
//! and a recording connection, and a probe plugin that journals callbacks.

#![allow(dead_code)]

pub mod probe;

pub use probe::{Journal, Probe};

use slbot::clock::ManualClock;
use slbot::connection::{Inbound, Outbound, OutboundLog, RecordingConnection};
use slbot::error::PluginError;
use slbot::persistence::Database;
use slbot::plugin::{PluginCatalog, PluginInit};
use slbot::settings::MemorySettings;
use slbot::{BotCore, Config, Event};
use std::sync::Arc;

/// Shared-secret admin, two probes, generous flood budget, no keep-alive noise.
pub const BASE_CONFIG: &str = r##"
[bot]
nick = "slbot"
default_channels = ["#bots"]

[connection]
host = "irc.example.net"
keepalive_delay = 3600.0
max_flood = 100
flood_interval = 8.0
flood_wait = 2.0

[admin]
enabled = true
scheme = "shared"
password = "secret123"
timeout = 600

[plugins]
enabled = ["first", "second"]
"##;

pub fn identity(nick: &str) -> String {
    format!("{nick}!{nick}@example.net")
}

/// Probes `first` and `second`, the built-in `echo`, and a `broken` plugin
/// whose constructor always fails.
pub fn catalog(journal: &Journal) -> PluginCatalog {
    let mut catalog = PluginCatalog::builtin();
    catalog
        .register("first", Probe::factory("first", journal.clone()))
        .register("second", Probe::factory("second", journal.clone()))
        .register("broken", |init: &PluginInit<'_>| {
            Err(PluginError::Init {
                plugin: init.name.to_string(),
                reason: "missing api key".into(),
            })
        });
    catalog
}

pub struct TestBot {
    pub core: BotCore,
    pub clock: ManualClock,
    pub log: OutboundLog,
    pub journal: Journal,
}

impl TestBot {
    pub fn start(config: &str) -> Self {
        Self::start_with_database(config, None)
    }

    pub fn start_with_database(config: &str, database: Option<Database>) -> Self {
        let config: Config = config.parse().expect("test config parses");
        let clock = ManualClock::new();
        let connection = RecordingConnection::new();
        let log = connection.log();
        let journal = Journal::new();

        let mut core = BotCore::new(
            config,
            Box::new(connection),
            Box::new(MemorySettings::new()),
            catalog(&journal),
            Arc::new(clock.clone()),
        )
        .with_database(database);
        core.start().expect("core starts");

        Self {
            core,
            clock,
            log,
            journal,
        }
    }

    /// `nick` says `text` in `channel`.
    pub fn say(&mut self, nick: &str, channel: &str, text: &str) {
        self.say_as(&identity(nick), channel, text);
    }

    pub fn say_as(&mut self, identity: &str, channel: &str, text: &str) {
        self.core
            .handle_inbound(Inbound::Privmsg {
                identity: identity.to_string(),
                target: Some(channel.to_string()),
                text: text.to_string(),
            })
            .expect("inbound line handled");
    }

    /// `nick` messages the bot privately.
    pub fn whisper(&mut self, nick: &str, text: &str) {
        self.core
            .handle_inbound(Inbound::Privmsg {
                identity: identity(nick),
                target: None,
                text: text.to_string(),
            })
            .expect("private line handled");
    }

    pub fn event(&mut self, event: Event) {
        self.core.handle_event(event).expect("event handled");
    }

    pub fn login(&mut self, nick: &str) {
        self.say(nick, "#bots", "!login secret123");
        assert!(self.core.is_admin(&identity(nick), nick), "{nick} logged in");
    }

    /// Move the clock forward and run whatever came due.
    pub fn advance(&mut self, secs: f64) {
        self.clock.advance_secs(secs);
        self.core.run_due();
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.log.messages()
    }

    /// Chat lines sent since the last call.
    pub fn take_messages(&self) -> Vec<(String, String)> {
        self.log
            .take()
            .into_iter()
            .filter_map(|entry| match entry {
                Outbound::Message { target, text } => Some((target, text)),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self, target: &str, text: &str) -> bool {
        self.messages().iter().any(|(t, m)| t == target && m == text)
    }
}
