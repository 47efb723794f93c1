//! The bot core.
//!
//! [`BotCore`] owns every piece of runtime state: the event bus, the
//! connection, admin sessions, the flood gate, deferred actions, loaded
//! plugins, and settings. It is driven from one task. Inbound events are
//! published on the bus, where the core's own subscriptions interpret them;
//! commands are resolved by the [`CommandRouter`] and plugins are notified
//! afterwards.

mod commands;

pub use commands::CoreCommand;

use crate::admin::AdminSessionManager;
use crate::bus::EventBus;
use crate::clock::{Clock, MAX_DELAY, deadline};
use crate::config::Config;
use crate::connection::{Connection, Inbound, normalize_channel};
use crate::error::{BotError, BotResult};
use crate::event::{Event, EventKind, classify_privmsg};
use crate::flood::{FloodConfig, FloodGate, SendDecision, secs};
use crate::persistence::Database;
use crate::plugin::{
    CommandTable, DispatchEnv, Effect, Invocation, PluginCatalog, PluginEvent, PluginRegistry, Tier,
};
use crate::roster::ChannelRoster;
use crate::router::{CommandRouter, Permissions, Searchable, parse_command, parse_private};
use crate::scheduler::{Deferred, Scheduler};
use crate::settings::SettingsStore;
use crate::telemetry::spans;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shortest delay accepted for plugin timers, so a timer that re-arms itself
/// with a zero delay cannot starve the loop.
const MIN_TIMER_DELAY: Duration = Duration::from_millis(1);

/// Adapter events the core interprets.
const ADAPTER_EVENTS: [EventKind; 20] = [
    EventKind::Connected,
    EventKind::MessageOfTheDay,
    EventKind::Message,
    EventKind::PrivateMessage,
    EventKind::DirectMessage,
    EventKind::Command,
    EventKind::Notice,
    EventKind::UserAction,
    EventKind::Joined,
    EventKind::Left,
    EventKind::Kicked,
    EventKind::TopicChanged,
    EventKind::UserJoined,
    EventKind::UserLeft,
    EventKind::UserQuit,
    EventKind::UserKicked,
    EventKind::UserRenamed,
    EventKind::UserList,
    EventKind::Pong,
    EventKind::Unknown,
];

pub struct BotCore {
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus<BotCore>>,
    connection: Box<dyn Connection>,
    admin: AdminSessionManager,
    flood: FloodGate,
    scheduler: Scheduler,
    plugins: PluginRegistry,
    commands: CommandTable<CoreCommand>,
    settings: Box<dyn SettingsStore>,
    database: Option<Database>,
    roster: ChannelRoster,
    channels: Vec<String>,
    nick: String,
    former_nick: Option<String>,
    prefix: String,
    shutup_until: Option<Instant>,
    /// Where to report the round trip of the pending `ping` command.
    ping_reply_to: Option<String>,
    pending_effects: VecDeque<Effect>,
    applying_effects: bool,
    running: bool,
    started: DateTime<Utc>,
}

impl BotCore {
    pub fn new(
        config: impl Into<Arc<Config>>,
        connection: Box<dyn Connection>,
        settings: Box<dyn SettingsStore>,
        catalog: PluginCatalog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = config.into();
        let bus = EventBus::new();
        for kind in ADAPTER_EVENTS {
            bus.subscribe(kind, |core: &mut BotCore, event: &Event| core.on_adapter_event(event));
        }
        bus.subscribe(EventKind::AdminCommand, |_: &mut BotCore, event: &Event| {
            if let Event::AdminCommand {
                identity,
                nick,
                channel,
                command,
                ..
            } = event
            {
                info!(
                    nick = %nick,
                    identity = %identity,
                    channel = %channel,
                    command = %command,
                    "Admin command executed"
                );
            }
            Ok(())
        });

        Self {
            admin: AdminSessionManager::from_config(config.admin.as_ref()),
            flood: FloodGate::new(FloodConfig::from_connection(&config.connection)),
            nick: config.bot.nick.clone(),
            prefix: config.connection.command_prefix.clone(),
            config,
            clock,
            bus: Arc::new(bus),
            connection,
            scheduler: Scheduler::new(),
            plugins: PluginRegistry::new(catalog),
            commands: commands::table(),
            settings,
            database: None,
            roster: ChannelRoster::new(),
            channels: Vec::new(),
            former_nick: None,
            shutup_until: None,
            ping_reply_to: None,
            pending_effects: VecDeque::new(),
            applying_effects: false,
            running: true,
            started: Utc::now(),
        }
    }

    /// Give plugins a database. Call before [`BotCore::start`] so plugin
    /// factories see it too.
    pub fn with_database(mut self, database: Option<Database>) -> Self {
        self.plugins.set_database(database.clone());
        self.database = database;
        self
    }

    /// Seed settings from the config, load plugins, and announce them.
    pub fn start(&mut self) -> BotResult {
        self.write_default_settings()?;
        self.apply_runtime_settings();
        info!(
            nick = %self.nick,
            prefix = %self.prefix,
            admin = self.admin.scheme().unwrap_or("disabled"),
            "Bot core starting"
        );
        self.load_plugins()?;
        Ok(())
    }

    fn write_default_settings(&mut self) -> BotResult {
        let bot = &self.config.bot;
        let conn = &self.config.connection;
        let defaults = [
            ("nick", json!(bot.nick)),
            ("default_channels", json!(bot.default_channels)),
            ("info", json!(bot.info)),
            ("shutup_duration", json!(bot.shutup_duration)),
            ("nick_command_delimiters", json!(bot.nick_command_delimiters)),
            ("connection.command_prefix", json!(conn.command_prefix)),
            ("connection.keepalive_delay", json!(conn.keepalive_delay)),
            ("connection.max_flood", json!(conn.max_flood)),
            ("connection.flood_interval", json!(conn.flood_interval)),
            ("connection.flood_wait", json!(conn.flood_wait)),
        ];
        for (key, value) in defaults {
            self.settings.set_initial(key, value)?;
        }
        Ok(())
    }

    /// Re-read the settings the core consults on every event.
    fn apply_runtime_settings(&mut self) {
        self.prefix = self
            .settings
            .get_str("connection.command_prefix")
            .filter(|prefix| !prefix.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.connection.command_prefix.clone());

        let base = FloodConfig::from_connection(&self.config.connection);
        let flood = FloodConfig {
            max_flood: self
                .settings
                .get_u64("connection.max_flood")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|&n| n > 0)
                .unwrap_or(base.max_flood),
            flood_interval: self
                .settings
                .get_f64("connection.flood_interval")
                .and_then(secs)
                .unwrap_or(base.flood_interval),
            flood_wait: self
                .settings
                .get_f64("connection.flood_wait")
                .and_then(secs)
                .unwrap_or(base.flood_wait),
            keepalive_delay: self
                .settings
                .get_f64("connection.keepalive_delay")
                .and_then(secs)
                .unwrap_or(base.keepalive_delay),
        };
        if flood != *self.flood.config() {
            debug!(?flood, "Flood settings changed");
            self.flood.set_config(flood);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus<BotCore>> {
        &self.bus
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn command_prefix(&self) -> &str {
        &self.prefix
    }

    /// Channels the bot is currently in, in join order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn admin(&self) -> &AdminSessionManager {
        &self.admin
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn settings(&self) -> &dyn SettingsStore {
        self.settings.as_ref()
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    pub fn roster(&self) -> &ChannelRoster {
        &self.roster
    }

    pub fn flood(&self) -> &FloodGate {
        &self.flood
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_shut_up(&self) -> bool {
        self.shutup_until.is_some_and(|until| self.clock.now() < until)
    }

    pub fn is_admin(&self, identity: &str, nick: &str) -> bool {
        self.admin.is_admin(identity, nick, self.clock.now())
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    /// Publish an inbound event on the bus.
    pub fn handle_event(&mut self, event: Event) -> BotResult {
        self.publish(&event)
    }

    /// Classify a raw line if needed, then handle it.
    pub fn handle_inbound(&mut self, inbound: Inbound) -> BotResult {
        match inbound {
            Inbound::Event(event) => self.handle_event(event),
            Inbound::Privmsg {
                identity,
                target,
                text,
            } => {
                let target = target.unwrap_or_else(|| self.nick.clone());
                let event = classify_privmsg(&identity, &target, &text, &self.nick, &self.prefix);
                self.handle_event(event)
            }
        }
    }

    fn publish(&mut self, event: &Event) -> BotResult {
        let bus = Arc::clone(&self.bus);
        bus.publish(self, event)?;
        Ok(())
    }

    fn on_adapter_event(&mut self, event: &Event) -> BotResult {
        match event {
            Event::Connected => self.on_connected()?,
            Event::PrivateMessage {
                identity,
                nick,
                text,
            } => {
                let found = match parse_private(text, &self.prefix) {
                    Some(parsed) => {
                        let own_nick = self.nick.clone();
                        self.find_and_call(parsed.name, identity, nick, &own_nick, parsed.rest, true)?
                    }
                    None => false,
                };
                if !found {
                    self.notify_plugins(&PluginEvent::PrivateMessage {
                        identity: identity.clone(),
                        nick: nick.clone(),
                        text: text.clone(),
                    });
                }
            }
            Event::DirectMessage {
                identity,
                nick,
                channel,
                text,
            } => {
                let delimiters = self.nick_delimiters();
                let found = match parse_command(text, "", &self.nick, &delimiters) {
                    Some(parsed) => self.find_and_call(parsed.name, identity, nick, channel, parsed.rest, false)?,
                    None => false,
                };
                if !found {
                    self.notify_plugins(&PluginEvent::Message {
                        identity: identity.clone(),
                        nick: nick.clone(),
                        channel: channel.clone(),
                        text: text.clone(),
                        highlighted: true,
                    });
                }
            }
            Event::Command {
                identity,
                nick,
                channel,
                name,
                rest,
            } => {
                if !self.find_and_call(name, identity, nick, channel, rest, false)? {
                    let text = format!("{}{} {}", self.prefix, name, rest);
                    self.notify_plugins(&PluginEvent::Message {
                        identity: identity.clone(),
                        nick: nick.clone(),
                        channel: channel.clone(),
                        text: text.trim_end().to_string(),
                        highlighted: true,
                    });
                }
            }
            Event::Joined { channel } => {
                info!(channel = %channel, "Joined channel");
                if !self.channels.contains(channel) {
                    self.channels.push(channel.clone());
                }
                let mut defaults = self.settings.get_string_list("default_channels");
                if !defaults.contains(channel) {
                    defaults.push(channel.clone());
                    self.settings.set("default_channels", json!(defaults))?;
                }
                self.relay(event);
            }
            Event::Left { channel } => {
                self.on_left(channel)?;
                self.relay(event);
            }
            Event::Kicked {
                kicker, channel, ..
            } => {
                warn!(channel = %channel, kicker = %kicker, "Kicked from channel");
                self.on_left(channel)?;
                self.notify_plugins(&PluginEvent::Left {
                    channel: channel.clone(),
                });
                self.relay(event);
            }
            Event::UserLeft { nick, channel, .. } => {
                self.admin.clear(nick);
                self.roster.user_left(nick, channel);
                self.relay(event);
            }
            Event::UserQuit { nick, .. } => {
                self.admin.clear(nick);
                self.roster.user_quit(nick);
                self.relay(event);
            }
            Event::UserKicked { kickee, channel, .. } => {
                self.admin.clear(kickee);
                self.roster.user_left(kickee, channel);
                self.relay(event);
            }
            Event::UserRenamed {
                old_nick, new_nick, ..
            } => {
                self.admin.clear(old_nick);
                self.admin.clear(new_nick);
                self.roster.user_renamed(old_nick, new_nick);
                let echo = self.former_nick.as_ref() == Some(old_nick) && *new_nick == self.nick;
                if echo {
                    // Later renames from the old nick belong to someone else.
                    self.former_nick = None;
                }
                if !echo && *old_nick != self.nick {
                    self.relay(event);
                }
            }
            Event::UserList { channel, users, .. } => {
                self.roster.apply_user_list(channel, users);
                self.relay(event);
            }
            Event::Pong { nick, seconds, .. } => {
                if let Some(target) = self.ping_reply_to.take() {
                    let text = format!("{nick} pong! Round trip time: {seconds:.2} seconds");
                    self.send_message(&target, &text)?;
                }
            }
            Event::MessageOfTheDay { .. }
            | Event::Message { .. }
            | Event::Notice { .. }
            | Event::UserAction { .. }
            | Event::TopicChanged { .. }
            | Event::UserJoined { .. }
            | Event::Unknown { .. } => self.relay(event),
            Event::AdminCommand { .. } | Event::PluginsLoaded | Event::Shutdown => {}
        }
        Ok(())
    }

    fn on_connected(&mut self) -> BotResult {
        info!("Connected");
        let nick = self
            .settings
            .get_str("nick")
            .map(str::to_string)
            .unwrap_or_else(|| self.config.bot.nick.clone());
        self.set_nick(&nick)?;

        for channel in self.settings.get_string_list("default_channels") {
            self.connection.join(&normalize_channel(&channel), None)?;
        }

        if !self.scheduler.has_pending(|d| matches!(d, Deferred::KeepAlive)) {
            self.keep_alive()?;
        }
        self.notify_plugins(&PluginEvent::Connected);
        Ok(())
    }

    fn on_left(&mut self, channel: &str) -> BotResult {
        info!(channel = %channel, "Left channel");
        self.channels.retain(|c| c != channel);
        self.roster.forget_channel(channel);
        let mut defaults = self.settings.get_string_list("default_channels");
        let before = defaults.len();
        defaults.retain(|c| c != channel);
        if defaults.len() != before {
            self.settings.set("default_channels", json!(defaults))?;
        }
        Ok(())
    }

    fn nick_delimiters(&self) -> String {
        self.settings
            .get_str("nick_command_delimiters")
            .map(str::to_string)
            .unwrap_or_else(|| self.config.bot.nick_command_delimiters.clone())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Resolve `name` for the caller and run the winning handler.
    ///
    /// Returns `Ok(false)` when no searchable exposes the command at a tier
    /// the caller qualifies for. A handler that fails still counts as found:
    /// the failure is logged and the notifications are skipped.
    fn find_and_call(
        &mut self,
        name: &str,
        identity: &str,
        nick: &str,
        channel: &str,
        rest: &str,
        private: bool,
    ) -> BotResult<bool> {
        let now = self.clock.now();
        let perms = Permissions {
            admin: self.admin.is_admin(identity, nick, now),
            op: !private && self.roster.is_op(nick, channel),
        };
        let Some(resolution) = CommandRouter::new(&self.commands, &self.plugins).resolve(name, perms) else {
            debug!(command = %name, nick = %nick, "Command not found");
            return Ok(false);
        };

        let inv = Invocation {
            identity,
            nick,
            channel,
            command: name,
            rest,
            private,
        };
        let span = spans::command(name, nick, channel);
        let _enter = span.enter();

        let result = match resolution.searchable {
            Searchable::Core => match self.commands.lookup(name, resolution.tier).map(|(_, h)| *h) {
                Some(handler) => handler(self, &inv),
                None => Ok(()),
            },
            Searchable::Plugin(index) => {
                let outcome = {
                    let mut env = DispatchEnv {
                        nick: &self.nick,
                        prefix: &self.prefix,
                        now,
                        admin: &self.admin,
                        settings: self.settings.as_mut(),
                        database: self.database.as_ref(),
                    };
                    self.plugins.call_command(index, resolution.tier, &inv, &mut env)
                };
                self.apply_effects(outcome.effects);
                outcome.result.map_err(BotError::from)
            }
        };

        if let Err(e) = result {
            error!(
                command = %name,
                nick = %nick,
                tier = %resolution.tier,
                code = e.error_code(),
                error = %e,
                "Command handler failed"
            );
            return Ok(true);
        }

        let admin = resolution.tier == Tier::Admin;
        if admin {
            self.admin.touch(nick, self.clock.now());
            self.publish(&Event::AdminCommand {
                identity: identity.to_string(),
                nick: nick.to_string(),
                channel: channel.to_string(),
                command: name.to_string(),
                rest: rest.to_string(),
            })?;
        }

        if resolution.notify {
            let (identity, nick, channel, command, rest) = (
                identity.to_string(),
                nick.to_string(),
                channel.to_string(),
                name.to_string(),
                rest.to_string(),
            );
            let event = if admin {
                PluginEvent::AdminCommand {
                    identity,
                    nick,
                    channel,
                    command,
                    rest,
                }
            } else {
                PluginEvent::Command {
                    identity,
                    nick,
                    channel,
                    command,
                    rest,
                }
            };
            self.notify_plugins(&event);
        }
        Ok(true)
    }

    /// Reload one plugin by name.
    pub fn reload_plugin(&mut self, name: &str) -> bool {
        let config = Arc::clone(&self.config);
        let loaded = self.plugins.load(name, &config);
        if loaded {
            self.plugins.create_tables();
        }
        loaded
    }

    /// Reload every plugin and tell them loading finished.
    pub fn load_plugins(&mut self) -> BotResult<usize> {
        let config = Arc::clone(&self.config);
        let count = self.plugins.load_all(&config);
        self.plugins.create_tables();
        self.notify_plugins(&PluginEvent::PluginsLoaded);
        self.publish(&Event::PluginsLoaded)?;
        Ok(count)
    }

    // ========================================================================
    // Plugin fan-out
    // ========================================================================

    fn relay(&mut self, event: &Event) {
        if let Some(event) = PluginEvent::relay(event) {
            self.notify_plugins(&event);
        }
    }

    /// Deliver `event` to every plugin and apply what they asked for.
    pub fn notify_plugins(&mut self, event: &PluginEvent) {
        let effects = {
            let mut env = DispatchEnv {
                nick: &self.nick,
                prefix: &self.prefix,
                now: self.clock.now(),
                admin: &self.admin,
                settings: self.settings.as_mut(),
                database: self.database.as_ref(),
            };
            self.plugins.dispatch(event, &mut env)
        };
        self.apply_effects(effects);
    }

    fn notify_plugin(&mut self, plugin: &str, event: &PluginEvent) {
        let effects = {
            let mut env = DispatchEnv {
                nick: &self.nick,
                prefix: &self.prefix,
                now: self.clock.now(),
                admin: &self.admin,
                settings: self.settings.as_mut(),
                database: self.database.as_ref(),
            };
            self.plugins.dispatch_to(plugin, event, &mut env)
        };
        self.apply_effects(effects);
    }

    /// Queue plugin effects and apply them in order.
    ///
    /// Applying an effect can notify plugins again (a send produces
    /// `on_send`); the resulting effects join the back of the queue instead
    /// of recursing.
    fn apply_effects(&mut self, effects: Vec<Effect>) {
        self.pending_effects.extend(effects);
        if self.applying_effects {
            return;
        }
        self.applying_effects = true;
        while let Some(effect) = self.pending_effects.pop_front() {
            if let Err(e) = self.apply_effect(effect) {
                warn!(error = %e, code = e.error_code(), "Failed to apply plugin effect");
            }
        }
        self.applying_effects = false;
    }

    fn apply_effect(&mut self, effect: Effect) -> BotResult {
        match effect {
            Effect::Send { target, text } => {
                self.send_message(&target, &text)?;
            }
            Effect::Action { target, text } => self.action(&target, &text)?,
            Effect::Join { channel, key } => self.join_channel(&channel, key.as_deref())?,
            Effect::Leave { channel, reason } => self.leave_channel(&channel, reason.as_deref())?,
            Effect::Kick {
                channel,
                nick,
                reason,
            } => self.connection.kick(&normalize_channel(&channel), &nick, &reason)?,
            Effect::Topic { channel, topic } => self.connection.topic(&normalize_channel(&channel), &topic)?,
            Effect::Whois { nick } => self.connection.whois(&nick)?,
            Effect::CallLater {
                plugin,
                delay,
                token,
            } => {
                let due = deadline(self.clock.now(), delay.max(MIN_TIMER_DELAY));
                self.scheduler.schedule(due, Deferred::PluginTimer { plugin, token });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Send a chat line unless the bot has been told to shut up.
    ///
    /// Returns whether the line went out now; a flood-deferred line is sent
    /// later by [`BotCore::run_due`].
    pub fn send_message(&mut self, target: &str, text: &str) -> BotResult<bool> {
        if self.is_shut_up() {
            debug!(target = %target, "Shut up, dropping message");
            return Ok(false);
        }
        self.transmit(target, text)
    }

    fn transmit(&mut self, target: &str, text: &str) -> BotResult<bool> {
        let now = self.clock.now();
        match self.flood.try_send(now) {
            SendDecision::Deferred { retry_at } => {
                self.scheduler.schedule(
                    retry_at,
                    Deferred::FloodRetry {
                        target: target.to_string(),
                        text: text.to_string(),
                    },
                );
                Ok(false)
            }
            SendDecision::Sent => {
                self.connection.send_message(target, text)?;
                self.notify_plugins(&PluginEvent::Send {
                    target: target.to_string(),
                    text: text.to_string(),
                });
                Ok(true)
            }
        }
    }

    pub fn action(&mut self, target: &str, text: &str) -> BotResult {
        self.connection.describe(target, text)?;
        self.notify_plugins(&PluginEvent::Action {
            target: target.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    pub fn join_channel(&mut self, channel: &str, key: Option<&str>) -> BotResult {
        self.connection.join(&normalize_channel(channel), key)?;
        Ok(())
    }

    pub fn leave_channel(&mut self, channel: &str, reason: Option<&str>) -> BotResult {
        self.connection.leave(&normalize_channel(channel), reason)?;
        Ok(())
    }

    /// Change the bot's nick and tell the plugins.
    pub fn set_nick(&mut self, nick: &str) -> BotResult {
        let nick = nick.trim();
        if nick.is_empty() {
            return Ok(());
        }
        self.connection.set_nick(nick)?;
        let old_nick = std::mem::replace(&mut self.nick, nick.to_string());
        if old_nick != nick {
            self.former_nick = Some(old_nick.clone());
        }
        info!(nick = %nick, old_nick = %old_nick, "Nick set");
        self.notify_plugins(&PluginEvent::NickChange {
            nick: nick.to_string(),
            old_nick,
        });
        Ok(())
    }

    /// Drop all chat sends for `duration`, capped at [`MAX_DELAY`].
    pub fn shut_up(&mut self, duration: Duration) {
        let duration = duration.min(MAX_DELAY);
        self.shutup_until = Some(deadline(self.clock.now(), duration));
        let until = chrono::Duration::from_std(duration)
            .ok()
            .map(|delta| (Utc::now() + delta).format("%H:%M:%S UTC").to_string());
        info!(until = ?until, "Shutting up");
    }

    pub fn ping(&mut self, target: &str, reply_to: &str) -> BotResult {
        self.ping_reply_to = Some(reply_to.to_string());
        self.connection.ping(target)?;
        Ok(())
    }

    /// Notify plugins, publish shutdown, save settings, and disconnect.
    pub fn quit(&mut self) -> BotResult {
        if !self.running {
            return Ok(());
        }
        info!("Shutting down");
        self.running = false;
        self.notify_plugins(&PluginEvent::Shutdown);
        self.publish(&Event::Shutdown)?;
        self.scheduler.clear();
        if let Err(e) = self.settings.save() {
            error!(error = %e, code = e.error_code(), "Failed to save settings");
        }
        self.connection.disconnect()?;
        Ok(())
    }

    // ========================================================================
    // Deferred actions
    // ========================================================================

    /// Run every deferred action due now.
    ///
    /// Actions scheduled while running are picked up only if they are
    /// already due at the instant this call started.
    pub fn run_due(&mut self) {
        let now = self.clock.now();
        while let Some(action) = self.scheduler.pop_due(now) {
            let result = match action {
                Deferred::FloodRetry { target, text } => self.transmit(&target, &text).map(|_| ()),
                Deferred::KeepAlive => self.keep_alive(),
                Deferred::PluginTimer { plugin, token } => {
                    self.notify_plugin(&plugin, &PluginEvent::Timer { token });
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!(error = %e, code = e.error_code(), "Deferred action failed");
            }
        }
    }

    /// Probe the server if nothing went out for a while, then re-arm.
    pub fn keep_alive(&mut self) -> BotResult {
        let check = self.flood.keep_alive(self.clock.now());
        self.scheduler.schedule(check.next_check, Deferred::KeepAlive);
        if check.probe {
            let host = self.config.connection.host.clone();
            self.connection.ping(&host)?;
        }
        Ok(())
    }

    // ========================================================================
    // Runtime
    // ========================================================================

    /// Process inbound items and deferred actions until shutdown.
    ///
    /// Returns when the bot quits, the inbound channel closes, or the
    /// process receives Ctrl-C.
    pub async fn run(&mut self, mut inbound: mpsc::Receiver<Inbound>) -> BotResult {
        while self.running {
            let next_due = self.scheduler.next_due();
            tokio::select! {
                item = inbound.recv() => match item {
                    Some(item) => {
                        if let Err(e) = self.handle_inbound(item) {
                            error!(error = %e, code = e.error_code(), "Failed to handle inbound event");
                        }
                    }
                    None => {
                        info!("Inbound stream closed");
                        self.quit()?;
                    }
                },
                _ = sleep_until(next_due) => self.run_due(),
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    self.quit()?;
                }
            }
        }
        Ok(())
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
