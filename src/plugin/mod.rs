//! Plugin interface.
//!
//! A plugin is a named, stateful unit that contributes tiered commands and
//! reacts to [`PluginEvent`]s. Commands are declared once, at load time, in a
//! [`CommandTable`]; the router consults those tables and never inspects a
//! plugin at runtime.
//!
//! Plugins never hold a reference to the core. Handlers queue [`Effect`]s on
//! their [`PluginContext`] and the core applies them after the handler
//! returns.

pub mod echo;
mod event;
pub mod registry;

pub use event::PluginEvent;
pub use registry::{PluginCatalog, PluginFactory, PluginInit, PluginRegistry};

use crate::admin::AdminSessionManager;
use crate::error::PluginError;
use crate::persistence::Database;
use crate::settings::{PluginSettings, SettingsStore};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

/// Command docs containing this token do not trigger plugin command
/// notifications (used by `login` so secrets are not echoed to observers).
pub const NO_NOTIFY_MARKER: &str = "**does_not_notify_plugins**";

/// Permission tier of a command handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    User,
    Op,
    Admin,
}

impl Tier {
    /// Tiers in the order the router checks them.
    pub const PRIORITY: [Tier; 3] = [Tier::Admin, Tier::Op, Tier::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Op => "op",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared metadata for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tier: Tier,
    /// Help text. May contain `{nick}`, `{command_prefix}` and [`NO_NOTIFY_MARKER`].
    pub doc: &'static str,
}

impl CommandSpec {
    pub fn notifies_plugins(&self) -> bool {
        !self.doc.contains(NO_NOTIFY_MARKER)
    }
}

/// Read-only view of a command table, used by the router and `help`.
pub trait CommandSource {
    fn find(&self, name: &str, tier: Tier) -> Option<&CommandSpec>;

    /// Every declared command, in registration order.
    fn specs(&self) -> Vec<&CommandSpec>;
}

/// Command name and tier to handler, built once when a plugin loads.
pub struct CommandTable<H> {
    entries: Vec<(CommandSpec, H)>,
    by_tier: HashMap<Tier, HashMap<&'static str, usize>>,
}

impl<H> CommandTable<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_tier: HashMap::new(),
        }
    }

    /// Register `handler` as `name` at `tier`, replacing an earlier
    /// registration of the same name and tier.
    pub fn register(&mut self, tier: Tier, name: &'static str, doc: &'static str, handler: H) -> &mut Self {
        let spec = CommandSpec { name, tier, doc };
        let slots = self.by_tier.entry(tier).or_default();
        match slots.get(name) {
            Some(&index) => self.entries[index] = (spec, handler),
            None => {
                slots.insert(name, self.entries.len());
                self.entries.push((spec, handler));
            }
        }
        self
    }

    /// Register a user-tier command.
    pub fn command(&mut self, name: &'static str, doc: &'static str, handler: H) -> &mut Self {
        self.register(Tier::User, name, doc, handler)
    }

    pub fn op(&mut self, name: &'static str, doc: &'static str, handler: H) -> &mut Self {
        self.register(Tier::Op, name, doc, handler)
    }

    pub fn admin(&mut self, name: &'static str, doc: &'static str, handler: H) -> &mut Self {
        self.register(Tier::Admin, name, doc, handler)
    }

    pub fn lookup(&self, name: &str, tier: Tier) -> Option<(&CommandSpec, &H)> {
        let index = *self.by_tier.get(&tier)?.get(name)?;
        self.entries.get(index).map(|(spec, handler)| (spec, handler))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H> Default for CommandTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> CommandSource for CommandTable<H> {
    fn find(&self, name: &str, tier: Tier) -> Option<&CommandSpec> {
        self.lookup(name, tier).map(|(spec, _)| spec)
    }

    fn specs(&self) -> Vec<&CommandSpec> {
        self.entries.iter().map(|(spec, _)| spec).collect()
    }
}

/// One resolved command call.
///
/// For private messages `channel` is the bot's own nick and `private` is set;
/// replies should go to [`Invocation::reply_target`].
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub identity: &'a str,
    pub nick: &'a str,
    pub channel: &'a str,
    pub command: &'a str,
    pub rest: &'a str,
    pub private: bool,
}

impl Invocation<'_> {
    pub fn reply_target(&self) -> &str {
        if self.private { self.nick } else { self.channel }
    }
}

/// A side effect requested by a plugin, applied by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Chat message; subject to shutup and flood control.
    Send { target: String, text: String },
    Action { target: String, text: String },
    Join { channel: String, key: Option<String> },
    Leave { channel: String, reason: Option<String> },
    Kick { channel: String, nick: String, reason: String },
    Topic { channel: String, topic: String },
    Whois { nick: String },
    /// Deliver `PluginEvent::Timer { token }` to `plugin` after `delay`.
    CallLater { plugin: String, delay: Duration, token: String },
}

/// What the core lends to plugins for the duration of one callback.
pub struct DispatchEnv<'a> {
    pub nick: &'a str,
    pub prefix: &'a str,
    pub now: Instant,
    pub admin: &'a AdminSessionManager,
    pub settings: &'a mut dyn SettingsStore,
    pub database: Option<&'a Database>,
}

impl DispatchEnv<'_> {
    fn context<'c>(&'c mut self, plugin: &'c str) -> PluginContext<'c> {
        PluginContext {
            plugin,
            nick: self.nick,
            prefix: self.prefix,
            now: self.now,
            admin: self.admin,
            settings: &mut *self.settings,
            database: self.database,
            effects: Vec::new(),
        }
    }
}

/// Handle passed to plugin callbacks.
pub struct PluginContext<'a> {
    plugin: &'a str,
    nick: &'a str,
    prefix: &'a str,
    now: Instant,
    admin: &'a AdminSessionManager,
    settings: &'a mut dyn SettingsStore,
    database: Option<&'a Database>,
    effects: Vec<Effect>,
}

impl<'a> PluginContext<'a> {
    pub fn plugin_name(&self) -> &str {
        self.plugin
    }

    /// The bot's current nick.
    pub fn nick(&self) -> &str {
        self.nick
    }

    pub fn command_prefix(&self) -> &str {
        self.prefix
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn send(&mut self, target: impl Into<String>, text: impl Into<String>) {
        self.effects.push(Effect::Send {
            target: target.into(),
            text: text.into(),
        });
    }

    /// Answer in the channel, or privately when the command came in private.
    pub fn reply(&mut self, inv: &Invocation<'_>, text: impl Into<String>) {
        self.send(inv.reply_target(), text);
    }

    pub fn action(&mut self, target: impl Into<String>, text: impl Into<String>) {
        self.effects.push(Effect::Action {
            target: target.into(),
            text: text.into(),
        });
    }

    pub fn join(&mut self, channel: impl Into<String>) {
        self.effects.push(Effect::Join {
            channel: channel.into(),
            key: None,
        });
    }

    pub fn leave(&mut self, channel: impl Into<String>) {
        self.effects.push(Effect::Leave {
            channel: channel.into(),
            reason: None,
        });
    }

    pub fn kick(&mut self, channel: impl Into<String>, nick: impl Into<String>, reason: impl Into<String>) {
        self.effects.push(Effect::Kick {
            channel: channel.into(),
            nick: nick.into(),
            reason: reason.into(),
        });
    }

    pub fn topic(&mut self, channel: impl Into<String>, topic: impl Into<String>) {
        self.effects.push(Effect::Topic {
            channel: channel.into(),
            topic: topic.into(),
        });
    }

    pub fn whois(&mut self, nick: impl Into<String>) {
        self.effects.push(Effect::Whois { nick: nick.into() });
    }

    /// Receive `PluginEvent::Timer { token }` after `delay`.
    pub fn call_later(&mut self, delay: Duration, token: impl Into<String>) {
        self.effects.push(Effect::CallLater {
            plugin: self.plugin.to_string(),
            delay,
            token: token.into(),
        });
    }

    /// Settings under this plugin's namespace.
    pub fn settings(&mut self) -> PluginSettings<'_> {
        PluginSettings::new(self.plugin, &mut *self.settings)
    }

    /// The plugin database, when persistence is configured.
    pub fn database(&self) -> Option<&Database> {
        self.database
    }

    pub fn format_doc(&self, text: &str) -> String {
        format_doc(text, self.nick, self.prefix)
    }

    pub fn is_admin(&self, identity: &str, nick: &str) -> bool {
        self.admin.is_admin(identity, nick, self.now)
    }

    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }
}

/// Substitute `{nick}` and `{command_prefix}` and drop control markers.
pub fn format_doc(text: &str, nick: &str, prefix: &str) -> String {
    text.replace(NO_NOTIFY_MARKER, "")
        .replace("{nick}", nick)
        .replace("{command_prefix}", prefix)
        .trim()
        .to_string()
}

/// Command handler signature for plugin `P`.
pub type CommandFn<P> = fn(&mut P, &mut PluginContext<'_>, &Invocation<'_>) -> Result<(), PluginError>;

/// A behavior module.
///
/// ```ignore
/// impl Plugin for Greeter {
///     fn name(&self) -> &str { "greeter" }
///
///     fn register_commands(table: &mut CommandTable<CommandFn<Self>>) {
///         table.command("hello", "Says hello.", Greeter::hello);
///     }
/// }
/// ```
pub trait Plugin: Send + 'static {
    /// Declared name; the registry keeps at most one plugin per name.
    fn name(&self) -> &str;

    fn register_commands(_table: &mut CommandTable<CommandFn<Self>>)
    where
        Self: Sized,
    {
    }

    fn on_event(&mut self, _ctx: &mut PluginContext<'_>, _event: &PluginEvent) -> Result<(), PluginError> {
        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS` statements run whenever plugins are
    /// (re)loaded and a database is configured. Prefix table names with the
    /// plugin name so plugins never collide.
    fn schema(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Object-safe form of a loaded plugin and its command table.
pub trait LoadedPlugin: Send {
    fn name(&self) -> &str;

    fn commands(&self) -> &dyn CommandSource;

    fn call(
        &mut self,
        tier: Tier,
        ctx: &mut PluginContext<'_>,
        inv: &Invocation<'_>,
    ) -> Result<(), PluginError>;

    fn on_event(&mut self, ctx: &mut PluginContext<'_>, event: &PluginEvent) -> Result<(), PluginError>;

    fn schema(&self) -> Vec<String>;
}

struct PluginSlot<P: Plugin> {
    plugin: P,
    table: CommandTable<CommandFn<P>>,
}

impl<P: Plugin> LoadedPlugin for PluginSlot<P> {
    fn name(&self) -> &str {
        self.plugin.name()
    }

    fn commands(&self) -> &dyn CommandSource {
        &self.table
    }

    fn call(
        &mut self,
        tier: Tier,
        ctx: &mut PluginContext<'_>,
        inv: &Invocation<'_>,
    ) -> Result<(), PluginError> {
        let Some((_, &handler)) = self.table.lookup(inv.command, tier) else {
            return Err(PluginError::MissingHandler {
                tier: tier.as_str(),
                command: inv.command.to_string(),
            });
        };
        handler(&mut self.plugin, ctx, inv)
    }

    fn on_event(&mut self, ctx: &mut PluginContext<'_>, event: &PluginEvent) -> Result<(), PluginError> {
        self.plugin.on_event(ctx, event)
    }

    fn schema(&self) -> Vec<String> {
        self.plugin.schema()
    }
}

/// Build the command table of `plugin` and box it for the registry.
pub fn boxed<P: Plugin>(plugin: P) -> Box<dyn LoadedPlugin> {
    let mut table = CommandTable::new();
    P::register_commands(&mut table);
    Box::new(PluginSlot { plugin, table })
}

/// Run plugin code, turning a panic into [`PluginError::Panicked`].
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, PluginError>) -> Result<T, PluginError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(PluginError::Panicked(reason))
        }
    }
}
