//! A scriptable plugin that journals every callback it receives.

use parking_lot::Mutex;
use slbot::error::PluginError;
use slbot::plugin::{
    CommandFn, CommandTable, Invocation, LoadedPlugin, Plugin, PluginContext, PluginEvent, PluginInit, boxed,
};
use std::sync::Arc;

/// Shared, ordered record of what plugins and bus subscribers observed.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

pub struct Probe {
    name: &'static str,
    journal: Journal,
}

impl Probe {
    pub fn new(name: &'static str, journal: Journal) -> Self {
        Self { name, journal }
    }

    /// Catalog factory producing a probe called `name`.
    pub fn factory(
        name: &'static str,
        journal: Journal,
    ) -> impl Fn(&PluginInit<'_>) -> Result<Box<dyn LoadedPlugin>, PluginError> + Send + Sync + 'static {
        move |_: &PluginInit<'_>| Ok(boxed(Probe::new(name, journal.clone())))
    }

    fn hello(&mut self, ctx: &mut PluginContext<'_>, inv: &Invocation<'_>) -> Result<(), PluginError> {
        ctx.reply(inv, format!("hello from {}", self.name));
        Ok(())
    }

    fn greet(&mut self, ctx: &mut PluginContext<'_>, inv: &Invocation<'_>) -> Result<(), PluginError> {
        ctx.reply(inv, format!("greeting from {}", self.name));
        Ok(())
    }

    fn op_greet(&mut self, ctx: &mut PluginContext<'_>, inv: &Invocation<'_>) -> Result<(), PluginError> {
        ctx.reply(inv, format!("op greeting from {}", self.name));
        Ok(())
    }

    fn secret(&mut self, ctx: &mut PluginContext<'_>, inv: &Invocation<'_>) -> Result<(), PluginError> {
        ctx.reply(inv, format!("secret from {}", self.name));
        Ok(())
    }

    fn plugins(&mut self, ctx: &mut PluginContext<'_>, inv: &Invocation<'_>) -> Result<(), PluginError> {
        ctx.reply(inv, "probe plugins");
        Ok(())
    }

    fn boom(&mut self, ctx: &mut PluginContext<'_>, inv: &Invocation<'_>) -> Result<(), PluginError> {
        ctx.reply(inv, "about to fail");
        Err(PluginError::failed("boom"))
    }

    fn explode(&mut self, _ctx: &mut PluginContext<'_>, _inv: &Invocation<'_>) -> Result<(), PluginError> {
        panic!("probe exploded");
    }
}

fn describe(event: &PluginEvent) -> String {
    let callback = event.callback_name();
    match event {
        PluginEvent::Command { command, .. } | PluginEvent::AdminCommand { command, .. } => {
            format!("{callback}:{command}")
        }
        PluginEvent::Message {
            text, highlighted, ..
        } => format!("{callback}:{text}:{highlighted}"),
        PluginEvent::PrivateMessage { text, .. } => format!("{callback}:{text}"),
        PluginEvent::NickChange { nick, old_nick } => format!("{callback}:{old_nick}->{nick}"),
        PluginEvent::UserRenamed {
            old_nick, new_nick, ..
        } => format!("{callback}:{old_nick}->{new_nick}"),
        PluginEvent::Send { target, text } => format!("{callback}:{target}:{text}"),
        _ => callback.to_string(),
    }
}

impl Plugin for Probe {
    fn name(&self) -> &str {
        self.name
    }

    fn register_commands(table: &mut CommandTable<CommandFn<Self>>) {
        table
            .command("hello", "Says hello from the probe.", Probe::hello)
            .command("greet", "Greets you.", Probe::greet)
            .op("greet", "Greets you like an op.", Probe::op_greet)
            .admin("secret", "Reveals a secret.", Probe::secret)
            .command("plugins", "Shadowed by the core.", Probe::plugins)
            .command("boom", "Fails.", Probe::boom)
            .command("explode", "Panics.", Probe::explode);
    }

    fn on_event(&mut self, _ctx: &mut PluginContext<'_>, event: &PluginEvent) -> Result<(), PluginError> {
        self.journal.record(format!("{}:{}", self.name, describe(event)));
        Ok(())
    }
}
