//! Echo plugin: a small built-in used for smoke testing a deployment.
//!
//! `plugin.toml` may set `greeting`, sent to every user joining a channel the
//! bot is in (`{user}` is replaced with their nick). With persistence
//! configured, `note` stores a line in the `echo_note` table.

use super::{CommandFn, CommandTable, Invocation, LoadedPlugin, Plugin, PluginContext, PluginEvent, PluginInit, boxed};
use crate::error::PluginError;
use crate::flood::secs;
use std::collections::HashMap;

const NOTE_TABLE: &str = "CREATE TABLE IF NOT EXISTS echo_note (
    id INTEGER PRIMARY KEY,
    nick TEXT NOT NULL,
    channel TEXT NOT NULL,
    text TEXT NOT NULL
)";

pub struct EchoPlugin {
    greeting: Option<String>,
    next_token: u64,
    pending: HashMap<String, (String, String)>,
}

/// Catalog entry.
pub fn factory(init: &PluginInit<'_>) -> Result<Box<dyn LoadedPlugin>, PluginError> {
    let greeting = match init.settings.get("greeting") {
        None => None,
        Some(toml::Value::String(greeting)) => Some(greeting.clone()),
        Some(other) => {
            return Err(PluginError::Init {
                plugin: init.name.to_string(),
                reason: format!("greeting must be a string, got {}", other.type_str()),
            });
        }
    };
    Ok(boxed(EchoPlugin::new(greeting)))
}

impl EchoPlugin {
    pub fn new(greeting: Option<String>) -> Self {
        Self {
            greeting,
            next_token: 0,
            pending: HashMap::new(),
        }
    }

    fn echo(&mut self, ctx: &mut PluginContext<'_>, inv: &Invocation<'_>) -> Result<(), PluginError> {
        let text = inv.rest.trim();
        if text.is_empty() {
            let usage = ctx.format_doc("Usage: {command_prefix}echo text");
            ctx.reply(inv, usage);
        } else {
            ctx.reply(inv, text);
        }
        Ok(())
    }

    fn later(&mut self, ctx: &mut PluginContext<'_>, inv: &Invocation<'_>) -> Result<(), PluginError> {
        let (delay, text) = inv.rest.trim().split_once(' ').unwrap_or((inv.rest.trim(), ""));
        let Some(delay) = delay.parse::<f64>().ok().and_then(secs) else {
            let usage = ctx.format_doc("Usage: {command_prefix}later seconds text");
            ctx.reply(inv, usage);
            return Ok(());
        };

        self.next_token += 1;
        let token = self.next_token.to_string();
        self.pending.insert(
            token.clone(),
            (inv.reply_target().to_string(), text.trim().to_string()),
        );
        ctx.call_later(delay, token);
        Ok(())
    }

    fn note(&mut self, ctx: &mut PluginContext<'_>, inv: &Invocation<'_>) -> Result<(), PluginError> {
        let text = inv.rest.trim().to_string();
        if text.is_empty() {
            let usage = ctx.format_doc("Usage: {command_prefix}note text");
            ctx.reply(inv, usage);
            return Ok(());
        }
        let Some(db) = ctx.database() else {
            ctx.reply(inv, "Notes are disabled: no database configured");
            return Ok(());
        };

        let (nick, channel) = (inv.nick.to_string(), inv.channel.to_string());
        db.submit("echo", move |pool| async move {
            let mut tx = pool.begin().await?;
            sqlx::query("INSERT INTO echo_note (nick, channel, text) VALUES (?, ?, ?)")
                .bind(nick)
                .bind(channel)
                .bind(text)
                .execute(&mut *tx)
                .await?;
            tx.commit().await
        })?;
        ctx.reply(inv, "Noted.");
        Ok(())
    }

    fn test_settings(&mut self, ctx: &mut PluginContext<'_>, inv: &Invocation<'_>) -> Result<(), PluginError> {
        ctx.settings().set("custom", "woohooooo")?;
        ctx.reply(inv, "Saved echo.custom");
        Ok(())
    }
}

impl Plugin for EchoPlugin {
    fn name(&self) -> &str {
        "echo"
    }

    fn register_commands(table: &mut CommandTable<CommandFn<Self>>) {
        table
            .command("echo", "Repeats what you say.", EchoPlugin::echo)
            .command(
                "later",
                "Repeats what you say after a delay. Usage: {command_prefix}later seconds text",
                EchoPlugin::later,
            )
            .command(
                "note",
                "Writes a note to the database. Usage: {command_prefix}note text",
                EchoPlugin::note,
            )
            .command("test_settings", "", EchoPlugin::test_settings);
    }

    fn schema(&self) -> Vec<String> {
        vec![NOTE_TABLE.to_string()]
    }

    fn on_event(&mut self, ctx: &mut PluginContext<'_>, event: &PluginEvent) -> Result<(), PluginError> {
        match event {
            PluginEvent::UserJoined { nick, channel, .. } => {
                if let Some(greeting) = &self.greeting
                    && nick != ctx.nick()
                {
                    ctx.send(channel.as_str(), greeting.replace("{user}", nick));
                }
            }
            PluginEvent::Timer { token } => {
                if let Some((target, text)) = self.pending.remove(token) {
                    ctx.send(target, text);
                }
            }
            PluginEvent::Shutdown => self.pending.clear(),
            _ => {}
        }
        Ok(())
    }
}
