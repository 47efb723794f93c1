//! Built-in commands (the `core` help category).

use super::BotCore;
use crate::clock::MAX_DELAY;
use crate::error::BotResult;
use crate::plugin::{CommandSource, CommandTable, Invocation, Tier, format_doc};
use crate::settings::parse_value;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

/// Handler signature for built-in commands. They act on the core directly.
pub type CoreCommand = fn(&mut BotCore, &Invocation<'_>) -> BotResult;

pub(super) fn table() -> CommandTable<CoreCommand> {
    let mut table: CommandTable<CoreCommand> = CommandTable::new();
    table
        .command(
            "login",
            "Logs you in to {nick} as an admin. Usage: {command_prefix}login password **does_not_notify_plugins**",
            login,
        )
        .command(
            "help",
            "Sends the {nick} command documentation to the user who calls it.",
            help,
        )
        .command("info", "Get some basic info about {nick}.", info)
        .command("plugins", "Lists the loaded plugins.", plugins)
        .command(
            "ping",
            "Pings you and responds with the round trip time.",
            ping,
        )
        .command("shutup", "Makes {nick} shut up for a while.", shutup)
        .admin("logout", "Logs you out of {nick}.", logout)
        .admin("testadmin", "", testadmin)
        .admin("admins", "Lists the currently logged in admins.", admins)
        .admin("clear_admins", "Clears all the current admin sessions.", clear_admins)
        .admin(
            "disable_admins",
            "Disables admins until next restart. Use in an emergency.",
            disable_admins,
        )
        .admin(
            "reload",
            "Reloads all the plugins, or one named plugin. Usage: {command_prefix}reload [plugin]",
            reload,
        )
        .admin(
            "join",
            "Makes {nick} join a channel. Usage: {command_prefix}join channel [key]",
            join,
        )
        .admin(
            "leave",
            "Makes {nick} leave a channel. Usage: {command_prefix}leave [channel]",
            leave,
        )
        .admin(
            "nick",
            "Makes {nick} change nick. Usage: {command_prefix}nick new_nick",
            nick,
        )
        .admin(
            "do",
            "Makes {nick} do an action. In private: {command_prefix}do channel action",
            act,
        )
        .admin(
            "kick",
            "Makes {nick} kick someone. Usage: {command_prefix}kick user [reason]",
            kick,
        )
        .admin(
            "topic",
            "Makes {nick} change the topic. Usage: {command_prefix}topic new topic text",
            topic,
        )
        .admin(
            "shutup",
            "Makes {nick} shut up for a while. Pass a number of seconds to override the default.",
            shutup_for,
        )
        .admin("quit", "Makes {nick} disconnect from the server.", quit)
        .admin(
            "set_setting",
            "Changes a setting. Usage: {command_prefix}set_setting key value",
            set_setting,
        )
        .admin("reload_settings", "Reloads {nick}'s settings.", reload_settings)
        .admin("save_settings", "Saves {nick}'s settings.", save_settings)
        .admin(
            "reset_settings",
            "Wipes every setting under a key. Usage: {command_prefix}reset_settings key",
            reset_settings,
        );
    table
}

impl BotCore {
    fn reply(&mut self, inv: &Invocation<'_>, text: &str) -> BotResult {
        self.send_message(inv.reply_target(), text)?;
        Ok(())
    }

    fn whisper(&mut self, inv: &Invocation<'_>, text: &str) -> BotResult {
        self.send_message(inv.nick, text)?;
        Ok(())
    }

    fn usage(&mut self, inv: &Invocation<'_>, usage: &str) -> BotResult {
        let text = format_doc(usage, &self.nick, &self.prefix);
        self.reply(inv, &text)
    }

    fn shutup_setting(&self) -> Duration {
        let secs = self
            .settings
            .get_u64("shutup_duration")
            .unwrap_or(self.config.bot.shutup_duration);
        Duration::from_secs(secs).min(MAX_DELAY)
    }
}

// ============================================================================
// User tier
// ============================================================================

fn login(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let now = core.clock.now();
    let accepted = core.admin.login(inv.identity, inv.nick, inv.rest, now);
    core.whisper(
        inv,
        if accepted {
            "Logged you in!"
        } else {
            "Failed to log you in"
        },
    )
}

fn help(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let category = inv.rest.trim();
    let mut lines = Vec::new();

    if category.is_empty() {
        lines.push(format_doc(
            "The following help categories are available. Select a category with '{command_prefix}help category'.",
            &core.nick,
            &core.prefix,
        ));
        let mut categories = vec![core.nick.clone()];
        categories.extend(core.plugins.names().into_iter().map(str::to_string));
        lines.push(categories.join(", "));
    } else {
        let mut sources: Vec<&dyn CommandSource> = Vec::new();
        if category == core.nick || category == "core" {
            sources.push(&core.commands);
        } else {
            sources.extend(
                core.plugins
                    .iter()
                    .filter(|p| category.contains(p.name()))
                    .map(|p| p.commands()),
            );
        }

        if sources.is_empty() {
            lines.push(format!("Could not find help category {category}"));
        } else {
            lines.push(format_doc(
                "Commands can be issued with a '{command_prefix}' or by starting with '{nick}'. Example: '{command_prefix}help' or '{nick}: help'.",
                &core.nick,
                &core.prefix,
            ));
            lines.push(format!(
                "The following commands are available in the category '{category}'"
            ));

            let is_admin = core.admin.is_admin(inv.identity, inv.nick, core.clock.now());
            let mut admin_lines = Vec::new();
            let mut user_lines = Vec::new();
            for spec in sources.iter().flat_map(|source| source.specs()) {
                let doc = format_doc(spec.doc, &core.nick, &core.prefix);
                if doc.is_empty() {
                    continue;
                }
                let doc = doc.split_whitespace().collect::<Vec<_>>().join(" ");
                match spec.tier {
                    Tier::Admin if is_admin => {
                        admin_lines.push(format!("- {} (Admin only): {doc}", spec.name));
                    }
                    Tier::User => user_lines.push(format!("- {}: {doc}", spec.name)),
                    _ => {}
                }
            }
            lines.extend(admin_lines);
            lines.extend(user_lines);
        }
    }

    for line in lines {
        core.whisper(inv, &line)?;
    }
    Ok(())
}

fn info(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let raw = core
        .settings
        .get_str("info")
        .map(str::to_string)
        .unwrap_or_else(|| core.config.bot.info.clone());
    let text = format_doc(&raw, &core.nick, &core.prefix);
    core.reply(inv, &text)?;
    let uptime = format!(
        "Up since {}",
        core.started.format("%Y-%m-%d %H:%M:%S UTC")
    );
    core.reply(inv, &uptime)
}

fn plugins(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let names = core.plugins.names().join(", ");
    core.reply(inv, &names)
}

fn ping(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    core.ping(inv.nick, inv.reply_target())
}

fn shutup(core: &mut BotCore, _inv: &Invocation<'_>) -> BotResult {
    let duration = core.shutup_setting();
    core.shut_up(duration);
    Ok(())
}

// ============================================================================
// Admin tier
// ============================================================================

fn logout(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    if core.admin.logout(inv.nick) {
        core.whisper(inv, "You have been logged out")
    } else {
        core.whisper(inv, "Failed to log you out. Something is wrong.")
    }
}

fn testadmin(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    core.whisper(inv, "yep, you are an admin")
}

fn admins(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let active = core.admin.list_active(core.clock.now()).join(", ");
    core.whisper(inv, &format!("Current Admins: {active}"))
}

fn clear_admins(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    core.admin.clear_all();
    core.whisper(inv, "Cleared all existing admin sessions.")
}

fn disable_admins(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    core.admin.disable();
    warn!(nick = %inv.nick, channel = %inv.channel, "Admins disabled");
    core.whisper(inv, "Disabled all admins. Notify the owner.")
}

fn reload(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let name = inv.rest.trim();
    if !name.is_empty() {
        if core.reload_plugin(name) {
            return core.reply(inv, &format!("Reloaded plugin {name}"));
        }
        core.reply(inv, &format!("Failed to reload plugin {name}"))?;
    }
    let count = core.load_plugins()?;
    core.reply(inv, &format!("{count} plugins reloaded"))
}

fn join(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let mut args = inv.rest.split_whitespace();
    let Some(channel) = args.next() else {
        return core.usage(inv, "Usage: {command_prefix}join channel [key]");
    };
    core.join_channel(channel, args.next())
}

fn leave(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let channel = match inv.rest.trim() {
        "" if inv.private => {
            return core.usage(inv, "Usage: {command_prefix}leave channel");
        }
        "" => inv.channel,
        named => named,
    };
    core.leave_channel(channel, None)
}

fn nick(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let new_nick = inv.rest.trim();
    if new_nick.is_empty() || new_nick.contains(char::is_whitespace) {
        return core.usage(inv, "Usage: {command_prefix}nick new_nick");
    }
    core.set_nick(new_nick)
}

fn act(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let (channel, action) = if inv.private {
        match inv.rest.trim().split_once(' ') {
            Some((channel, action)) => (channel, action.trim()),
            None => return core.usage(inv, "Usage: {command_prefix}do channel action"),
        }
    } else {
        (inv.channel, inv.rest.trim())
    };
    if action.is_empty() {
        return core.usage(inv, "Usage: {command_prefix}do action");
    }
    core.action(channel, action)
}

fn kick(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let params: Vec<&str> = inv.rest.split_whitespace().collect();
    if inv.private {
        let [target, channel, reason @ ..] = params.as_slice() else {
            return core.usage(inv, "Usage: {command_prefix}kick target channel [reason]");
        };
        let reason = reason.join(" ");
        core.whisper(inv, &format!("kicking {target} from {channel}"))?;
        core.connection
            .kick(&crate::connection::normalize_channel(channel), target, &reason)?;
    } else {
        let [target, reason @ ..] = params.as_slice() else {
            return core.usage(inv, "Usage: {command_prefix}kick target [reason]");
        };
        let reason = reason.join(" ");
        core.action(inv.channel, format!("kicks {target} {reason}").trim_end())?;
        core.connection.kick(inv.channel, target, &reason)?;
    }
    Ok(())
}

fn topic(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    if inv.private {
        let Some((channel, text)) = inv.rest.trim().split_once(' ') else {
            return core.usage(inv, "Usage: {command_prefix}topic channel new topic text");
        };
        core.connection
            .topic(&crate::connection::normalize_channel(channel), text.trim())?;
    } else {
        core.connection.topic(inv.channel, inv.rest.trim())?;
    }
    Ok(())
}

fn shutup_for(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let rest = inv.rest.trim();
    let duration = if rest.is_empty() {
        core.shutup_setting()
    } else {
        match rest.parse::<u64>().map(Duration::from_secs) {
            Ok(duration) if duration <= MAX_DELAY => duration,
            _ => return core.usage(inv, "Usage: {command_prefix}shutup [seconds]"),
        }
    };
    core.shut_up(duration);
    Ok(())
}

fn quit(core: &mut BotCore, _inv: &Invocation<'_>) -> BotResult {
    core.quit()
}

fn set_setting(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let Some((key, value)) = inv.rest.trim().split_once(' ') else {
        return core.usage(inv, "Usage: {command_prefix}set_setting key value");
    };
    core.settings.set(key, parse_value(value.trim()))?;
    core.apply_runtime_settings();
    core.reply(inv, &format!("Set {key}"))
}

fn reload_settings(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    core.settings.load()?;
    core.apply_runtime_settings();
    core.reply(inv, "Reloaded settings")
}

fn save_settings(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    core.settings.save()?;
    core.reply(inv, "Saved settings")
}

fn reset_settings(core: &mut BotCore, inv: &Invocation<'_>) -> BotResult {
    let key = inv.rest.trim();
    if key.is_empty() {
        return core.usage(inv, "Usage: {command_prefix}reset_settings key");
    }
    core.settings.set(key, json!({}))?;
    core.apply_runtime_settings();
    core.reply(inv, &format!("reset settings starting at {key}"))
}
