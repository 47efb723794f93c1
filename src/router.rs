//! Command parsing and resolution.
//!
//! Resolution searches `[core] + plugins in load order`. Within each
//! searchable the tiers the caller qualifies for are tried from most to least
//! privileged (admin, op, user). The first hit wins and the search stops, so
//! one inbound command resolves to at most one handler. A caller who lacks a
//! tier simply never matches it and falls through to lower tiers or to
//! "not found".

use crate::plugin::{CommandSource, PluginRegistry, Tier};

/// A command name and its argument text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub name: &'a str,
    pub rest: &'a str,
}

/// Split `text` at the first space into name and rest.
pub fn split_command(text: &str) -> ParsedCommand<'_> {
    let text = text.trim_start();
    let (name, rest) = text.split_once(' ').unwrap_or((text, ""));
    ParsedCommand { name, rest }
}

/// Parse a channel line as a command.
///
/// Accepts a leading `prefix` (`!help`) or the bot's own nick followed by any
/// of `delimiters` (`slbot: help`). Returns `None` for anything else.
pub fn parse_command<'a>(
    text: &'a str,
    prefix: &str,
    own_nick: &str,
    delimiters: &str,
) -> Option<ParsedCommand<'a>> {
    let text = text.trim_start();
    let body = if !prefix.is_empty()
        && let Some(body) = text.strip_prefix(prefix)
    {
        body
    } else if !own_nick.is_empty()
        && text
            .get(..own_nick.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(own_nick))
    {
        text[own_nick.len()..].trim_start_matches(|c: char| delimiters.contains(c) || c.is_whitespace())
    } else {
        return None;
    };

    let parsed = split_command(body);
    (!parsed.name.is_empty()).then_some(parsed)
}

/// Parse a private line: the prefix is optional.
pub fn parse_private<'a>(text: &'a str, prefix: &str) -> Option<ParsedCommand<'a>> {
    let text = text.trim_start();
    let body = if prefix.is_empty() {
        text
    } else {
        text.strip_prefix(prefix).unwrap_or(text)
    };
    let parsed = split_command(body);
    (!parsed.name.is_empty()).then_some(parsed)
}

/// Tiers a caller qualifies for, beyond `user`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    pub admin: bool,
    pub op: bool,
}

impl Permissions {
    pub fn allows(&self, tier: Tier) -> bool {
        match tier {
            Tier::Admin => self.admin,
            Tier::Op => self.op,
            Tier::User => true,
        }
    }
}

/// Where a command was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Searchable {
    Core,
    /// Index into the registry's load order.
    Plugin(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub searchable: Searchable,
    pub tier: Tier,
    /// False when the handler's doc carries the no-notify marker.
    pub notify: bool,
}

pub struct CommandRouter<'a> {
    core: &'a dyn CommandSource,
    plugins: &'a PluginRegistry,
}

impl<'a> CommandRouter<'a> {
    pub fn new(core: &'a dyn CommandSource, plugins: &'a PluginRegistry) -> Self {
        Self { core, plugins }
    }

    pub fn resolve(&self, name: &str, perms: Permissions) -> Option<Resolution> {
        let searchables = std::iter::once((Searchable::Core, self.core)).chain(
            self.plugins
                .iter()
                .enumerate()
                .map(|(i, p)| (Searchable::Plugin(i), p.commands())),
        );

        for (searchable, source) in searchables {
            for tier in Tier::PRIORITY {
                if !perms.allows(tier) {
                    continue;
                }
                if let Some(spec) = source.find(name, tier) {
                    return Some(Resolution {
                        searchable,
                        tier,
                        notify: spec.notifies_plugins(),
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use crate::plugin::{CommandFn, CommandTable, Plugin, PluginCatalog, PluginContext, Invocation, boxed};

    #[test]
    fn test_parse_prefix_and_address() {
        assert_eq!(
            parse_command("!login secret123", "!", "slbot", ":,"),
            Some(ParsedCommand {
                name: "login",
                rest: "secret123"
            })
        );
        assert_eq!(
            parse_command("SLBOT, help core", "!", "slbot", ":,"),
            Some(ParsedCommand {
                name: "help",
                rest: "core"
            })
        );
        assert_eq!(parse_command("hello there", "!", "slbot", ":,"), None);
        assert_eq!(parse_command("!", "!", "slbot", ":,"), None);
    }

    #[test]
    fn test_parse_private_prefix_optional() {
        assert_eq!(parse_private("login pw", "!").map(|p| p.name), Some("login"));
        assert_eq!(parse_private("!login pw", "!").map(|p| p.rest), Some("pw"));
        assert_eq!(parse_private("   ", "!"), None);
    }

    struct Stub(&'static str);

    impl Stub {
        fn run(&mut self, _: &mut PluginContext<'_>, _: &Invocation<'_>) -> Result<(), PluginError> {
            Ok(())
        }
    }

    impl Plugin for Stub {
        fn name(&self) -> &str {
            self.0
        }

        fn register_commands(table: &mut CommandTable<CommandFn<Self>>) {
            table
                .command("shared", "", Stub::run)
                .command("greet", "", Stub::run)
                .op("greet", "", Stub::run)
                .admin("secret", "**does_not_notify_plugins**", Stub::run);
        }
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new(PluginCatalog::new());
        registry.insert(boxed(Stub("first")));
        registry.insert(boxed(Stub("second")));
        registry
    }

    #[test]
    fn test_core_wins_over_plugins() {
        let mut core: CommandTable<()> = CommandTable::new();
        core.command("shared", "", ());
        let plugins = registry();
        let router = CommandRouter::new(&core, &plugins);

        let hit = router.resolve("shared", Permissions::default()).unwrap();
        assert_eq!(hit.searchable, Searchable::Core);
    }

    #[test]
    fn test_first_plugin_in_load_order_wins() {
        let core: CommandTable<()> = CommandTable::new();
        let plugins = registry();
        let router = CommandRouter::new(&core, &plugins);

        let hit = router.resolve("greet", Permissions::default()).unwrap();
        assert_eq!(hit.searchable, Searchable::Plugin(0));
        assert_eq!(hit.tier, Tier::User);
    }

    #[test]
    fn test_tiers_require_permission() {
        let core: CommandTable<()> = CommandTable::new();
        let plugins = registry();
        let router = CommandRouter::new(&core, &plugins);

        let op = Permissions { admin: false, op: true };
        assert_eq!(router.resolve("greet", op).unwrap().tier, Tier::Op);

        assert_eq!(router.resolve("secret", Permissions::default()), None);
        let admin = Permissions { admin: true, op: false };
        let hit = router.resolve("secret", admin).unwrap();
        assert_eq!(hit.tier, Tier::Admin);
        assert!(!hit.notify);
    }
}
