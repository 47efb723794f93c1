//! Integration tests for command resolution across the core and plugins.

mod common;

use common::{BASE_CONFIG, TestBot, identity};
use slbot::event::EventKind;
use slbot::{BotCore, Event};
use std::time::Duration;

fn pair(target: &str, text: &str) -> (String, String) {
    (target.to_string(), text.to_string())
}

#[test]
fn test_core_command_shadows_plugin_command() {
    let mut bot = TestBot::start(BASE_CONFIG);

    bot.say("bob", "#bots", "!plugins");

    assert_eq!(bot.take_messages(), [pair("#bots", "first, second")]);
}

#[test]
fn test_first_loaded_plugin_wins() {
    let mut bot = TestBot::start(BASE_CONFIG);

    bot.say("bob", "#bots", "!hello");

    assert_eq!(bot.take_messages(), [pair("#bots", "hello from first")]);
}

#[test]
fn test_command_fans_out_to_every_plugin() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.journal.clear();

    bot.say("bob", "#bots", "!hello");

    assert!(bot.journal.contains("first:on_command:hello"));
    assert!(bot.journal.contains("second:on_command:hello"));
}

#[test]
fn test_reload_moves_plugin_to_the_back() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.login("alice");
    bot.take_messages();

    bot.say("alice", "#bots", "!reload first");
    assert_eq!(bot.take_messages(), [pair("#bots", "Reloaded plugin first")]);
    assert_eq!(bot.core.plugins().names(), ["second", "first"]);

    bot.say("bob", "#bots", "!hello");
    assert_eq!(bot.take_messages(), [pair("#bots", "hello from second")]);
}

#[test]
fn test_admin_tier_needs_a_session() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.journal.clear();

    bot.say("alice", "#bots", "!secret");
    assert!(bot.take_messages().is_empty());
    assert!(bot.journal.contains("first:on_message:!secret:true"));

    bot.login("alice");
    bot.take_messages();
    bot.say("alice", "#bots", "!secret");
    assert_eq!(bot.take_messages(), [pair("#bots", "secret from first")]);
}

#[test]
fn test_op_tier_from_user_list() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.event(Event::UserList {
        channel_type: "=".into(),
        channel: "#bots".into(),
        users: vec!["@carol".into(), "dave".into()],
    });

    bot.say("carol", "#bots", "!greet");
    bot.say("dave", "#bots", "!greet");

    assert_eq!(
        bot.take_messages(),
        [
            pair("#bots", "op greeting from first"),
            pair("#bots", "greeting from first"),
        ]
    );
}

#[test]
fn test_op_tier_ignored_in_private() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.event(Event::UserList {
        channel_type: "=".into(),
        channel: "#bots".into(),
        users: vec!["@carol".into()],
    });

    bot.whisper("carol", "greet");

    assert_eq!(bot.take_messages(), [pair("carol", "greeting from first")]);
}

#[test]
fn test_admin_command_published_before_plugins_hear_it() {
    let mut bot = TestBot::start(BASE_CONFIG);
    let journal = bot.journal.clone();
    bot.core
        .bus()
        .subscribe(EventKind::AdminCommand, move |_: &mut BotCore, event: &Event| {
            if let Event::AdminCommand { command, .. } = event {
                journal.record(format!("bus:admin_command:{command}"));
            }
            Ok(())
        });
    bot.login("alice");
    bot.journal.clear();

    bot.advance(30.0);
    bot.say("alice", "#bots", "!secret");

    let published = bot.journal.position("bus:admin_command:secret").expect("published");
    let notified = bot
        .journal
        .position("first:on_admin_command:secret")
        .expect("plugins notified");
    assert!(published < notified);
    assert!(!bot.journal.contains("first:on_command:secret"));

    let session = bot.core.admin().session("alice").expect("session");
    assert_eq!(session.expires_at, bot.core.now() + Duration::from_secs(600));
}

#[test]
fn test_failing_handler_is_isolated() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.journal.clear();

    bot.say("bob", "#bots", "!boom");
    // Effects queued before the failure still apply.
    assert_eq!(bot.take_messages(), [pair("#bots", "about to fail")]);
    assert!(!bot.journal.contains("first:on_command:boom"));
    assert!(!bot.journal.contains("first:on_message:!boom:true"));

    bot.say("bob", "#bots", "!explode");
    assert!(bot.take_messages().is_empty());
    assert!(!bot.journal.contains("second:on_command:explode"));

    bot.say("bob", "#bots", "!hello");
    assert_eq!(bot.take_messages(), [pair("#bots", "hello from first")]);
    assert_eq!(bot.core.plugins().len(), 2);
}

#[test]
fn test_unknown_command_becomes_highlighted_message() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.journal.clear();

    bot.say("bob", "#bots", "!nope with args");

    assert!(bot.take_messages().is_empty());
    assert!(bot.journal.contains("first:on_message:!nope with args:true"));
    assert!(bot.journal.contains("second:on_message:!nope with args:true"));
}

#[test]
fn test_plain_message_reaches_plugins() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.journal.clear();

    bot.say("bob", "#bots", "nice weather");
    bot.say("bob", "#bots", "is slbot around?");

    assert!(bot.journal.contains("first:on_message:nice weather:false"));
    assert!(bot.journal.contains("first:on_message:is slbot around?:true"));
}

#[test]
fn test_direct_address() {
    let mut bot = TestBot::start(BASE_CONFIG);

    bot.say("bob", "#bots", "slbot: hello");
    bot.say("bob", "#bots", "SLBOT, plugins");

    assert_eq!(
        bot.take_messages(),
        [pair("#bots", "hello from first"), pair("#bots", "first, second")]
    );
}

#[test]
fn test_direct_address_without_command_is_a_message() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.journal.clear();

    bot.say("bob", "#bots", "slbot: whatever");

    assert!(bot.take_messages().is_empty());
    assert!(bot.journal.contains("first:on_message:slbot: whatever:true"));
}

#[test]
fn test_private_command_replies_to_sender() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.journal.clear();

    bot.whisper("bob", "hello");
    bot.whisper("bob", "!hello");
    bot.whisper("bob", "just chatting");

    assert_eq!(
        bot.take_messages(),
        [pair("bob", "hello from first"), pair("bob", "hello from first")]
    );
    assert!(bot.journal.contains("first:on_private_message:just chatting"));
}

#[test]
fn test_help_lists_categories_and_commands() {
    let mut bot = TestBot::start(BASE_CONFIG);

    bot.say("bob", "#bots", "!help");
    let lines = bot.take_messages();
    assert!(lines.iter().all(|(target, _)| target == "bob"));
    assert_eq!(lines[1].1, "slbot, first, second");

    bot.say("bob", "#bots", "!help first");
    let lines: Vec<String> = bot.take_messages().into_iter().map(|(_, text)| text).collect();
    assert!(lines.contains(&"- hello: Says hello from the probe.".to_string()));
    assert!(!lines.iter().any(|l| l.contains("secret")));

    bot.login("bob");
    bot.take_messages();
    bot.say("bob", "#bots", "!help slbot");
    let lines: Vec<String> = bot.take_messages().into_iter().map(|(_, text)| text).collect();
    let admin_line = lines
        .iter()
        .position(|l| l.starts_with("- logout (Admin only)"))
        .expect("admin commands listed");
    let user_line = lines
        .iter()
        .position(|l| l.starts_with("- help:"))
        .expect("user commands listed");
    assert!(admin_line < user_line);
    assert!(!lines.iter().any(|l| l.contains("testadmin")));
    assert!(!lines.iter().any(|l| l.contains("does_not_notify_plugins")));

    bot.say("bob", "#bots", "!help nothing");
    assert!(bot.sent("bob", "Could not find help category nothing"));
}

#[test]
fn test_own_rename_is_not_forwarded() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.login("alice");
    bot.journal.clear();

    bot.say("alice", "#bots", "!nick newbot");
    assert_eq!(bot.core.nick(), "newbot");
    assert!(bot.journal.contains("first:on_nick_change:slbot->newbot"));

    // Server echo of our own change.
    bot.event(Event::UserRenamed {
        identity: "slbot!slbot@example.net".into(),
        old_nick: "slbot".into(),
        new_nick: "newbot".into(),
    });
    assert!(!bot.journal.entries().iter().any(|e| e.contains("on_user_renamed")));

    bot.event(Event::UserRenamed {
        identity: identity("bob"),
        old_nick: "bob".into(),
        new_nick: "robert".into(),
    });
    assert!(bot.journal.contains("first:on_user_renamed:bob->robert"));
}

#[test]
fn test_old_nick_released_after_rename_echo() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.login("alice");
    bot.say("alice", "#bots", "!nick newbot");
    bot.event(Event::UserRenamed {
        identity: "slbot!slbot@example.net".into(),
        old_nick: "slbot".into(),
        new_nick: "newbot".into(),
    });
    bot.journal.clear();

    // Someone else picks up the bot's old nick and moves on.
    bot.event(Event::UserRenamed {
        identity: identity("carol"),
        old_nick: "carol".into(),
        new_nick: "slbot".into(),
    });
    bot.event(Event::UserRenamed {
        identity: identity("slbot"),
        old_nick: "slbot".into(),
        new_nick: "dave".into(),
    });

    assert!(bot.journal.contains("first:on_user_renamed:carol->slbot"));
    assert!(bot.journal.contains("first:on_user_renamed:slbot->dave"));
}

#[test]
fn test_op_tier_ignores_nick_case() {
    let mut bot = TestBot::start(BASE_CONFIG);

    bot.event(Event::UserList {
        channel_type: "=".into(),
        channel: "#Bots".into(),
        users: vec!["@Carol".into(), "bob".into()],
    });

    bot.say("carol", "#bots", "!greet");
    bot.say("bob", "#bots", "!greet");

    assert_eq!(
        bot.take_messages(),
        [
            pair("#bots", "op greeting from first"),
            pair("#bots", "greeting from first"),
        ]
    );
}

#[test]
fn test_changed_prefix_applies_immediately() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.login("alice");
    bot.take_messages();

    bot.say("alice", "#bots", "!set_setting connection.command_prefix ?");
    assert_eq!(bot.take_messages(), [pair("#bots", "Set connection.command_prefix")]);
    assert_eq!(bot.core.command_prefix(), "?");

    bot.say("bob", "#bots", "?hello");
    bot.say("bob", "#bots", "!hello");
    assert_eq!(bot.take_messages(), [pair("#bots", "hello from first")]);
}
