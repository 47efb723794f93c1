//! Integration tests for settings seeded from config and changed at runtime.

mod common;

use common::{BASE_CONFIG, Journal, TestBot, catalog, identity};
use slbot::clock::ManualClock;
use slbot::connection::{Inbound, Outbound, RecordingConnection};
use slbot::settings::{JsonSettings, SettingsStore};
use slbot::{BotCore, Config, Event};
use std::path::Path;
use std::sync::Arc;

fn json_bot(path: &Path) -> (BotCore, slbot::connection::OutboundLog) {
    let config: Config = BASE_CONFIG.parse().expect("config");
    let connection = RecordingConnection::new();
    let log = connection.log();
    let store = JsonSettings::open(path).expect("settings open");
    let mut core = BotCore::new(
        config,
        Box::new(connection),
        Box::new(store),
        catalog(&Journal::new()),
        Arc::new(ManualClock::new()),
    );
    core.start().expect("start");
    (core, log)
}

fn say(core: &mut BotCore, nick: &str, text: &str) {
    core.handle_inbound(Inbound::Privmsg {
        identity: identity(nick),
        target: Some("#bots".into()),
        text: text.into(),
    })
    .expect("handled");
}

#[test]
fn test_defaults_seeded_from_config() {
    let bot = TestBot::start(BASE_CONFIG);
    let settings = bot.core.settings();

    assert_eq!(settings.get_str("nick"), Some("slbot"));
    assert_eq!(settings.get_string_list("default_channels"), ["#bots"]);
    assert_eq!(settings.get_str("connection.command_prefix"), Some("!"));
    assert_eq!(settings.get_u64("connection.max_flood"), Some(100));
    assert_eq!(settings.get_u64("shutup_duration"), Some(30));
}

#[test]
fn test_joined_and_left_update_default_channels() {
    let mut bot = TestBot::start(BASE_CONFIG);

    bot.event(Event::Joined {
        channel: "#extra".into(),
    });
    assert_eq!(bot.core.channels(), ["#extra"]);
    assert_eq!(
        bot.core.settings().get_string_list("default_channels"),
        ["#bots", "#extra"]
    );
    assert!(bot.journal.contains("first:on_joined"));

    bot.event(Event::Left {
        channel: "#bots".into(),
    });
    assert_eq!(
        bot.core.settings().get_string_list("default_channels"),
        ["#extra"]
    );

    bot.event(Event::Kicked {
        kicker_identity: identity("op"),
        kicker: "op".into(),
        channel: "#extra".into(),
        reason: "bye".into(),
    });
    assert!(bot.core.channels().is_empty());
    assert!(bot.core.settings().get_string_list("default_channels").is_empty());
    assert!(bot.journal.contains("first:on_left"));
    assert!(bot.journal.contains("first:on_kicked"));
}

#[test]
fn test_join_and_leave_commands() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.login("alice");
    bot.log.take();

    bot.say("alice", "#bots", "!join lounge sesame");
    bot.say("alice", "#bots", "!leave");
    bot.whisper("alice", "leave");

    assert_eq!(
        bot.log.take(),
        [
            Outbound::Join {
                channel: "#lounge".into(),
                key: Some("sesame".into())
            },
            Outbound::Leave {
                channel: "#bots".into(),
                reason: None
            },
            Outbound::Message {
                target: "alice".into(),
                text: "Usage: !leave channel".into()
            },
        ]
    );
}

#[test]
fn test_reset_settings_wipes_subtree() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.login("alice");

    bot.say("alice", "#bots", "!set_setting connection.command_prefix ?");
    assert_eq!(bot.core.command_prefix(), "?");

    bot.say("alice", "#bots", "?reset_settings connection");
    assert!(bot.sent("#bots", "reset settings starting at connection"));
    assert_eq!(bot.core.settings().get("connection.max_flood"), None);
    // Falls back to the configured prefix.
    assert_eq!(bot.core.command_prefix(), "!");
}

#[test]
fn test_json_settings_survive_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");

    {
        let (mut core, log) = json_bot(&path);
        say(&mut core, "alice", "!login secret123");
        say(&mut core, "alice", "!set_setting connection.command_prefix ?");
        say(&mut core, "alice", "?set_setting info {\"motto\": \"beep\"}");
        assert!(log.messages().contains(&("#bots".to_string(), "Set info".to_string())));
        core.quit().expect("quit");
    }

    let (core, _log) = json_bot(&path);
    assert_eq!(core.command_prefix(), "?");
    assert_eq!(core.settings().get_str("info.motto"), Some("beep"));
    // Seeding never overwrites stored values.
    assert_eq!(core.settings().get_str("nick"), Some("slbot"));
}

#[test]
fn test_reload_settings_picks_up_file_edits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");
    let (mut core, _log) = json_bot(&path);
    say(&mut core, "alice", "!login secret123");

    let mut edited = JsonSettings::open(&path).expect("reopen");
    edited
        .set("connection.command_prefix", serde_json::json!("$"))
        .expect("edit");

    say(&mut core, "alice", "!reload_settings");
    assert_eq!(core.command_prefix(), "$");
}
