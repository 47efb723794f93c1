//! Integration tests for admin login, session expiry, and the kill switch.

mod common;

use common::{BASE_CONFIG, TestBot, identity};
use slbot::Event;
use std::time::Duration;

#[test]
fn test_login_then_disable_admins() {
    let mut bot = TestBot::start(BASE_CONFIG);

    bot.say("alice", "#bots", "!login secret123");
    assert!(bot.core.admin().session("alice").is_some());
    assert_eq!(
        bot.take_messages(),
        [("alice".to_string(), "Logged you in!".to_string())]
    );

    bot.say("alice", "#bots", "!disable_admins");
    assert_eq!(
        bot.take_messages(),
        [(
            "alice".to_string(),
            "Disabled all admins. Notify the owner.".to_string()
        )]
    );
    assert!(!bot.core.admin().is_enabled());
    assert!(bot.core.admin().list_active(bot.core.now()).is_empty());

    // No longer resolves as an admin command: it falls through to plugins as
    // a plain highlighted message and nothing is sent back.
    bot.journal.clear();
    bot.say("alice", "#bots", "!disable_admins");
    assert!(bot.take_messages().is_empty());
    assert!(bot.journal.contains("first:on_message:!disable_admins:true"));

    bot.say("alice", "#bots", "!login secret123");
    assert_eq!(
        bot.take_messages(),
        [("alice".to_string(), "Failed to log you in".to_string())]
    );
}

#[test]
fn test_login_is_not_echoed_to_plugins() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.journal.clear();

    bot.say("alice", "#bots", "!login secret123");

    let entries = bot.journal.entries();
    assert!(!entries.iter().any(|e| e.contains("on_command")));
    assert!(!entries.iter().any(|e| e.contains("secret123")));
}

#[test]
fn test_wrong_secret_creates_no_session() {
    let mut bot = TestBot::start(BASE_CONFIG);

    bot.say("mallory", "#bots", "!login hunter2");

    assert!(bot.core.admin().session("mallory").is_none());
    assert!(bot.sent("mallory", "Failed to log you in"));
}

#[test]
fn test_private_login_without_prefix() {
    let mut bot = TestBot::start(BASE_CONFIG);

    bot.whisper("alice", "login secret123");

    assert!(bot.core.is_admin(&identity("alice"), "alice"));
    assert!(bot.sent("alice", "Logged you in!"));
}

#[test]
fn test_session_expires_without_admin_commands() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.login("alice");
    bot.take_messages();

    bot.advance(599.0);
    bot.say("alice", "#bots", "!testadmin");
    assert_eq!(
        bot.take_messages(),
        [("alice".to_string(), "yep, you are an admin".to_string())]
    );

    // The command refreshed the session past its original expiry.
    bot.advance(599.0);
    assert!(bot.core.is_admin(&identity("alice"), "alice"));

    bot.advance(1.0);
    assert!(!bot.core.is_admin(&identity("alice"), "alice"));
    bot.say("alice", "#bots", "!testadmin");
    assert!(bot.take_messages().is_empty());
}

#[test]
fn test_admin_command_refreshes_expiry() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.login("alice");

    bot.advance(100.0);
    bot.say("alice", "#bots", "!admins");

    let session = bot.core.admin().session("alice").expect("session");
    assert_eq!(session.expires_at, bot.core.now() + Duration::from_secs(600));
    assert!(bot.sent("alice", "Current Admins: alice"));
}

#[test]
fn test_session_bound_to_identity() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.login("alice");
    bot.take_messages();

    bot.say_as("alice!impostor@elsewhere", "#bots", "!testadmin");

    assert!(bot.take_messages().is_empty());
}

#[test]
fn test_sessions_cleared_on_rename_part_quit_kick() {
    let mut bot = TestBot::start(BASE_CONFIG);

    bot.login("alice");
    bot.event(Event::UserRenamed {
        identity: identity("alice"),
        old_nick: "alice".into(),
        new_nick: "alicia".into(),
    });
    assert!(bot.core.admin().session("alice").is_none());
    assert!(bot.core.admin().session("alicia").is_none());

    bot.login("alice");
    bot.event(Event::UserLeft {
        identity: identity("alice"),
        nick: "alice".into(),
        channel: "#bots".into(),
    });
    assert!(bot.core.admin().session("alice").is_none());

    bot.login("alice");
    bot.event(Event::UserQuit {
        identity: identity("alice"),
        nick: "alice".into(),
        reason: "bye".into(),
    });
    assert!(bot.core.admin().session("alice").is_none());

    bot.login("alice");
    bot.event(Event::UserKicked {
        kickee: "alice".into(),
        channel: "#bots".into(),
        kicker_identity: identity("op"),
        kicker: "op".into(),
        reason: "out".into(),
    });
    assert!(bot.core.admin().session("alice").is_none());
}

#[test]
fn test_logout_and_clear_admins() {
    let mut bot = TestBot::start(BASE_CONFIG);
    bot.login("alice");
    bot.login("bob");

    bot.say("alice", "#bots", "!logout");
    assert!(bot.sent("alice", "You have been logged out"));
    assert!(!bot.core.is_admin(&identity("alice"), "alice"));

    bot.say("bob", "#bots", "!clear_admins");
    assert!(bot.sent("bob", "Cleared all existing admin sessions."));
    assert!(!bot.core.is_admin(&identity("bob"), "bob"));
    assert!(bot.core.admin().is_enabled());
}

#[test]
fn test_missing_admin_section_disables_admin() {
    let config = r#"
[bot]
nick = "slbot"

[plugins]
enabled = []
"#;
    let mut bot = TestBot::start(config);

    bot.say("alice", "#bots", "!login secret123");

    assert!(!bot.core.admin().is_enabled());
    assert!(bot.sent("alice", "Failed to log you in"));
}
