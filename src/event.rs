//! Typed event catalog.
//!
//! Every inbound adapter event and every event the core publishes itself is a
//! variant of [`Event`]. Subscribers match on the variant instead of a string
//! topic, so payload shapes are checked at compile time.

use std::fmt;

/// An event published on the [`EventBus`](crate::bus::EventBus).
///
/// `identity` is the stable `nick!user@host` string of the sender; `nick` is
/// its mutable display part.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // === Adapter events ===
    Connected,
    MessageOfTheDay {
        text: String,
    },
    Message {
        identity: String,
        nick: String,
        channel: String,
        text: String,
        highlighted: bool,
    },
    PrivateMessage {
        identity: String,
        nick: String,
        text: String,
    },
    /// A channel line addressed to the bot by name (`slbot: help`).
    DirectMessage {
        identity: String,
        nick: String,
        channel: String,
        text: String,
    },
    /// A channel line starting with the command prefix, already split.
    Command {
        identity: String,
        nick: String,
        channel: String,
        name: String,
        rest: String,
    },
    Notice {
        identity: String,
        nick: String,
        channel: String,
        text: String,
    },
    UserAction {
        identity: String,
        nick: String,
        channel: String,
        action: String,
    },
    /// The bot joined a channel.
    Joined {
        channel: String,
    },
    /// The bot left a channel.
    Left {
        channel: String,
    },
    /// The bot was kicked from a channel.
    Kicked {
        kicker_identity: String,
        kicker: String,
        channel: String,
        reason: String,
    },
    TopicChanged {
        identity: String,
        nick: String,
        channel: String,
        topic: String,
    },
    UserJoined {
        identity: String,
        nick: String,
        channel: String,
    },
    UserLeft {
        identity: String,
        nick: String,
        channel: String,
    },
    UserQuit {
        identity: String,
        nick: String,
        reason: String,
    },
    UserKicked {
        kickee: String,
        channel: String,
        kicker_identity: String,
        kicker: String,
        reason: String,
    },
    /// `identity` is the identity under the old nick.
    UserRenamed {
        identity: String,
        old_nick: String,
        new_nick: String,
    },
    /// Names reply. `users` keep their status prefixes (`@alice`, `+bob`).
    UserList {
        channel_type: String,
        channel: String,
        users: Vec<String>,
    },
    Pong {
        identity: String,
        nick: String,
        seconds: f64,
    },
    /// A protocol event with no dedicated variant.
    Unknown {
        prefix: String,
        command: String,
        params: Vec<String>,
    },

    // === Core events ===
    /// An admin-tier command ran. Published before plugins are notified.
    AdminCommand {
        identity: String,
        nick: String,
        channel: String,
        command: String,
        rest: String,
    },
    PluginsLoaded,
    Shutdown,
}

/// Discriminant of [`Event`], used as the subscription topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    MessageOfTheDay,
    Message,
    PrivateMessage,
    DirectMessage,
    Command,
    Notice,
    UserAction,
    Joined,
    Left,
    Kicked,
    TopicChanged,
    UserJoined,
    UserLeft,
    UserQuit,
    UserKicked,
    UserRenamed,
    UserList,
    Pong,
    Unknown,
    AdminCommand,
    PluginsLoaded,
    Shutdown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::MessageOfTheDay => "message_of_the_day",
            Self::Message => "message",
            Self::PrivateMessage => "private_message",
            Self::DirectMessage => "direct_message",
            Self::Command => "command",
            Self::Notice => "notice",
            Self::UserAction => "user_action",
            Self::Joined => "joined",
            Self::Left => "left",
            Self::Kicked => "kicked",
            Self::TopicChanged => "topic_changed",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::UserQuit => "user_quit",
            Self::UserKicked => "user_kicked",
            Self::UserRenamed => "user_renamed",
            Self::UserList => "user_list",
            Self::Pong => "pong",
            Self::Unknown => "unknown",
            Self::AdminCommand => "admin_command",
            Self::PluginsLoaded => "plugins_loaded",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::MessageOfTheDay { .. } => EventKind::MessageOfTheDay,
            Self::Message { .. } => EventKind::Message,
            Self::PrivateMessage { .. } => EventKind::PrivateMessage,
            Self::DirectMessage { .. } => EventKind::DirectMessage,
            Self::Command { .. } => EventKind::Command,
            Self::Notice { .. } => EventKind::Notice,
            Self::UserAction { .. } => EventKind::UserAction,
            Self::Joined { .. } => EventKind::Joined,
            Self::Left { .. } => EventKind::Left,
            Self::Kicked { .. } => EventKind::Kicked,
            Self::TopicChanged { .. } => EventKind::TopicChanged,
            Self::UserJoined { .. } => EventKind::UserJoined,
            Self::UserLeft { .. } => EventKind::UserLeft,
            Self::UserQuit { .. } => EventKind::UserQuit,
            Self::UserKicked { .. } => EventKind::UserKicked,
            Self::UserRenamed { .. } => EventKind::UserRenamed,
            Self::UserList { .. } => EventKind::UserList,
            Self::Pong { .. } => EventKind::Pong,
            Self::Unknown { .. } => EventKind::Unknown,
            Self::AdminCommand { .. } => EventKind::AdminCommand,
            Self::PluginsLoaded => EventKind::PluginsLoaded,
            Self::Shutdown => EventKind::Shutdown,
        }
    }
}

/// Extract the nick from a `nick!user@host` identity.
pub fn nick_of(identity: &str) -> &str {
    identity.split_once('!').map_or(identity, |(nick, _)| nick)
}

/// Classify a raw inbound chat line.
///
/// - `target` equal to the bot's nick: [`Event::PrivateMessage`]
/// - text starting with the bot's nick (case-insensitive): [`Event::DirectMessage`]
/// - text starting with `prefix`: [`Event::Command`], split at the first space
/// - anything else: [`Event::Message`], highlighted when it mentions the bot
pub fn classify_privmsg(
    identity: &str,
    target: &str,
    text: &str,
    own_nick: &str,
    prefix: &str,
) -> Event {
    let identity_owned = identity.to_string();
    let nick = nick_of(identity).to_string();

    if target == own_nick {
        return Event::PrivateMessage {
            identity: identity_owned,
            nick,
            text: text.to_string(),
        };
    }

    let channel = target.to_string();
    if !own_nick.is_empty()
        && text
            .get(..own_nick.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(own_nick))
    {
        return Event::DirectMessage {
            identity: identity_owned,
            nick,
            channel,
            text: text.to_string(),
        };
    }

    if !prefix.is_empty()
        && let Some(body) = text.strip_prefix(prefix)
    {
        let (name, rest) = body.split_once(' ').unwrap_or((body, ""));
        return Event::Command {
            identity: identity_owned,
            nick,
            channel,
            name: name.to_string(),
            rest: rest.to_string(),
        };
    }

    Event::Message {
        identity: identity_owned,
        nick,
        channel,
        text: text.to_string(),
        highlighted: !own_nick.is_empty() && text.contains(own_nick),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "alice!a@straylight.net";

    #[test]
    fn test_nick_of() {
        assert_eq!(nick_of(ALICE), "alice");
        assert_eq!(nick_of("server.example"), "server.example");
    }

    #[test]
    fn test_classify_private() {
        let ev = classify_privmsg(ALICE, "slbot", "!help", "slbot", "!");
        assert_eq!(ev.kind(), EventKind::PrivateMessage);
    }

    #[test]
    fn test_classify_direct_is_case_insensitive() {
        let ev = classify_privmsg(ALICE, "#bots", "SLBot: help", "slbot", "!");
        assert!(matches!(ev, Event::DirectMessage { ref channel, .. } if channel == "#bots"));
    }

    #[test]
    fn test_classify_command_splits_rest() {
        let ev = classify_privmsg(ALICE, "#bots", "!login secret123", "slbot", "!");
        assert_eq!(
            ev,
            Event::Command {
                identity: ALICE.to_string(),
                nick: "alice".to_string(),
                channel: "#bots".to_string(),
                name: "login".to_string(),
                rest: "secret123".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_message_highlight() {
        let plain = classify_privmsg(ALICE, "#bots", "hello all", "slbot", "!");
        let mention = classify_privmsg(ALICE, "#bots", "hey slbot", "slbot", "!");
        assert!(matches!(plain, Event::Message { highlighted: false, .. }));
        assert!(matches!(mention, Event::Message { highlighted: true, .. }));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(EventKind::AdminCommand.to_string(), "admin_command");
        assert_eq!(Event::Shutdown.kind().as_str(), "shutdown");
    }
}
