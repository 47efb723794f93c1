//! Events delivered to plugins.

use crate::event::Event;

/// A callback delivered to every loaded plugin (or, for timers, to one).
#[derive(Debug, Clone, PartialEq)]
pub enum PluginEvent {
    /// All plugins finished loading.
    PluginsLoaded,
    NickChange {
        nick: String,
        old_nick: String,
    },
    Connected,
    MessageOfTheDay {
        text: String,
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
    /// A private line that did not resolve to a command.
    PrivateMessage {
        identity: String,
        nick: String,
        text: String,
    },
    Message {
        identity: String,
        nick: String,
        channel: String,
        text: String,
        highlighted: bool,
    },
    /// The bot transmitted a chat line.
    Send {
        target: String,
        text: String,
    },
    /// The bot performed an action.
    Action {
        target: String,
        text: String,
    },
    /// A user-tier or op-tier command ran.
    Command {
        identity: String,
        nick: String,
        channel: String,
        command: String,
        rest: String,
    },
    /// An admin-tier command ran.
    AdminCommand {
        identity: String,
        nick: String,
        channel: String,
        command: String,
        rest: String,
    },
    Joined {
        channel: String,
    },
    Left {
        channel: String,
    },
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
    UserRenamed {
        identity: String,
        old_nick: String,
        new_nick: String,
    },
    UserList {
        channel_type: String,
        channel: String,
        users: Vec<String>,
    },
    Unknown {
        prefix: String,
        command: String,
        params: Vec<String>,
    },
    /// A delay requested with `call_later` elapsed.
    Timer {
        token: String,
    },
    Shutdown,
}

impl PluginEvent {
    /// Callback name used in logs.
    pub fn callback_name(&self) -> &'static str {
        match self {
            Self::PluginsLoaded => "on_plugins_loaded",
            Self::NickChange { .. } => "on_nick_change",
            Self::Connected => "on_connected",
            Self::MessageOfTheDay { .. } => "on_message_of_the_day",
            Self::Notice { .. } => "on_notice",
            Self::UserAction { .. } => "on_user_action",
            Self::PrivateMessage { .. } => "on_private_message",
            Self::Message { .. } => "on_message",
            Self::Send { .. } => "on_send",
            Self::Action { .. } => "on_action",
            Self::Command { .. } => "on_command",
            Self::AdminCommand { .. } => "on_admin_command",
            Self::Joined { .. } => "on_joined",
            Self::Left { .. } => "on_left",
            Self::Kicked { .. } => "on_kicked",
            Self::TopicChanged { .. } => "on_topic_changed",
            Self::UserJoined { .. } => "on_user_joined",
            Self::UserLeft { .. } => "on_user_left",
            Self::UserQuit { .. } => "on_user_quit",
            Self::UserKicked { .. } => "on_user_kicked",
            Self::UserRenamed { .. } => "on_user_renamed",
            Self::UserList { .. } => "on_user_list",
            Self::Unknown { .. } => "on_unknown",
            Self::Timer { .. } => "on_timer",
            Self::Shutdown => "on_shutdown",
        }
    }

    /// The plugin callback for an event the core forwards unchanged.
    ///
    /// Events the core interprets first (messages that may be commands,
    /// pongs) have no direct counterpart and return `None`.
    pub fn relay(event: &Event) -> Option<Self> {
        let relayed = match event.clone() {
            Event::Connected => Self::Connected,
            Event::MessageOfTheDay { text } => Self::MessageOfTheDay { text },
            Event::Notice {
                identity,
                nick,
                channel,
                text,
            } => Self::Notice {
                identity,
                nick,
                channel,
                text,
            },
            Event::UserAction {
                identity,
                nick,
                channel,
                action,
            } => Self::UserAction {
                identity,
                nick,
                channel,
                action,
            },
            Event::Message {
                identity,
                nick,
                channel,
                text,
                highlighted,
            } => Self::Message {
                identity,
                nick,
                channel,
                text,
                highlighted,
            },
            Event::Joined { channel } => Self::Joined { channel },
            Event::Left { channel } => Self::Left { channel },
            Event::Kicked {
                kicker_identity,
                kicker,
                channel,
                reason,
            } => Self::Kicked {
                kicker_identity,
                kicker,
                channel,
                reason,
            },
            Event::TopicChanged {
                identity,
                nick,
                channel,
                topic,
            } => Self::TopicChanged {
                identity,
                nick,
                channel,
                topic,
            },
            Event::UserJoined {
                identity,
                nick,
                channel,
            } => Self::UserJoined {
                identity,
                nick,
                channel,
            },
            Event::UserLeft {
                identity,
                nick,
                channel,
            } => Self::UserLeft {
                identity,
                nick,
                channel,
            },
            Event::UserQuit {
                identity,
                nick,
                reason,
            } => Self::UserQuit {
                identity,
                nick,
                reason,
            },
            Event::UserKicked {
                kickee,
                channel,
                kicker_identity,
                kicker,
                reason,
            } => Self::UserKicked {
                kickee,
                channel,
                kicker_identity,
                kicker,
                reason,
            },
            Event::UserRenamed {
                identity,
                old_nick,
                new_nick,
            } => Self::UserRenamed {
                identity,
                old_nick,
                new_nick,
            },
            Event::UserList {
                channel_type,
                channel,
                users,
            } => Self::UserList {
                channel_type,
                channel,
                users,
            },
            Event::Unknown {
                prefix,
                command,
                params,
            } => Self::Unknown {
                prefix,
                command,
                params,
            },
            Event::AdminCommand {
                identity,
                nick,
                channel,
                command,
                rest,
            } => Self::AdminCommand {
                identity,
                nick,
                channel,
                command,
                rest,
            },
            Event::PluginsLoaded => Self::PluginsLoaded,
            Event::Shutdown => Self::Shutdown,
            Event::PrivateMessage { .. }
            | Event::DirectMessage { .. }
            | Event::Command { .. }
            | Event::Pong { .. } => return None,
        };
        Some(relayed)
    }
}
