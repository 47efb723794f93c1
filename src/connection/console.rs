//! Line-oriented console adapter used by the `slbot` binary.
//!
//! Input lines have the form `nick[@#channel] text`. Without a channel the
//! line is a private message to the bot. Lines starting with `/` simulate
//! server events:
//!
//! ```text
//! /connect                     /motd text
//! /joined #chan                /left #chan
//! /kicked kicker #chan reason  /topic nick #chan topic
//! /userjoin nick #chan         /userpart nick #chan
//! /userquit nick reason        /userkick nick #chan kicker reason
//! /rename old new              /names #chan @op voiced ...
//! /notice nick #chan text      /me nick #chan action
//! /pong nick seconds
//! ```
//!
//! Everything the bot does is printed to the output writer, one line per
//! operation.

use super::{Connection, Inbound};
use crate::error::ConnectionError;
use crate::event::Event;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Writes every outbound operation as a line of text.
pub struct ConsoleConnection {
    out: Box<dyn Write + Send>,
    nick: String,
    closed: bool,
}

impl ConsoleConnection {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            nick: String::new(),
            closed: false,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    fn line(&mut self, line: std::fmt::Arguments<'_>) -> Result<(), ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }
}

impl Connection for ConsoleConnection {
    fn send_message(&mut self, target: &str, text: &str) -> Result<(), ConnectionError> {
        let nick = self.nick.clone();
        self.line(format_args!("[{target}] <{nick}> {text}"))
    }

    fn describe(&mut self, target: &str, action: &str) -> Result<(), ConnectionError> {
        let nick = self.nick.clone();
        self.line(format_args!("[{target}] * {nick} {action}"))
    }

    fn join(&mut self, channel: &str, key: Option<&str>) -> Result<(), ConnectionError> {
        match key {
            Some(key) => self.line(format_args!("JOIN {channel} {key}")),
            None => self.line(format_args!("JOIN {channel}")),
        }
    }

    fn leave(&mut self, channel: &str, reason: Option<&str>) -> Result<(), ConnectionError> {
        self.line(format_args!("PART {channel} :{}", reason.unwrap_or_default()))
    }

    fn kick(&mut self, channel: &str, nick: &str, reason: &str) -> Result<(), ConnectionError> {
        self.line(format_args!("KICK {channel} {nick} :{reason}"))
    }

    fn topic(&mut self, channel: &str, topic: &str) -> Result<(), ConnectionError> {
        self.line(format_args!("TOPIC {channel} :{topic}"))
    }

    fn whois(&mut self, nick: &str) -> Result<(), ConnectionError> {
        self.line(format_args!("WHOIS {nick}"))
    }

    fn ping(&mut self, target: &str) -> Result<(), ConnectionError> {
        self.line(format_args!("PING {target}"))
    }

    fn set_nick(&mut self, nick: &str) -> Result<(), ConnectionError> {
        self.line(format_args!("NICK {nick}"))?;
        self.nick = nick.to_string();
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.line(format_args!("QUIT"))?;
        self.closed = true;
        Ok(())
    }
}

/// Console users get a stable synthetic identity.
pub fn console_identity(nick: &str) -> String {
    format!("{nick}!{nick}@console")
}

/// Parse one console line. Blank lines yield `None`.
pub fn parse_console_line(line: &str) -> Option<Inbound> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(control) = line.strip_prefix('/') {
        return Some(Inbound::Event(parse_control(control)));
    }

    let (head, text) = line.split_once(' ').unwrap_or((line, ""));
    let (nick, target) = match head.split_once('@') {
        Some((nick, channel)) => (nick, Some(channel.to_string())),
        None => (head, None),
    };
    if nick.is_empty() {
        return None;
    }
    Some(Inbound::Privmsg {
        identity: console_identity(nick),
        target,
        text: text.to_string(),
    })
}

fn parse_control(control: &str) -> Event {
    let mut words = control.split_whitespace();
    let command = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    let arg = |i: usize| args.get(i).copied().unwrap_or_default().to_string();
    let tail = |from: usize| args.get(from..).map(|rest| rest.join(" ")).unwrap_or_default();

    match command {
        "connect" => Event::Connected,
        "motd" => Event::MessageOfTheDay { text: tail(0) },
        "joined" => Event::Joined { channel: arg(0) },
        "left" => Event::Left { channel: arg(0) },
        "kicked" => Event::Kicked {
            kicker_identity: console_identity(&arg(0)),
            kicker: arg(0),
            channel: arg(1),
            reason: tail(2),
        },
        "topic" => Event::TopicChanged {
            identity: console_identity(&arg(0)),
            nick: arg(0),
            channel: arg(1),
            topic: tail(2),
        },
        "userjoin" => Event::UserJoined {
            identity: console_identity(&arg(0)),
            nick: arg(0),
            channel: arg(1),
        },
        "userpart" => Event::UserLeft {
            identity: console_identity(&arg(0)),
            nick: arg(0),
            channel: arg(1),
        },
        "userquit" => Event::UserQuit {
            identity: console_identity(&arg(0)),
            nick: arg(0),
            reason: tail(1),
        },
        "userkick" => Event::UserKicked {
            kickee: arg(0),
            channel: arg(1),
            kicker_identity: console_identity(&arg(2)),
            kicker: arg(2),
            reason: tail(3),
        },
        "rename" => Event::UserRenamed {
            identity: console_identity(&arg(0)),
            old_nick: arg(0),
            new_nick: arg(1),
        },
        "names" => Event::UserList {
            channel_type: "=".to_string(),
            channel: arg(0),
            users: args.iter().skip(1).map(|u| u.to_string()).collect(),
        },
        "notice" => Event::Notice {
            identity: console_identity(&arg(0)),
            nick: arg(0),
            channel: arg(1),
            text: tail(2),
        },
        "me" => Event::UserAction {
            identity: console_identity(&arg(0)),
            nick: arg(0),
            channel: arg(1),
            action: tail(2),
        },
        "pong" => Event::Pong {
            identity: console_identity(&arg(0)),
            nick: arg(0),
            seconds: args.get(1).and_then(|s| s.parse().ok()).unwrap_or_default(),
        },
        other => Event::Unknown {
            prefix: "console".to_string(),
            command: other.to_uppercase(),
            params: args.iter().map(|a| a.to_string()).collect(),
        },
    }
}

/// Read stdin line by line and forward parsed items until EOF or until the
/// receiver goes away.
pub fn spawn_stdin_reader(tx: mpsc::Sender<Inbound>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let Some(inbound) = parse_console_line(&line) else {
                        continue;
                    };
                    if tx.send(inbound).await.is_err() {
                        debug!("Core stopped, console reader exiting");
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Console input closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Console read failed");
                    break;
                }
            }
        }
    })
}
