//! In-memory connection that records every outbound operation.

use super::Connection;
use crate::error::ConnectionError;
use parking_lot::Mutex;
use std::sync::Arc;

/// One operation performed on a [`RecordingConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message { target: String, text: String },
    Action { target: String, text: String },
    Join { channel: String, key: Option<String> },
    Leave { channel: String, reason: Option<String> },
    Kick { channel: String, nick: String, reason: String },
    Topic { channel: String, topic: String },
    Whois { nick: String },
    Ping { target: String },
    Nick { nick: String },
    Disconnect,
}

#[derive(Debug, Default)]
struct LogInner {
    entries: Vec<Outbound>,
    closed: bool,
}

/// Shared handle onto what a [`RecordingConnection`] has seen.
///
/// The core owns the connection; callers keep a clone of the log to inspect
/// traffic afterwards.
#[derive(Debug, Clone, Default)]
pub struct OutboundLog {
    inner: Arc<Mutex<LogInner>>,
}

impl OutboundLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Outbound> {
        self.inner.lock().entries.clone()
    }

    /// Return and forget everything recorded so far.
    pub fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut self.inner.lock().entries)
    }

    /// Chat lines only, as `(target, text)`.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Outbound::Message { target, text } => Some((target.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    /// Make every further operation fail with [`ConnectionError::Closed`].
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn push(&self, entry: Outbound) -> Result<(), ConnectionError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(ConnectionError::Closed);
        }
        inner.entries.push(entry);
        Ok(())
    }
}

/// A [`Connection`] that only records.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnection {
    log: OutboundLog,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: OutboundLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> OutboundLog {
        self.log.clone()
    }
}

impl Connection for RecordingConnection {
    fn send_message(&mut self, target: &str, text: &str) -> Result<(), ConnectionError> {
        self.log.push(Outbound::Message {
            target: target.to_string(),
            text: text.to_string(),
        })
    }

    fn describe(&mut self, target: &str, action: &str) -> Result<(), ConnectionError> {
        self.log.push(Outbound::Action {
            target: target.to_string(),
            text: action.to_string(),
        })
    }

    fn join(&mut self, channel: &str, key: Option<&str>) -> Result<(), ConnectionError> {
        self.log.push(Outbound::Join {
            channel: channel.to_string(),
            key: key.map(str::to_string),
        })
    }

    fn leave(&mut self, channel: &str, reason: Option<&str>) -> Result<(), ConnectionError> {
        self.log.push(Outbound::Leave {
            channel: channel.to_string(),
            reason: reason.map(str::to_string),
        })
    }

    fn kick(&mut self, channel: &str, nick: &str, reason: &str) -> Result<(), ConnectionError> {
        self.log.push(Outbound::Kick {
            channel: channel.to_string(),
            nick: nick.to_string(),
            reason: reason.to_string(),
        })
    }

    fn topic(&mut self, channel: &str, topic: &str) -> Result<(), ConnectionError> {
        self.log.push(Outbound::Topic {
            channel: channel.to_string(),
            topic: topic.to_string(),
        })
    }

    fn whois(&mut self, nick: &str) -> Result<(), ConnectionError> {
        self.log.push(Outbound::Whois {
            nick: nick.to_string(),
        })
    }

    fn ping(&mut self, target: &str) -> Result<(), ConnectionError> {
        self.log.push(Outbound::Ping {
            target: target.to_string(),
        })
    }

    fn set_nick(&mut self, nick: &str) -> Result<(), ConnectionError> {
        self.log.push(Outbound::Nick {
            nick: nick.to_string(),
        })
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.log.push(Outbound::Disconnect)?;
        self.log.close();
        Ok(())
    }
}
