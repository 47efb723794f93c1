//! Connection adapters.
//!
//! The core talks to the network through the [`Connection`] trait and
//! receives [`Inbound`] items from whatever task reads the network. The wire
//! protocol itself lives outside this crate; the adapters here are a
//! recording adapter for tests and a line-oriented console adapter.

pub mod console;
mod memory;

pub use memory::{OutboundLog, Outbound, RecordingConnection};

use crate::error::ConnectionError;
use crate::event::Event;

/// Outbound operations the core performs on the active connection.
pub trait Connection: Send {
    fn send_message(&mut self, target: &str, text: &str) -> Result<(), ConnectionError>;

    /// Send a `/me` action.
    fn describe(&mut self, target: &str, action: &str) -> Result<(), ConnectionError>;

    fn join(&mut self, channel: &str, key: Option<&str>) -> Result<(), ConnectionError>;

    fn leave(&mut self, channel: &str, reason: Option<&str>) -> Result<(), ConnectionError>;

    fn kick(&mut self, channel: &str, nick: &str, reason: &str) -> Result<(), ConnectionError>;

    fn topic(&mut self, channel: &str, topic: &str) -> Result<(), ConnectionError>;

    fn whois(&mut self, nick: &str) -> Result<(), ConnectionError>;

    /// Liveness probe or user ping; the answer arrives as [`Event::Pong`].
    fn ping(&mut self, target: &str) -> Result<(), ConnectionError>;

    fn set_nick(&mut self, nick: &str) -> Result<(), ConnectionError>;

    fn disconnect(&mut self) -> Result<(), ConnectionError>;
}

/// An item read from the network.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Already classified by the adapter.
    Event(Event),
    /// A raw chat line; the core classifies it against its current nick and
    /// prefix. `target: None` means the line was addressed to the bot.
    Privmsg {
        identity: String,
        target: Option<String>,
        text: String,
    },
}

/// Prefix `#` onto a channel name that carries no channel sigil.
pub fn normalize_channel(channel: &str) -> String {
    let channel = channel.trim();
    match channel.chars().next() {
        Some('&' | '#' | '!' | '+') => channel.to_string(),
        _ => format!("#{channel}"),
    }
}
