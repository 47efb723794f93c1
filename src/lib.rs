//! slbot - Straylight Bot
//!
//! An extensible chat-bot runtime. One [`BotCore`] owns the connection, the
//! event bus, admin sessions, flood control, and the loaded plugins; inbound
//! events are routed to built-in commands or plugin commands by tier and
//! then fanned out to every plugin.

pub mod admin;
pub mod bus;
pub mod clock;
pub mod config;
pub mod connection;
pub mod core;
pub mod error;
pub mod event;
pub mod flood;
pub mod persistence;
pub mod plugin;
pub mod roster;
pub mod router;
pub mod scheduler;
pub mod settings;
pub mod telemetry;

pub use crate::config::Config;
pub use crate::core::BotCore;
pub use crate::error::{BotError, BotResult};
pub use crate::event::Event;
