//! Outbound flood control and keep-alive timing.
//!
//! The window holds the timestamps of the last `max_flood` sends, most recent
//! first. A send is deferred when the window is full and its oldest entry is
//! younger than `flood_interval`; the caller retries after `flood_wait`.
//! Keep-alive probes count as activity and share the same window.

use crate::clock::{MAX_DELAY, deadline};
use crate::config::ConnectionConfig;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Pacing parameters, resolved to durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodConfig {
    pub max_flood: usize,
    pub flood_interval: Duration,
    pub flood_wait: Duration,
    pub keepalive_delay: Duration,
}

impl FloodConfig {
    pub fn from_connection(conn: &ConnectionConfig) -> Self {
        let defaults = Self::default();
        Self {
            max_flood: conn.max_flood,
            flood_interval: secs(conn.flood_interval).unwrap_or(defaults.flood_interval),
            flood_wait: secs(conn.flood_wait).unwrap_or(defaults.flood_wait),
            keepalive_delay: secs(conn.keepalive_delay).unwrap_or(defaults.keepalive_delay),
        }
    }
}

impl Default for FloodConfig {
    fn default() -> Self {
        use crate::config::defaults::*;
        Self {
            max_flood: default_max_flood(),
            flood_interval: Duration::from_secs_f64(default_flood_interval()),
            flood_wait: Duration::from_secs_f64(default_flood_wait()),
            keepalive_delay: Duration::from_secs_f64(default_keepalive_delay()),
        }
    }
}

/// Positive seconds, at most [`MAX_DELAY`], to a duration.
pub(crate) fn secs(value: f64) -> Option<Duration> {
    if value > 0.0 {
        Duration::try_from_secs_f64(value)
            .ok()
            .filter(|delay| *delay <= MAX_DELAY)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDecision {
    /// Recorded in the window; transmit now.
    Sent,
    /// Over budget; retry the same send at `retry_at`.
    Deferred { retry_at: Instant },
}

/// Outcome of a keep-alive check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveCheck {
    /// A probe is due now and has been recorded as activity.
    pub probe: bool,
    /// When the next check should run.
    pub next_check: Instant,
}

#[derive(Debug)]
pub struct FloodGate {
    config: FloodConfig,
    window: VecDeque<Instant>,
}

impl FloodGate {
    pub fn new(config: FloodConfig) -> Self {
        Self {
            config,
            window: VecDeque::with_capacity(config.max_flood),
        }
    }

    pub fn config(&self) -> &FloodConfig {
        &self.config
    }

    /// Swap pacing parameters, trimming the window to the new budget.
    pub fn set_config(&mut self, config: FloodConfig) {
        self.config = config;
        self.window.truncate(config.max_flood);
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Timestamp of the most recent outbound activity.
    pub fn last_activity(&self) -> Option<Instant> {
        self.window.front().copied()
    }

    /// Decide whether a send may go out at `now`.
    pub fn try_send(&mut self, now: Instant) -> SendDecision {
        if self.window.len() >= self.config.max_flood
            && let Some(&oldest) = self.window.back()
            && now.saturating_duration_since(oldest) < self.config.flood_interval
        {
            let retry_at = deadline(now, self.config.flood_wait);
            debug!(
                window = self.window.len(),
                wait_ms = self.config.flood_wait.as_millis() as u64,
                "Flood budget exhausted, deferring send"
            );
            return SendDecision::Deferred { retry_at };
        }

        self.record(now);
        SendDecision::Sent
    }

    /// Decide whether a keep-alive probe is due at `now`.
    ///
    /// The next check always lands on the moment the next probe would become
    /// due, so intervening sends push it back instead of being ignored.
    pub fn keep_alive(&mut self, now: Instant) -> KeepAliveCheck {
        let delay = self.config.keepalive_delay;
        let elapsed = self
            .last_activity()
            .map(|last| now.saturating_duration_since(last));

        match elapsed {
            Some(elapsed) if elapsed < delay => KeepAliveCheck {
                probe: false,
                next_check: deadline(now, delay - elapsed),
            },
            _ => {
                self.record(now);
                debug!("Keep-alive probe due");
                KeepAliveCheck {
                    probe: true,
                    next_check: deadline(now, delay),
                }
            }
        }
    }

    fn record(&mut self, now: Instant) {
        self.window.push_front(now);
        self.window.truncate(self.config.max_flood);
    }
}
