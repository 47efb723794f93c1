//! Deferred actions.
//!
//! Flood retries, keep-alive re-arms, and plugin timers are queued here and
//! run by the core once due. Nothing blocks while an action waits; the runtime
//! sleeps until [`Scheduler::next_due`] or the next inbound event, whichever
//! comes first. Actions due at the same instant run in scheduling order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    /// Retry a chat send held back by the flood gate.
    FloodRetry { target: String, text: String },
    /// Run the keep-alive check.
    KeepAlive,
    /// Deliver `PluginEvent::Timer` to one plugin.
    PluginTimer { plugin: String, token: String },
}

#[derive(Debug)]
struct Entry {
    due: Instant,
    seq: u64,
    action: Deferred,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Instant, action: Deferred) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { due, seq, action }));
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(e)| e.due)
    }

    /// Pop the earliest action if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Deferred> {
        match self.heap.peek() {
            Some(Reverse(e)) if e.due <= now => self.heap.pop().map(|Reverse(e)| e.action),
            _ => None,
        }
    }

    pub fn has_pending(&self, pred: impl Fn(&Deferred) -> bool) -> bool {
        self.heap.iter().any(|Reverse(e)| pred(&e.action))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop everything. Only shutdown supersedes scheduled actions.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn timer(token: &str) -> Deferred {
        Deferred::PluginTimer {
            plugin: "echo".into(),
            token: token.into(),
        }
    }

    #[test]
    fn test_pops_in_due_order_then_fifo() {
        let mut sched = Scheduler::new();
        let t0 = Instant::now();
        sched.schedule(t0 + Duration::from_secs(5), timer("late"));
        sched.schedule(t0 + Duration::from_secs(1), timer("a"));
        sched.schedule(t0 + Duration::from_secs(1), timer("b"));

        assert_eq!(sched.next_due(), Some(t0 + Duration::from_secs(1)));
        assert_eq!(sched.pop_due(t0), None);

        let now = t0 + Duration::from_secs(10);
        let order: Vec<_> = std::iter::from_fn(|| sched.pop_due(now)).collect();
        assert_eq!(order, [timer("a"), timer("b"), timer("late")]);
        assert!(sched.is_empty());
    }

    #[test]
    fn test_has_pending_and_clear() {
        let mut sched = Scheduler::new();
        sched.schedule(Instant::now(), Deferred::KeepAlive);
        assert!(sched.has_pending(|d| matches!(d, Deferred::KeepAlive)));
        assert!(!sched.has_pending(|d| matches!(d, Deferred::FloodRetry { .. })));

        sched.clear();
        assert_eq!(sched.len(), 0);
        assert_eq!(sched.next_due(), None);
    }
}
