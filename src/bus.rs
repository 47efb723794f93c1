//! Synchronous publish/subscribe register.
//!
//! Subscribers are invoked in subscription order with mutable access to a
//! context `C` (the bot core in production). The subscriber list is
//! snapshotted before dispatch, so a subscriber may publish or subscribe
//! re-entrantly; a subscription added mid-dispatch only sees later publishes.

use crate::error::{BotError, BusError};
use crate::event::{Event, EventKind};
use parking_lot::RwLock;
use std::sync::Arc;

/// Subscriber callback.
pub type Subscriber<C> = Arc<dyn Fn(&mut C, &Event) -> Result<(), BotError> + Send + Sync>;

struct Subscription<C> {
    topic: EventKind,
    handler: Subscriber<C>,
}

pub struct EventBus<C> {
    subscriptions: RwLock<Vec<Subscription<C>>>,
}

impl<C> EventBus<C> {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Register `handler` for `topic`. Subscriptions live as long as the bus.
    pub fn subscribe<F>(&self, topic: EventKind, handler: F)
    where
        F: Fn(&mut C, &Event) -> Result<(), BotError> + Send + Sync + 'static,
    {
        self.subscriptions.write().push(Subscription {
            topic,
            handler: Arc::new(handler),
        });
    }

    pub fn subscriber_count(&self, topic: EventKind) -> usize {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.topic == topic)
            .count()
    }

    /// Invoke every subscriber of `event`'s topic, in subscription order.
    ///
    /// The first subscriber error stops dispatch and is returned to the
    /// caller; the bus itself swallows nothing.
    pub fn publish(&self, ctx: &mut C, event: &Event) -> Result<(), BusError> {
        let topic = event.kind();
        let snapshot: Vec<Subscriber<C>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in snapshot {
            handler(ctx, event).map_err(|e| BusError::Subscriber {
                topic,
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self::new()
    }
}
