//! Dispatch module - ordered fan-out of log events to subscribers
//!
//! The registry is append-only during setup and iterated, never mutated,
//! during dispatch. Subscribers run one after another on the listener's
//! task, so no two subscriber invocations ever overlap and a subscriber
//! may issue RCON commands synchronously while handling an event.

use async_trait::async_trait;

use crate::logs::LogEvent;

/// A subscriber receives every log event, in registration order, including
/// the terminal [`LogEvent::Shutdown`]
#[async_trait]
pub trait Subscriber: Send {
    /// Name used when reporting this subscriber's failures
    fn name(&self) -> &str;

    /// Handle one event. An error is reported and does not affect delivery
    /// to the remaining subscribers.
    async fn on_event(&mut self, event: &LogEvent) -> anyhow::Result<()>;
}

/// Ordered registry of subscribers
#[derive(Default)]
pub struct Dispatcher {
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber to the registry. Must happen before the
    /// dispatch loop starts consuming events.
    pub fn register(&mut self, subscriber: Box<dyn Subscriber>) {
        tracing::debug!("Registered subscriber '{}'", subscriber.name());
        self.subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `event` to every subscriber, in registration order. Each
    /// subscriber runs to completion before the next one starts; a failing
    /// subscriber is logged and skipped, never propagated.
    pub async fn dispatch(&mut self, event: &LogEvent) {
        for subscriber in &mut self.subscribers {
            if let Err(err) = subscriber.on_event(event).await {
                tracing::error!("Subscriber '{}' failed: {:#}", subscriber.name(), err);
            }
        }
    }
}
