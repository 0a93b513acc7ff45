//! Event Bus implementation.
//!
//! Provides the EventBus struct that carries listener emissions out of the
//! router. There is no global instance; each router is handed its bus.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{BusEvent, EventCategory};
use crate::listener::ListenerId;

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Filter to receive only specific events
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Receive all events.
    #[default]
    All,
    /// Receive events matching any of these categories.
    Categories(Vec<EventCategory>),
    /// Receive events produced by any of these listeners.
    Listeners(Vec<ListenerId>),
}

impl EventFilter {
    /// Check if an event matches this filter
    pub fn matches(&self, event: &BusEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
            EventFilter::Listeners(ids) => ids.contains(event.listener()),
        }
    }
}

type EventHandler = Box<dyn Fn(BusEvent) + Send + Sync>;

/// Configuration for the event bus
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for broadcast. A receiver that falls further behind
    /// than this skips the oldest events.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Error types for event bus operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventBusError {
    /// No subscribers are listening
    #[error("No active subscribers")]
    NoSubscribers,
}

/// Publication bus for listener emissions
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
    handlers: Arc<RwLock<HashMap<SubscriptionId, (EventFilter, EventHandler)>>>,
    config: EventBusConfig,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Publish an event to all subscribers
    ///
    /// Synchronous handlers run on the calling thread before this returns.
    /// Returns the number of broadcast receivers, or `NoSubscribers` when
    /// nobody at all is listening.
    pub fn publish(&self, event: BusEvent) -> Result<usize, EventBusError> {
        let handlers = self.handlers.read();
        for (_, (filter, handler)) in handlers.iter() {
            if filter.matches(&event) {
                handler(event.clone());
            }
        }

        match self.sender.send(event) {
            Ok(count) => Ok(count),
            Err(_) => {
                if handlers.is_empty() {
                    Err(EventBusError::NoSubscribers)
                } else {
                    Ok(0)
                }
            }
        }
    }

    /// Subscribe to events with a synchronous handler
    ///
    /// The handler is called from the dispatch path and should return quickly.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(BusEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.write().insert(id, (filter, Box::new(handler)));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Get a receiver for async consumers
    pub fn receiver(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Unsubscribe from events
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.handlers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Get the number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state_changed(id: &str) -> BusEvent {
        BusEvent::StateChanged {
            listener: ListenerId::new(id),
            state: true,
        }
    }

    fn event_fired(id: &str) -> BusEvent {
        BusEvent::EventFired {
            listener: ListenerId::new(id),
            event_type: "open".to_string(),
            frame: Frame::new(vec![1, 2]),
        }
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();

        let id = bus.subscribe(EventFilter::All, |_| {});
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert!(matches!(
            bus.publish(state_changed("bell")),
            Err(EventBusError::NoSubscribers)
        ));
    }

    #[test]
    fn test_event_filtering() {
        let bus = EventBus::new();
        let sensor_count = Arc::new(AtomicUsize::new(0));
        let door_count = Arc::new(AtomicUsize::new(0));

        let sc = sensor_count.clone();
        bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Sensor]),
            move |_| {
                sc.fetch_add(1, Ordering::SeqCst);
            },
        );

        let dc = door_count.clone();
        bus.subscribe(
            EventFilter::Listeners(vec![ListenerId::new("door")]),
            move |_| {
                dc.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.publish(state_changed("bell")).ok();
        bus.publish(event_fired("door")).ok();
        bus.publish(event_fired("gate")).ok();

        assert_eq!(sensor_count.load(Ordering::SeqCst), 1);
        assert_eq!(door_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_receiver() {
        let bus = EventBus::new();
        let mut receiver = bus.receiver();

        bus.publish(event_fired("door")).ok();

        match receiver.recv().await {
            Ok(BusEvent::EventFired { event_type, .. }) => assert_eq!(event_type, "open"),
            other => panic!("Wrong event received: {:?}", other),
        }
    }

    #[test]
    fn test_slow_receiver_lags() {
        let bus = EventBus::with_config(EventBusConfig {
            channel_capacity: 2,
        });
        let mut receiver = bus.receiver();

        for _ in 0..4 {
            bus.publish(state_changed("bell")).ok();
        }
        assert!(matches!(
            receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(2))
        ));
        assert!(receiver.try_recv().is_ok());
    }
}
