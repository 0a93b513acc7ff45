//! # Event Bus Module
//!
//! The publication boundary of the bus router. Listeners produce
//! [`BusEvent`]s; the router publishes them here and the hosting application
//! subscribes to forward them to sensors, automations or a message bus.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gdoor_core::event_bus::{BusEvent, EventBus, EventCategory, EventFilter};
//!
//! let events = Arc::new(EventBus::new());
//! let subscription = events.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Event]),
//!     |event| {
//!         if let BusEvent::EventFired { event_type, .. } = event {
//!             println!("event: {}", event_type);
//!         }
//!     },
//! );
//!
//! let router = BusRouter::new(events.clone());
//! // ... register listeners, dispatch frames ...
//!
//! events.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
