//! # GDoor Core
//!
//! Frame dispatch core for the gdoor bus.
//! Provides frame patterns, event type resolution, the binary sensor and
//! event listeners, and the router that walks them for every received frame.

pub mod error;
pub mod event_bus;
pub mod event_types;
pub mod frame;
pub mod listener;
pub mod router;
pub mod tx;
pub mod types;

pub use error::{ConfigurationError, DispatchFault, Error, Result, TxError};

pub use event_bus::{
    BusEvent, EventBus, EventBusConfig, EventBusError, EventCategory, EventFilter, SubscriptionId,
};

pub use event_types::{resolve_event_types, EventBusdata};

pub use frame::{Frame, FramePattern};

pub use listener::{
    BinarySensorListener, BusId, BusListener, EventListener, ListenerId, ListenerKind,
    SharedListener,
};

pub use router::{BusRouter, BusStatus, DispatchSummary, DEFAULT_IDLE_TIMEOUT};

pub use tx::{BusTransmitter, BusWrite, HexLineTransmitter, TxLink};

pub use types::{shared, Shared};
