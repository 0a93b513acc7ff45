//! Bus listener interface
//!
//! Defines the listener trait the router dispatches frames to, plus the
//! identity types shared by every listener kind.

mod binary_sensor;
mod event;

pub use binary_sensor::BinarySensorListener;
pub use event::EventListener;

use crate::error::{DispatchFault, TxError};
use crate::event_bus::BusEvent;
use crate::frame::Frame;
use crate::types::Shared;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Stable listener identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(String);

impl ListenerId {
    /// Create an id from a configuration name
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListenerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of a bus router
///
/// Listeners hold one as their non-owning parent reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusId(Uuid);

impl BusId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for BusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bus({})", &self.0.to_string()[..8])
    }
}

/// Listener kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListenerKind {
    /// Reports a binary state.
    BinarySensor,
    /// Reports named events.
    Event,
}

impl std::fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerKind::BinarySensor => write!(f, "binary_sensor"),
            ListenerKind::Event => write!(f, "event"),
        }
    }
}

/// Listener trait for bus frames
///
/// `on_frame` is the single dispatch entry point. It returns the emission (if
/// any) instead of publishing it, so a listener can never fire more than one
/// signal per frame.
pub trait BusListener {
    /// Stable identity of this listener
    fn id(&self) -> &ListenerId;

    /// Kind of listener
    fn kind(&self) -> ListenerKind;

    /// Router this listener is registered with, if any
    fn parent(&self) -> Option<BusId>;

    /// Record the router this listener was registered with
    fn set_parent(&mut self, bus: BusId);

    /// Test a frame and react to it
    fn on_frame(&mut self, frame: &Frame) -> Result<Option<BusEvent>, DispatchFault>;

    /// Time-driven housekeeping, called between frames
    fn poll(&mut self, _now: Instant) -> Option<BusEvent> {
        None
    }

    /// Trigger an event type from the TX side, without an inbound frame
    fn handle_tx(&mut self, _event_type: &str) -> Result<BusEvent, TxError> {
        Err(TxError::NotAnEventListener {
            id: self.id().to_string(),
        })
    }

    /// Whether `handle_tx` would accept this event type
    fn accepts_tx(&self, _event_type: &str) -> bool {
        false
    }

    /// Log the listener configuration
    fn dump_config(&self);
}

/// Shared handle to a registered listener
///
/// The router and the code that built the listener both hold one; dispatch is
/// single threaded so `Rc<RefCell<_>>` is enough.
pub type SharedListener = Shared<dyn BusListener>;
