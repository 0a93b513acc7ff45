//! Event type definitions for the publication boundary.
//!
//! Every emission leaving a listener is one of these. Events are cloneable and
//! serializable so subscribers can log or forward them.

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::listener::ListenerId;

/// Emission from a bus listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusEvent {
    /// Binary sensor state was set
    StateChanged {
        /// Sensor that changed.
        listener: ListenerId,
        /// New state.
        state: bool,
    },
    /// Named event fired
    EventFired {
        /// Event listener that fired.
        listener: ListenerId,
        /// Resolved event type name.
        event_type: String,
        /// Frame that triggered it; empty when triggered from the TX side.
        frame: Frame,
    },
}

impl BusEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            BusEvent::StateChanged { .. } => EventCategory::Sensor,
            BusEvent::EventFired { .. } => EventCategory::Event,
        }
    }

    /// Listener that produced this event
    pub fn listener(&self) -> &ListenerId {
        match self {
            BusEvent::StateChanged { listener, .. } | BusEvent::EventFired { listener, .. } => {
                listener
            }
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            BusEvent::StateChanged { listener, state } => {
                format!("{} -> {}", listener, if *state { "ON" } else { "OFF" })
            }
            BusEvent::EventFired {
                listener,
                event_type,
                frame,
            } if frame.is_empty() => format!("{} fired '{}' (tx)", listener, event_type),
            BusEvent::EventFired {
                listener,
                event_type,
                frame,
            } => format!("{} fired '{}' on {}", listener, event_type, frame),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Binary sensor state changes.
    Sensor,
    /// Named events.
    Event,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Sensor => write!(f, "Sensor"),
            EventCategory::Event => write!(f, "Event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_description() {
        let event = BusEvent::StateChanged {
            listener: ListenerId::new("bell"),
            state: true,
        };
        assert_eq!(event.category(), EventCategory::Sensor);
        assert_eq!(event.description(), "bell -> ON");

        let event = BusEvent::EventFired {
            listener: ListenerId::new("door"),
            event_type: "open".to_string(),
            frame: Frame::new(vec![0x0A, 0x0B]),
        };
        assert_eq!(event.category(), EventCategory::Event);
        assert_eq!(event.description(), "door fired 'open' on 0A0B");
        assert_eq!(event.listener().as_str(), "door");
    }

    #[test]
    fn test_serialized_shape() {
        let event = BusEvent::StateChanged {
            listener: ListenerId::new("bell"),
            state: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "state_changed");
        assert_eq!(json["listener"], "bell");
        assert_eq!(json["state"], false);
    }
}
