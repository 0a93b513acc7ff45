//! Event listener
//!
//! Maps frame patterns to event type names. The event type list is resolved
//! at construction; TX-only names have no patterns and are fired through
//! [`BusListener::handle_tx`].

use super::{BusId, BusListener, ListenerId, ListenerKind};
use crate::error::{ConfigurationError, DispatchFault, TxError};
use crate::event_bus::BusEvent;
use crate::event_types::{resolve_event_types, EventBusdata};
use crate::frame::{Frame, FramePattern};

/// Named-event listener
#[derive(Debug, Clone)]
pub struct EventListener {
    id: ListenerId,
    parent: Option<BusId>,
    event_types: Vec<String>,
    // declaration order; first match wins
    patterns: Vec<(String, Vec<FramePattern>)>,
}

impl EventListener {
    /// Build a listener from an explicit type list and/or busdata mapping
    ///
    /// Resolves the event types first, then parses every busdata string.
    pub fn new(
        id: impl Into<ListenerId>,
        explicit_types: &[String],
        busdata: &EventBusdata,
    ) -> Result<Self, ConfigurationError> {
        let id = id.into();
        let event_types = resolve_event_types(id.as_str(), explicit_types, busdata)?;
        let mut listener = Self {
            id,
            parent: None,
            event_types,
            patterns: Vec::new(),
        };

        for (event_type, payloads) in busdata.iter() {
            for hex in payloads {
                listener.add_frame_pattern(FramePattern::parse(hex)?, event_type)?;
            }
        }
        Ok(listener)
    }

    /// Add a pattern for an already-resolved event type
    pub fn add_frame_pattern(
        &mut self,
        pattern: FramePattern,
        event_type: &str,
    ) -> Result<(), ConfigurationError> {
        if !self.has_event_type(event_type) {
            return Err(ConfigurationError::UnknownEventType {
                listener: self.id.to_string(),
                event_type: event_type.to_string(),
            });
        }

        match self.patterns.iter_mut().find(|(name, _)| name == event_type) {
            Some((_, list)) => list.push(pattern),
            None => self.patterns.push((event_type.to_string(), vec![pattern])),
        }
        Ok(())
    }

    /// Resolved event type names
    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }

    /// Whether `name` is one of the resolved event types
    pub fn has_event_type(&self, name: &str) -> bool {
        self.event_types.iter().any(|t| t == name)
    }

    /// Patterns registered for an event type
    pub fn patterns_for(&self, event_type: &str) -> &[FramePattern] {
        self.patterns
            .iter()
            .find(|(name, _)| name == event_type)
            .map(|(_, list)| list.as_slice())
            .unwrap_or_default()
    }

    /// True when no inbound pattern is configured at all
    pub fn is_tx_only(&self) -> bool {
        self.patterns.is_empty()
    }

    fn event(&self, event_type: &str, frame: Frame) -> BusEvent {
        BusEvent::EventFired {
            listener: self.id.clone(),
            event_type: event_type.to_string(),
            frame,
        }
    }
}

impl BusListener for EventListener {
    fn id(&self) -> &ListenerId {
        &self.id
    }

    fn kind(&self) -> ListenerKind {
        ListenerKind::Event
    }

    fn parent(&self) -> Option<BusId> {
        self.parent
    }

    fn set_parent(&mut self, bus: BusId) {
        self.parent = Some(bus);
    }

    fn on_frame(&mut self, frame: &Frame) -> Result<Option<BusEvent>, DispatchFault> {
        let matched = self.patterns.iter().find_map(|(event_type, list)| {
            list.iter()
                .any(|p| p.matches(frame.as_bytes()))
                .then_some(event_type.as_str())
        });

        Ok(matched.map(|event_type| {
            tracing::trace!("{} matched busdata {} as '{}'", self.id, frame, event_type);
            self.event(event_type, frame.clone())
        }))
    }

    fn handle_tx(&mut self, event_type: &str) -> Result<BusEvent, TxError> {
        if !self.has_event_type(event_type) {
            return Err(TxError::UnknownEventType {
                event_type: event_type.to_string(),
            });
        }
        Ok(self.event(event_type, Frame::default()))
    }

    fn accepts_tx(&self, event_type: &str) -> bool {
        self.has_event_type(event_type)
    }

    fn dump_config(&self) {
        tracing::info!("Bus event '{}':", self.id);
        tracing::info!("  Event types: {}", self.event_types.join(", "));
        if self.is_tx_only() {
            tracing::info!("  Busdata filters: none (TX-only event)");
            return;
        }
        for (event_type, list) in &self.patterns {
            for pattern in list {
                tracing::info!("  Busdata '{}' -> event_type '{}'", pattern, event_type);
            }
        }
    }
}
