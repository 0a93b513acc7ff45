//! Binary sensor listener
//!
//! Asserts `true` whenever an inbound frame equals one of its patterns. There
//! is no "off" pattern: unmatched frames leave the state alone. An optional
//! auto-reset delay turns the sensor back off from `poll` once the delay has
//! passed since the last match.

use std::time::{Duration, Instant};

use super::{BusId, BusListener, ListenerId, ListenerKind};
use crate::error::DispatchFault;
use crate::event_bus::BusEvent;
use crate::frame::{Frame, FramePattern};

/// Binary sensor driven by exact frame matches
#[derive(Debug, Clone)]
pub struct BinarySensorListener {
    id: ListenerId,
    parent: Option<BusId>,
    patterns: Vec<FramePattern>,
    state: bool,
    auto_reset: Option<Duration>,
    last_match: Option<Instant>,
}

impl BinarySensorListener {
    /// Create a sensor with no patterns and state `false`
    pub fn new(id: impl Into<ListenerId>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            patterns: Vec::new(),
            state: false,
            auto_reset: None,
            last_match: None,
        }
    }

    /// Return to `false` this long after the last match
    pub fn with_auto_reset(mut self, delay: Duration) -> Self {
        self.auto_reset = Some(delay);
        self
    }

    /// Append a pattern; duplicates are tolerated
    pub fn add_frame_pattern(&mut self, pattern: FramePattern) {
        self.patterns.push(pattern);
    }

    /// Current state
    pub fn state(&self) -> bool {
        self.state
    }

    /// Configured patterns
    pub fn patterns(&self) -> &[FramePattern] {
        &self.patterns
    }

    /// Configured auto-reset delay
    pub fn auto_reset(&self) -> Option<Duration> {
        self.auto_reset
    }

    fn matches(&self, frame: &Frame) -> bool {
        self.patterns.iter().any(|p| p.matches(frame.as_bytes()))
    }
}

impl BusListener for BinarySensorListener {
    fn id(&self) -> &ListenerId {
        &self.id
    }

    fn kind(&self) -> ListenerKind {
        ListenerKind::BinarySensor
    }

    fn parent(&self) -> Option<BusId> {
        self.parent
    }

    fn set_parent(&mut self, bus: BusId) {
        self.parent = Some(bus);
    }

    fn on_frame(&mut self, frame: &Frame) -> Result<Option<BusEvent>, DispatchFault> {
        if !self.matches(frame) {
            return Ok(None);
        }

        tracing::trace!("{} matched busdata {}", self.id, frame);
        self.state = true;
        self.last_match = Some(Instant::now());
        Ok(Some(BusEvent::StateChanged {
            listener: self.id.clone(),
            state: true,
        }))
    }

    fn poll(&mut self, now: Instant) -> Option<BusEvent> {
        let delay = self.auto_reset?;
        let last = self.last_match?;
        if !self.state || now.saturating_duration_since(last) < delay {
            return None;
        }

        self.state = false;
        self.last_match = None;
        Some(BusEvent::StateChanged {
            listener: self.id.clone(),
            state: false,
        })
    }

    fn dump_config(&self) {
        tracing::info!("Binary sensor '{}':", self.id);
        if let Some(delay) = self.auto_reset {
            tracing::info!("  Auto reset: {} ms", delay.as_millis());
        }
        for pattern in &self.patterns {
            tracing::info!("  Busdata filter: {}", pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(patterns: &[&str]) -> BinarySensorListener {
        let mut sensor = BinarySensorListener::new("bell");
        for p in patterns {
            sensor.add_frame_pattern(FramePattern::parse(p).unwrap());
        }
        sensor
    }

    #[test]
    fn test_match_sets_state() {
        let mut sensor = sensor(&["0A0B"]);
        assert!(!sensor.state());

        let event = sensor.on_frame(&Frame::new(vec![0x0A, 0x0B])).unwrap();
        assert_eq!(
            event,
            Some(BusEvent::StateChanged {
                listener: ListenerId::new("bell"),
                state: true
            })
        );
        assert!(sensor.state());
    }

    #[test]
    fn test_unmatched_frame_leaves_state() {
        let mut sensor = sensor(&["0A0B"]);
        assert_eq!(sensor.on_frame(&Frame::new(vec![0x0C])).unwrap(), None);
        assert!(!sensor.state());

        sensor.on_frame(&Frame::new(vec![0x0A, 0x0B])).unwrap();
        assert_eq!(sensor.on_frame(&Frame::new(vec![0x0C])).unwrap(), None);
        assert!(sensor.state());
    }

    #[test]
    fn test_duplicate_patterns_emit_once() {
        let mut sensor = sensor(&["0A0B", "0a0b"]);
        assert_eq!(sensor.patterns().len(), 2);
        assert!(sensor
            .on_frame(&Frame::new(vec![0x0A, 0x0B]))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_poll_without_auto_reset_keeps_state() {
        let mut sensor = sensor(&["01"]);
        sensor.on_frame(&Frame::new(vec![0x01])).unwrap();
        assert_eq!(sensor.poll(Instant::now() + Duration::from_secs(60)), None);
        assert!(sensor.state());
    }

    #[test]
    fn test_auto_reset_after_delay() {
        let mut sensor = sensor(&["01"]).with_auto_reset(Duration::from_millis(500));
        sensor.on_frame(&Frame::new(vec![0x01])).unwrap();

        assert_eq!(sensor.poll(Instant::now()), None);
        assert!(sensor.state());

        let event = sensor.poll(Instant::now() + Duration::from_millis(600));
        assert_eq!(
            event,
            Some(BusEvent::StateChanged {
                listener: ListenerId::new("bell"),
                state: false
            })
        );
        assert!(!sensor.state());

        // already off, nothing more to report
        assert_eq!(sensor.poll(Instant::now() + Duration::from_secs(5)), None);
    }
}
