//! Bus router
//!
//! Owns the listener registry of one bus and routes every decoded frame to
//! every registered listener, in registration order. The router owns no
//! transport: whatever reads the wire calls [`BusRouter::dispatch`].
//!
//! Listeners register during startup, before the first dispatch. There is no
//! unregister operation.
//!
//! A listener that returns an error, panics, or is still borrowed when a frame
//! arrives is logged and skipped for that frame only. It stays registered.

use std::any::Any;
use std::panic;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ConfigurationError, DispatchFault, TxError};
use crate::event_bus::{BusEvent, EventBus};
use crate::frame::Frame;
use crate::listener::{BusId, BusListener, ListenerId, SharedListener};
use crate::tx::{BusTransmitter, BusWrite};

/// Time without frames after which the bus reports idle
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Bus activity as seen by the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusStatus {
    /// No frame within the idle timeout.
    Idle,
    /// Last frame, rendered as hex, still within the idle timeout.
    Active(String),
}

impl std::fmt::Display for BusStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusStatus::Idle => write!(f, "BUS_IDLE"),
            BusStatus::Active(hex) => write!(f, "{}", hex),
        }
    }
}

/// Outcome of dispatching one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Listeners that emitted a signal.
    pub emitted: usize,
    /// Listeners that faulted and were skipped.
    pub faults: usize,
}

struct Registered {
    id: ListenerId,
    handle: SharedListener,
}

/// Frame router for one bus
pub struct BusRouter {
    id: BusId,
    listeners: Vec<Registered>,
    events: Arc<EventBus>,
    last_frame: Option<(Frame, Instant)>,
    idle_timeout: Duration,
}

impl BusRouter {
    /// Create a router publishing to `events`
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            id: BusId::new(),
            listeners: Vec::new(),
            events,
            last_frame: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Set the idle timeout used by [`BusRouter::bus_status`]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Identity of this router
    pub fn id(&self) -> BusId {
        self.id
    }

    /// Event bus emissions are published to
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// True when no listener is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Ids of registered listeners, in registration order
    pub fn listener_ids(&self) -> Vec<ListenerId> {
        self.listeners.iter().map(|r| r.id.clone()).collect()
    }

    /// Register a listener
    ///
    /// Fails if the same handle or another listener with the same id is
    /// already registered here, if the listener belongs to another router, or
    /// if the caller still holds a borrow of the handle.
    pub fn register_listener(&mut self, listener: SharedListener) -> Result<(), ConfigurationError> {
        let Ok(mut candidate) = listener.try_borrow_mut() else {
            let id = listener
                .try_borrow()
                .map(|l| l.id().to_string())
                .unwrap_or_default();
            return Err(ConfigurationError::ListenerBusy { id });
        };
        let id = candidate.id().clone();

        let duplicate = candidate.parent() == Some(self.id)
            || self
                .listeners
                .iter()
                .any(|r| r.id == id || Rc::ptr_eq(&r.handle, &listener));
        if duplicate {
            return Err(ConfigurationError::DuplicateListener { id: id.to_string() });
        }
        if candidate.parent().is_some() {
            return Err(ConfigurationError::AttachedElsewhere { id: id.to_string() });
        }

        candidate.set_parent(self.id);
        tracing::debug!("{} registered {} listener '{}'", self.id, candidate.kind(), id);
        drop(candidate);

        self.listeners.push(Registered {
            id,
            handle: listener,
        });
        Ok(())
    }

    /// Route one frame to every listener
    ///
    /// Never fails. A listener that faults is logged and skipped; the rest of
    /// the registry still sees the frame.
    pub fn dispatch(&mut self, frame: &Frame) -> DispatchSummary {
        self.last_frame = Some((frame.clone(), Instant::now()));
        tracing::debug!("Dispatching bus frame {}", frame);

        let mut summary = DispatchSummary::default();
        for entry in &self.listeners {
            let result = match entry.handle.try_borrow_mut() {
                Ok(mut l) => panic::catch_unwind(panic::AssertUnwindSafe(|| l.on_frame(frame)))
                    .unwrap_or_else(|payload| {
                        Err(DispatchFault::Handler {
                            reason: panic_reason(payload.as_ref()),
                        })
                    }),
                Err(_) => Err(DispatchFault::ListenerBusy),
            };

            match result {
                Ok(Some(event)) => {
                    summary.emitted += 1;
                    self.publish(event);
                }
                Ok(None) => {}
                Err(fault) => {
                    summary.faults += 1;
                    tracing::warn!(
                        "Listener '{}' faulted on frame {}: {}",
                        entry.id,
                        frame,
                        fault
                    );
                }
            }
        }
        summary
    }

    /// Run time-driven listener housekeeping
    ///
    /// Returns the number of emissions. Listeners that are busy are skipped
    /// until the next poll.
    pub fn poll(&mut self, now: Instant) -> usize {
        let mut emitted = 0;
        for entry in &self.listeners {
            let event = match entry.handle.try_borrow_mut() {
                Ok(mut l) => match panic::catch_unwind(panic::AssertUnwindSafe(|| l.poll(now))) {
                    Ok(event) => event,
                    Err(payload) => {
                        tracing::warn!(
                            "Listener '{}' faulted on poll: {}",
                            entry.id,
                            panic_reason(payload.as_ref())
                        );
                        None
                    }
                },
                Err(_) => continue,
            };
            if let Some(event) = event {
                emitted += 1;
                self.publish(event);
            }
        }
        emitted
    }

    /// Fire an event type on a registered event listener from the TX side
    pub fn fire_tx_event(&self, listener: &ListenerId, event_type: &str) -> Result<(), TxError> {
        let handle = self.find(listener).ok_or_else(|| TxError::UnknownListener {
            id: listener.to_string(),
        })?;
        let event = handle
            .try_borrow_mut()
            .map_err(|_| TxError::ListenerBusy {
                id: listener.to_string(),
            })?
            .handle_tx(event_type)?;
        self.publish(event);
        Ok(())
    }

    /// Check that an output's linked TX event can be fired on this bus
    pub fn validate_tx_link(&self, output: &BusWrite) -> Result<(), ConfigurationError> {
        let Some(link) = output.tx_event() else {
            return Ok(());
        };
        let invalid = |reason: String| ConfigurationError::InvalidTxLink {
            output: output.id().to_string(),
            reason,
        };

        let handle = self
            .find(&link.listener)
            .ok_or_else(|| invalid(format!("no listener '{}'", link.listener)))?;
        let accepts = handle
            .try_borrow()
            .map_err(|_| invalid(format!("'{}' is busy", link.listener)))?
            .accepts_tx(&link.event_type);
        if !accepts {
            return Err(invalid(format!(
                "'{}' does not declare event type '{}'",
                link.listener, link.event_type
            )));
        }
        Ok(())
    }

    /// Send an output's payload, then fire its linked TX event
    pub fn write(
        &self,
        output: &BusWrite,
        transmitter: &mut dyn BusTransmitter,
    ) -> Result<(), TxError> {
        tracing::debug!("Writing bus data {} for '{}'", output.payload(), output.id());
        transmitter.send(output.payload())?;

        if let Some(link) = output.tx_event() {
            self.fire_tx_event(&link.listener, &link.event_type)?;
        }
        Ok(())
    }

    /// Activity status at `now`
    pub fn bus_status(&self, now: Instant) -> BusStatus {
        match &self.last_frame {
            Some((frame, at)) if now.saturating_duration_since(*at) < self.idle_timeout => {
                BusStatus::Active(frame.to_hex())
            }
            _ => BusStatus::Idle,
        }
    }

    /// Last dispatched frame
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref().map(|(frame, _)| frame)
    }

    /// Log the router and every listener configuration
    pub fn dump_config(&self) {
        tracing::info!("GDoor bus {}:", self.id);
        tracing::info!("  Listeners: {}", self.listeners.len());
        tracing::info!("  Idle timeout: {} ms", self.idle_timeout.as_millis());
        for entry in &self.listeners {
            match entry.handle.try_borrow() {
                Ok(l) => l.dump_config(),
                Err(_) => tracing::info!("  {}: busy", entry.id),
            }
        }
    }

    fn find(&self, id: &ListenerId) -> Option<&SharedListener> {
        self.listeners
            .iter()
            .find(|r| r.id == *id)
            .map(|r| &r.handle)
    }

    fn publish(&self, event: BusEvent) {
        tracing::debug!("{}", event.description());
        if self.events.publish(event).is_err() {
            tracing::trace!("No subscribers on {}", self.id);
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("panicked: {}", message)
}

impl std::fmt::Debug for BusRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusRouter")
            .field("id", &self.id)
            .field("listeners", &self.listeners.len())
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_types::EventBusdata;
    use crate::frame::FramePattern;
    use crate::listener::{BinarySensorListener, EventListener, ListenerKind};
    use crate::types::shared;
    use parking_lot::Mutex;

    fn sensor(id: &str, pattern: &str) -> BinarySensorListener {
        let mut sensor = BinarySensorListener::new(id);
        sensor.add_frame_pattern(FramePattern::parse(pattern).unwrap());
        sensor
    }

    fn recording_router() -> (BusRouter, Arc<Mutex<Vec<BusEvent>>>) {
        let events = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        events.subscribe(Default::default(), move |e| sink.lock().push(e));
        (BusRouter::new(events), seen)
    }

    struct FaultyListener {
        id: ListenerId,
        parent: Option<BusId>,
    }

    impl BusListener for FaultyListener {
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
        fn on_frame(&mut self, _frame: &Frame) -> Result<Option<BusEvent>, DispatchFault> {
            Err(DispatchFault::Handler {
                reason: "boom".to_string(),
            })
        }
        fn dump_config(&self) {}
    }

    struct PanickingListener {
        id: ListenerId,
        parent: Option<BusId>,
    }

    impl BusListener for PanickingListener {
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
            panic!("cannot decode {}", frame);
        }
        fn poll(&mut self, _now: Instant) -> Option<BusEvent> {
            panic!("clock went backwards");
        }
        fn dump_config(&self) {}
    }

    #[test]
    fn test_one_matching_one_not() {
        let (mut router, seen) = recording_router();
        router
            .register_listener(shared(sensor("bell", "0A0B")))
            .unwrap();
        router
            .register_listener(shared(sensor("light", "0C0D")))
            .unwrap();

        let summary = router.dispatch(&Frame::new(vec![0x0A, 0x0B]));
        assert_eq!(summary, DispatchSummary { emitted: 1, faults: 0 });
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].listener().as_str(), "bell");
    }

    #[test]
    fn test_same_handle_twice_rejected() {
        let (mut router, _) = recording_router();
        let bell: SharedListener = shared(sensor("bell", "01"));
        router.register_listener(bell.clone()).unwrap();

        assert_eq!(
            router.register_listener(bell),
            Err(ConfigurationError::DuplicateListener {
                id: "bell".to_string()
            })
        );
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (mut router, _) = recording_router();
        router.register_listener(shared(sensor("bell", "01"))).unwrap();
        assert!(matches!(
            router.register_listener(shared(sensor("bell", "02"))),
            Err(ConfigurationError::DuplicateListener { .. })
        ));
    }

    #[test]
    fn test_listener_belongs_to_one_router() {
        let (mut first, _) = recording_router();
        let (mut second, _) = recording_router();
        let bell: SharedListener = shared(sensor("bell", "01"));

        first.register_listener(bell.clone()).unwrap();
        assert_eq!(bell.borrow().parent(), Some(first.id()));
        assert!(matches!(
            second.register_listener(bell),
            Err(ConfigurationError::AttachedElsewhere { .. })
        ));
        assert!(second.is_empty());
    }

    #[test]
    fn test_fault_does_not_stop_dispatch() {
        let (mut router, seen) = recording_router();
        router
            .register_listener(shared(FaultyListener {
                id: ListenerId::new("broken"),
                parent: None,
            }))
            .unwrap();
        router.register_listener(shared(sensor("bell", "01"))).unwrap();

        let summary = router.dispatch(&Frame::new(vec![0x01]));
        assert_eq!(summary, DispatchSummary { emitted: 1, faults: 1 });
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_panicking_listener_is_a_fault() {
        let (mut router, seen) = recording_router();
        let broken = shared(PanickingListener {
            id: ListenerId::new("broken"),
            parent: None,
        });
        router.register_listener(broken.clone()).unwrap();
        router.register_listener(shared(sensor("bell", "01"))).unwrap();

        let summary = router.dispatch(&Frame::new(vec![0x01]));
        assert_eq!(summary, DispatchSummary { emitted: 1, faults: 1 });
        assert_eq!(seen.lock()[0].listener().as_str(), "bell");

        // Still registered and no longer borrowed
        assert!(broken.try_borrow_mut().is_ok());
        let summary = router.dispatch(&Frame::new(vec![0x01]));
        assert_eq!(summary, DispatchSummary { emitted: 1, faults: 1 });

        assert_eq!(router.poll(Instant::now()), 0);
    }

    #[test]
    fn test_panic_reason() {
        let payload = std::panic::catch_unwind(|| panic!("bad frame {}", 7)).unwrap_err();
        assert_eq!(panic_reason(payload.as_ref()), "panicked: bad frame 7");

        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_reason(payload.as_ref()), "panicked: static");
    }

    #[test]
    fn test_register_borrowed_listener_rejected() {
        let (mut router, _) = recording_router();
        let bell: SharedListener = shared(sensor("bell", "01"));

        {
            let _guard = bell.borrow();
            assert_eq!(
                router.register_listener(bell.clone()),
                Err(ConfigurationError::ListenerBusy {
                    id: "bell".to_string()
                })
            );
        }
        {
            let _guard = bell.borrow_mut();
            assert!(matches!(
                router.register_listener(bell.clone()),
                Err(ConfigurationError::ListenerBusy { .. })
            ));
        }
        assert!(router.is_empty());

        router.register_listener(bell).unwrap();
        assert_eq!(router.listener_ids(), vec![ListenerId::new("bell")]);
    }

    #[test]
    fn test_busy_listener_is_a_fault() {
        let (mut router, _) = recording_router();
        let bell = shared(sensor("bell", "01"));
        router.register_listener(bell.clone()).unwrap();

        let _guard = bell.borrow();
        let summary = router.dispatch(&Frame::new(vec![0x01]));
        assert_eq!(summary.faults, 1);
    }

    #[test]
    fn test_shared_pattern_triggers_both_kinds() {
        let (mut router, seen) = recording_router();
        let bell = shared(sensor("bell", "0A0B"));
        router.register_listener(bell.clone()).unwrap();

        let busdata: EventBusdata = [("ring", vec!["0A0B"])].into_iter().collect();
        router
            .register_listener(shared(EventListener::new("door", &[], &busdata).unwrap()))
            .unwrap();

        let summary = router.dispatch(&Frame::new(vec![0x0A, 0x0B]));
        assert_eq!(summary.emitted, 2);
        assert!(bell.borrow().state());
        let seen = seen.lock();
        assert_eq!(seen[0].listener().as_str(), "bell");
        assert_eq!(seen[1].listener().as_str(), "door");
    }

    #[test]
    fn test_poll_resets_sensor() {
        let (mut router, seen) = recording_router();
        let bell = shared(sensor("bell", "01").with_auto_reset(Duration::from_millis(100)));
        router.register_listener(bell.clone()).unwrap();

        router.dispatch(&Frame::new(vec![0x01]));
        assert_eq!(router.poll(Instant::now() + Duration::from_millis(200)), 1);
        assert!(!bell.borrow().state());
        assert_eq!(
            seen.lock().last(),
            Some(&BusEvent::StateChanged {
                listener: ListenerId::new("bell"),
                state: false
            })
        );
    }

    #[test]
    fn test_bus_status() {
        let (mut router, _) = recording_router();
        assert_eq!(router.bus_status(Instant::now()), BusStatus::Idle);

        router.dispatch(&Frame::new(vec![0x01, 0xAB]));
        assert_eq!(
            router.bus_status(Instant::now()),
            BusStatus::Active("01AB".to_string())
        );
        assert_eq!(
            router.bus_status(Instant::now() + Duration::from_secs(1)),
            BusStatus::Idle
        );
        assert_eq!(BusStatus::Idle.to_string(), "BUS_IDLE");
    }

    #[test]
    fn test_fire_tx_event() {
        let (mut router, seen) = recording_router();
        router
            .register_listener(shared(
                EventListener::new("chime", &["ring".to_string()], &EventBusdata::new()).unwrap(),
            ))
            .unwrap();
        router.register_listener(shared(sensor("bell", "01"))).unwrap();

        router
            .fire_tx_event(&ListenerId::new("chime"), "ring")
            .unwrap();
        assert_eq!(seen.lock().len(), 1);

        assert!(matches!(
            router.fire_tx_event(&ListenerId::new("bell"), "ring"),
            Err(TxError::NotAnEventListener { .. })
        ));
        assert!(matches!(
            router.fire_tx_event(&ListenerId::new("nobody"), "ring"),
            Err(TxError::UnknownListener { .. })
        ));
    }

    #[test]
    fn test_fire_tx_event_on_borrowed_listener() {
        let (mut router, seen) = recording_router();
        let chime: SharedListener = shared(
            EventListener::new("chime", &["ring".to_string()], &EventBusdata::new()).unwrap(),
        );
        router.register_listener(chime.clone()).unwrap();

        let guard = chime.borrow_mut();
        assert!(matches!(
            router.fire_tx_event(&ListenerId::new("chime"), "ring"),
            Err(TxError::ListenerBusy { .. })
        ));
        drop(guard);

        router
            .fire_tx_event(&ListenerId::new("chime"), "ring")
            .unwrap();
        assert_eq!(seen.lock().len(), 1);
    }
}
