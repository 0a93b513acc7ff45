//! TX side of the bus
//!
//! A [`BusWrite`] is an output that puts a fixed payload on the bus and can
//! fire a linked event type on an event listener when it does. The physical
//! sender is abstracted behind [`BusTransmitter`].

use std::io::Write;

use crate::error::{ConfigurationError, TxError};
use crate::frame::{Frame, FramePattern};
use crate::listener::ListenerId;

/// Puts frames on the bus
pub trait BusTransmitter {
    /// Send one frame
    fn send(&mut self, frame: &Frame) -> Result<(), TxError>;
}

/// Transmitter writing each frame as an uppercase hex line
///
/// Used by the command line tool and handy for tests.
#[derive(Debug)]
pub struct HexLineTransmitter<W: Write> {
    writer: W,
}

impl<W: Write> HexLineTransmitter<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> BusTransmitter for HexLineTransmitter<W> {
    fn send(&mut self, frame: &Frame) -> Result<(), TxError> {
        writeln!(self.writer, "{}", frame.to_hex())
            .and_then(|_| self.writer.flush())
            .map_err(|e| TxError::Transmit {
                reason: e.to_string(),
            })
    }
}

/// Event fired on another listener after a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxLink {
    /// Event listener to trigger.
    pub listener: ListenerId,
    /// Event type to fire.
    pub event_type: String,
}

/// Bus write output
#[derive(Debug, Clone)]
pub struct BusWrite {
    id: String,
    payload: Frame,
    tx_event: Option<TxLink>,
}

impl BusWrite {
    /// Create an output sending `payload` (busdata hex)
    pub fn new(id: impl Into<String>, payload: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            id: id.into(),
            payload: FramePattern::parse(payload)?.to_frame(),
            tx_event: None,
        })
    }

    /// Fire `event_type` on `listener` after every write
    pub fn with_tx_event(mut self, listener: impl Into<ListenerId>, event_type: &str) -> Self {
        self.tx_event = Some(TxLink {
            listener: listener.into(),
            event_type: event_type.to_string(),
        });
        self
    }

    /// Output id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Frame this output sends
    pub fn payload(&self) -> &Frame {
        &self.payload
    }

    /// Linked TX event, if any
    pub fn tx_event(&self) -> Option<&TxLink> {
        self.tx_event.as_ref()
    }
}
