//! Error handling for the gdoor bus core
//!
//! Provides error types for each phase of the bus lifecycle:
//! - Configuration errors (registration and setup time)
//! - Dispatch faults (a single listener failing while handling a frame)
//! - TX errors (emit-only event triggering and bus writes)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Configuration error type
///
/// Raised only while listeners are being built and registered. Always
/// surfaced to the operator at startup, never silently corrected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Busdata string is not valid hex
    #[error("Invalid busdata '{value}': {reason}")]
    InvalidHex {
        /// The offending busdata string.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Event listener has neither frame data nor explicit event types
    #[error("No event source for '{listener}': provide frame data or explicit types")]
    NoEventSource {
        /// The listener being configured.
        listener: String,
    },

    /// Busdata mapping key missing from the explicit event type list
    #[error(
        "Busdata key '{key}' is not listed in event_types. \
         Add it, or remove event_types to derive them from busdata keys"
    )]
    UnlistedEventType {
        /// The mapping key that is not listed.
        key: String,
    },

    /// Frame pattern added for an event type the listener does not know
    #[error("Event type '{event_type}' is not registered on '{listener}'")]
    UnknownEventType {
        /// The listener being configured.
        listener: String,
        /// The unknown event type name.
        event_type: String,
    },

    /// Listener is already present in this router
    #[error("Listener '{id}' is already registered")]
    DuplicateListener {
        /// The listener id.
        id: String,
    },

    /// Listener already belongs to another router
    #[error("Listener '{id}' is attached to another bus")]
    AttachedElsewhere {
        /// The listener id.
        id: String,
    },

    /// Listener handle is still borrowed by the caller
    #[error("Listener '{id}' is borrowed and cannot be registered")]
    ListenerBusy {
        /// The listener id, empty when the handle is mutably borrowed.
        id: String,
    },

    /// Bus write output references something that cannot be linked
    #[error("Invalid TX link on '{output}': {reason}")]
    InvalidTxLink {
        /// The output id.
        output: String,
        /// Why the link is invalid.
        reason: String,
    },
}

/// Dispatch fault type
///
/// A listener failing while handling a frame. Caught per listener by the
/// router and logged; never propagated out of dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchFault {
    /// Listener is borrowed elsewhere while the frame is delivered
    #[error("Listener busy during dispatch")]
    ListenerBusy,

    /// Listener handler reported a failure
    #[error("Listener handler failed: {reason}")]
    Handler {
        /// The failure reason.
        reason: String,
    },
}

/// TX error type
///
/// Errors from emit-only event triggering and bus write outputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    /// No listener with the given id is registered
    #[error("No listener '{id}' on this bus")]
    UnknownListener {
        /// The listener id.
        id: String,
    },

    /// Listener cannot be triggered from the TX side
    #[error("Listener '{id}' does not accept TX events")]
    NotAnEventListener {
        /// The listener id.
        id: String,
    },

    /// Event type is not in the listener's resolved list
    #[error("Event type '{event_type}' is not declared")]
    UnknownEventType {
        /// The undeclared event type.
        event_type: String,
    },

    /// Listener is borrowed elsewhere
    #[error("Listener '{id}' is busy")]
    ListenerBusy {
        /// The listener id.
        id: String,
    },

    /// Transmitter failed to put the frame on the bus
    #[error("Transmit failed: {reason}")]
    Transmit {
        /// The reason for the failure.
        reason: String,
    },
}

/// Main error type for the gdoor bus
///
/// A unified error type that can represent any error from the core.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Dispatch fault
    #[error(transparent)]
    Dispatch(#[from] DispatchFault),

    /// TX error
    #[error(transparent)]
    Tx(#[from] TxError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a configuration error
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Check if this is a TX error
    pub fn is_tx_error(&self) -> bool {
        matches!(self, Error::Tx(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlisted_event_type_names_key() {
        let err = ConfigurationError::UnlistedEventType {
            key: "closed".to_string(),
        };
        assert!(err.to_string().contains("'closed'"));
    }

    #[test]
    fn test_no_event_source_message() {
        let err = ConfigurationError::NoEventSource {
            listener: "door".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No event source for 'door': provide frame data or explicit types"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ConfigurationError::DuplicateListener {
            id: "bell".to_string(),
        }
        .into();
        assert!(err.is_configuration_error());
        assert!(!err.is_tx_error());

        let err: Error = TxError::Transmit {
            reason: "line busy".to_string(),
        }
        .into();
        assert!(err.is_tx_error());
        assert_eq!(err.to_string(), "Transmit failed: line busy");
    }
}
