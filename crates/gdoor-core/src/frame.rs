//! Bus frames and frame patterns
//!
//! A [`Frame`] is a decoded byte sequence as delivered by the transport.
//! A [`FramePattern`] is the configuration-time counterpart: built once from a
//! validated busdata hex string and matched by exact byte equality.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// A decoded bus frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame(Vec<u8>);

impl Frame {
    /// Create a frame from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode a busdata hex string
    ///
    /// Accepts upper or lower case digits. The string must be non-empty and
    /// have an even number of digits.
    pub fn from_hex(hex: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidHex {
            value: hex.to_string(),
            reason: reason.to_string(),
        };

        if hex.is_empty() {
            return Err(invalid("busdata is empty"));
        }
        if hex.len() % 2 != 0 {
            return Err(invalid("odd number of hex digits"));
        }

        let mut bytes = Vec::with_capacity(hex.len() / 2);
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            // from_str_radix tolerates a leading '+', so check digits first
            if !chunk.iter().all(u8::is_ascii_hexdigit) {
                return Err(invalid(&format!("non-hex digit at offset {}", i * 2)));
            }
            let pair = std::str::from_utf8(chunk).map_err(|_| invalid("not ASCII"))?;
            let byte = u8::from_str_radix(pair, 16)
                .map_err(|_| invalid(&format!("'{}' is not a hex byte", pair)))?;
            bytes.push(byte);
        }
        Ok(Self(bytes))
    }

    /// Render as uppercase hex, two digits per byte
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(self.0.len() * 2);
        for byte in &self.0 {
            s.push(HEX_DIGITS[(byte >> 4) as usize] as char);
            s.push(HEX_DIGITS[(byte & 0x0F) as usize] as char);
        }
        s
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes in the frame
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a frame with no bytes (TX-triggered events carry one)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Frame {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Immutable exact-match frame pattern
///
/// Never empty. Two patterns with the same bytes match exactly the same
/// frames, so duplicates in a pattern set are harmless.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FramePattern {
    bytes: Box<[u8]>,
}

impl FramePattern {
    /// Build a pattern from a busdata hex string
    pub fn parse(hex: &str) -> Result<Self, ConfigurationError> {
        Frame::from_hex(hex).map(|frame| Self {
            bytes: frame.0.into_boxed_slice(),
        })
    }

    /// Exact byte equality against an incoming frame
    pub fn matches(&self, frame: &[u8]) -> bool {
        *self.bytes == *frame
    }

    /// Pattern bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Pattern as a frame, e.g. for transmitting it
    pub fn to_frame(&self) -> Frame {
        Frame::from(&*self.bytes)
    }

    /// Uppercase hex rendering
    pub fn to_hex(&self) -> String {
        self.to_frame().to_hex()
    }
}

impl std::str::FromStr for FramePattern {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for FramePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
