//! Error types for ZNP frame parsing and encoding

use thiserror::Error;

/// Errors that can occur while parsing or building ZNP frames
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer is incomplete - need more data
    #[error("incomplete data: need {needed} more bytes")]
    Incomplete { needed: usize },

    /// Frame does not start with the start-of-frame marker
    #[error("missing start-of-frame marker, got 0x{0:02X}")]
    MissingStartOfFrame(u8),

    /// Length byte disagrees with the amount of data
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Payload does not fit in the one-byte length field
    #[error("payload too long: {0} bytes (max 255)")]
    PayloadTooLong(usize),

    /// Frame check sequence mismatch
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}
