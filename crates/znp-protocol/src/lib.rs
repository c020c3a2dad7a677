//! ZNP Protocol Library
//!
//! This crate implements the byte-level side of the Texas Instruments
//! Z-Stack "ZNP" (Zigbee Network Processor) serial protocol, as spoken by
//! CC2531/CC2652 based Zigbee coordinators:
//!
//! - **Framing**: `FE LEN CMD0 CMD1 PAYLOAD FCS` with an XOR frame check sequence
//! - **Command header**: command type (SREQ/SRSP/AREQ) and subsystem packed into `CMD0`
//! - **SYS version**: decoding of the `SYS_VERSION` response payload
//!
//! Only what is needed to positively identify Z-Stack firmware is covered;
//! this is not a Zigbee stack.
//!
//! # Example
//!
//! ```rust
//! use znp_protocol::{EncodeCommand, ProtocolCodec, ZnpCodec, ZnpFrame};
//! use znp_protocol::commands::{sys, Subsystem};
//!
//! let request = ZnpFrame::sys_ping();
//! assert_eq!(request.encode(), vec![0xFE, 0x01, 0x21, 0x01, 0x01, 0x20]);
//!
//! let mut codec = ZnpCodec::new();
//! codec.push_bytes(&[0xFE, 0x02, 0x61, 0x01, 0x59, 0x06, 0x3D]);
//! let frame = codec.next_frame().unwrap();
//! assert!(frame.is_response_to(Subsystem::Sys, sys::PING));
//! ```

pub mod commands;
pub mod error;
pub mod frame;
pub mod version;

pub use commands::{CommandType, Subsystem};
pub use error::ParseError;
pub use frame::{fcs, verify_fcs, ZnpCodec, ZnpFrame, MAX_PAYLOAD_LEN, SOF};
pub use version::SysVersion;

/// Trait for codecs that parse incoming byte streams into frames
pub trait ProtocolCodec {
    /// The frame type produced by this codec
    type Frame;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete, valid frame from the buffer
    fn next_frame(&mut self) -> Option<Self::Frame>;

    /// Try to extract the next complete frame along with its raw bytes
    fn next_frame_with_bytes(&mut self) -> Option<(Self::Frame, Vec<u8>)>;

    /// Clear the internal buffer
    fn clear(&mut self);
}

/// Trait for frames that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this frame to its wire format
    fn encode(&self) -> Vec<u8>;
}

/// Format bytes as a lower-case hex string without separators
pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x02, 0x01, 0xAB]), "0201ab");
        assert_eq!(to_hex(&[]), "");
    }
}
