//! ZNP frame structure and frame check sequence
//!
//! # Frame Format
//! ```text
//! FE [len] [cmd0] [cmd1] [payload: len bytes] [fcs]
//! ```
//!
//! - `FE`: Start of frame
//! - `len`: Payload length (0-255)
//! - `cmd0`: Command type (bits 7..5) and subsystem (bits 4..0)
//! - `cmd1`: Command id within the subsystem
//! - `fcs`: XOR of every byte from `len` through the end of the payload

use tracing::trace;

use crate::commands::{cmd0, sys, CommandType, Subsystem};
use crate::error::ParseError;
use crate::{EncodeCommand, ProtocolCodec};

/// Start-of-frame marker
pub const SOF: u8 = 0xFE;
/// Largest payload the one-byte length field can describe
pub const MAX_PAYLOAD_LEN: usize = 255;
/// Header bytes covered by the FCS before the payload: len, cmd0, cmd1
pub const HEADER_LEN: usize = 3;
/// Smallest possible frame: SOF + header + FCS
pub const MIN_FRAME_LEN: usize = 1 + HEADER_LEN + 1;

/// Buffered bytes kept while hunting for a frame
const MAX_BUFFER_LEN: usize = 4 * (MIN_FRAME_LEN + MAX_PAYLOAD_LEN);

/// XOR frame check sequence over `data`
pub fn fcs(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Check a received FCS against the header (`len, cmd0, cmd1`) and payload
pub fn verify_fcs(header: [u8; HEADER_LEN], payload: &[u8], received: u8) -> bool {
    fcs(&header) ^ fcs(payload) == received
}

/// A single ZNP frame
///
/// Fields are only set through the constructors, so the payload always fits
/// the one-byte length field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZnpFrame {
    /// Command type and subsystem
    cmd0: u8,
    /// Command id
    cmd1: u8,
    /// Command payload
    payload: Vec<u8>,
}

impl ZnpFrame {
    /// Create a frame, rejecting payloads the length byte cannot describe
    pub fn new(cmd0: u8, cmd1: u8, payload: Vec<u8>) -> Result<Self, ParseError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ParseError::PayloadTooLong(payload.len()));
        }
        Ok(Self {
            cmd0,
            cmd1,
            payload,
        })
    }

    /// Create a synchronous request for `subsystem`
    pub fn request(subsystem: Subsystem, cmd1: u8, payload: Vec<u8>) -> Result<Self, ParseError> {
        Self::new(cmd0(CommandType::Sreq, subsystem), cmd1, payload)
    }

    /// Create a synchronous response for `subsystem`
    pub fn response(subsystem: Subsystem, cmd1: u8, payload: Vec<u8>) -> Result<Self, ParseError> {
        Self::new(cmd0(CommandType::Srsp, subsystem), cmd1, payload)
    }

    /// `SYS_PING` request carrying our capability flags
    pub fn sys_ping() -> Self {
        Self {
            cmd0: cmd0(CommandType::Sreq, Subsystem::Sys),
            cmd1: sys::PING,
            payload: vec![sys::PING_CAPABILITIES],
        }
    }

    /// `SYS_VERSION` request
    pub fn sys_version() -> Self {
        Self {
            cmd0: cmd0(CommandType::Sreq, Subsystem::Sys),
            cmd1: sys::VERSION,
            payload: Vec::new(),
        }
    }

    /// Command type and subsystem byte
    pub fn cmd0(&self) -> u8 {
        self.cmd0
    }

    /// Command id byte
    pub fn cmd1(&self) -> u8 {
        self.cmd1
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Command type encoded in `cmd0`
    pub fn command_type(&self) -> Option<CommandType> {
        CommandType::try_from(self.cmd0).ok()
    }

    /// Subsystem encoded in `cmd0`
    pub fn subsystem(&self) -> Option<Subsystem> {
        Subsystem::try_from(self.cmd0).ok()
    }

    /// True if this is the synchronous response to `subsystem`/`cmd1`
    pub fn is_response_to(&self, subsystem: Subsystem, cmd1: u8) -> bool {
        self.cmd0 == cmd0(CommandType::Srsp, subsystem) && self.cmd1 == cmd1
    }

    /// Header bytes covered by the FCS
    pub fn header(&self) -> [u8; HEADER_LEN] {
        // Length is bounded by construction
        [self.payload.len() as u8, self.cmd0, self.cmd1]
    }

    /// Parse exactly one complete frame from `data`
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < MIN_FRAME_LEN {
            return Err(ParseError::Incomplete {
                needed: MIN_FRAME_LEN - data.len(),
            });
        }
        if data[0] != SOF {
            return Err(ParseError::MissingStartOfFrame(data[0]));
        }

        let len = data[1] as usize;
        let expected_total = MIN_FRAME_LEN + len;
        if data.len() != expected_total {
            return Err(ParseError::InvalidFrame(format!(
                "length byte says {} payload bytes ({} total), got {} bytes",
                len,
                expected_total,
                data.len()
            )));
        }

        let header = [data[1], data[2], data[3]];
        let payload = &data[4..4 + len];
        let received = data[expected_total - 1];
        if !verify_fcs(header, payload, received) {
            return Err(ParseError::ChecksumMismatch {
                expected: fcs(&header) ^ fcs(payload),
                actual: received,
            });
        }

        Ok(Self {
            cmd0: data[2],
            cmd1: data[3],
            payload: payload.to_vec(),
        })
    }
}

impl EncodeCommand for ZnpFrame {
    fn encode(&self) -> Vec<u8> {
        let header = self.header();
        let mut out = Vec::with_capacity(MIN_FRAME_LEN + self.payload.len());
        out.push(SOF);
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.payload);
        out.push(fcs(&header) ^ fcs(&self.payload));
        out
    }
}

impl std::fmt::Display for ZnpFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.command_type(), self.subsystem()) {
            (Some(kind), Some(subsystem)) => write!(
                f,
                "{} {} 0x{:02X} {:02X?}",
                kind.name(),
                subsystem.name(),
                self.cmd1,
                self.payload
            ),
            _ => write!(
                f,
                "0x{:02X} 0x{:02X} {:02X?}",
                self.cmd0, self.cmd1, self.payload
            ),
        }
    }
}

/// Streaming ZNP codec
///
/// Bytes before a start-of-frame marker are discarded, as are frames whose
/// FCS does not match.
#[derive(Debug)]
pub struct ZnpCodec {
    buffer: Vec<u8>,
}

impl ZnpCodec {
    /// Create a new ZNP codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    /// Number of bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn take_frame(&mut self) -> Option<(ZnpFrame, Vec<u8>)> {
        loop {
            let start = match self.buffer.iter().position(|&b| b == SOF) {
                Some(pos) => pos,
                None => {
                    self.buffer.clear();
                    return None;
                }
            };
            if start > 0 {
                trace!("Discarding {} bytes before SOF", start);
                self.buffer.drain(..start);
            }

            if self.buffer.len() < MIN_FRAME_LEN {
                return None;
            }
            let total = MIN_FRAME_LEN + self.buffer[1] as usize;
            if self.buffer.len() < total {
                return None;
            }

            let raw: Vec<u8> = self.buffer[..total].to_vec();
            match ZnpFrame::decode(&raw) {
                Ok(frame) => {
                    self.buffer.drain(..total);
                    return Some((frame, raw));
                }
                Err(e) => {
                    // Resync on the next marker after this one
                    trace!("Dropping invalid frame: {}", e);
                    self.buffer.drain(..1);
                }
            }
        }
    }
}

impl Default for ZnpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCodec for ZnpCodec {
    type Frame = ZnpFrame;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() > MAX_BUFFER_LEN {
            let excess = self.buffer.len() - MAX_BUFFER_LEN;
            self.buffer.drain(..excess);
        }
    }

    fn next_frame(&mut self) -> Option<ZnpFrame> {
        self.take_frame().map(|(frame, _)| frame)
    }

    fn next_frame_with_bytes(&mut self) -> Option<(ZnpFrame, Vec<u8>)> {
        self.take_frame()
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_sys_ping() {
        assert_eq!(
            ZnpFrame::sys_ping().encode(),
            vec![0xFE, 0x01, 0x21, 0x01, 0x01, 0x20]
        );
    }

    #[test]
    fn test_encode_sys_version() {
        // Empty payload: FCS = 0x00 ^ 0x21 ^ 0x02
        assert_eq!(
            ZnpFrame::sys_version().encode(),
            vec![0xFE, 0x00, 0x21, 0x02, 0x23]
        );
    }

    #[test]
    fn test_decode_ping_response() {
        let frame = ZnpFrame::decode(&[0xFE, 0x02, 0x61, 0x01, 0x59, 0x06, 0x3D]).unwrap();
        assert!(frame.is_response_to(Subsystem::Sys, sys::PING));
        assert_eq!(frame.payload, vec![0x59, 0x06]);
        assert_eq!(frame.command_type(), Some(CommandType::Srsp));
    }

    #[test]
    fn test_decode_rejects_bad_fcs() {
        let result = ZnpFrame::decode(&[0xFE, 0x02, 0x61, 0x01, 0x59, 0x06, 0x3E]);
        assert_eq!(
            result,
            Err(ParseError::ChecksumMismatch {
                expected: 0x3D,
                actual: 0x3E
            })
        );
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            ZnpFrame::decode(&[0xFE, 0x00]),
            Err(ParseError::Incomplete { needed: 3 })
        ));
    }

    #[test]
    fn test_payload_too_long() {
        let result = ZnpFrame::new(0x21, 0x01, vec![0; 256]);
        assert_eq!(result, Err(ParseError::PayloadTooLong(256)));
        assert!(ZnpFrame::new(0x21, 0x01, vec![0; 255]).is_ok());
    }

    #[test]
    fn test_largest_payload_length_byte() {
        let frame = ZnpFrame::new(0x61, 0x02, vec![0xAA; MAX_PAYLOAD_LEN]).unwrap();
        assert_eq!(frame.header()[0] as usize, frame.payload().len());

        let bytes = frame.encode();
        assert_eq!(bytes.len(), MIN_FRAME_LEN + MAX_PAYLOAD_LEN);
        assert_eq!(ZnpFrame::decode(&bytes), Ok(frame));
    }

    #[test]
    fn test_request_is_not_its_own_response() {
        let ping = ZnpFrame::sys_ping();
        assert!(!ping.is_response_to(Subsystem::Sys, sys::PING));
    }

    #[test]
    fn test_display() {
        assert_eq!(ZnpFrame::sys_ping().to_string(), "SREQ SYS 0x01 [01]");
    }

    #[test]
    fn test_streaming_parse() {
        let mut codec = ZnpCodec::new();

        codec.push_bytes(&[0x00, 0x13, 0xFE, 0x02, 0x61]);
        assert!(codec.next_frame().is_none());

        codec.push_bytes(&[0x01, 0x59, 0x06, 0x3D]);
        let frame = codec.next_frame().unwrap();
        assert!(frame.is_response_to(Subsystem::Sys, sys::PING));
        assert_eq!(codec.buffered(), 0);
    }

    #[test]
    fn test_streaming_skips_corrupt_frame() {
        let mut codec = ZnpCodec::new();
        let mut data = vec![0xFE, 0x02, 0x61, 0x01, 0x59, 0x06, 0x00];
        data.extend(ZnpFrame::sys_version().encode());
        codec.push_bytes(&data);

        let (frame, raw) = codec.next_frame_with_bytes().unwrap();
        assert_eq!(frame, ZnpFrame::sys_version());
        assert_eq!(raw, ZnpFrame::sys_version().encode());
        assert!(codec.next_frame().is_none());
    }

    #[test]
    fn test_streaming_two_frames() {
        let mut codec = ZnpCodec::new();
        let mut data = ZnpFrame::sys_ping().encode();
        data.extend(ZnpFrame::sys_version().encode());
        codec.push_bytes(&data);

        assert_eq!(codec.next_frame(), Some(ZnpFrame::sys_ping()));
        assert_eq!(codec.next_frame(), Some(ZnpFrame::sys_version()));
        assert_eq!(codec.next_frame(), None);
    }

    proptest! {
        #[test]
        fn prop_build_then_validate(
            cmd0 in any::<u8>(),
            cmd1 in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_LEN),
        ) {
            let frame = ZnpFrame::new(cmd0, cmd1, payload.clone()).unwrap();
            let bytes = frame.encode();

            let header = [bytes[1], bytes[2], bytes[3]];
            prop_assert!(verify_fcs(header, &payload, bytes[bytes.len() - 1]));
            prop_assert_eq!(ZnpFrame::decode(&bytes).unwrap(), frame);
        }

        #[test]
        fn prop_single_bit_flip_fails_validation(
            cmd0 in any::<u8>(),
            cmd1 in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            position in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut bytes = ZnpFrame::new(cmd0, cmd1, payload).unwrap().encode();
            let idx = position.index(bytes.len());
            bytes[idx] ^= 1 << bit;

            prop_assert!(ZnpFrame::decode(&bytes).is_err());

            // The FCS check alone catches every flip outside the SOF byte
            if idx > 0 {
                let len = bytes.len();
                let header = [bytes[1], bytes[2], bytes[3]];
                prop_assert!(!verify_fcs(header, &bytes[4..len - 1], bytes[len - 1]));
            }
        }
    }
}
