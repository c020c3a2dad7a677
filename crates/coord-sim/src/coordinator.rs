//! Virtual coordinator simulation
//!
//! Provides a simulated Z-Stack coordinator that answers ZNP requests with
//! protocol-accurate frames.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use znp_protocol::commands::{cmd0, sys, CommandType, Subsystem};
use znp_protocol::{EncodeCommand, ProtocolCodec, ZnpCodec, ZnpFrame};

/// `SYS_VERSION` payload of a Z-Stack 3.x build: status 0, transport 2,
/// product 1, release 2.7.1, revision 20230715
pub const ZSTACK_3X_VERSION: [u8; 10] = [0x00, 0x02, 0x01, 0x02, 0x07, 0x01, 0x3B, 0xB2, 0x34, 0x01];

/// Capability bitmask returned in ping responses (SYS, AF, ZDO, SAPI, UTIL, APP...)
const DEFAULT_CAPABILITIES: u16 = 0x0659;

/// `RPC_ERROR` code for an unsupported command
const RPC_ERR_CMD_ID: u8 = 0x02;

/// Configuration for creating a virtual coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualCoordinatorConfig {
    /// Display name/identifier
    pub id: String,
    /// Answer `SYS_PING` requests
    pub answers_ping: bool,
    /// Capability bitmask sent in ping responses
    pub capabilities: u16,
    /// `SYS_VERSION` payload, `None` leaves version requests unanswered
    pub version: Option<Vec<u8>>,
    /// Garbage bytes written before every response
    pub noise: Vec<u8>,
    /// Number of initial responses sent with a broken checksum
    pub corrupt_responses: usize,
}

impl Default for VirtualCoordinatorConfig {
    fn default() -> Self {
        Self {
            id: "Virtual Z-Stack".to_string(),
            answers_ping: true,
            capabilities: DEFAULT_CAPABILITIES,
            version: Some(ZSTACK_3X_VERSION.to_vec()),
            noise: Vec::new(),
            corrupt_responses: 0,
        }
    }
}

/// A simulated Z-Stack coordinator
#[derive(Debug)]
pub struct VirtualCoordinator {
    config: VirtualCoordinatorConfig,
    /// Incoming byte parser
    codec: ZnpCodec,
    /// Pending output bytes, one entry per response
    pending_output: VecDeque<Vec<u8>>,
    /// Requests received so far
    requests: Vec<ZnpFrame>,
    /// Responses still to be corrupted
    corrupt_remaining: usize,
}

impl VirtualCoordinator {
    /// Create a coordinator answering ping and version
    pub fn new(id: impl Into<String>) -> Self {
        Self::from_config(VirtualCoordinatorConfig {
            id: id.into(),
            ..VirtualCoordinatorConfig::default()
        })
    }

    /// Create a virtual coordinator from configuration
    pub fn from_config(config: VirtualCoordinatorConfig) -> Self {
        let corrupt_remaining = config.corrupt_responses;
        Self {
            config,
            codec: ZnpCodec::new(),
            pending_output: VecDeque::new(),
            requests: Vec::new(),
            corrupt_remaining,
        }
    }

    /// Device that never answers, like a non-ZNP firmware
    pub fn silent(id: impl Into<String>) -> Self {
        Self::from_config(VirtualCoordinatorConfig {
            id: id.into(),
            answers_ping: false,
            version: None,
            ..VirtualCoordinatorConfig::default()
        })
    }

    /// Get the coordinator's identifier
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &VirtualCoordinatorConfig {
        &self.config
    }

    /// Requests decoded so far, in arrival order
    pub fn requests(&self) -> &[ZnpFrame] {
        &self.requests
    }

    /// Feed bytes from the host; returns the number of requests handled
    pub fn process_bytes(&mut self, data: &[u8]) -> usize {
        self.codec.push_bytes(data);

        let mut handled = 0;
        while let Some(frame) = self.codec.next_frame() {
            trace!("{} received {}", self.config.id, frame);
            self.handle_request(&frame);
            self.requests.push(frame);
            handled += 1;
        }
        handled
    }

    fn handle_request(&mut self, request: &ZnpFrame) {
        if request.command_type() != Some(CommandType::Sreq) {
            debug!("{} ignoring non-SREQ frame {}", self.config.id, request);
            return;
        }

        let response = match (request.subsystem(), request.cmd1()) {
            (Some(Subsystem::Sys), sys::PING) => {
                if !self.config.answers_ping {
                    return;
                }
                ZnpFrame::response(
                    Subsystem::Sys,
                    sys::PING,
                    self.config.capabilities.to_le_bytes().to_vec(),
                )
            }
            (Some(Subsystem::Sys), sys::VERSION) => match &self.config.version {
                Some(payload) => ZnpFrame::response(Subsystem::Sys, sys::VERSION, payload.clone()),
                None => return,
            },
            _ => ZnpFrame::new(
                cmd0(CommandType::Srsp, Subsystem::RpcError),
                0x00,
                vec![RPC_ERR_CMD_ID, request.cmd0(), request.cmd1()],
            ),
        };

        match response {
            Ok(frame) => self.queue_response(&frame),
            Err(e) => debug!("{} could not build response: {}", self.config.id, e),
        }
    }

    fn queue_response(&mut self, frame: &ZnpFrame) {
        let mut bytes = self.config.noise.clone();
        let mut encoded = frame.encode();
        if self.corrupt_remaining > 0 {
            self.corrupt_remaining -= 1;
            if let Some(fcs) = encoded.last_mut() {
                *fcs ^= 0xFF;
            }
            debug!("{} corrupting checksum of {}", self.config.id, frame);
        }
        bytes.extend(encoded);
        self.pending_output.push_back(bytes);
    }

    /// Take the next pending output bytes
    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.pending_output.pop_front()
    }

    /// Check if there is pending output
    pub fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }

    /// Get the number of pending output messages
    pub fn output_count(&self) -> usize {
        self.pending_output.len()
    }
}
