//! ZNP command header definitions
//!
//! The first command byte (`CMD0`) packs the command type into bits 7..5 and
//! the subsystem into bits 4..0. The second byte (`CMD1`) is the command id
//! within that subsystem.

use crate::error::ParseError;

/// Mask selecting the command type bits of `CMD0`
pub const TYPE_MASK: u8 = 0xE0;
/// Mask selecting the subsystem bits of `CMD0`
pub const SUBSYSTEM_MASK: u8 = 0x1F;

/// ZNP command type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandType {
    /// Poll (SPI only)
    Poll = 0x00,
    /// Synchronous request
    Sreq = 0x20,
    /// Asynchronous request / indication
    Areq = 0x40,
    /// Synchronous response
    Srsp = 0x60,
}

impl CommandType {
    /// Short upper-case name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            CommandType::Poll => "POLL",
            CommandType::Sreq => "SREQ",
            CommandType::Areq => "AREQ",
            CommandType::Srsp => "SRSP",
        }
    }
}

impl TryFrom<u8> for CommandType {
    type Error = ParseError;

    /// Extract the command type from a full `CMD0` byte
    fn try_from(cmd0: u8) -> Result<Self, Self::Error> {
        match cmd0 & TYPE_MASK {
            0x00 => Ok(Self::Poll),
            0x20 => Ok(Self::Sreq),
            0x40 => Ok(Self::Areq),
            0x60 => Ok(Self::Srsp),
            other => Err(ParseError::InvalidFrame(format!(
                "unknown command type 0x{:02X}",
                other
            ))),
        }
    }
}

/// ZNP subsystem identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Subsystem {
    /// RPC error reporting
    RpcError = 0x00,
    /// System interface (ping, version, reset)
    Sys = 0x01,
    /// MAC layer
    Mac = 0x02,
    /// Network layer
    Nwk = 0x03,
    /// Application framework
    Af = 0x04,
    /// Zigbee device object
    Zdo = 0x05,
    /// Simple API
    Sapi = 0x06,
    /// Utilities
    Util = 0x07,
    /// Debug interface
    Debug = 0x08,
    /// Application interface
    App = 0x09,
}

impl Subsystem {
    /// Short upper-case name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Subsystem::RpcError => "RPC_ERROR",
            Subsystem::Sys => "SYS",
            Subsystem::Mac => "MAC",
            Subsystem::Nwk => "NWK",
            Subsystem::Af => "AF",
            Subsystem::Zdo => "ZDO",
            Subsystem::Sapi => "SAPI",
            Subsystem::Util => "UTIL",
            Subsystem::Debug => "DEBUG",
            Subsystem::App => "APP",
        }
    }
}

impl TryFrom<u8> for Subsystem {
    type Error = ParseError;

    /// Extract the subsystem from a full `CMD0` byte
    fn try_from(cmd0: u8) -> Result<Self, Self::Error> {
        match cmd0 & SUBSYSTEM_MASK {
            0x00 => Ok(Self::RpcError),
            0x01 => Ok(Self::Sys),
            0x02 => Ok(Self::Mac),
            0x03 => Ok(Self::Nwk),
            0x04 => Ok(Self::Af),
            0x05 => Ok(Self::Zdo),
            0x06 => Ok(Self::Sapi),
            0x07 => Ok(Self::Util),
            0x08 => Ok(Self::Debug),
            0x09 => Ok(Self::App),
            other => Err(ParseError::InvalidFrame(format!(
                "unknown subsystem 0x{:02X}",
                other
            ))),
        }
    }
}

/// Build a `CMD0` byte from a command type and subsystem
pub const fn cmd0(kind: CommandType, subsystem: Subsystem) -> u8 {
    kind as u8 | subsystem as u8
}

/// SYS subsystem command ids
pub mod sys {
    /// `SYS_PING`: returns the capability bitmap
    pub const PING: u8 = 0x01;
    /// `SYS_VERSION`: returns transport/product/release information
    pub const VERSION: u8 = 0x02;

    /// Capability flags payload sent with our ping request
    pub const PING_CAPABILITIES: u8 = 0x01;
}
