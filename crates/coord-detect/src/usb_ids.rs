//! USB Vendor/Product ID database for Zigbee coordinator adapters
//!
//! Most coordinators are a radio SoC behind a USB-to-serial bridge, so the
//! USB ID often names the bridge chip rather than the radio. The tables here
//! record which IDs are seen on which boards.

use serde::{Serialize, Serializer};

/// USB Vendor ID / Product ID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }

    /// Parse `"vvvv:pppp"` (hex, any case)
    pub fn parse(s: &str) -> Option<Self> {
        let (vid, pid) = s.trim().split_once(':')?;
        Self::from_hex_parts(vid, pid)
    }

    /// Build from separate vendor and product hex strings, as udev reports them
    pub fn from_hex_parts(vid: &str, pid: &str) -> Option<Self> {
        let vid = u16::from_str_radix(vid.trim(), 16).ok()?;
        let pid = u16::from_str_radix(pid.trim(), 16).ok()?;
        Some(Self { vid, pid })
    }
}

impl std::fmt::Display for UsbId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vid, self.pid)
    }
}

impl Serialize for UsbId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Texas Instruments
pub mod ti {
    use super::UsbId;

    pub const VID: u16 = 0x0451;

    /// CC2531 USB dongle (native USB, Z-Stack)
    pub const CC2531: UsbId = UsbId::new(VID, 0x16A8);
}

/// Silicon Labs
pub mod silabs {
    use super::UsbId;

    pub const VID: u16 = 0x10C4;

    /// CP210x bridge, used by both ZBDongle-P (CC2652P) and EFR32 boards
    pub const CP210X: UsbId = UsbId::new(VID, 0xEA60);
    /// EFR32 with native USB CDC
    pub const EFR32: UsbId = UsbId::new(VID, 0x8A2A);
}

/// WCH (Nanjing Qinheng)
pub mod wch {
    use super::UsbId;

    pub const VID: u16 = 0x1A86;

    /// CH340, common on CC2531 clone boards
    pub const CH340: UsbId = UsbId::new(VID, 0x7523);
    /// CH9102, used by SONOFF ZBDongle-E (EFR32MG21)
    pub const CH9102: UsbId = UsbId::new(VID, 0x55D4);
}

/// Dresden Elektronik
pub mod dresden {
    use super::UsbId;

    pub const VID: u16 = 0x1CF1;

    /// ConBee / ConBee II (deCONZ firmware)
    pub const CONBEE: UsbId = UsbId::new(VID, 0x0030);
}

/// FTDI
pub mod ftdi {
    use super::UsbId;

    pub const VID: u16 = 0x0403;

    /// FT231X, used by SLZB-06 and Tube's coordinators
    pub const FT231X: UsbId = UsbId::new(VID, 0x6015);
}

/// Espressif
pub mod espressif {
    use super::UsbId;

    pub const VID: u16 = 0x303A;

    /// ESP32 native USB serial/JTAG
    pub const USB_SERIAL: UsbId = UsbId::new(VID, 0x1001);
}

/// USB IDs seen on Zigbee adapters, with a display description
pub const KNOWN_ZIGBEE_ADAPTERS: &[(UsbId, &str)] = &[
    (wch::CH340, "CH340 (CC2531, many clones)"),
    (silabs::CP210X, "Silicon Labs CP210x (Sonoff Zigbee 3.0)"),
    (silabs::EFR32, "Silicon Labs (EFR32)"),
    (ti::CC2531, "Texas Instruments CC2531"),
    (dresden::CONBEE, "ConBee/ConBee II"),
    (ftdi::FT231X, "FTDI (SLZB-06, Tube)"),
    (wch::CH9102, "CH9102 (SONOFF ZBDongle-E)"),
    (espressif::USB_SERIAL, "Espressif (ESP32-based)"),
];

/// IDs that almost always carry Silicon Labs EZSP firmware
pub const EMBER_SIGNATURES: &[UsbId] = &[wch::CH9102, silabs::EFR32];

/// IDs that almost always carry TI Z-Stack firmware
pub const ZSTACK_SIGNATURES: &[UsbId] = &[ti::CC2531];

/// Description of a known Zigbee adapter
pub fn known_adapter(id: UsbId) -> Option<&'static str> {
    KNOWN_ZIGBEE_ADAPTERS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, desc)| *desc)
}

/// Check if a USB ID is on the known Zigbee adapter list
pub fn is_known_zigbee_adapter(id: UsbId) -> bool {
    known_adapter(id).is_some()
}

/// Check if a USB ID is a bridge chip found on EZSP boards
///
/// Any Silicon Labs vendor ID qualifies, as does the CH9102 used by the
/// ZBDongle-E.
pub fn is_ember_bridge(id: UsbId) -> bool {
    id.vid == silabs::VID || id == wch::CH9102
}
