//! Driver family classification from USB signatures
//!
//! Zigbee2MQTT needs to be told which adapter driver to use: `zstack` for
//! TI Z-Stack (ZNP) firmware or `ember` for Silicon Labs EZSP firmware. This
//! module makes a best guess from what the OS tells us about a device,
//! without touching the device itself.

use serde::Serialize;

use crate::scanner::DeviceInfo;
use crate::usb_ids::{dresden, silabs, wch, UsbId, EMBER_SIGNATURES, ZSTACK_SIGNATURES};

/// Coordinator driver family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// TI Z-Stack, ZNP serial protocol
    Zstack,
    /// Silicon Labs EZSP ("ember")
    Ember,
    /// Not determined, or a family outside these two
    Unknown,
}

impl Driver {
    /// Adapter name as Zigbee2MQTT spells it
    pub fn name(&self) -> &'static str {
        match self {
            Driver::Zstack => "zstack",
            Driver::Ember => "ember",
            Driver::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How much a guess can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn name(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifier verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverGuess {
    pub driver: Driver,
    pub confidence: Confidence,
    /// Human readable justification, for display only
    pub reason: String,
}

impl DriverGuess {
    fn new(driver: Driver, confidence: Confidence, reason: impl Into<String>) -> Self {
        Self {
            driver,
            confidence,
            reason: reason.into(),
        }
    }
}

/// Keywords pointing at EZSP firmware on a CP210x board
const EMBER_HINTS: &[&str] = &["efr", "ember", "ezsp", "zbdongle-e"];

/// Board and chip keywords, checked in order after the USB ID rules
const KEYWORD_RULES: &[(&str, Driver, &str)] = &[
    ("zbdongle-e", Driver::Ember, "mentions ZBDongle-E"),
    ("zbdongle-p", Driver::Zstack, "mentions ZBDongle-P"),
    ("cc2531", Driver::Zstack, "mentions CC2531"),
    ("cc2652", Driver::Zstack, "mentions CC2652"),
    ("efr32", Driver::Ember, "mentions EFR32"),
];

/// Guess the driver family of a device
///
/// Rules are checked in order, first match wins: exact USB IDs, then the
/// CP210x shared-bridge heuristic, then the ConBee exclusion, then free-text
/// keywords, then give up.
pub fn classify(device: &DeviceInfo) -> DriverGuess {
    let desc = device.description.to_lowercase();
    let alias = device
        .stable_alias
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let mentions = |keyword: &str| desc.contains(keyword) || alias.contains(keyword);

    if let Some(id) = device.usb_id {
        if let Some(guess) = classify_usb_id(id, &mentions) {
            return guess;
        }
    }

    if desc.contains("conbee") {
        return conbee_guess("description mentions ConBee");
    }

    for (keyword, driver, reason) in KEYWORD_RULES {
        if mentions(keyword) {
            return DriverGuess::new(*driver, Confidence::Medium, *reason);
        }
    }

    let usb_id = device
        .usb_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    DriverGuess::new(
        Driver::Unknown,
        Confidence::Low,
        format!("no known signature for usb_id={} ({})", usb_id, device.path),
    )
}

fn classify_usb_id(id: UsbId, mentions: &dyn Fn(&str) -> bool) -> Option<DriverGuess> {
    if EMBER_SIGNATURES.contains(&id) {
        return Some(DriverGuess::new(
            Driver::Ember,
            Confidence::High,
            format!("USB ID {} (EFR32, e.g. ZBDongle-E)", id),
        ));
    }

    if ZSTACK_SIGNATURES.contains(&id) {
        return Some(DriverGuess::new(
            Driver::Zstack,
            Confidence::High,
            format!("USB ID {} (TI CC2531)", id),
        ));
    }

    if id == wch::CH340 {
        return Some(DriverGuess::new(
            Driver::Zstack,
            Confidence::Medium,
            format!("USB ID {} (CH340, usually a CC2531 clone)", id),
        ));
    }

    if id == silabs::CP210X {
        // Both families ship behind this bridge; ZBDongle-P is the common one
        if EMBER_HINTS.iter().any(|hint| mentions(hint)) {
            return Some(DriverGuess::new(
                Driver::Ember,
                Confidence::Medium,
                format!("USB ID {} (CP210x) with EFR/Ember hints", id),
            ));
        }
        return Some(DriverGuess::new(
            Driver::Zstack,
            Confidence::Medium,
            format!("USB ID {} (CP210x, usually CC2652P / ZBDongle-P)", id),
        ));
    }

    if id == dresden::CONBEE {
        return Some(conbee_guess(&format!("USB ID {}", id)));
    }

    None
}

fn conbee_guess(evidence: &str) -> DriverGuess {
    DriverGuess::new(
        Driver::Unknown,
        Confidence::High,
        format!(
            "ConBee/ConBee II ({}): deCONZ firmware, neither zstack nor ember",
            evidence
        ),
    )
}
