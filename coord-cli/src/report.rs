//! Device resolution and terminal output

use std::fmt::Write;

use coord_detect::{
    pick, DeviceInfo, DriverGuess, ProbeDetails, ProbeResult, ToolInstallResult,
};
use serde::Serialize;

/// Device chosen for a command, with the path to open
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub device: DeviceInfo,
    pub path: String,
}

/// Pick the device to work on
///
/// An explicit argument wins and is matched against the enumerated paths and
/// aliases. Without one the picker chooses from `devices`, and the saved
/// setting is the last resort.
pub fn resolve_target(
    devices: &[DeviceInfo],
    explicit: Option<&str>,
    saved: Option<&str>,
) -> Option<Target> {
    let lookup = |path: &str| Target {
        device: devices
            .iter()
            .find(|d| d.matches(path))
            .cloned()
            .unwrap_or_else(|| DeviceInfo::manual(path)),
        path: path.to_string(),
    };

    if let Some(path) = explicit {
        return Some(lookup(path));
    }
    if let Some(device) = pick(devices) {
        return Some(Target {
            path: device.display_path().to_string(),
            device: device.clone(),
        });
    }
    saved.map(lookup)
}

/// Classification output for `--json`
#[derive(Debug, Serialize)]
pub struct GuessReport<'a> {
    pub device: &'a DeviceInfo,
    pub path: &'a str,
    pub guess: &'a DriverGuess,
}

/// Probe output for `--json`
#[derive(Debug, Serialize)]
pub struct ProbeReport<'a> {
    pub device: &'a DeviceInfo,
    pub path: &'a str,
    pub result: &'a ProbeResult,
    /// Flasher installation run before the probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<&'a ToolInstallResult>,
}

pub const NO_DEVICES: &str =
    "  (no devices found)\n\n  Connect a Zigbee USB adapter, or pass the device path explicitly";

fn mark(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "FAILED"
    }
}

pub fn render_devices(devices: &[DeviceInfo]) -> String {
    let mut out = String::from("Serial devices:\n");
    if devices.is_empty() {
        out.push_str(NO_DEVICES);
        out.push('\n');
        return out;
    }

    for device in devices {
        let marker = if device.is_known_zigbee { "*" } else { "-" };
        let _ = writeln!(out, "  {} {}", marker, device.path);
        let _ = writeln!(out, "      {}", device.description);
        if let Some(id) = device.usb_id {
            let _ = writeln!(out, "      usb id: {}", id);
        }
        if let Some(alias) = device.stable_alias.as_deref().filter(|a| *a != device.path) {
            let _ = writeln!(out, "      alias:  {}", alias);
        }
    }
    out.push_str("\n  * known Zigbee adapter\n");
    out
}

pub fn render_guess(target: &Target, guess: &DriverGuess) -> String {
    let mut out = String::from("Coordinator (driver estimate):\n");
    let _ = writeln!(out, "  Device:      {}", target.path);
    let _ = writeln!(
        out,
        "  USB ID:      {}",
        target
            .device
            .usb_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(out, "  Description: {}", target.device.description);
    out.push('\n');
    let _ = writeln!(out, "  Driver:      {}", guess.driver);
    let _ = writeln!(out, "  Confidence:  {}", guess.confidence);
    let _ = writeln!(out, "  Reason:      {}", guess.reason);
    out
}

pub fn render_probe(target: &Target, result: &ProbeResult) -> String {
    let mut out = String::from("Coordinator (probe):\n");
    let _ = writeln!(out, "  Device:  {}", target.path);
    let _ = writeln!(out, "  Result:  {} {}", mark(result.ok), result.driver);
    let _ = writeln!(out, "  Message: {}", result.message);

    match &result.details {
        ProbeDetails::None => {}
        ProbeDetails::ZnpPing => {
            let _ = writeln!(out, "  Firmware (znp): version unknown");
        }
        ProbeDetails::ZnpVersion(version) => {
            let _ = writeln!(out, "  Firmware (znp): {}", version);
            if let Some(product) = version.product {
                let _ = writeln!(out, "  Product id:     {}", product);
            }
            let _ = writeln!(out, "  Raw version:    {}", version.raw_hex);
        }
        ProbeDetails::Ember(details) => {
            if let Some(version) = &details.firmware_version {
                let _ = writeln!(out, "  Firmware (ember): {}", version);
            }
            if !result.ok && !details.raw_output.is_empty() {
                let _ = writeln!(out, "  ---\n{}\n  ---", details.raw_output);
            }
        }
    }
    out
}

pub fn render_install(result: &ToolInstallResult) -> String {
    let mut out = format!("Installing {}:\n", result.tool_name);
    let _ = writeln!(out, "  Result: {} {}", mark(result.ok), result.message);
    if let Some(output) = result.raw_output.as_deref().filter(|o| !o.is_empty()) {
        let _ = writeln!(out, "  ---\n{}\n  ---", output);
    }
    out
}
