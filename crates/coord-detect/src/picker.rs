//! Coordinator candidate selection

use crate::scanner::{DeviceInfo, WELL_KNOWN_ALIAS};

/// Device nodes tried when nothing better is known
pub const FALLBACK_PATHS: &[&str] = &["/dev/ttyACM0", "/dev/ttyUSB0"];

/// Pick the most likely coordinator from an enumeration
///
/// Known Zigbee adapters are preferred over other serial devices; within
/// that pool the device behind [`WELL_KNOWN_ALIAS`] wins, otherwise the first
/// one in enumeration order.
pub fn pick(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    pick_with_alias(devices, WELL_KNOWN_ALIAS)
}

/// [`pick`] with an explicit preferred alias
pub fn pick_with_alias<'a>(devices: &'a [DeviceInfo], alias: &str) -> Option<&'a DeviceInfo> {
    let pool = zigbee_adapters(devices);
    pool.iter()
        .find(|d| d.stable_alias.as_deref() == Some(alias))
        .or_else(|| pool.first())
        .copied()
}

/// Known Zigbee adapters, or every device when none is known
pub fn zigbee_adapters(devices: &[DeviceInfo]) -> Vec<&DeviceInfo> {
    let known: Vec<&DeviceInfo> = devices.iter().filter(|d| d.is_known_zigbee).collect();
    if known.is_empty() {
        devices.iter().collect()
    } else {
        known
    }
}

/// Device path to configure when the user has not chosen one
///
/// `exists` reports whether a path is present on this system.
pub fn default_device_path(devices: &[DeviceInfo], exists: impl Fn(&str) -> bool) -> String {
    if exists(WELL_KNOWN_ALIAS) {
        return WELL_KNOWN_ALIAS.to_string();
    }

    let known: Vec<&DeviceInfo> = devices.iter().filter(|d| d.is_known_zigbee).collect();
    if let Some(with_alias) = known.iter().find_map(|d| d.stable_alias.as_deref()) {
        return with_alias.to_string();
    }
    if let Some(first) = known.first() {
        return first.path.clone();
    }

    FALLBACK_PATHS
        .iter()
        .find(|p| exists(p))
        .unwrap_or(&FALLBACK_PATHS[0])
        .to_string()
}
