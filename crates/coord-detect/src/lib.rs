//! Zigbee Coordinator Detection Library
//!
//! This crate finds serial devices that may be Zigbee coordinators, guesses
//! their driver family from USB identifiers and identifies the firmware by
//! probing: TI Z-Stack over the ZNP protocol, Silicon Labs EZSP through
//! `universal-silabs-flasher`.
//!
//! # Example
//!
//! ```rust,no_run
//! use coord_detect::{classify, pick, CoordinatorProber, DeviceScanner, OsEnv};
//!
//! # async fn run() {
//! let devices = DeviceScanner::new(OsEnv::new()).enumerate().await;
//! if let Some(device) = pick(&devices) {
//!     println!("{} looks like {}", device.display_path(), classify(device).driver);
//!
//!     let result = CoordinatorProber::new(OsEnv::new())
//!         .probe(device, device.display_path())
//!         .await;
//!     println!("{}", result.message);
//! }
//! # }
//! ```

pub mod classify;
pub mod ember;
pub mod env;
pub mod error;
pub mod installer;
pub mod orchestrator;
pub mod picker;
pub mod probe;
pub mod scanner;
pub mod usb_ids;

#[cfg(test)]
mod test_support;

pub use classify::{classify, Confidence, Driver, DriverGuess};
pub use ember::{extract_firmware_version, EmberProber, FLASHER_TOOL};
pub use env::{OsEnv, ProcessOutput, SystemEnv};
pub use error::DetectError;
pub use installer::{install_flasher, install_tool, InstallerConfig, ToolInstallResult};
pub use orchestrator::{probe_coordinator, warrants_ember_probe, CoordinatorProber, DriverProbe};
pub use picker::{default_device_path, pick, pick_with_alias, zigbee_adapters};
pub use probe::{EmberDetails, ProbeConfig, ProbeDetails, ProbeResult, ZnpProber, DEFAULT_BAUD_RATE};
pub use scanner::{DeviceInfo, DeviceScanner, ScannerConfig, WELL_KNOWN_ALIAS};
pub use usb_ids::UsbId;
