//! Silicon Labs (EZSP / Ember) identification through an external tool
//!
//! There is no in-process EZSP implementation here. The prober defers to
//! `universal-silabs-flasher`, which knows how to talk to the Gecko
//! bootloader and the EZSP/CPC/Spinel firmwares.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::classify::Driver;
use crate::env::SystemEnv;
use crate::error::DetectError;
use crate::probe::{EmberDetails, ProbeDetails, ProbeResult};

/// Name of the Silicon Labs flasher executable
pub const FLASHER_TOOL: &str = "universal-silabs-flasher";

/// Upper bound for one `info` invocation
pub const INFO_TIMEOUT: Duration = Duration::from_secs(20);

fn firmware_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(firmware|fw)\s*version\s*[:=]\s*([0-9]+(?:\.[0-9]+){1,4})")
            .expect("valid firmware version regex")
    })
}

/// Pull the first firmware version out of the tool's output
///
/// Accepts lines such as `Firmware version: 7.4.3.0` or `fw version = 6.10`.
pub fn extract_firmware_version(output: &str) -> Option<String> {
    firmware_version_pattern()
        .captures(output)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Prober for Silicon Labs coordinators
pub struct EmberProber<E> {
    env: E,
    tool: String,
}

impl<E: SystemEnv> EmberProber<E> {
    pub fn new(env: E) -> Self {
        Self {
            env,
            tool: FLASHER_TOOL.to_string(),
        }
    }

    /// Use a different flasher executable name or path
    pub fn with_tool(env: E, tool: impl Into<String>) -> Self {
        Self {
            env,
            tool: tool.into(),
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Ask the flasher tool about the firmware on `device_path`
    pub async fn probe(&self, device_path: &str) -> ProbeResult {
        let Some(tool_path) = self.env.find_executable(&self.tool) else {
            debug!("{} not found on PATH", self.tool);
            return ProbeResult::failed(format!(
                "{} is not installed (install it with: z2m-coord coordinator --install-flasher)",
                self.tool
            ));
        };
        let tool_path = tool_path.to_string_lossy().into_owned();

        debug!("Querying {} with {}", device_path, tool_path);
        let output = match self
            .env
            .run(&tool_path, &["--device", device_path, "info"], INFO_TIMEOUT)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!("{} failed on {}: {}", self.tool, device_path, e);
                return match e {
                    DetectError::ToolNotFound(_) => ProbeResult::failed(format!(
                        "{} is not installed (install it with: z2m-coord coordinator --install-flasher)",
                        self.tool
                    )),
                    e => ProbeResult::from_error("Silicon Labs probe failed", &e),
                };
            }
        };

        let raw = output.combined();
        let ok = output.success();
        let firmware_version = if ok && !raw.is_empty() {
            extract_firmware_version(&raw)
        } else {
            None
        };

        let message = if ok {
            match &firmware_version {
                Some(version) => {
                    info!("Identified Silicon Labs firmware {}", version);
                    format!("Silicon Labs info received (firmware {})", version)
                }
                None => {
                    info!("Identified Silicon Labs adapter, firmware version not reported");
                    "Silicon Labs info received".to_string()
                }
            }
        } else {
            debug!("{} exited with {:?}", self.tool, output.exit_code);
            format!(
                "could not read info with {} (exit code {}); check the port and stop services using it",
                self.tool,
                output
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".to_string())
            )
        };

        ProbeResult {
            driver: if ok { Driver::Ember } else { Driver::Unknown },
            ok,
            details: ProbeDetails::Ember(EmberDetails {
                firmware_version,
                raw_output: raw.trim().to_string(),
            }),
            message,
        }
    }
}
