//! Probe sequencing
//!
//! The ZNP probe is cheap and conclusive, so it always runs first. The
//! Silicon Labs tool is only consulted for hardware that can plausibly carry
//! EZSP firmware.

use async_trait::async_trait;
use tracing::debug;

use crate::classify::Driver;
use crate::ember::EmberProber;
use crate::env::SystemEnv;
use crate::probe::{ProbeConfig, ProbeResult, ZnpProber};
use crate::scanner::DeviceInfo;
use crate::usb_ids::is_ember_bridge;

/// A probe that identifies the firmware behind a device path
#[async_trait]
pub trait DriverProbe: Send + Sync {
    async fn probe(&self, device_path: &str) -> ProbeResult;
}

#[async_trait]
impl DriverProbe for ZnpProber {
    async fn probe(&self, device_path: &str) -> ProbeResult {
        self.probe_port(device_path).await
    }
}

#[async_trait]
impl<E: SystemEnv> DriverProbe for EmberProber<E> {
    async fn probe(&self, device_path: &str) -> ProbeResult {
        EmberProber::probe(self, device_path).await
    }
}

/// True if the device could be a Silicon Labs coordinator
pub fn warrants_ember_probe(device: &DeviceInfo) -> bool {
    device.usb_id.is_some_and(is_ember_bridge)
        || device.description.to_lowercase().contains("efr32")
}

/// Identify the coordinator at `device_path`
///
/// Returns the ZNP result if it proves Z-Stack. Otherwise the Ember result
/// when the hardware warrants it, else the (negative) ZNP result.
pub async fn probe_coordinator(
    device: &DeviceInfo,
    device_path: &str,
    znp: &dyn DriverProbe,
    ember: &dyn DriverProbe,
) -> ProbeResult {
    let znp_result = znp.probe(device_path).await;
    if znp_result.ok && znp_result.driver == Driver::Zstack {
        return znp_result;
    }

    if warrants_ember_probe(device) {
        debug!("ZNP probe negative, asking the Silicon Labs tool");
        return ember.probe(device_path).await;
    }

    znp_result
}

/// The real probers bundled for one system environment
pub struct CoordinatorProber<E> {
    znp: ZnpProber,
    ember: EmberProber<E>,
}

impl<E: SystemEnv> CoordinatorProber<E> {
    pub fn new(env: E) -> Self {
        Self::with_config(ProbeConfig::default(), env)
    }

    pub fn with_config(config: ProbeConfig, env: E) -> Self {
        Self {
            znp: ZnpProber::with_config(config),
            ember: EmberProber::new(env),
        }
    }

    /// Use a different Silicon Labs flasher executable
    pub fn with_flasher(mut self, tool: impl Into<String>) -> Self
    where
        E: Clone,
    {
        self.ember = EmberProber::with_tool(self.ember.env().clone(), tool);
        self
    }

    pub async fn probe(&self, device: &DeviceInfo, device_path: &str) -> ProbeResult {
        probe_coordinator(device, device_path, &self.znp, &self.ember).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeDetails;
    use crate::usb_ids::{silabs, ti, wch};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SpyProbe {
        result: ProbeResult,
        calls: AtomicUsize,
    }

    impl SpyProbe {
        fn returning(driver: Driver, ok: bool) -> Self {
            Self {
                result: ProbeResult {
                    driver,
                    ok,
                    details: ProbeDetails::None,
                    message: format!("{} {}", driver, ok),
                },
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DriverProbe for SpyProbe {
        async fn probe(&self, _device_path: &str) -> ProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn device(usb_id: Option<crate::usb_ids::UsbId>, description: &str) -> DeviceInfo {
        DeviceInfo {
            path: "/dev/ttyUSB0".to_string(),
            stable_alias: None,
            usb_id,
            description: description.to_string(),
            is_known_zigbee: false,
        }
    }

    #[test]
    fn test_warrants_ember_probe() {
        assert!(warrants_ember_probe(&device(Some(silabs::CP210X), "")));
        assert!(warrants_ember_probe(&device(Some(wch::CH9102), "")));
        assert!(!warrants_ember_probe(&device(Some(wch::CH340), "")));
        assert!(!warrants_ember_probe(&device(Some(ti::CC2531), "")));
        assert!(warrants_ember_probe(&device(None, "Sonoff EFR32MG21")));
        assert!(!warrants_ember_probe(&device(None, "Manual device")));
    }

    #[tokio::test]
    async fn test_zstack_short_circuits() {
        let znp = SpyProbe::returning(Driver::Zstack, true);
        let ember = SpyProbe::returning(Driver::Ember, true);
        let dev = device(Some(silabs::CP210X), "");

        let result = probe_coordinator(&dev, "/dev/ttyUSB0", &znp, &ember).await;
        assert_eq!(result.driver, Driver::Zstack);
        assert_eq!(znp.calls(), 1);
        assert_eq!(ember.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_through_to_ember_for_silabs() {
        let znp = SpyProbe::returning(Driver::Unknown, false);
        let ember = SpyProbe::returning(Driver::Ember, true);
        let dev = device(Some(silabs::EFR32), "");

        let result = probe_coordinator(&dev, "/dev/ttyUSB0", &znp, &ember).await;
        assert_eq!(result.driver, Driver::Ember);
        assert!(result.ok);
        assert_eq!(ember.calls(), 1);
    }

    #[tokio::test]
    async fn test_ember_result_returned_even_when_negative() {
        let znp = SpyProbe::returning(Driver::Unknown, false);
        let ember = SpyProbe::returning(Driver::Unknown, false);
        let dev = device(None, "EFR32 dongle");

        let result = probe_coordinator(&dev, "/dev/ttyUSB0", &znp, &ember).await;
        assert_eq!(result.message, ember.result.message);
        assert_eq!(ember.calls(), 1);
    }

    #[tokio::test]
    async fn test_other_hardware_keeps_znp_result() {
        let znp = SpyProbe::returning(Driver::Unknown, false);
        let ember = SpyProbe::returning(Driver::Ember, true);
        let dev = device(Some(wch::CH340), "USB Serial");

        let result = probe_coordinator(&dev, "/dev/ttyUSB0", &znp, &ember).await;
        assert_eq!(result.driver, Driver::Unknown);
        assert!(!result.ok);
        assert_eq!(znp.calls(), 1);
        assert_eq!(ember.calls(), 0);
    }
}
