//! Serial device scanner
//!
//! Lists USB serial device nodes, looks each one up in the udev database and
//! attaches stable aliases (`/dev/serial/by-id/*` and the conventional
//! `/dev/zigbee` symlink) to the nodes they point at.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::env::SystemEnv;
use crate::error::DetectError;
use crate::usb_ids::{known_adapter, UsbId};

/// Conventional udev symlink for the Zigbee coordinator
pub const WELL_KNOWN_ALIAS: &str = "/dev/zigbee";

/// Information about a serial device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Device node (e.g., /dev/ttyUSB0)
    pub path: String,
    /// Persistent symlink pointing at the same device
    pub stable_alias: Option<String>,
    /// USB Vendor/Product ID (if USB)
    pub usb_id: Option<UsbId>,
    /// Vendor/model text, or a marker explaining why it is missing
    pub description: String,
    /// USB ID is on the known Zigbee adapter list
    pub is_known_zigbee: bool,
}

impl DeviceInfo {
    /// Device given by the user, with nothing known about it
    pub fn manual(path: &str) -> Self {
        Self {
            path: path.to_string(),
            stable_alias: Some(path.to_string()),
            usb_id: None,
            description: "Manual device".to_string(),
            is_known_zigbee: false,
        }
    }

    /// Device that could not be looked up
    fn degraded(path: &str, description: &str) -> Self {
        Self {
            path: path.to_string(),
            stable_alias: None,
            usb_id: None,
            description: description.to_string(),
            is_known_zigbee: false,
        }
    }

    /// Path to show and store: the alias when there is one
    pub fn display_path(&self) -> &str {
        self.stable_alias.as_deref().unwrap_or(&self.path)
    }

    /// True if `path` names this device, directly or by alias
    pub fn matches(&self, path: &str) -> bool {
        self.path == path || self.stable_alias.as_deref() == Some(path)
    }
}

/// Device scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Directory holding device nodes
    pub dev_dir: PathBuf,
    /// Glob patterns under `dev_dir` for candidate nodes, listed in order
    pub node_patterns: Vec<String>,
    /// Directory of persistent by-id symlinks
    pub by_id_dir: PathBuf,
    /// Preferred alias symlink
    pub well_known_alias: PathBuf,
    /// udev query executable
    pub query_tool: String,
    /// Time budget for each udev query
    pub query_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
            node_patterns: vec!["ttyUSB*".to_string(), "ttyACM*".to_string()],
            by_id_dir: PathBuf::from("/dev/serial/by-id"),
            well_known_alias: PathBuf::from(WELL_KNOWN_ALIAS),
            query_tool: "udevadm".to_string(),
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// udev properties of one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UdevProperties {
    values: HashMap<String, String>,
}

impl UdevProperties {
    /// Parse `udevadm info --query=all` output
    ///
    /// Property lines look like `E: ID_VENDOR_ID=10c4`; other record types
    /// are ignored.
    pub fn parse(output: &str) -> Self {
        let values = output
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                let line = line.strip_prefix("E:").unwrap_or(line).trim_start();
                let (key, value) = line.split_once('=')?;
                if key.is_empty() || key.contains(char::is_whitespace) {
                    return None;
                }
                Some((key.to_string(), value.trim().to_string()))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// USB ID from `ID_VENDOR_ID` and `ID_MODEL_ID`
    pub fn usb_id(&self) -> Option<UsbId> {
        UsbId::from_hex_parts(self.get("ID_VENDOR_ID")?, self.get("ID_MODEL_ID")?)
    }

    /// Vendor and model names from the hardware database
    fn vendor_model(&self) -> String {
        let vendor = self.get("ID_VENDOR_FROM_DATABASE").unwrap_or_default();
        let model = self.get("ID_MODEL_FROM_DATABASE").unwrap_or_default();
        format!("{} {}", vendor, model).trim().to_string()
    }

    /// Build the device record for `path`
    pub fn into_device_info(self, path: &str) -> DeviceInfo {
        let usb_id = self.usb_id();
        let known = usb_id.and_then(known_adapter);
        let vendor_model = self.vendor_model();

        let description = match (usb_id, known) {
            (Some(_), Some(desc)) => desc.to_string(),
            _ if !vendor_model.is_empty() => vendor_model,
            (Some(_), None) => "Unknown USB device".to_string(),
            (None, _) => "Unknown device".to_string(),
        };

        DeviceInfo {
            path: path.to_string(),
            stable_alias: None,
            usb_id,
            description,
            is_known_zigbee: known.is_some(),
        }
    }
}

/// Serial device scanner
pub struct DeviceScanner<E> {
    config: ScannerConfig,
    env: E,
}

impl<E: SystemEnv> DeviceScanner<E> {
    /// Create a new scanner with default configuration
    pub fn new(env: E) -> Self {
        Self {
            config: ScannerConfig::default(),
            env,
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig, env: E) -> Self {
        Self { config, env }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Enumerate all candidate serial devices
    ///
    /// Never fails: unreadable directories yield no entries, and devices
    /// whose metadata cannot be read are still listed.
    pub async fn enumerate(&self) -> Vec<DeviceInfo> {
        info!("Enumerating serial devices...");

        let config = self.config.clone();
        let scan = match tokio::task::spawn_blocking(move || FsScan::read(&config)).await {
            Ok(scan) => scan,
            Err(e) => {
                warn!("Device node scan did not complete: {}", e);
                FsScan::default()
            }
        };

        let mut devices = Vec::new();
        for path in &scan.nodes {
            devices.push(self.query_device(path).await);
        }

        self.attach_by_id_aliases(&mut devices, scan.by_id).await;
        if let Some(link) = scan.well_known {
            self.attach_well_known_alias(&mut devices, link).await;
        }

        if devices.is_empty() {
            info!("No serial devices found");
        } else {
            info!("Found {} serial device(s)", devices.len());
            for device in &devices {
                info!("  {} - {}", device.display_path(), device.description);
            }
        }

        devices
    }

    /// Look up udev metadata for one device, degrading instead of failing
    async fn query_device(&self, path: &str) -> DeviceInfo {
        let result = self
            .env
            .run(
                &self.config.query_tool,
                &["info", "--query=all", "--name", path],
                self.config.query_timeout,
            )
            .await;

        match result {
            Ok(output) if output.success() => {
                let info = UdevProperties::parse(&output.stdout).into_device_info(path);
                debug!(
                    "{}: usb_id={:?} known={} ({})",
                    path, info.usb_id, info.is_known_zigbee, info.description
                );
                info
            }
            Ok(output) => {
                debug!("{} query for {} exited with {:?}", self.config.query_tool, path, output.exit_code);
                DeviceInfo::degraded(path, "Unknown device")
            }
            Err(DetectError::Timeout { .. }) => {
                warn!("Timed out reading device info for {}", path);
                DeviceInfo::degraded(path, "Timeout getting device info")
            }
            Err(DetectError::ToolNotFound(tool)) => {
                warn!("{} not available, listing {} without metadata", tool, path);
                DeviceInfo::degraded(path, &format!("Device ({} not available)", tool))
            }
            Err(e) => {
                warn!("Failed to read device info for {}: {}", path, e);
                DeviceInfo::degraded(path, &format!("Error: {}", e))
            }
        }
    }

    /// Attach `/dev/serial/by-id` symlinks to the devices they resolve to
    async fn attach_by_id_aliases(&self, devices: &mut Vec<DeviceInfo>, links: Vec<AliasLink>) {
        for link in links {
            match devices.iter_mut().find(|d| d.path == link.target) {
                Some(existing) => {
                    if existing.stable_alias.is_none() {
                        existing.stable_alias = Some(link.alias);
                    }
                }
                None => {
                    let mut info = self.query_device(&link.target).await;
                    info.stable_alias = Some(link.alias);
                    devices.push(info);
                }
            }
        }
    }

    /// Prefer the well-known alias over any other for the device it names
    async fn attach_well_known_alias(&self, devices: &mut Vec<DeviceInfo>, link: AliasLink) {
        match devices.iter_mut().find(|d| d.path == link.target) {
            Some(existing) => existing.stable_alias = Some(link.alias),
            None => {
                let mut info = self.query_device(&link.target).await;
                info.stable_alias = Some(link.alias);
                devices.push(info);
            }
        }
    }
}

/// Symlink and the device node it resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
struct AliasLink {
    alias: String,
    target: String,
}

/// Filesystem side of an enumeration, gathered off the async runtime
#[derive(Debug, Default)]
struct FsScan {
    nodes: Vec<String>,
    by_id: Vec<AliasLink>,
    well_known: Option<AliasLink>,
}

impl FsScan {
    fn read(config: &ScannerConfig) -> Self {
        Self {
            nodes: list_nodes(&config.dev_dir, &config.node_patterns),
            by_id: by_id_links(&config.by_id_dir),
            well_known: well_known_link(&config.well_known_alias),
        }
    }
}

fn glob_paths(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(e) => {
            warn!("Invalid device pattern {}: {}", pattern, e);
            Vec::new()
        }
    }
}

/// Nodes matching each pattern under `dev_dir`, sorted within each pattern
fn list_nodes(dev_dir: &Path, patterns: &[String]) -> Vec<String> {
    let mut nodes = Vec::new();
    for pattern in patterns {
        let mut matching: Vec<String> = glob_paths(&path_string(&dev_dir.join(pattern)))
            .iter()
            .map(|p| path_string(p))
            .collect();
        matching.sort();
        nodes.extend(matching);
    }
    debug!("{} candidate node(s) under {}", nodes.len(), dev_dir.display());
    nodes
}

/// Resolvable symlinks in `dir`, sorted by alias
fn by_id_links(dir: &Path) -> Vec<AliasLink> {
    let mut links: Vec<PathBuf> = glob_paths(&path_string(&dir.join("*")))
        .into_iter()
        .filter(|p| {
            std::fs::symlink_metadata(p)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false)
        })
        .collect();
    links.sort();

    links
        .into_iter()
        .filter_map(|link| match std::fs::canonicalize(&link) {
            Ok(real) => Some(AliasLink {
                alias: path_string(&link),
                target: path_string(&real),
            }),
            Err(e) => {
                debug!("Skipping dangling alias {}: {}", link.display(), e);
                None
            }
        })
        .collect()
}

fn well_known_link(link: &Path) -> Option<AliasLink> {
    if !link.exists() {
        return None;
    }
    let alias = path_string(link);
    let target = std::fs::canonicalize(link)
        .map(|p| path_string(&p))
        .unwrap_or_else(|_| alias.clone());
    Some(AliasLink { alias, target })
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
