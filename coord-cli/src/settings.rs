//! Persisted settings

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use coord_detect::{DEFAULT_BAUD_RATE, FLASHER_TOOL};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "z2m-coord";

/// Settings stored between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Coordinator device path chosen with `set-device`
    #[serde(default)]
    pub zigbee_device: Option<String>,
    /// Silicon Labs flasher executable
    #[serde(default = "default_flasher_tool")]
    pub flasher_tool: String,
    /// Baud rate for the ZNP probe
    #[serde(default = "default_probe_baud_rate")]
    pub probe_baud_rate: u32,
}

fn default_flasher_tool() -> String {
    FLASHER_TOOL.to_string()
}

fn default_probe_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            zigbee_device: None,
            flasher_tool: default_flasher_tool(),
            probe_baud_rate: default_probe_baud_rate(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for z2m-coord
    /// Uses $XDG_CONFIG_HOME/z2m-coord when set, falls back to ~/.config/z2m-coord
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join(APP_DIR));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join(APP_DIR))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, defaults if missing or unreadable
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("z2m-coord-settings-{}-{}", std::process::id(), name))
            .join("settings.json")
    }

    #[test]
    fn test_round_trip() {
        let path = scratch_file("round-trip");
        let settings = Settings {
            zigbee_device: Some("/dev/serial/by-id/usb-ITead_Sonoff-if00".to_string()),
            flasher_tool: "/opt/usf/bin/universal-silabs-flasher".to_string(),
            probe_baud_rate: 460_800,
        };

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = Settings::load_from(Path::new("/nonexistent/z2m-coord/settings.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.probe_baud_rate, 115_200);
        assert_eq!(settings.flasher_tool, "universal-silabs-flasher");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "zigbee_device": "/dev/ttyACM0" }"#).unwrap();
        assert_eq!(settings.zigbee_device.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(settings.probe_baud_rate, DEFAULT_BAUD_RATE);
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let path = scratch_file("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(Settings::load_from(&path), Settings::default());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
