//! Application settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use civ_protocol::frame::{CONTROLLER_ADDR, IC7410_ADDR};
use civ_protocol::Preamble;
use rig_audio::{CaptureParams, SupervisorConfig};
use rig_control::{EngineConfig, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};

/// Serial link to the rig
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RigSettings {
    /// Serial port path; empty runs without rig control
    pub port: String,
    pub baud_rate: u32,
    /// CI-V address of the rig
    pub rig_address: u8,
    /// CI-V address this program answers as
    pub controller_address: u8,
    /// Per-frame timeout in milliseconds
    pub timeout_ms: u64,
    /// Read the FB/NG frame after set commands
    pub expect_ack: bool,
    /// Status poll period in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for RigSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            rig_address: IC7410_ADDR,
            controller_address: CONTROLLER_ADDR,
            timeout_ms: 500,
            expect_ack: true,
            poll_interval_ms: 250,
        }
    }
}

impl RigSettings {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            preamble: Preamble::to_rig(self.rig_address, self.controller_address),
            timeout: Duration::from_millis(self.timeout_ms),
            expect_ack: self.expect_ack,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

/// Receive audio capture and display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioSettings {
    pub enabled: bool,
    pub capture: CaptureParams,
    pub supervisor: SupervisorConfig,
    /// How often the spectrum peak is logged, in milliseconds
    pub report_interval_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capture: CaptureParams::default(),
            supervisor: SupervisorConfig::default(),
            report_interval_ms: 1000,
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub rig: RigSettings,
    pub audio: AudioSettings,
}

impl Settings {
    /// Uses $XDG_CONFIG_HOME/ic7410-monitor, falls back to ~/.config/ic7410-monitor
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("ic7410-monitor"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("ic7410-monitor"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the config directory, or defaults
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring settings file: {:#}", e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save settings to the config directory
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("ic7410-monitor-{}-{}", std::process::id(), name))
            .join("settings.json")
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "rig": { "port": "/dev/ttyUSB0" } }"#).unwrap();
        assert_eq!(settings.rig.port, "/dev/ttyUSB0");
        assert_eq!(settings.rig.baud_rate, 19_200);
        assert_eq!(settings.rig.rig_address, 0x80);
        assert_eq!(settings.audio, AudioSettings::default());
    }

    #[test]
    fn test_engine_config() {
        let rig = RigSettings {
            rig_address: 0x66,
            timeout_ms: 200,
            ..Default::default()
        };
        let config = rig.engine_config();
        assert_eq!(config.preamble.bytes(), [0xFE, 0xFE, 0x66, 0xE0]);
        assert_eq!(config.timeout, Duration::from_millis(200));
        assert!(config.expect_ack);
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch_path("save");
        let mut settings = Settings::default();
        settings.rig.port = "COM3".to_string();
        settings.audio.capture.sample_rate = 44_100;
        settings.audio.supervisor.scale.floor_db = -120.0;

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = scratch_path("bad");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert!(Settings::load_from(&path).is_err());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
