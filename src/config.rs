//! Driver configuration
//!
//! Loaded from TOML; every field has a default so a partial (or missing)
//! file is fine:
//!
//! ```toml
//! log_level = "info"
//!
//! [device]
//! vendor_id = 0x1500
//! product_id = 0x3001
//! usage_page = 0xFFA0
//!
//! [session]
//! auto_reconnect = true
//! reconnect_interval_ms = 2000
//! read_timeout_ms = 5
//!
//! [input]
//! debounce_ms = 50
//! long_press_ms = 500
//!
//! [display]
//! brightness = 80
//! chunk_delay_ms = 5
//! keep_alive_secs = 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use soomfon_panel::{DecoderConfig, EncoderConfig, PanelConfig};
use soomfon_transport::protocol::{device, timing};
use soomfon_transport::{DeviceFilter, SessionConfig};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which HID interface to open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: u16,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            vendor_id: device::VENDOR_ID,
            product_id: device::PRODUCT_ID,
            usage_page: device::USAGE_PAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub auto_reconnect: bool,
    pub reconnect_interval_ms: u64,
    pub read_timeout_ms: i32,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_interval_ms: timing::RECONNECT_INTERVAL_MS,
            read_timeout_ms: timing::READ_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSection {
    pub debounce_ms: u64,
    pub long_press_ms: u64,
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            debounce_ms: timing::DEBOUNCE_MS,
            long_press_ms: timing::LONG_PRESS_THRESHOLD_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// Applied after connecting in `monitor`; untouched when absent
    pub brightness: Option<u8>,
    pub chunk_delay_ms: u64,
    /// 0 disables the keep-alive report
    pub keep_alive_secs: u64,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            brightness: None,
            chunk_delay_ms: timing::IMAGE_CHUNK_DELAY_MS,
            keep_alive_secs: timing::KEEP_ALIVE_INTERVAL_SECS,
        }
    }
}

/// Top-level driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
    pub device: DeviceSection,
    pub session: SessionSection,
    pub input: InputSection,
    pub display: DisplaySection,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            device: DeviceSection::default(),
            session: SessionSection::default(),
            input: InputSection::default(),
            display: DisplaySection::default(),
        }
    }
}

impl DriverConfig {
    /// `~/.config/soomfon/driver.toml` (platform equivalent)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("soomfon")
            .join("driver.toml")
    }

    /// Load config from a file, or return defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(level) = self.display.brightness {
            if level > 100 {
                return Err(ConfigError::Invalid(format!(
                    "display.brightness {} out of range 0-100",
                    level
                )));
            }
        }
        if self.session.read_timeout_ms <= 0 {
            return Err(ConfigError::Invalid(
                "session.read_timeout_ms must be positive".into(),
            ));
        }
        if self.session.reconnect_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "session.reconnect_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter {
            vendor_id: self.device.vendor_id,
            product_id: self.device.product_id,
            usage_page: self.device.usage_page,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            auto_reconnect: self.session.auto_reconnect,
            reconnect_interval: Duration::from_millis(self.session.reconnect_interval_ms),
            read_timeout_ms: self.session.read_timeout_ms,
        }
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            debounce: Duration::from_millis(self.input.debounce_ms),
            long_press: Duration::from_millis(self.input.long_press_ms),
        }
    }

    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            chunk_delay: Duration::from_millis(self.display.chunk_delay_ms),
        }
    }

    pub fn panel_config(&self) -> PanelConfig {
        PanelConfig {
            session: self.session_config(),
            decoder: self.decoder_config(),
            encoder: self.encoder_config(),
            keep_alive: match self.display.keep_alive_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            brightness: self.display.brightness,
        }
    }
}
