// SPDX-License-Identifier: GPL-3.0-only

//! Scanner configuration
//!
//! Stored as TOML under the user config directory. Every field has a
//! default, so a partial (or missing) file is valid.

use crate::backends::camera::{BackendKind, FacingMode};
use crate::constants::{self, QualityTier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Application directory name under the user config dir
const APP_DIR: &str = "qr-checkin";
const CONFIG_FILE: &str = "config.toml";

/// Errors from reading or writing the config file
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config file I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Invalid config file: {}", e),
            ConfigError::Serialize(e) => write!(f, "Cannot serialize config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::Serialize(err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Capture backend
    pub backend: BackendKind,
    /// Initial quality tier
    pub quality: QualityTier,
    /// Facing requested when no device is selected
    pub facing: FacingMode,
    /// Device id selected by default, if present in the catalog
    pub preferred_device: Option<String>,
    /// Decode loop tick in milliseconds
    pub frame_interval_ms: u64,
    /// Wait after releasing hardware before acquiring again
    pub settle_delay_ms: u64,
    /// Frames are downsampled so neither side exceeds this
    pub max_decode_dimension: u32,
    /// Gain of the contrast-enhanced decode passes
    pub contrast_gain: f32,
    /// Accepted spellings of the identifier key
    pub identifier_keys: Vec<String>,
    /// Context (attraction) id attached to scan reports
    pub context_id: Option<u64>,
    /// Image files served by the still backend
    pub still_images: Vec<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            quality: QualityTier::default(),
            facing: FacingMode::default(),
            preferred_device: None,
            frame_interval_ms: constants::FRAME_INTERVAL.as_millis() as u64,
            settle_delay_ms: constants::SETTLE_DELAY.as_millis() as u64,
            max_decode_dimension: constants::MAX_DECODE_DIMENSION,
            contrast_gain: constants::CONTRAST_GAIN,
            identifier_keys: constants::IDENTIFIER_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            context_id: None,
            still_images: Vec::new(),
        }
    }
}

impl ScannerConfig {
    /// Default config file location (`$XDG_CONFIG_HOME/qr-checkin/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load `path` (or the default location), falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => {
                    warn!("No config directory available, using defaults");
                    return Self::default();
                }
            },
        };

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Write the config as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
