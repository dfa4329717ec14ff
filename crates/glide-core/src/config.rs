use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GlideError, Result};

/// Top-level configuration for Glide.
///
/// Loaded from `~/.glide/config.toml` by default. Every section is optional
/// in the file and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlideConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub keyboard: KeyboardConfig,
    #[serde(default)]
    pub power: PowerConfig,
}

impl GlideConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GlideConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| GlideError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Gesture typing behaviour and recognizer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// User preference: gesture typing on or off.
    pub enabled: bool,
    /// Maximum number of candidates a recognizer returns.
    pub max_suggestions: usize,
    /// Points closer than this (in pixels) to the previous point are dropped.
    pub min_point_distance: u32,
    /// Number of samples both gesture and word paths are resampled to.
    pub resample_points: usize,
    /// Weight of the log-frequency bonus when ranking candidates.
    pub frequency_weight: f64,
    /// Whether a space is appended when a pending gesture is confirmed.
    pub auto_space: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_suggestions: 15,
            min_point_distance: 8,
            resample_points: 32,
            frequency_weight: 2.0,
            auto_space: true,
        }
    }
}

/// Default alphabet keyboard used by the command-line simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Layout identifier.
    pub layout_id: String,
    /// Keyboard width in pixels.
    pub width: u32,
    /// Keyboard height in pixels.
    pub height: u32,
    /// Locale used for capitalization. Empty means no locale.
    pub locale: String,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            layout_id: "qwerty".to_string(),
            width: 1080,
            height: 640,
            locale: "en".to_string(),
        }
    }
}

/// Power-saving integration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Whether power-saving mode is currently active.
    pub power_saving: bool,
}
