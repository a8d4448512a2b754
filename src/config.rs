//! Configuration file support.
//!
//! Thresholds, render style, hotkeys, the segmentation endpoint and the label
//! list are read from a versioned JSON file. Missing fields take defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::keybindings::KeyBindings;
use crate::model::Category;
use crate::render::RenderStyle;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Distances and sizes used by the tools and the fit computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Vertex grab radius in screen pixels
    pub vertex_hit_px: f32,
    /// Edge distance for vertex insertion, in image units
    pub edge_insert_distance: f32,
    /// Minimum drawn box size in screen pixels (exclusive)
    pub min_box_size_px: f32,
    /// Share of the container used by the fitted image
    pub fit_fraction: f32,
    /// Minimum longest side of a rendered image
    pub min_display_size: f32,
    /// Half side of the fallback square, in image units
    pub fallback_half_size: f32,
    /// Confidence of the fallback square
    pub fallback_confidence: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            vertex_hit_px: constants::VERTEX_HIT_RADIUS_PX,
            edge_insert_distance: constants::EDGE_INSERT_DISTANCE,
            min_box_size_px: constants::MIN_BOX_SIZE_PX,
            fit_fraction: constants::FIT_FRACTION,
            min_display_size: constants::MIN_DISPLAY_SIZE,
            fallback_half_size: constants::FALLBACK_HALF_SIZE,
            fallback_confidence: constants::FALLBACK_CONFIDENCE,
        }
    }
}

/// Where smart-polygon requests go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Endpoint URL. Without one the host must answer
    /// `SegmentationRequested` events itself.
    pub endpoint: Option<String>,
    pub user_agent: String,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            user_agent: format!("labelkit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Canvas configuration that can be exported and imported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Version of the configuration file format
    pub version: u32,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub style: RenderStyle,

    #[serde(default)]
    pub keybindings: KeyBindings,

    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// Label definitions for the registry
    #[serde(default)]
    pub labels: Vec<Category>,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

impl CanvasConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            thresholds: Thresholds::default(),
            style: RenderStyle::default(),
            keybindings: KeyBindings::default(),
            segmentation: SegmentationConfig::default(),
            labels: Vec::new(),
            log_level: LogLevel::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_json()?)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "config.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("labelkit").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home| {
                home.join(".config")
                    .join("labelkit")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load from the default path, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
