//! Configuration loading and resolution
//!
//! Player settings come from a small TOML file. Every field has a built-in
//! default, so a missing file is never fatal.
//!
//! # Resolution priority
//!
//! 1. Explicit path (command-line `--config`)
//! 2. `CHORUS_CONFIG` environment variable
//! 3. Platform config file (`<config_dir>/chorus/config.toml`)
//! 4. Built-in defaults
//!
//! Individual values may still be overridden by command-line flags after
//! loading; see [`TomlConfig::apply_overrides`].

use crate::{Error, Result, MAX_SAMPLING_RATE, MIN_SAMPLING_RATE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "CHORUS_CONFIG";

/// Player configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Sampling rate requested from the output device.
    ///
    /// The device negotiates the closest rate it supports.
    pub preferred_sampling_rate: u32,

    /// Output device name (None = host default device)
    pub device: Option<String>,

    /// Device buffer size in frames (None = device default)
    pub buffer_size: Option<u32>,

    /// Frames pulled from each decoder per read call in the mixer
    pub block_frames: usize,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            preferred_sampling_rate: 44100,
            device: None,
            buffer_size: None,
            block_frames: 1024,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Values from the command line that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub preferred_sampling_rate: Option<u32>,
    pub device: Option<String>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse a config from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    ///
    /// # Errors
    /// - File cannot be read
    /// - TOML syntax or type errors
    /// - Values outside their allowed ranges
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve and load the configuration following the priority order.
    ///
    /// A missing file at any level falls through to the next one; an explicit
    /// path that does not exist only produces a warning. A file that exists
    /// but fails to parse is an error, since silently ignoring it would hide
    /// a typo from the user.
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_path {
            if path.exists() {
                return Self::load_from(path);
            }
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Self::load_from(&path);
            }
            warn!(
                "{} points to missing file {}, ignoring",
                CONFIG_ENV_VAR,
                path.display()
            );
        }

        // Priority 3: Platform config file
        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
            debug!("No config file at {}", path.display());
        }

        // Priority 4: Built-in defaults
        debug!("Using built-in configuration defaults");
        Ok(Self::default())
    }

    /// Apply command-line overrides and re-validate.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(rate) = overrides.preferred_sampling_rate {
            self.preferred_sampling_rate = rate;
        }
        if let Some(device) = overrides.device {
            self.device = Some(device);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        self.validate()
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SAMPLING_RATE..=MAX_SAMPLING_RATE).contains(&self.preferred_sampling_rate) {
            return Err(Error::Config(format!(
                "preferred_sampling_rate {} outside [{}, {}]",
                self.preferred_sampling_rate, MIN_SAMPLING_RATE, MAX_SAMPLING_RATE
            )));
        }
        if self.block_frames == 0 {
            return Err(Error::Config("block_frames must be at least 1".to_string()));
        }
        if self.buffer_size == Some(0) {
            return Err(Error::Config("buffer_size must be at least 1 frame".to_string()));
        }
        Ok(())
    }
}

/// Platform config file location: `<config_dir>/chorus/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chorus").join("config.toml"))
}
