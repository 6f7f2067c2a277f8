//! # Chorus Common Library
//!
//! Shared code for the Chorus crates:
//! - Configuration loading (TOML file, environment, command-line overrides)
//! - Tracing subscriber setup
//! - Common error type

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ConfigOverrides, LoggingConfig, TomlConfig};
pub use error::{Error, Result};

/// Lowest sampling rate accepted anywhere in the engine (Hz)
pub const MIN_SAMPLING_RATE: u32 = 8000;

/// Highest sampling rate accepted anywhere in the engine (Hz)
pub const MAX_SAMPLING_RATE: u32 = 48000;
