//! Command-line configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via SQLWIRE_CONFIG or --config)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use sqlwire_protocol::compress::{DEFAULT_LEVEL, DEFAULT_THRESHOLD};
use sqlwire_protocol::{CompressionPolicy, MAX_DECOMPRESSED_SIZE};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Compression configuration.
    pub compression: CompressionConfig,
}

impl Config {
    /// Loads configuration from `path` (if any), then applies environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    fn apply_env_overrides(&mut self) {
        self.database.apply_env_overrides();
        self.compression.apply_env_overrides();
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression.level > 9 {
            return Err(ConfigError::Validation(format!(
                "compression.level must be 0-9, got {}",
                self.compression.level
            )));
        }
        if self.compression.max_decompressed == 0 {
            return Err(ConfigError::Validation(
                "compression.max_decompressed must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Database configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database used when --db is not given.
    pub path: Option<PathBuf>,
    /// Open databases read-only for `select`.
    pub read_only: bool,
}

impl DatabaseConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SQLWIRE_DB") {
            if !path.is_empty() {
                self.path = Some(PathBuf::from(path));
            }
        }

        if let Ok(read_only) = std::env::var("SQLWIRE_READ_ONLY") {
            self.read_only = read_only == "1" || read_only.to_lowercase() == "true";
        }
    }
}

/// Compression configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Compress encoded output at all.
    pub enabled: bool,
    /// Minimum plain size in bytes before output is compressed.
    pub threshold: usize,
    /// gzip level, 0-9.
    pub level: u32,
    /// Largest size a compressed input may inflate to.
    pub max_decompressed: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_THRESHOLD,
            level: DEFAULT_LEVEL,
            max_decompressed: MAX_DECOMPRESSED_SIZE,
        }
    }
}

impl CompressionConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("SQLWIRE_COMPRESS") {
            self.enabled = enabled == "1" || enabled.to_lowercase() == "true";
        }

        if let Ok(threshold) = std::env::var("SQLWIRE_COMPRESS_THRESHOLD") {
            if let Ok(n) = threshold.parse() {
                self.threshold = n;
            }
        }

        if let Ok(level) = std::env::var("SQLWIRE_COMPRESSION_LEVEL") {
            if let Ok(n) = level.parse() {
                self.level = n;
            }
        }

        if let Ok(max) = std::env::var("SQLWIRE_MAX_DECOMPRESSED") {
            if let Ok(n) = max.parse() {
                self.max_decompressed = n;
            }
        }
    }

    /// The encoder policy for this configuration.
    pub fn policy(&self) -> CompressionPolicy {
        CompressionPolicy {
            enabled: self.enabled,
            threshold: self.threshold,
            level: self.level,
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {}", .path.display(), .message)]
    Parse { path: PathBuf, message: String },

    #[error("configuration validation failed: {0}")]
    Validation(String),
}
