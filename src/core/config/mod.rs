//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first existing file wins:
//! 1. An explicit path (e.g. `--config`); it must exist
//! 2. `$BOLTNAV_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/boltnav/config.toml`
//! 4. `<platform config dir>/boltnav/config.toml`
//!
//! Missing files are not an error; defaults are used. A file that exists
//! but cannot be parsed or validated is an error.
//!
//! # Example
//!
//! ```no_run
//! use boltnav::core::config::Config;
//!
//! let result = Config::load(None).unwrap();
//! println!("origin: {}", result.config.engine.origin);
//! ```

pub mod schema;

pub use schema::{EngineConfig, PrefetchStrategy, DEFAULT_RENDER_TIMEOUT_MS};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "BOLTNAV_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
}

/// Loaded configuration and where it came from.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Engine settings.
    pub engine: EngineConfig,
    /// Path the settings were read from, if any.
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if `explicit` does not exist, or if a config file
    /// exists but cannot be read, parsed or validated.
    pub fn load(explicit: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::from_file(path);
        }

        for path in Self::search_paths() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(ConfigLoadResult {
            config: Config::default(),
        })
    }

    /// Candidate locations, in precedence order.
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            paths.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg_home).join("boltnav/config.toml"));
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("boltnav/config.toml"));
        }
        paths
    }

    fn from_file(path: &Path) -> Result<ConfigLoadResult, ConfigError> {
        let engine = Self::read_engine_config(path)?;
        engine.validate()?;
        Ok(ConfigLoadResult {
            config: Config {
                engine,
                loaded_from: Some(path.to_path_buf()),
            },
        })
    }

    /// Read and parse an engine config file.
    fn read_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}
