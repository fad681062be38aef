//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! origin = "https://example.com"
//! strategy = "viewport"
//! protected_script = "/scripts/index.js"
//! render_timeout_ms = 1500
//! cache_bust_param = "_bolt"
//!
//! [markers]
//! region = "data-bolt"
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing: the origin must be an absolute
//! http(s) URL and the cache-bust parameter must be a usable query key.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::markers::Markers;
use crate::core::types::UrlResolver;

/// Default render watchdog period.
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 1500;

/// When links are prefetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchStrategy {
    /// Prefetch when the pointer hovers or a touch starts on the link.
    #[default]
    Hover,
    /// Prefetch when the link becomes fully visible.
    Viewport,
    /// Prefetch every link as soon as it is observed.
    Eager,
}

impl std::fmt::Display for PrefetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefetchStrategy::Hover => write!(f, "hover"),
            PrefetchStrategy::Viewport => write!(f, "viewport"),
            PrefetchStrategy::Eager => write!(f, "eager"),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Site origin, e.g. `https://example.com`.
    pub origin: String,

    /// Prefetch strategy for observed links.
    pub strategy: PrefetchStrategy,

    /// Source URL of the engine's own bootstrap script.
    ///
    /// When unset, a script carrying the protected marker is used instead.
    pub protected_script: Option<String>,

    /// Render watchdog period in milliseconds. `0` disables the watchdog.
    pub render_timeout_ms: u64,

    /// Query parameter appended to re-injected script URLs.
    pub cache_bust_param: String,

    /// Marker attribute names.
    pub markers: Markers,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost".to_string(),
            strategy: PrefetchStrategy::default(),
            protected_script: None,
            render_timeout_ms: DEFAULT_RENDER_TIMEOUT_MS,
            cache_bust_param: "_bolt".to_string(),
            markers: Markers::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration for a given origin with every other value defaulted.
    pub fn for_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        UrlResolver::new(&self.origin).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let param = &self.cache_bust_param;
        if param.is_empty() || param.contains(['&', '=', '?', '#', ' ']) {
            return Err(ConfigError::InvalidValue(format!(
                "cache_bust_param '{}' is not a usable query key",
                param
            )));
        }

        for name in self.markers.all() {
            if name.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "marker attribute names cannot be empty".to_string(),
                ));
            }
        }

        if let Some(script) = &self.protected_script {
            if script.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "protected_script cannot be blank".to_string(),
                ));
            }
        }

        Ok(())
    }
}
