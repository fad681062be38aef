//! core::types
//!
//! Strong types for core navigation concepts.
//!
//! # Types
//!
//! - [`NormalizedUrl`] - Origin-relative path (plus query) used as identity
//! - [`UrlResolver`] - Resolves hrefs against the site origin
//! - [`Target`] - Result of resolving an href: same-origin or external
//! - [`ScrollPosition`] - Viewport scroll offset, serialized as `[x, y]`
//! - [`HistoryEntry`] - State persisted with every history entry
//!
//! # Examples
//!
//! ```
//! use boltnav::core::types::{NormalizedUrl, Target, UrlResolver};
//!
//! let resolver = UrlResolver::new("https://example.com").unwrap();
//! let here = NormalizedUrl::root();
//!
//! let target = resolver.resolve("https://example.com/about?x=1#team", &here).unwrap();
//! assert_eq!(target, Target::SameOrigin(NormalizedUrl::from_path("/about?x=1")));
//!
//! let away = resolver.resolve("https://other.org/", &here).unwrap();
//! assert!(matches!(away, Target::External(_)));
//! ```

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from URL handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("invalid origin '{0}': must be an absolute http(s) URL")]
    InvalidOrigin(String),

    #[error("cannot resolve '{href}': {message}")]
    Unresolvable { href: String, message: String },
}

/// An origin-relative URL: path plus optional query, never a fragment.
///
/// Two hrefs that point at the same document normalize to the same value,
/// which is what the prefetch cache and the same-URL check key on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    /// The site root, `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Wrap an already origin-relative path.
    ///
    /// An empty path becomes `/`, a missing leading slash is added and any
    /// fragment is dropped.
    pub fn from_path(path: &str) -> Self {
        let path = path.split('#').next().unwrap_or_default();
        if path.is_empty() {
            Self::root()
        } else if path.starts_with('/') {
            Self(path.to_string())
        } else {
            Self(format!("/{}", path))
        }
    }

    /// Get the URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path component without the query.
    pub fn path(&self) -> &str {
        self.0.split('?').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of resolving an href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Same origin as the site: the engine may handle it.
    SameOrigin(NormalizedUrl),
    /// Different origin: always left to the platform.
    External(String),
}

/// Resolves hrefs against the configured origin.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    origin: Url,
}

impl UrlResolver {
    /// Create a resolver for an absolute http(s) origin.
    ///
    /// # Errors
    ///
    /// Returns `UrlError::InvalidOrigin` if `origin` does not parse, is not
    /// http(s), or has no host.
    pub fn new(origin: &str) -> Result<Self, UrlError> {
        let url = Url::parse(origin).map_err(|_| UrlError::InvalidOrigin(origin.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(UrlError::InvalidOrigin(origin.to_string()));
        }
        Ok(Self { origin: url })
    }

    /// The origin as serialized by the URL parser (no trailing path).
    pub fn origin(&self) -> String {
        self.origin.origin().ascii_serialization()
    }

    /// Resolve `href` relative to the page at `current`.
    pub fn resolve(&self, href: &str, current: &NormalizedUrl) -> Result<Target, UrlError> {
        let base = self.join(&self.origin, current.as_str(), href)?;
        let absolute = self.join(&base, href, href)?;

        if absolute.origin() != self.origin.origin() {
            return Ok(Target::External(absolute.to_string()));
        }

        let mut normalized = absolute.path().to_string();
        if let Some(query) = absolute.query() {
            normalized.push('?');
            normalized.push_str(query);
        }
        Ok(Target::SameOrigin(NormalizedUrl::from_path(&normalized)))
    }

    /// Resolve `href` against the site root, returning `None` for external URLs.
    pub fn normalize(&self, href: &str) -> Result<Option<NormalizedUrl>, UrlError> {
        match self.resolve(href, &NormalizedUrl::root())? {
            Target::SameOrigin(url) => Ok(Some(url)),
            Target::External(_) => Ok(None),
        }
    }

    /// Absolute URL for a normalized one, as sent over the network.
    pub fn absolute(&self, url: &NormalizedUrl) -> String {
        self.origin
            .join(url.as_str())
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.origin(), url))
    }

    /// Absolute URL for any href, resolved against the site root. External
    /// hrefs come back unchanged apart from normalization.
    pub fn absolute_href(&self, href: &str) -> Result<String, UrlError> {
        self.join(&self.origin, href, href).map(|u| u.to_string())
    }

    fn join(&self, base: &Url, input: &str, href: &str) -> Result<Url, UrlError> {
        base.join(input).map_err(|e| UrlError::Unresolvable {
            href: href.to_string(),
            message: e.to_string(),
        })
    }
}

/// Viewport scroll offset, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition(pub f64, pub f64);

impl ScrollPosition {
    /// The top-left corner.
    pub const TOP: ScrollPosition = ScrollPosition(0.0, 0.0);
}

/// State stored with every history entry the engine pushes.
///
/// Shape on the wire: `{ "payload": "<html>", "page": "/path", "scroll": [x, y] }`.
/// Entries that do not deserialize into this shape are treated as having no
/// cached payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Raw HTML of the page.
    pub payload: String,
    /// Normalized URL of the page.
    pub page: NormalizedUrl,
    /// Scroll offset to restore after rendering.
    pub scroll: ScrollPosition,
}

impl HistoryEntry {
    /// Serialize for the platform history API.
    pub fn to_state(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Read an entry from platform history state.
    ///
    /// Returns `None` for foreign or empty state, or an empty payload.
    pub fn from_state(state: &serde_json::Value) -> Option<Self> {
        serde_json::from_value::<HistoryEntry>(state.clone())
            .ok()
            .filter(|entry| !entry.payload.is_empty())
    }
}
