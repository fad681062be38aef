//! host::traits
//!
//! Seams between the engine and the platform it drives.
//!
//! # Design
//!
//! [`Fetcher`] and [`ScriptLoader`] are async because they involve network
//! I/O. [`Browser`] is synchronous: history and scroll are immediate
//! operations on the hosting page. All three are object safe so the engine
//! can hold them as `Arc<dyn ...>`.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::ScrollPosition;

/// Errors from fetching a page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    /// Connection, DNS or TLS failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be read as text.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Errors from loading a re-injected external script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptLoadError {
    #[error("script {src} returned HTTP {status}")]
    Status { status: u16, src: String },

    #[error("failed to load script {src}: {message}")]
    Network { src: String, message: String },
}

/// Retrieves page HTML.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the document at an absolute URL and return its text.
    ///
    /// A non-success status is an error; the body is not returned.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Loads external scripts after they are re-injected into the document.
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    /// Resolve once the script at `src` has loaded or failed.
    async fn load(&self, src: &str) -> Result<(), ScriptLoadError>;
}

/// The hosting page: location, session history and viewport scroll.
pub trait Browser: Send + Sync {
    /// Current location as an absolute URL.
    fn location(&self) -> String;

    /// State attached to the current history entry.
    fn history_state(&self) -> Option<serde_json::Value>;

    /// Push a new history entry and move to it.
    fn push_state(&self, state: serde_json::Value, url: &str);

    /// Replace the state of the current history entry.
    fn replace_state(&self, state: serde_json::Value, url: &str);

    /// Full-page navigation to an absolute URL, bypassing the engine.
    fn assign(&self, url: &str);

    /// Let the platform perform the history traversal it just reported.
    fn native_traversal(&self);

    fn scroll_position(&self) -> ScrollPosition;

    fn scroll_to(&self, position: ScrollPosition);
}
