//! host::mock
//!
//! Deterministic [`Fetcher`] and [`ScriptLoader`] for tests.
//!
//! # Example
//!
//! ```
//! use boltnav::host::{Fetcher, MockFetcher};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let fetcher = MockFetcher::new().with_page("https://site.test/about", "<title>About</title>");
//!
//! let html = fetcher.fetch("https://site.test/about").await.unwrap();
//! assert!(html.contains("About"));
//! assert_eq!(fetcher.calls(), vec!["https://site.test/about".to_string()]);
//! # });
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{FetchError, Fetcher, ScriptLoadError, ScriptLoader};

#[derive(Debug, Default)]
struct FetcherInner {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    calls: Vec<String>,
    delay: Option<Duration>,
}

/// Serves pages from memory.
///
/// Unknown URLs answer 404; URLs registered with [`MockFetcher::fail`]
/// fail at the network level. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    inner: Arc<Mutex<FetcherInner>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FetcherInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve `html` at `url`.
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.set_page(url, html);
        self
    }

    pub fn set_page(&self, url: &str, html: &str) {
        self.lock().pages.insert(url.to_string(), html.to_string());
    }

    /// Make requests for `url` fail with a network error.
    pub fn fail(self, url: &str) -> Self {
        self.lock().failing.insert(url.to_string());
        self
    }

    /// Delay every response.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.lock().delay = Some(delay);
        self
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let delay = {
            let mut inner = self.lock();
            inner.calls.push(url.to_string());
            inner.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let inner = self.lock();
        if inner.failing.contains(url) {
            return Err(FetchError::Network(format!("connection refused: {}", url)));
        }
        inner
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

#[derive(Debug, Default)]
struct LoaderInner {
    failing: HashSet<String>,
    loaded: Vec<String>,
}

/// Records script loads; sources whose path matches a failing entry fail.
#[derive(Debug, Clone, Default)]
pub struct MockScriptLoader {
    inner: Arc<Mutex<LoaderInner>>,
}

impl MockScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoaderInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail loads of `path`, ignoring any query string on the request.
    pub fn fail(self, path: &str) -> Self {
        self.lock().failing.insert(path.to_string());
        self
    }

    /// Sources requested so far, as passed to `load`.
    pub fn loaded(&self) -> Vec<String> {
        self.lock().loaded.clone()
    }
}

#[async_trait]
impl ScriptLoader for MockScriptLoader {
    async fn load(&self, src: &str) -> Result<(), ScriptLoadError> {
        let mut inner = self.lock();
        inner.loaded.push(src.to_string());
        let path = src.split('?').next().unwrap_or(src);
        if inner.failing.contains(path) {
            return Err(ScriptLoadError::Status {
                status: 500,
                src: src.to_string(),
            });
        }
        Ok(())
    }
}
