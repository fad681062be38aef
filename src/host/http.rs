//! host::http
//!
//! Network-backed [`Fetcher`] and [`ScriptLoader`] built on `reqwest`.
//!
//! Both share one client with a cookie store, so session cookies set by the
//! site are sent back on every page fetch the way a same-origin browser
//! request would.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;

use super::traits::{FetchError, Fetcher, ScriptLoadError, ScriptLoader};
use crate::core::types::UrlResolver;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";

/// Fetches pages over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with its own cookie-aware client.
    pub fn new() -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("boltnav/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// A script loader sharing this fetcher's client and cookies.
    pub fn script_loader(&self, resolver: UrlResolver) -> HttpScriptLoader {
        HttpScriptLoader {
            client: self.client.clone(),
            resolver,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}

/// Loads scripts by fetching them; relative sources resolve against the site
/// origin.
#[derive(Debug, Clone)]
pub struct HttpScriptLoader {
    client: Client,
    resolver: UrlResolver,
}

#[async_trait]
impl ScriptLoader for HttpScriptLoader {
    async fn load(&self, src: &str) -> Result<(), ScriptLoadError> {
        let url = self
            .resolver
            .absolute_href(src)
            .map_err(|e| ScriptLoadError::Network {
                src: src.to_string(),
                message: e.to_string(),
            })?;

        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| ScriptLoadError::Network {
                    src: src.to_string(),
                    message: e.to_string(),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScriptLoadError::Status {
                status: status.as_u16(),
                src: src.to_string(),
            });
        }
        // Drain the body so the load completes only once the script arrived.
        response
            .bytes()
            .await
            .map(|_| ())
            .map_err(|e| ScriptLoadError::Network {
                src: src.to_string(),
                message: e.to_string(),
            })
    }
}
