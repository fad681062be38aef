//! visit command - Drive a live engine through a sequence of navigations
//!
//! The starting page is fetched over HTTP and becomes the live document.
//! Every lifecycle event is logged. Navigations run one after another the
//! way successive link clicks would.

use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};

use crate::core::config::EngineConfig;
use crate::core::types::UrlResolver;
use crate::dom::Document;
use crate::engine::{ActivationOutcome, Engine, EventKind, Hosts, NavigationOutcome};
use crate::host::{Fetcher, HttpFetcher, MemoryBrowser};

/// Load `url`, then navigate to each of `paths` in turn.
pub fn visit(config: &EngineConfig, url: &str, paths: &[String], print_html: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    rt.block_on(visit_impl(config, url, paths, print_html))
}

async fn visit_impl(
    config: &EngineConfig,
    url: &str,
    paths: &[String],
    print_html: bool,
) -> Result<()> {
    let site = UrlResolver::new(url).with_context(|| format!("'{}' is not a site URL", url))?;
    let mut config = config.clone();
    config.origin = site.origin();

    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let initial = fetcher
        .fetch(url)
        .await
        .with_context(|| format!("Failed to load {}", url))?;

    let browser = Arc::new(MemoryBrowser::new(url));
    let hosts = Hosts {
        scripts: Arc::new(fetcher.script_loader(site)),
        fetcher: Arc::new(fetcher),
        browser: browser.clone(),
    };
    let engine = Engine::new(config, Document::parse(&initial), hosts)
        .context("Failed to start navigation engine")?;

    for kind in EventKind::ALL {
        engine.on(kind, |event| match serde_json::to_string(&event.detail) {
            Ok(detail) => tracing::info!("{} {}", event.kind, detail),
            Err(_) => tracing::info!("{}", event.kind),
        });
    }

    for path in paths {
        match engine.navigate(path).await {
            ActivationOutcome::Navigated(NavigationOutcome::Rendered(to)) => {
                println!("{} -> {}", to, engine.with_document(|doc| doc.title()));
            }
            ActivationOutcome::Navigated(NavigationOutcome::Superseded(to)) => {
                tracing::warn!("navigation to {} superseded by a history traversal", to);
            }
            ActivationOutcome::Navigated(NavigationOutcome::NativeFallback(to)) => {
                return Err(anyhow!("navigation to {} fell back to a full page load", to));
            }
            ActivationOutcome::Ignored(reason) => {
                tracing::warn!("navigation to {} ignored: {:?}", path, reason);
            }
            ActivationOutcome::NotIntercepted => {
                return Err(anyhow!("{} is not a same-origin page", path));
            }
        }
    }

    tracing::debug!("history holds {} entries", browser.history_len());
    if print_html {
        println!("{}", engine.with_document(|doc| doc.to_html()));
    }
    Ok(())
}
