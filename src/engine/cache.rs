//! engine::cache
//!
//! Prefetch cache: fetched page HTML keyed by normalized URL.
//!
//! A hit hands back the same shared payload without touching the network.
//! A miss fetches, stores, snapshots the page and injects `rel=preload`
//! hints for its prefetch targets into the live head. Requests for a URL
//! already in flight are not coalesced; the later completion overwrites the
//! entry with identical content.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::events::{EventBus, EventDetail, EventKind};
use super::lock_document;
use crate::core::markers;
use crate::core::types::{NormalizedUrl, UrlResolver};
use crate::dom::Document;
use crate::host::{FetchError, Fetcher};
use crate::snapshot::{PageSnapshot, SnapshotExtractor};

/// Fetched pages, shared with the engine.
pub struct PrefetchCache {
    entries: Mutex<HashMap<NormalizedUrl, Arc<str>>>,
    fetcher: Arc<dyn Fetcher>,
    resolver: UrlResolver,
    extractor: SnapshotExtractor,
    events: Arc<EventBus>,
    document: Arc<Mutex<Document>>,
}

impl PrefetchCache {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        resolver: UrlResolver,
        extractor: SnapshotExtractor,
        events: Arc<EventBus>,
        document: Arc<Mutex<Document>>,
    ) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fetcher,
            resolver,
            extractor,
            events,
            document,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<NormalizedUrl, Arc<str>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, url: &NormalizedUrl) -> Option<Arc<str>> {
        self.lock().get(url).cloned()
    }

    pub fn contains(&self, url: &NormalizedUrl) -> bool {
        self.lock().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Cached payload for `url`, fetching it on a miss.
    pub async fn prefetch(&self, url: &NormalizedUrl) -> Result<Arc<str>, FetchError> {
        if let Some(hit) = self.get(url) {
            tracing::debug!("prefetch cache hit for {}", url);
            return Ok(hit);
        }

        self.events.emit(
            EventKind::PrefetchBefore,
            EventDetail::Url { url: url.clone() },
        );

        let html = self.fetcher.fetch(&self.resolver.absolute(url)).await?;
        let payload: Arc<str> = Arc::from(html);
        self.lock().insert(url.clone(), Arc::clone(&payload));

        let page = self.extractor.incoming(&payload);
        {
            let mut live = lock_document(&self.document);
            inject_preload_hints(&mut live, &page.snapshot);
        }

        self.events.emit(
            EventKind::PrefetchComplete,
            EventDetail::Url { url: url.clone() },
        );
        Ok(payload)
    }
}

/// Add a `rel=preload` hint to the live head for every prefetch target in
/// `snapshot` that does not have one yet. Returns how many were added.
pub fn inject_preload_hints(live: &mut Document, snapshot: &PageSnapshot) -> usize {
    if snapshot.prefetch.is_empty() {
        return 0;
    }
    let Some(head) = live.head() else {
        tracing::warn!("no <head> to receive preload hints");
        return 0;
    };

    let mut hinted: HashSet<String> = live
        .select_attr(markers::PRELOAD_HINT)
        .into_iter()
        .filter_map(|l| live.attr(l, "href").map(str::to_string))
        .collect();

    let mut added = 0;
    for target in &snapshot.prefetch {
        if !hinted.insert(target.url.clone()) {
            continue;
        }
        let link = live.create_element("link");
        live.set_attr(link, "rel", "preload");
        live.set_attr(link, "href", &target.url);
        live.set_attr(link, "as", target.kind.as_str());
        live.set_attr(link, markers::PRELOAD_HINT, "");
        live.append_child(head, link);
        added += 1;
    }
    added
}

/// Remove every preload hint the engine injected.
pub fn discard_preload_hints(live: &mut Document) {
    for hint in live.select_attr(markers::PRELOAD_HINT) {
        live.remove(hint);
    }
}
