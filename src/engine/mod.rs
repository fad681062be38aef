//! engine
//!
//! The navigation engine: intercepts link activations, fetches and caches
//! pages, and swaps them into the live document through a fixed sequence of
//! checkpoints that collaborators can observe and pause.
//!
//! # Architecture
//!
//! [`Engine`] is a cheap, cloneable handle. It owns the live document and
//! reaches the platform only through the [`crate::host`] traits, so it runs
//! the same way in a headless driver and in tests.
//!
//! # Lifecycle
//!
//! A forward navigation emits, in order:
//!
//! ```text
//! navigate-before → (prefetch-before → prefetch-complete)? → navigate-complete
//! → render-before ⏸ → loading ⏸ → render-complete ⏸
//! → load-progress* → load-complete → engine-complete
//! ```
//!
//! Each ⏸ is an intercept-gate checkpoint: if a gate is open the cycle waits
//! there until [`Engine::resume`]. The navigation itself also waits on the
//! gate once after running any transition. The engine is locked from the
//! moment an activation is accepted until right before `load-complete`.
//!
//! # Modules
//!
//! - [`events`]: lifecycle event bus
//! - [`intercept`]: pause/resume gate
//! - [`cache`]: prefetch cache and preload hints
//! - [`transitions`]: named transitions and route matching
//! - [`links`]: link observation and prefetch triggers
//! - `controller`: the navigation state machine
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use boltnav::core::config::EngineConfig;
//! use boltnav::dom::Document;
//! use boltnav::engine::{ActivationOutcome, Engine, Hosts, LinkActivation};
//! use boltnav::host::{MemoryBrowser, MockFetcher, MockScriptLoader};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let fetcher = MockFetcher::new().with_page(
//!     "https://site.test/about",
//!     r#"<html><head><title>About</title></head><body><main data-bolt="main">About Us</main></body></html>"#,
//! );
//! let hosts = Hosts {
//!     fetcher: Arc::new(fetcher),
//!     scripts: Arc::new(MockScriptLoader::new()),
//!     browser: Arc::new(MemoryBrowser::new("https://site.test/")),
//! };
//! let page = Document::parse(
//!     r#"<html><head><title>Home</title></head><body><main data-bolt="main">Home</main></body></html>"#,
//! );
//! let engine = Engine::new(EngineConfig::for_origin("https://site.test"), page, hosts).unwrap();
//!
//! let outcome = engine.activate(LinkActivation::new("/about")).await;
//! assert!(matches!(outcome, ActivationOutcome::Navigated(_)));
//! assert_eq!(engine.with_document(|doc| doc.title()), "About");
//! # });
//! ```

pub mod cache;
mod controller;
pub mod events;
pub mod intercept;
pub mod links;
pub mod transitions;

pub use cache::PrefetchCache;
pub use events::{Event, EventBus, EventDetail, EventKind, Handler, ListenOptions, ListenerId};
pub use intercept::InterceptGate;
pub use links::{LinkRegistration, LinkTable, Trigger};
pub use transitions::{RoutePattern, Transition, TransitionArgs, TransitionError, TransitionRegistry};

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::core::config::{ConfigError, EngineConfig};
use crate::core::types::{HistoryEntry, NormalizedUrl, UrlError, UrlResolver};
use crate::dom::{Document, NodeId};
use crate::host::{Browser, FetchError, Fetcher, ScriptLoader};
use crate::merge::{DocumentMerger, RenderError, ScriptReconciler};
use crate::snapshot::{ProtectedScript, SnapshotExtractor};

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Url(#[from] UrlError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("'{0}' is not on the site origin")]
    External(String),
}

/// Keyboard modifiers held during an activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.meta || self.alt
    }
}

/// A click (or tap) on a link, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkActivation {
    pub href: String,
    pub modifiers: Modifiers,
    /// The activated element, when it is a registered link.
    pub link: Option<NodeId>,
}

impl LinkActivation {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            modifiers: Modifiers::default(),
            link: None,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn on_link(mut self, node: NodeId) -> Self {
        self.link = Some(node);
        self
    }
}

/// Why an intercepted activation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SameUrl,
    Locked,
}

/// How a navigation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The page was rendered in place.
    Rendered(NormalizedUrl),
    /// The engine gave up and asked the platform to load this absolute URL.
    NativeFallback(String),
    /// A history traversal arrived before this page was committed; the
    /// traversed-to entry is rendered instead.
    Superseded(NormalizedUrl),
}

/// Result of [`Engine::activate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Default platform handling applies; nothing was emitted.
    NotIntercepted,
    /// Default handling was prevented but no navigation started.
    Ignored(IgnoreReason),
    Navigated(NavigationOutcome),
}

/// Result of [`Engine::popstate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopOutcome {
    /// No cached payload (or engine disabled): the platform traverses.
    Native,
    /// A cycle is running; the entry is rendered once it finishes.
    Deferred,
    Navigated(NavigationOutcome),
}

/// Platform seams the engine drives.
#[derive(Clone)]
pub struct Hosts {
    pub fetcher: Arc<dyn Fetcher>,
    pub scripts: Arc<dyn ScriptLoader>,
    pub browser: Arc<dyn Browser>,
}

#[derive(Debug)]
struct NavigationState {
    current: NormalizedUrl,
    locked: bool,
    enabled: bool,
    pending_pop: bool,
}

struct EngineInner {
    config: EngineConfig,
    resolver: UrlResolver,
    extractor: SnapshotExtractor,
    merger: DocumentMerger,
    scripts: ScriptReconciler,
    events: Arc<EventBus>,
    gate: InterceptGate,
    cache: PrefetchCache,
    transitions: Mutex<TransitionRegistry>,
    state: Mutex<NavigationState>,
    links: Mutex<LinkTable>,
    document: Arc<Mutex<Document>>,
    hosts: Hosts,
}

/// Handle to a navigation engine. Clones share the same engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("origin", &self.inner.config.origin)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

/// Lock the shared live document, recovering from poisoning.
pub(crate) fn lock_document(document: &Mutex<Document>) -> MutexGuard<'_, Document> {
    document.lock().unwrap_or_else(|e| e.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Engine {
    /// Set up an engine over the live `document`.
    ///
    /// Resolves the protected script (configured, else marked in the
    /// document), records the current page as the initial history entry and
    /// observes links.
    pub fn new(config: EngineConfig, document: Document, hosts: Hosts) -> Result<Self, EngineError> {
        config.validate()?;
        let resolver = UrlResolver::new(&config.origin)?;

        let protected = match &config.protected_script {
            Some(src) => Some(ProtectedScript::new(src)),
            None => {
                let found = SnapshotExtractor::new(config.markers.clone(), None)
                    .find_marked_protected(&document);
                if found.is_none() {
                    tracing::warn!(
                        "no protected script configured or marked with {}; continuing without one",
                        config.markers.protected
                    );
                }
                found
            }
        };
        let extractor = SnapshotExtractor::new(config.markers.clone(), protected);

        let location = hosts.browser.location();
        let current = match resolver.normalize(&location) {
            Ok(Some(url)) => url,
            Ok(None) | Err(_) => {
                tracing::warn!("location {} is not on {}; assuming /", location, config.origin);
                NormalizedUrl::root()
            }
        };

        let initial = HistoryEntry {
            payload: document.to_html(),
            page: current.clone(),
            scroll: hosts.browser.scroll_position(),
        };
        hosts.browser.replace_state(initial.to_state(), &location);

        let events = Arc::new(EventBus::new());
        let document = Arc::new(Mutex::new(document));
        let cache = PrefetchCache::new(
            Arc::clone(&hosts.fetcher),
            resolver.clone(),
            extractor.clone(),
            Arc::clone(&events),
            Arc::clone(&document),
        );

        let engine = Self {
            inner: Arc::new(EngineInner {
                merger: DocumentMerger::new(config.markers.clone()),
                scripts: ScriptReconciler::new(config.cache_bust_param.clone()),
                config,
                resolver,
                extractor,
                events,
                gate: InterceptGate::new(),
                cache,
                transitions: Mutex::new(TransitionRegistry::default()),
                state: Mutex::new(NavigationState {
                    current,
                    locked: false,
                    enabled: true,
                    pending_pop: false,
                }),
                links: Mutex::new(LinkTable::default()),
                document,
                hosts,
            }),
        };
        engine.observe_links();
        tracing::info!("engine ready on {}", engine.current_url());
        Ok(engine)
    }

    fn state(&self) -> MutexGuard<'_, NavigationState> {
        lock(&self.inner.state)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.inner.resolver
    }

    pub fn current_url(&self) -> NormalizedUrl {
        self.state().current.clone()
    }

    /// Read the live document.
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&lock_document(&self.inner.document))
    }

    /// Mutate the live document, e.g. from a transition.
    pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut lock_document(&self.inner.document))
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler, ListenOptions::default())
    }

    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.events.once(kind, handler)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.events.off(kind, id)
    }

    // ------------------------------------------------------------------
    // Flow control
    // ------------------------------------------------------------------

    /// Hold the running cycle at its next checkpoint.
    pub fn pause(&self) {
        self.inner.gate.pause();
    }

    /// Release a held cycle. Returns whether a gate was open.
    pub fn resume(&self) -> bool {
        self.inner.gate.resume()
    }

    /// A handle to the gate that can move into event handlers and tasks.
    pub fn intercept(&self) -> InterceptGate {
        self.inner.gate.clone()
    }

    /// Reject new navigations until [`Engine::unlock`].
    pub fn lock(&self) {
        self.state().locked = true;
    }

    pub fn unlock(&self) {
        self.state().locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    /// Stop intercepting activations and popstate, and drop link
    /// registrations. Not reversible.
    pub fn disable(&self) {
        self.state().enabled = false;
        let removed = lock(&self.inner.links).teardown();
        tracing::info!("engine disabled ({} link registrations removed)", removed);
    }

    // ------------------------------------------------------------------
    // Transitions and links
    // ------------------------------------------------------------------

    /// Register a transition. Invalid registrations are rejected with a
    /// warning and leave the engine unaffected.
    pub fn register_transition(&self, transition: Transition) -> Result<(), TransitionError> {
        let result = lock(&self.inner.transitions).register(transition);
        if let Err(e) = &result {
            tracing::warn!("transition rejected: {}", e);
        }
        result
    }

    /// The registration for `node`, if it is an observed link.
    pub fn link(&self, node: NodeId) -> Option<LinkRegistration> {
        lock(&self.inner.links).get(node).cloned()
    }

    /// First observed link whose `href` attribute equals `href`.
    pub fn find_link(&self, href: &str) -> Option<NodeId> {
        let candidates: Vec<NodeId> = self.with_document(|doc| {
            doc.select_attr(&self.inner.config.markers.link)
                .into_iter()
                .filter(|&n| doc.attr(n, "href") == Some(href))
                .collect()
        });
        let links = lock(&self.inner.links);
        candidates.into_iter().find(|&n| links.get(n).is_some())
    }

    pub fn link_count(&self) -> usize {
        lock(&self.inner.links).len()
    }

    pub fn cache(&self) -> &PrefetchCache {
        &self.inner.cache
    }
}
