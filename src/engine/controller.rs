//! engine::controller
//!
//! The navigation state machine.
//!
//! ```text
//! idle → preflight → locked/navigating → rendering → idle
//! idle → locked/popstate → rendering → idle
//! ```
//!
//! A cycle holds a [`CycleGuard`] from the moment it takes the lock. The
//! guard releases the lock, releases any open gate, clears the busy flag and
//! cancels the render watchdog, both on the success path and when a cycle
//! bails out early, so a failed cycle never leaves the engine locked.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::cache::discard_preload_hints;
use super::events::{EventDetail, EventKind};
use super::links::Trigger;
use super::transitions::{Transition, TransitionArgs};
use super::{
    lock, lock_document, ActivationOutcome, Engine, EngineError, IgnoreReason, LinkActivation,
    NavigationOutcome, PopOutcome,
};
use crate::core::markers;
use crate::core::types::{HistoryEntry, NormalizedUrl, ScrollPosition, Target};
use crate::merge::{RenderError, ScriptReconciler};

/// Releases the engine when a cycle ends, however it ends.
struct CycleGuard<'a> {
    engine: &'a Engine,
    watchdog: Option<JoinHandle<()>>,
    released: bool,
}

impl<'a> CycleGuard<'a> {
    fn new(engine: &'a Engine, url: &NormalizedUrl) -> Self {
        Self {
            engine,
            watchdog: engine.start_watchdog(url),
            released: false,
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
        self.engine.unlock();
        self.engine.resume();
        self.engine.set_busy(false);
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl Engine {
    // ------------------------------------------------------------------
    // Link observation and prefetch
    // ------------------------------------------------------------------

    /// Rebind link registrations to the current document. With the eager
    /// strategy every observed link is prefetched in the background.
    pub(crate) fn observe_links(&self) {
        if !self.is_enabled() {
            return;
        }
        let current = self.current_url();
        let eager = {
            let doc = lock_document(&self.inner.document);
            lock(&self.inner.links).observe(
                &doc,
                &self.inner.config.markers,
                &self.inner.resolver,
                &current,
                self.inner.config.strategy,
            )
        };

        if eager.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no async runtime; skipping eager prefetch");
            return;
        };
        for url in eager {
            let engine = self.clone();
            runtime.spawn(async move {
                if let Err(e) = engine.inner.cache.prefetch(&url).await {
                    tracing::warn!("eager prefetch of {} failed: {}", url, e);
                }
            });
        }
    }

    /// Prefetch `href` into the cache.
    pub async fn prefetch(&self, href: &str) -> Result<Arc<str>, EngineError> {
        let url = self
            .inner
            .resolver
            .resolve(href, &self.current_url())?;
        match url {
            Target::SameOrigin(url) => Ok(self.inner.cache.prefetch(&url).await?),
            Target::External(url) => Err(EngineError::External(url)),
        }
    }

    /// Report a host interaction on a link. Prefetches the link's page if a
    /// matching trigger is still armed; returns whether it did.
    pub async fn link_trigger(&self, node: crate::dom::NodeId, trigger: Trigger) -> bool {
        let Some(url) = lock(&self.inner.links).fire(node, trigger) else {
            return false;
        };
        match self.inner.cache.prefetch(&url).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("prefetch of {} failed: {}", url, e);
                false
            }
        }
    }

    pub async fn link_hovered(&self, node: crate::dom::NodeId) -> bool {
        self.link_trigger(node, Trigger::Hover).await
    }

    pub async fn link_touched(&self, node: crate::dom::NodeId) -> bool {
        self.link_trigger(node, Trigger::Touch).await
    }

    pub async fn link_visible(&self, node: crate::dom::NodeId) -> bool {
        self.link_trigger(node, Trigger::Visible).await
    }

    // ------------------------------------------------------------------
    // Forward navigation
    // ------------------------------------------------------------------

    /// Handle a link activation.
    pub async fn activate(&self, activation: LinkActivation) -> ActivationOutcome {
        if activation.modifiers.any() || !self.is_enabled() {
            return ActivationOutcome::NotIntercepted;
        }

        let from = self.current_url();
        let to = match self.inner.resolver.resolve(&activation.href, &from) {
            Ok(Target::SameOrigin(url)) => url,
            Ok(Target::External(_)) => return ActivationOutcome::NotIntercepted,
            Err(e) => {
                tracing::warn!("not intercepting activation: {}", e);
                return ActivationOutcome::NotIntercepted;
            }
        };

        {
            let mut state = self.state();
            if state.current == to {
                return ActivationOutcome::Ignored(IgnoreReason::SameUrl);
            }
            if state.locked {
                tracing::debug!("navigation to {} ignored: engine locked", to);
                return ActivationOutcome::Ignored(IgnoreReason::Locked);
            }
            state.locked = true;
        }

        let registration = activation.link.and_then(|node| self.link(node));
        let explicit = registration.as_ref().and_then(|r| r.transition.clone());
        let preserve_scroll = registration.is_some_and(|r| r.preserve_scroll);

        let args = TransitionArgs {
            from: from.clone(),
            to: to.clone(),
        };
        let transition = lock(&self.inner.transitions).resolve(explicit.as_deref(), &args);

        self.inner.events.emit(
            EventKind::NavigateBefore,
            EventDetail::Route {
                from,
                to: to.clone(),
            },
        );

        let outcome = self.navigate_to(to, transition, args, preserve_scroll).await;
        self.settle().await;
        ActivationOutcome::Navigated(outcome)
    }

    /// Navigate programmatically, with the same lifecycle as a click.
    pub async fn navigate(&self, href: &str) -> ActivationOutcome {
        self.activate(LinkActivation::new(href)).await
    }

    async fn navigate_to(
        &self,
        to: NormalizedUrl,
        transition: Option<Transition>,
        args: TransitionArgs,
        preserve_scroll: bool,
    ) -> NavigationOutcome {
        let mut guard = CycleGuard::new(self, &to);
        let absolute = self.inner.resolver.absolute(&to);

        if let Some(transition) = transition {
            tracing::debug!("running transition '{}'", transition.name);
            (transition.run)(self, &args);
        }
        self.inner.gate.wait().await;
        self.set_busy(true);

        let payload = match self.inner.cache.prefetch(&to).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("fetching {} failed ({}); falling back to native navigation", to, e);
                guard.release();
                self.inner.hosts.browser.assign(&absolute);
                return NavigationOutcome::NativeFallback(absolute);
            }
        };

        let scroll = if preserve_scroll {
            self.inner.hosts.browser.scroll_position()
        } else {
            ScrollPosition::TOP
        };
        let entry = HistoryEntry {
            payload: payload.to_string(),
            page: to.clone(),
            scroll,
        };
        {
            // A popstate deferred while the page loaded wins over this navigation.
            let mut state = self.state();
            if state.pending_pop {
                tracing::debug!("navigation to {} superseded by a history traversal", to);
                return NavigationOutcome::Superseded(to);
            }
            state.current = to.clone();
            self.inner
                .hosts
                .browser
                .push_state(entry.to_state(), &absolute);
        }
        self.inner
            .events
            .emit(EventKind::NavigateComplete, EventDetail::Url { url: to.clone() });

        match self.render(&payload, &to, scroll, guard).await {
            Ok(()) => NavigationOutcome::Rendered(to),
            Err(e) => {
                tracing::error!("render of {} failed ({}); falling back to native navigation", to, e);
                self.inner.hosts.browser.assign(&absolute);
                NavigationOutcome::NativeFallback(absolute)
            }
        }
    }

    // ------------------------------------------------------------------
    // History traversal
    // ------------------------------------------------------------------

    /// Handle a popstate carrying the new entry's `state`.
    ///
    /// A popstate that arrives while a cycle runs is deferred; when the
    /// cycle finishes the engine renders whatever entry is current by then,
    /// so the last traversal wins.
    pub async fn popstate(&self, state: Option<serde_json::Value>) -> PopOutcome {
        if !self.is_enabled() {
            return PopOutcome::Native;
        }
        let Some(entry) = state.as_ref().and_then(HistoryEntry::from_state) else {
            tracing::debug!("history entry has no cached payload; native traversal");
            self.inner.hosts.browser.native_traversal();
            return PopOutcome::Native;
        };

        {
            let mut state = self.state();
            if state.locked {
                tracing::debug!("popstate to {} deferred: cycle running", entry.page);
                state.pending_pop = true;
                return PopOutcome::Deferred;
            }
            state.locked = true;
        }

        let outcome = self.pop_to(entry).await;
        self.settle().await;
        PopOutcome::Navigated(outcome)
    }

    /// Render a history entry. The caller holds the lock.
    async fn pop_to(&self, entry: HistoryEntry) -> NavigationOutcome {
        let guard = CycleGuard::new(self, &entry.page);
        let args = TransitionArgs {
            from: self.current_url(),
            to: entry.page.clone(),
        };

        self.inner.events.emit(
            EventKind::NavigatePopBefore,
            EventDetail::Route {
                from: args.from.clone(),
                to: args.to.clone(),
            },
        );
        let transition = lock(&self.inner.transitions).resolve(None, &args);
        if let Some(transition) = transition {
            (transition.run)(self, &args);
        }
        self.inner.events.emit(
            EventKind::NavigateBefore,
            EventDetail::Route {
                from: args.from.clone(),
                to: args.to.clone(),
            },
        );

        self.inner.gate.wait().await;
        self.set_busy(true);
        self.inner.events.emit(
            EventKind::NavigateComplete,
            EventDetail::Url {
                url: entry.page.clone(),
            },
        );
        self.state().current = entry.page.clone();

        match self
            .render(&entry.payload, &entry.page, entry.scroll, guard)
            .await
        {
            Ok(()) => NavigationOutcome::Rendered(entry.page),
            Err(e) => {
                tracing::error!("render of {} from history failed: {}", entry.page, e);
                self.inner.hosts.browser.native_traversal();
                NavigationOutcome::NativeFallback(self.inner.resolver.absolute(&entry.page))
            }
        }
    }

    /// Finish a cycle: render the latest deferred history entry, if any,
    /// then announce that the engine is idle.
    async fn settle(&self) {
        loop {
            let entry = {
                let mut state = self.state();
                if state.locked || !std::mem::take(&mut state.pending_pop) {
                    break;
                }
                let entry = self
                    .inner
                    .hosts
                    .browser
                    .history_state()
                    .as_ref()
                    .and_then(HistoryEntry::from_state);
                match entry {
                    Some(entry) if entry.page != state.current => {
                        state.locked = true;
                        entry
                    }
                    _ => continue,
                }
            };
            tracing::debug!("rendering deferred popstate to {}", entry.page);
            self.pop_to(entry).await;
        }
        self.inner.events.emit(EventKind::EngineComplete, EventDetail::None);
    }

    // ------------------------------------------------------------------
    // Render
    // ------------------------------------------------------------------

    async fn render(
        &self,
        payload: &str,
        url: &NormalizedUrl,
        scroll: ScrollPosition,
        mut guard: CycleGuard<'_>,
    ) -> Result<(), RenderError> {
        let events = &self.inner.events;
        let detail = || EventDetail::Url { url: url.clone() };

        events.emit(EventKind::RenderBefore, detail());
        self.inner.gate.wait().await;

        let incoming = self.inner.extractor.incoming(payload);
        if incoming.document.body().is_none() {
            return Err(RenderError::IncomingMissingBody);
        }
        let current = {
            let doc = lock_document(&self.inner.document);
            self.inner.extractor.extract(&doc)
        };

        events.emit(EventKind::Loading, detail());
        self.inner.gate.wait().await;

        {
            let mut doc = lock_document(&self.inner.document);
            self.inner
                .merger
                .merge_links(&mut doc, &current, &incoming)?;
        }

        events.emit(EventKind::RenderComplete, detail());
        self.inner.gate.wait().await;

        let pending = {
            let mut doc = lock_document(&self.inner.document);
            self.inner
                .merger
                .merge_content(&mut doc, &current, &incoming)?;
            // Region swaps may drop scripts, so plan against the merged page.
            let merged = self.inner.extractor.extract(&doc);
            let plan = self.inner.scripts.plan(&merged, &incoming.snapshot);
            self.inner
                .scripts
                .apply(&mut doc, &plan, &incoming.document)?
        };

        let report = ScriptReconciler::await_loads(
            pending,
            Arc::clone(&self.inner.hosts.scripts),
            |total, complete| {
                events.emit(
                    EventKind::LoadProgress,
                    EventDetail::Progress { total, complete },
                )
            },
        )
        .await;
        if report.failed > 0 {
            tracing::warn!("{} of {} scripts failed to load", report.failed, report.total());
        }

        self.observe_links();
        guard.release();
        {
            let mut doc = lock_document(&self.inner.document);
            discard_preload_hints(&mut doc);
            doc.take_mutations();
            let released = doc.collect_garbage();
            tracing::trace!("released {} detached nodes", released);
        }
        self.inner.hosts.browser.scroll_to(scroll);
        events.emit(EventKind::LoadComplete, detail());
        tracing::info!("rendered {}", url);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn set_busy(&self, busy: bool) {
        let mut doc = lock_document(&self.inner.document);
        if let Some(root) = doc.document_element() {
            doc.set_attr(root, markers::BUSY, if busy { "true" } else { "false" });
        }
    }

    /// Emit `load-timeout` if the cycle outlives the configured period.
    fn start_watchdog(&self, url: &NormalizedUrl) -> Option<JoinHandle<()>> {
        let period = self.inner.config.render_timeout_ms;
        if period == 0 {
            return None;
        }
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let events = Arc::clone(&self.inner.events);
        let url = url.clone();
        Some(runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(period)).await;
            tracing::warn!("render of {} exceeded {}ms", url, period);
            events.emit(EventKind::LoadTimeout, EventDetail::Url { url });
        }))
    }
}
