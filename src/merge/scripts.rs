//! merge::scripts
//!
//! Script reconciliation between the current and incoming page.
//!
//! Identity is the script source: external scripts by URL, inline scripts
//! by exact text. Scripts on both pages are left alone. Scripts only on the
//! current page are removed. Scripts only on the incoming page are created
//! fresh so the platform executes them: attributes are copied, external
//! sources get a cache-busting query parameter and remember their original
//! URL, and inline scripts get their text. The protected script never takes
//! part (the snapshot excludes it).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;

use super::RenderError;
use crate::core::markers;
use crate::dom::Document;
use crate::host::ScriptLoader;
use crate::snapshot::{PageSnapshot, Placement, ScriptSource, ScriptTag};

/// Default `type` for re-injected scripts without one.
const DEFAULT_SCRIPT_TYPE: &str = "text/javascript";

/// What a reconciliation will do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptPlan {
    /// Live script nodes to remove.
    pub remove: Vec<crate::dom::NodeId>,
    /// Incoming scripts to re-inject, in document order.
    pub inject: Vec<ScriptTag>,
}

impl ScriptPlan {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.inject.is_empty()
    }
}

/// A re-injected script the render cycle waits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingScript {
    /// Loads from the given (cache-busted) source.
    External(String),
    /// Runs synchronously on insertion.
    Inline,
}

/// Outcome of waiting for re-injected scripts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: usize,
}

impl LoadReport {
    pub fn total(&self) -> usize {
        self.loaded + self.failed
    }
}

/// Plans and applies script changes.
#[derive(Debug)]
pub struct ScriptReconciler {
    cache_bust_param: String,
    counter: AtomicU64,
}

impl ScriptReconciler {
    pub fn new(cache_bust_param: impl Into<String>) -> Self {
        Self {
            cache_bust_param: cache_bust_param.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Diff the scripts of two snapshots.
    pub fn plan(&self, current: &PageSnapshot, incoming: &PageSnapshot) -> ScriptPlan {
        let remove = current
            .scripts
            .iter()
            .filter(|s| !incoming.scripts.iter().any(|i| i.source == s.source))
            .map(|s| s.node)
            .collect();
        let inject = incoming
            .scripts
            .iter()
            .filter(|i| !current.scripts.iter().any(|s| s.source == i.source))
            .cloned()
            .collect();
        ScriptPlan { remove, inject }
    }

    /// Apply `plan` to the live document. Returns what to wait on.
    pub fn apply(
        &self,
        live: &mut Document,
        plan: &ScriptPlan,
        incoming: &Document,
    ) -> Result<Vec<PendingScript>, RenderError> {
        let head = live.head().ok_or(RenderError::MissingHead)?;
        let body = live.body().ok_or(RenderError::MissingBody)?;

        for &node in &plan.remove {
            live.remove(node);
        }

        let mut pending = Vec::with_capacity(plan.inject.len());
        for tag in &plan.inject {
            let script = live.create_element("script");
            if let Some(el) = incoming.element(tag.node) {
                for attr in &el.attrs {
                    if matches!(attr.name.as_str(), "src" | "type") {
                        continue;
                    }
                    live.set_attr(script, &attr.name, &attr.value);
                }
            }
            live.set_attr(
                script,
                "type",
                tag.kind.as_deref().unwrap_or(DEFAULT_SCRIPT_TYPE),
            );

            match &tag.source {
                ScriptSource::Src(src) => {
                    let busted = self.cache_busted(src);
                    live.set_attr(script, markers::ORIGINAL_SRC, src);
                    live.set_attr(script, "src", &busted);
                    pending.push(PendingScript::External(busted));
                }
                ScriptSource::Inline(text) => {
                    let text_node = live.create_text(text);
                    live.append_child(script, text_node);
                    pending.push(PendingScript::Inline);
                }
            }

            let parent = match tag.placement {
                Placement::Head => head,
                Placement::Body => body,
            };
            live.append_child(parent, script);
        }
        Ok(pending)
    }

    /// `src` with a unique cache-busting query parameter appended.
    pub fn cache_busted(&self, src: &str) -> String {
        let separator = if src.contains('?') { '&' } else { '?' };
        let token = format!(
            "{}{}",
            chrono::Utc::now().timestamp_millis(),
            self.counter.fetch_add(1, Ordering::Relaxed)
        );
        format!("{}{}{}={}", src, separator, self.cache_bust_param, token)
    }

    /// Wait until every pending script has loaded or failed.
    ///
    /// `on_progress(total, complete)` is called once up front with zero
    /// complete, then after every settled script. Inline scripts settle
    /// immediately; failures count as settled and are logged.
    pub async fn await_loads(
        pending: Vec<PendingScript>,
        loader: Arc<dyn ScriptLoader>,
        on_progress: impl Fn(usize, usize),
    ) -> LoadReport {
        let total = pending.len();
        let mut report = LoadReport::default();
        on_progress(total, 0);

        let mut loads = JoinSet::new();
        for script in pending {
            match script {
                PendingScript::Inline => {
                    report.loaded += 1;
                    on_progress(total, report.total());
                }
                PendingScript::External(src) => {
                    let loader = Arc::clone(&loader);
                    loads.spawn(async move { loader.load(&src).await });
                }
            }
        }

        while let Some(result) = loads.join_next().await {
            match result {
                Ok(Ok(())) => report.loaded += 1,
                Ok(Err(e)) => {
                    tracing::warn!("{}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::warn!("script load task failed: {}", e);
                    report.failed += 1;
                }
            }
            on_progress(total, report.total());
        }
        report
    }
}
