//! merge
//!
//! Reconciles the live document with an incoming page.
//!
//! # Passes
//!
//! 1. **Meta**: title is replaced; meta tags are fully replaced unless the
//!    two sets are already identical.
//! 2. **Links/modules**: stylesheet-style links are diffed by `href`.
//!    Module-preload links present on both pages are converted into live
//!    `type=module` scripts; module-preload links only on the incoming page
//!    are dropped (script reconciliation covers them).
//! 3. **Attribute merge**: elements matched by merge key get their
//!    attributes diffed in place; the node itself is never replaced.
//!    Unmatched elements are appended to the body, unless they sit inside a
//!    region, static or merge element that brings them along.
//! 4. **Regions**: see [`regions`].
//!
//! Script reconciliation lives in [`scripts`].
//!
//! # Invariants
//!
//! - Each pass produces zero mutations when both pages are identical, with
//!   one exception: a shared module preload without a live module script is
//!   converted the first time it is seen.
//! - Only live nodes indexed by the current snapshot are removed; engine
//!   injected elements are handled explicitly.

pub mod regions;
pub mod scripts;

pub use scripts::{LoadReport, PendingScript, ScriptPlan, ScriptReconciler};

use std::collections::HashSet;

use thiserror::Error;

use crate::core::markers::{self, Markers};
use crate::dom::{Document, NodeId};
use crate::snapshot::{IncomingPage, PageSnapshot};

/// Errors that halt a render cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("live document has no <head>")]
    MissingHead,

    #[error("live document has no <body>")]
    MissingBody,

    #[error("incoming page has no <body>")]
    IncomingMissingBody,
}

/// Excludes script elements from imports and comparisons. Scripts only
/// enter the live document through [`ScriptReconciler`].
pub(crate) fn skip_scripts(doc: &Document, node: NodeId) -> bool {
    doc.is_element(node, "script")
}

fn keep_all(_: &Document, _: NodeId) -> bool {
    false
}

/// Tags that cannot be appended to the body as new merge elements.
const STRUCTURAL_TAGS: &[&str] = &["html", "head", "body"];

/// Applies the meta, link/module, attribute and region passes.
#[derive(Debug, Clone)]
pub struct DocumentMerger {
    markers: Markers,
}

impl DocumentMerger {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }

    /// Pass 1: title and meta tags.
    pub fn merge_meta(
        &self,
        live: &mut Document,
        current: &PageSnapshot,
        incoming: &IncomingPage,
    ) -> Result<(), RenderError> {
        let head = live.head().ok_or(RenderError::MissingHead)?;
        live.set_title(&incoming.snapshot.title);

        let unchanged = current.meta.len() == incoming.snapshot.meta.len()
            && current
                .meta
                .iter()
                .zip(&incoming.snapshot.meta)
                .all(|(&a, &b)| live.subtree_eq(a, &incoming.document, b, &keep_all));
        if unchanged {
            return Ok(());
        }

        for &meta in &current.meta {
            live.remove(meta);
        }
        for &meta in &incoming.snapshot.meta {
            let copy = live.import(&incoming.document, meta, &keep_all);
            live.append_child(head, copy);
        }
        Ok(())
    }

    /// Pass 2: stylesheet-style links and module preloads.
    pub fn merge_links(
        &self,
        live: &mut Document,
        current: &PageSnapshot,
        incoming: &IncomingPage,
    ) -> Result<(), RenderError> {
        let head = live.head().ok_or(RenderError::MissingHead)?;
        let next = &incoming.snapshot;

        for link in &current.links {
            if !next.links.iter().any(|l| l.href == link.href) {
                live.remove(link.node);
            }
        }
        for link in &next.links {
            if current.links.iter().any(|l| l.href == link.href) {
                continue;
            }
            let copy = live.import(&incoming.document, link.node, &keep_all);
            live.append_child(head, copy);
        }

        for module in &current.modules {
            if !next.modules.iter().any(|m| m.href == module.href) {
                live.remove(module.node);
            }
        }

        let converted = live.select_attr(markers::CONVERTED_MODULE);
        for &script in &converted {
            let src = live.attr(script, "src").unwrap_or_default();
            if !next.modules.iter().any(|m| m.href == src) {
                live.remove(script);
            }
        }

        let mut live_modules: HashSet<String> = live
            .select_tag("script")
            .into_iter()
            .filter(|&s| live.attr(s, "type") == Some("module"))
            .filter_map(|s| live.attr(s, "src").map(str::to_string))
            .collect();
        for module in &next.modules {
            if !current.modules.iter().any(|m| m.href == module.href) {
                continue;
            }
            if !live_modules.insert(module.href.clone()) {
                continue;
            }
            let script = live.create_element("script");
            live.set_attr(script, "type", "module");
            live.set_attr(script, "src", &module.href);
            live.set_attr(script, markers::CONVERTED_MODULE, "");
            live.append_child(head, script);
        }
        Ok(())
    }

    /// Pass 3: attribute-merge elements.
    pub fn merge_attributes(
        &self,
        live: &mut Document,
        current: &PageSnapshot,
        incoming: &IncomingPage,
    ) -> Result<(), RenderError> {
        for element in &incoming.snapshot.merge {
            match current.merge_element(&element.key) {
                Some(existing) => {
                    sync_attributes(live, existing.node, &incoming.document, element.node);
                }
                None => {
                    if self.placed_by_ancestor(&incoming.document, element.node) {
                        continue;
                    }
                    let tag = incoming.document.tag(element.node).unwrap_or_default();
                    if STRUCTURAL_TAGS.contains(&tag) {
                        tracing::warn!(
                            "merge element '{}' is <{}> with no live match, skipping",
                            element.key,
                            tag
                        );
                        continue;
                    }
                    let body = live.body().ok_or(RenderError::MissingBody)?;
                    let copy = live.import(&incoming.document, element.node, &skip_scripts);
                    live.append_child(body, copy);
                }
            }
        }
        Ok(())
    }

    /// Whether an ancestor of `node` is a region, static or merge element,
    /// whose reconciliation places `node` along with it.
    fn placed_by_ancestor(&self, doc: &Document, node: NodeId) -> bool {
        let markers = &self.markers;
        doc.has_ancestor(node, |d, n| {
            d.has_attr(n, &markers.region)
                || d.has_attr(n, &markers.static_region)
                || d.has_attr(n, &markers.merge)
        })
    }

    /// Pass 4: router regions and incidental markup in the body.
    pub fn swap_regions(
        &self,
        live: &mut Document,
        incoming: &IncomingPage,
    ) -> Result<(), RenderError> {
        let live_body = live.body().ok_or(RenderError::MissingBody)?;
        let incoming_body = incoming
            .document
            .body()
            .ok_or(RenderError::IncomingMissingBody)?;
        regions::RegionReconciler::new(&self.markers, live, &incoming.document)
            .reconcile(live_body, incoming_body);
        Ok(())
    }

    /// Passes 1, 3 and 4 in order (pass 2 runs at an earlier checkpoint).
    pub fn merge_content(
        &self,
        live: &mut Document,
        current: &PageSnapshot,
        incoming: &IncomingPage,
    ) -> Result<(), RenderError> {
        self.merge_meta(live, current, incoming)?;
        self.merge_attributes(live, current, incoming)?;
        self.swap_regions(live, incoming)
    }
}

/// Make the attributes of live `node` equal those of `source_node`:
/// attributes missing from the source are removed, the rest are set.
pub(crate) fn sync_attributes(
    live: &mut Document,
    node: NodeId,
    source: &Document,
    source_node: NodeId,
) {
    let Some(wanted) = source.element(source_node).map(|el| el.attrs.clone()) else {
        return;
    };
    let existing: Vec<String> = live
        .element(node)
        .map(|el| el.attrs.iter().map(|a| a.name.clone()).collect())
        .unwrap_or_default();

    for name in existing {
        if !wanted.iter().any(|a| a.name == name) {
            live.remove_attr(node, &name);
        }
    }
    for attr in &wanted {
        live.set_attr(node, &attr.name, &attr.value);
    }
}
