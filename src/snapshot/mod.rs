//! snapshot
//!
//! Structured view of the parts of a page the engine reconciles.
//!
//! # Design
//!
//! A [`PageSnapshot`] is an index into a [`Document`]: it holds node ids, not
//! copies. The incoming page owns its parsed document alongside its
//! snapshot ([`IncomingPage`]); the current page's snapshot indexes the live
//! document and is captured right before merging.
//!
//! Snapshots never include engine-injected elements (preload hints and
//! converted module scripts) or the protected bootstrap script, so none of
//! those are ever removed or re-injected by a merge.

pub mod prefetch;

pub use prefetch::{AssetKind, PrefetchTarget, UnsupportedTarget};

use serde::Serialize;

use crate::core::markers::{self, Markers};
use crate::dom::{Document, NodeId};

/// A router region: swapped by content, identified by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub key: String,
    pub node: NodeId,
}

/// An element whose attributes are merged in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeElement {
    pub key: String,
    pub node: NodeId,
}

/// A stylesheet-style or module-preload `<link>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTag {
    pub href: String,
    pub node: NodeId,
}

/// Where a script lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Head,
    Body,
}

/// Script identity: external by URL, inline by exact text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScriptSource {
    Src(String),
    Inline(String),
}

/// A `<script>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTag {
    pub node: NodeId,
    pub source: ScriptSource,
    /// The `type` attribute, if any.
    pub kind: Option<String>,
    pub placement: Placement,
}

/// Parsed, structured representation of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub title: String,
    pub regions: Vec<Region>,
    pub scripts: Vec<ScriptTag>,
    pub meta: Vec<NodeId>,
    pub links: Vec<LinkTag>,
    pub modules: Vec<LinkTag>,
    pub merge: Vec<MergeElement>,
    pub prefetch: Vec<PrefetchTarget>,
}

impl PageSnapshot {
    pub fn region(&self, key: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.key == key)
    }

    pub fn merge_element(&self, key: &str) -> Option<&MergeElement> {
        self.merge.iter().find(|m| m.key == key)
    }

    /// JSON-friendly summary for display.
    pub fn summary(&self, doc: &Document) -> SnapshotSummary {
        SnapshotSummary {
            title: self.title.clone(),
            regions: self.regions.iter().map(|r| r.key.clone()).collect(),
            scripts: self
                .scripts
                .iter()
                .map(|s| ScriptSummary {
                    src: match &s.source {
                        ScriptSource::Src(src) => Some(src.clone()),
                        ScriptSource::Inline(_) => None,
                    },
                    kind: s.kind.clone(),
                    placement: s.placement,
                })
                .collect(),
            meta: self.meta.iter().map(|&m| doc.outer_html(m)).collect(),
            links: self.links.iter().map(|l| l.href.clone()).collect(),
            modules: self.modules.iter().map(|l| l.href.clone()).collect(),
            merge: self.merge.iter().map(|m| m.key.clone()).collect(),
            prefetch: self
                .prefetch
                .iter()
                .map(|p| PrefetchSummary {
                    url: p.url.clone(),
                    kind: p.kind,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub title: String,
    pub regions: Vec<String>,
    pub scripts: Vec<ScriptSummary>,
    pub meta: Vec<String>,
    pub links: Vec<String>,
    pub modules: Vec<String>,
    pub merge: Vec<String>,
    pub prefetch: Vec<PrefetchSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptSummary {
    pub src: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub placement: Placement,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrefetchSummary {
    pub url: String,
    #[serde(rename = "as")]
    pub kind: AssetKind,
}

/// A fetched page: its own parsed document plus the snapshot indexing it.
#[derive(Debug, Clone)]
pub struct IncomingPage {
    pub document: Document,
    pub snapshot: PageSnapshot,
}

/// Identifier of the engine's own bootstrap script.
///
/// Matching ignores scheme, host, query and fragment, so
/// `https://site.test/js/app.js?v=3` matches `/js/app.js`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedScript(String);

impl ProtectedScript {
    pub fn new(src: &str) -> Self {
        Self(script_path(src).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, src: &str) -> bool {
        script_path(src) == self.0
    }
}

fn script_path(src: &str) -> &str {
    let src = src.split(['?', '#']).next().unwrap_or_default();
    match src.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or("/"),
        None => src,
    }
}

/// Builds [`PageSnapshot`]s from documents.
#[derive(Debug, Clone)]
pub struct SnapshotExtractor {
    markers: Markers,
    protected: Option<ProtectedScript>,
}

impl SnapshotExtractor {
    pub fn new(markers: Markers, protected: Option<ProtectedScript>) -> Self {
        Self { markers, protected }
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    pub fn protected(&self) -> Option<&ProtectedScript> {
        self.protected.as_ref()
    }

    /// Find the protected script in a document by its marker attribute.
    pub fn find_marked_protected(&self, doc: &Document) -> Option<ProtectedScript> {
        doc.select(|el| el.tag == "script" && el.attr(&self.markers.protected).is_some())
            .into_iter()
            .find_map(|s| doc.attr(s, "src"))
            .map(ProtectedScript::new)
    }

    /// Parse `html` and snapshot it.
    pub fn incoming(&self, html: &str) -> IncomingPage {
        let document = Document::parse(html);
        let snapshot = self.extract(&document);
        IncomingPage { document, snapshot }
    }

    /// Snapshot a document.
    pub fn extract(&self, doc: &Document) -> PageSnapshot {
        PageSnapshot {
            title: doc.title(),
            regions: self.regions(doc),
            scripts: self.scripts(doc),
            meta: doc.select_tag("meta"),
            links: self.links(doc, false),
            modules: self.links(doc, true),
            merge: doc
                .select_attr(&self.markers.merge)
                .into_iter()
                .map(|node| MergeElement {
                    key: doc.attr(node, &self.markers.merge).unwrap_or_default().to_string(),
                    node,
                })
                .collect(),
            prefetch: self.prefetch_targets(doc),
        }
    }

    /// Outermost elements carrying the region marker.
    fn regions(&self, doc: &Document) -> Vec<Region> {
        let marker = self.markers.region.as_str();
        doc.select_attr(marker)
            .into_iter()
            .filter(|&n| !doc.has_ancestor(n, |d, a| d.has_attr(a, marker)))
            .map(|node| Region {
                key: doc.attr(node, marker).unwrap_or_default().to_string(),
                node,
            })
            .collect()
    }

    /// Whether a script element is the protected bootstrap script.
    pub fn is_protected(&self, doc: &Document, node: NodeId) -> bool {
        if doc.has_attr(node, &self.markers.protected) {
            return true;
        }
        match (&self.protected, doc.attr(node, "src")) {
            (Some(protected), Some(src)) => protected.matches(src),
            _ => false,
        }
    }

    fn scripts(&self, doc: &Document) -> Vec<ScriptTag> {
        let head = doc.head();
        doc.select_tag("script")
            .into_iter()
            .filter(|&n| !self.is_protected(doc, n))
            .filter(|&n| !doc.has_attr(n, markers::CONVERTED_MODULE))
            .map(|node| {
                let src = doc
                    .attr(node, markers::ORIGINAL_SRC)
                    .or_else(|| doc.attr(node, "src"))
                    .filter(|s| !s.is_empty());
                let source = match src {
                    Some(src) => ScriptSource::Src(src.to_string()),
                    None => ScriptSource::Inline(doc.text_content(node)),
                };
                let in_head = head.is_some_and(|h| doc.has_ancestor(node, |_, a| a == h));
                ScriptTag {
                    node,
                    source,
                    kind: doc.attr(node, "type").map(str::to_string),
                    placement: if in_head {
                        Placement::Head
                    } else {
                        Placement::Body
                    },
                }
            })
            .collect()
    }

    fn links(&self, doc: &Document, modules: bool) -> Vec<LinkTag> {
        doc.select_tag("link")
            .into_iter()
            .filter(|&n| !doc.has_attr(n, markers::PRELOAD_HINT))
            .filter(|&n| is_module_preload(doc, n) == modules)
            .filter_map(|node| {
                let href = doc.attr(node, "href")?.to_string();
                if modules && self.protected.as_ref().is_some_and(|p| p.matches(&href)) {
                    return None;
                }
                Some(LinkTag { href, node })
            })
            .collect()
    }

    fn prefetch_targets(&self, doc: &Document) -> Vec<PrefetchTarget> {
        doc.select_attr(&self.markers.prefetch)
            .into_iter()
            .filter_map(|node| match prefetch::resolve_target(doc, node) {
                Ok(target) => Some(target),
                Err(e) => {
                    tracing::warn!("skipping prefetch target: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Whether a `<link>` is a module preload.
pub fn is_module_preload(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, "rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|t| t.eq_ignore_ascii_case("modulepreload"))
    })
}
