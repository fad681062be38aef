//! engine::links
//!
//! Link observation: which elements the engine intercepts and which
//! prefetch triggers are armed on them.
//!
//! Every observation pass tears down the previous registrations before
//! building new ones from the current document, so listeners never leak
//! across render cycles. A prefetch trigger fires at most once per
//! registration; click interception stays bound until the next pass.

use std::collections::BTreeMap;

use crate::core::config::PrefetchStrategy;
use crate::core::markers::{self, Markers};
use crate::core::types::{NormalizedUrl, Target, UrlResolver};
use crate::dom::{Document, NodeId};

/// Host interaction a listener is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Hover,
    Touch,
    Visible,
    Click,
}

impl Trigger {
    fn prefetches(&self) -> bool {
        !matches!(self, Trigger::Click)
    }
}

/// One bound listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle {
    pub id: u64,
    pub trigger: Trigger,
}

/// A link the engine handles.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRegistration {
    pub node: NodeId,
    pub url: NormalizedUrl,
    /// Explicit transition requested by the link.
    pub transition: Option<String>,
    /// Keep the current scroll offset in the pushed history entry.
    pub preserve_scroll: bool,
    pub listeners: Vec<ListenerHandle>,
}

impl LinkRegistration {
    pub fn has_trigger(&self, trigger: Trigger) -> bool {
        self.listeners.iter().any(|l| l.trigger == trigger)
    }
}

/// Current link registrations, keyed by node.
#[derive(Debug, Default)]
pub struct LinkTable {
    links: BTreeMap<NodeId, LinkRegistration>,
    next_id: u64,
}

impl LinkTable {
    /// Rebuild registrations from `doc`. Returns the URLs to prefetch right
    /// away (the eager strategy), deduplicated, in document order.
    pub fn observe(
        &mut self,
        doc: &Document,
        markers: &Markers,
        resolver: &UrlResolver,
        current: &NormalizedUrl,
        strategy: PrefetchStrategy,
    ) -> Vec<NormalizedUrl> {
        let removed = self.teardown();
        let mut eager = Vec::new();

        for node in doc.select_attr(&markers.link) {
            let Some(href) = doc.attr(node, "href") else {
                continue;
            };
            let url = match resolver.resolve(href, current) {
                Ok(Target::SameOrigin(url)) => url,
                Ok(Target::External(_)) => continue,
                Err(e) => {
                    tracing::warn!("ignoring link: {}", e);
                    continue;
                }
            };

            let triggers: &[Trigger] = match strategy {
                PrefetchStrategy::Hover => &[Trigger::Hover, Trigger::Touch, Trigger::Click],
                PrefetchStrategy::Viewport => &[Trigger::Visible, Trigger::Click],
                PrefetchStrategy::Eager => &[Trigger::Click],
            };
            let listeners = triggers
                .iter()
                .map(|&trigger| {
                    self.next_id += 1;
                    ListenerHandle {
                        id: self.next_id,
                        trigger,
                    }
                })
                .collect();

            if strategy == PrefetchStrategy::Eager && !eager.contains(&url) {
                eager.push(url.clone());
            }

            self.links.insert(
                node,
                LinkRegistration {
                    node,
                    url,
                    transition: doc
                        .attr(node, &markers.transition)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                    preserve_scroll: doc.attr(node, &markers.link) == Some(markers::STATIC_SCROLL),
                    listeners,
                },
            );
        }

        tracing::debug!(
            "observed {} links ({} registrations torn down)",
            self.links.len(),
            removed
        );
        eager
    }

    /// Drop every registration. Returns how many there were.
    pub fn teardown(&mut self) -> usize {
        let count = self.links.len();
        self.links.clear();
        count
    }

    pub fn get(&self, node: NodeId) -> Option<&LinkRegistration> {
        self.links.get(&node)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.links.values().map(|l| l.listeners.len()).sum()
    }

    /// Fire a prefetch trigger on `node`. Returns the URL to prefetch if the
    /// trigger was armed; all prefetch triggers of the link are disarmed.
    pub fn fire(&mut self, node: NodeId, trigger: Trigger) -> Option<NormalizedUrl> {
        let link = self.links.get_mut(&node)?;
        if !trigger.prefetches() || !link.has_trigger(trigger) {
            return None;
        }
        link.listeners.retain(|l| !l.trigger.prefetches());
        Some(link.url.clone())
    }
}
