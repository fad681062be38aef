//! merge::regions
//!
//! Router region swap and incidental markup reconciliation.
//!
//! # Roles
//!
//! Every child of a reconciled parent gets a role:
//!
//! - **Region**: carries the region marker; matched by key. A matched region
//!   keeps its node and has its content replaced in place; a region only on
//!   the incoming page is inserted at its incoming position; a region only
//!   on the live page is removed.
//! - **Merge**: carries the merge marker; left to the attribute pass. If it
//!   wraps regions or static elements, its children are reconciled too.
//! - **Static**: carries the static marker; never touched, even when absent
//!   from the incoming page.
//! - **Container**: any other element that wraps regions, merge or static
//!   elements. Matched by tag and position, attributes synced, children
//!   reconciled recursively.
//! - **Incidental**: everything else. Removed and re-inserted fresh from the
//!   incoming page.
//!
//! Scripts are skipped (they belong to script reconciliation), as are
//! comments and whitespace-only text. Merge elements nested in imported
//! markup are skipped when their key is already live, so a merge key never
//! appears twice.
//!
//! When the live and incoming children of a parent are already equivalent
//! nothing is removed or inserted, which keeps identical pages mutation free.

use std::collections::{HashMap, HashSet};

use crate::core::markers::Markers;
use crate::dom::{Document, NodeData, NodeId};

use super::{skip_scripts, sync_attributes};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Role {
    Region(String),
    Merge { key: String, wraps: bool },
    Static(String),
    Container,
    Incidental,
    Script,
}

/// Reconciles the children of one live parent with one incoming parent.
pub struct RegionReconciler<'a> {
    markers: &'a Markers,
    live: &'a mut Document,
    incoming: &'a Document,
    /// Connected static elements in the live document, counted by key.
    live_statics: HashMap<String, usize>,
}

impl<'a> RegionReconciler<'a> {
    pub fn new(markers: &'a Markers, live: &'a mut Document, incoming: &'a Document) -> Self {
        let mut reconciler = Self {
            markers,
            live,
            incoming,
            live_statics: HashMap::new(),
        };
        let root = reconciler.live.root();
        reconciler.track_statics(root);
        reconciler
    }

    /// Reconcile the children of `live_parent` against `incoming_parent`.
    pub fn reconcile(&mut self, live_parent: NodeId, incoming_parent: NodeId) {
        let live = self.roles(&*self.live, live_parent);
        let next = self.roles(self.incoming, incoming_parent);
        let containers = pair_containers(&*self.live, &live, self.incoming, &next);

        if self.equivalent(&live, &next) {
            for (l, i) in self.recursable_pairs(&live, &next, &containers) {
                sync_attributes(self.live, l, self.incoming, i);
                self.reconcile(l, i);
            }
            return;
        }

        self.remove_stale(&live, &next, &containers);
        self.place(live_parent, &live, &next, &containers);
    }

    fn roles(&self, doc: &Document, parent: NodeId) -> Vec<(NodeId, Role)> {
        doc.children(parent)
            .iter()
            .filter_map(|&n| self.role(doc, n).map(|r| (n, r)))
            .collect()
    }

    fn role(&self, doc: &Document, node: NodeId) -> Option<Role> {
        let el = match doc.data(node) {
            NodeData::Text(t) if t.trim().is_empty() => return None,
            NodeData::Text(_) => return Some(Role::Incidental),
            NodeData::Element(el) => el,
            _ => return None,
        };

        if let Some(key) = el.attr(&self.markers.region) {
            return Some(Role::Region(key.to_string()));
        }
        if el.attr(&self.markers.static_region).is_some() {
            return Some(Role::Static(self.static_key(doc, node)));
        }
        if let Some(key) = el.attr(&self.markers.merge) {
            return Some(Role::Merge {
                key: key.to_string(),
                wraps: self.wraps_marked(doc, node),
            });
        }
        if el.tag == "script" {
            return Some(Role::Script);
        }
        if self.wraps_marked(doc, node) {
            return Some(Role::Container);
        }
        Some(Role::Incidental)
    }

    /// Whether any descendant carries a region, merge or static marker.
    fn wraps_marked(&self, doc: &Document, node: NodeId) -> bool {
        doc.descendants(node).into_iter().skip(1).any(|d| {
            doc.has_attr(d, &self.markers.region)
                || doc.has_attr(d, &self.markers.merge)
                || doc.has_attr(d, &self.markers.static_region)
        })
    }

    fn static_key(&self, doc: &Document, node: NodeId) -> String {
        match doc.attr(node, &self.markers.static_region) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => match doc.attr(node, "id") {
                Some(id) => format!("#{}", id),
                None => doc.tag(node).unwrap_or_default().to_string(),
            },
        }
    }

    fn live_static_exists(&self, key: &str) -> bool {
        self.live_statics.contains_key(key)
    }

    fn statics_in(&self, node: NodeId) -> Vec<String> {
        self.live
            .descendants(node)
            .into_iter()
            .filter(|&d| self.live.has_attr(d, &self.markers.static_region))
            .map(|d| self.static_key(&*self.live, d))
            .collect()
    }

    fn track_statics(&mut self, node: NodeId) {
        for key in self.statics_in(node) {
            *self.live_statics.entry(key).or_insert(0) += 1;
        }
    }

    fn untrack_statics(&mut self, node: NodeId) {
        for key in self.statics_in(node) {
            if let Some(count) = self.live_statics.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    self.live_statics.remove(&key);
                }
            }
        }
    }

    fn equivalent(&self, live: &[(NodeId, Role)], next: &[(NodeId, Role)]) -> bool {
        let statics_present = next.iter().all(|(_, r)| match r {
            Role::Static(key) => self.live_static_exists(key),
            _ => true,
        });
        if !statics_present {
            return false;
        }

        let comparable = |(_, r): &&(NodeId, Role)| !matches!(r, Role::Static(_) | Role::Script);
        let ours: Vec<_> = live.iter().filter(comparable).collect();
        let theirs: Vec<_> = next.iter().filter(comparable).collect();

        ours.len() == theirs.len()
            && ours.iter().zip(&theirs).all(|((l, lr), (i, ir))| match (lr, ir) {
                (Role::Region(a), Role::Region(b)) => {
                    a == b && self.live.subtree_eq(*l, self.incoming, *i, &skip_scripts)
                }
                (Role::Merge { key: a, .. }, Role::Merge { key: b, .. }) => a == b,
                (Role::Container, Role::Container) => self.live.tag(*l) == self.incoming.tag(*i),
                (Role::Incidental, Role::Incidental) => {
                    self.live.subtree_eq(*l, self.incoming, *i, &skip_scripts)
                }
                _ => false,
            })
    }

    /// Matched pairs whose children need reconciling.
    fn recursable_pairs(
        &self,
        live: &[(NodeId, Role)],
        next: &[(NodeId, Role)],
        containers: &[(NodeId, NodeId)],
    ) -> Vec<(NodeId, NodeId)> {
        let mut pairs = containers.to_vec();
        for (i, role) in next {
            if let Role::Merge { key, wraps: true } = role {
                if let Some(l) = find_merge(live, key) {
                    pairs.push((l, *i));
                }
            }
        }
        pairs
    }

    fn remove_stale(
        &mut self,
        live: &[(NodeId, Role)],
        next: &[(NodeId, Role)],
        containers: &[(NodeId, NodeId)],
    ) {
        for (node, role) in live {
            let keep = match role {
                Role::Incidental => false,
                Role::Region(key) => find_region(next, key).is_some(),
                Role::Container => {
                    containers.iter().any(|(l, _)| l == node)
                        || self
                            .live
                            .descendants(*node)
                            .into_iter()
                            .any(|d| self.live.has_attr(d, &self.markers.static_region))
                }
                Role::Merge { .. } | Role::Static(_) | Role::Script => true,
            };
            if !keep {
                self.untrack_statics(*node);
                self.live.remove(*node);
            }
        }
    }

    fn place(
        &mut self,
        parent: NodeId,
        live: &[(NodeId, Role)],
        next: &[(NodeId, Role)],
        containers: &[(NodeId, NodeId)],
    ) {
        let mut anchor: Option<NodeId> = None;

        for (node, role) in next {
            match role {
                Role::Region(key) => match find_region(live, key) {
                    Some(existing) => {
                        self.update_region(existing, *node);
                        anchor = Some(existing);
                    }
                    None => anchor = Some(self.insert_fresh(parent, *node, anchor)),
                },
                Role::Merge { key, wraps } => {
                    if let Some(existing) = find_merge(live, key) {
                        if *wraps {
                            self.reconcile(existing, *node);
                        }
                        anchor = Some(existing);
                    }
                }
                Role::Static(key) => {
                    let existing = live
                        .iter()
                        .find(|(_, r)| matches!(r, Role::Static(k) if k == key))
                        .map(|(n, _)| *n);
                    match existing {
                        Some(n) => anchor = Some(n),
                        None if self.live_static_exists(key) => {}
                        None => anchor = Some(self.insert_fresh(parent, *node, anchor)),
                    }
                }
                Role::Container => match containers.iter().find(|(_, i)| i == node) {
                    Some(&(existing, _)) => {
                        sync_attributes(self.live, existing, self.incoming, *node);
                        self.reconcile(existing, *node);
                        anchor = Some(existing);
                    }
                    None => anchor = Some(self.insert_fresh(parent, *node, anchor)),
                },
                Role::Incidental => anchor = Some(self.insert_fresh(parent, *node, anchor)),
                Role::Script => {}
            }
        }
    }

    fn insert_fresh(&mut self, parent: NodeId, node: NodeId, anchor: Option<NodeId>) -> NodeId {
        let copy = self.import(node);
        self.live.insert_after(parent, copy, anchor);
        self.track_statics(copy);
        copy
    }

    fn live_merge_keys(&self) -> HashSet<String> {
        let merge = &self.markers.merge;
        self.live
            .select_attr(merge)
            .into_iter()
            .filter_map(|n| self.live.attr(n, merge).map(str::to_string))
            .collect()
    }

    /// Whether incoming `node` is a merge element whose key is already live.
    fn merge_key_is_live(&self, node: NodeId) -> bool {
        match self.incoming.attr(node, &self.markers.merge) {
            Some(key) => self.live_merge_keys().contains(key),
            None => false,
        }
    }

    /// Copy an incoming subtree, leaving out scripts and any merge element
    /// whose key is already live.
    fn import(&mut self, node: NodeId) -> NodeId {
        let markers = self.markers;
        let merge = &markers.merge;
        let incoming = self.incoming;
        let nests_merge = incoming
            .descendants(node)
            .into_iter()
            .skip(1)
            .any(|d| incoming.has_attr(d, merge));
        if !nests_merge {
            return self.live.import(incoming, node, &skip_scripts);
        }

        let live_keys = self.live_merge_keys();
        let skip = |doc: &Document, n: NodeId| {
            skip_scripts(doc, n) || doc.attr(n, merge).is_some_and(|key| live_keys.contains(key))
        };
        self.live.import(incoming, node, &skip)
    }

    /// Replace a matched region's content in place, keeping the node.
    fn update_region(&mut self, existing: NodeId, node: NodeId) {
        if self
            .live
            .subtree_eq(existing, self.incoming, node, &skip_scripts)
        {
            return;
        }
        sync_attributes(self.live, existing, self.incoming, node);
        self.untrack_statics(existing);
        self.live.clear_children(existing);
        let incoming = self.incoming;
        for &child in incoming.children(node) {
            if skip_scripts(incoming, child) || self.merge_key_is_live(child) {
                continue;
            }
            let copy = self.import(child);
            self.live.append_child(existing, copy);
        }
        self.track_statics(existing);
    }
}

fn find_region(roles: &[(NodeId, Role)], key: &str) -> Option<NodeId> {
    roles
        .iter()
        .find(|(_, r)| matches!(r, Role::Region(k) if k == key))
        .map(|(n, _)| *n)
}

fn find_merge(roles: &[(NodeId, Role)], key: &str) -> Option<NodeId> {
    roles
        .iter()
        .find(|(_, r)| matches!(r, Role::Merge { key: k, .. } if k == key))
        .map(|(n, _)| *n)
}

/// Pair containers by tag and ordinal among same-tag containers.
fn pair_containers(
    live_doc: &Document,
    live: &[(NodeId, Role)],
    next_doc: &Document,
    next: &[(NodeId, Role)],
) -> Vec<(NodeId, NodeId)> {
    let of_tag = |doc: &Document, roles: &[(NodeId, Role)], tag: &str| -> Vec<NodeId> {
        roles
            .iter()
            .filter(|(n, r)| *r == Role::Container && doc.tag(*n) == Some(tag))
            .map(|(n, _)| *n)
            .collect()
    };

    let mut pairs = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for (n, r) in next {
        if *r != Role::Container {
            continue;
        }
        let tag = next_doc.tag(*n).unwrap_or_default();
        if seen.contains(&tag) {
            continue;
        }
        seen.push(tag);
        let ours = of_tag(live_doc, live, tag);
        let theirs = of_tag(next_doc, next, tag);
        pairs.extend(ours.into_iter().zip(theirs));
    }
    pairs
}
