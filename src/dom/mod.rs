//! dom
//!
//! Arena-backed HTML document model.
//!
//! # Design
//!
//! Nodes live in a `Vec` and are addressed by [`NodeId`]. Removing a node
//! detaches it from its parent but keeps it in the arena, so ids held by a
//! snapshot stay valid until [`Document::collect_garbage`] releases every
//! detached slot for reuse. Nodes imported from another document are deep
//! copies and start detached.
//!
//! Every mutation that touches a node connected to the document root is
//! appended to a mutation log. Detached nodes (e.g. a subtree being built
//! before insertion) mutate silently. The log is what makes "merging two
//! identical pages changes nothing" an observable property.
//!
//! # Example
//!
//! ```
//! use boltnav::dom::Document;
//!
//! let mut doc = Document::parse("<html><head><title>Home</title></head><body></body></html>");
//! assert_eq!(doc.title(), "Home");
//!
//! let body = doc.body().unwrap();
//! let p = doc.create_element("p");
//! doc.append_child(body, p);
//! assert_eq!(doc.mutation_count(), 1);
//! ```

mod parse;
mod serialize;

use std::collections::HashMap;

/// Index of a node in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// An element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Element tag and attributes. Tag names are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    /// Look up an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// A recorded change to the connected tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Inserted { parent: NodeId, node: NodeId },
    Removed { parent: NodeId, node: NodeId },
    AttributeSet { node: NodeId, name: String },
    AttributeRemoved { node: NodeId, name: String },
}

/// An HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    mutations: Vec<Mutation>,
    /// Released slots, reused before the arena grows.
    free: Vec<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document with no children.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            root: NodeId(0),
            mutations: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Parse an HTML string. Parsing never fails; malformed markup is
    /// repaired the way browsers repair it.
    pub fn parse(html: &str) -> Self {
        parse::parse_document(html)
    }

    /// Serialize the whole document to HTML.
    pub fn to_html(&self) -> String {
        serialize::serialize(self, self.root)
    }

    /// Serialize one node (and its subtree) to HTML.
    pub fn outer_html(&self, node: NodeId) -> String {
        serialize::serialize(self, node)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.0].data
    }

    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes[node.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Lowercase tag name, if `node` is an element.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    pub fn is_element(&self, node: NodeId, tag: &str) -> bool {
        self.tag(node) == Some(tag)
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|el| el.attr(name))
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|&c| c == node)?;
        siblings.get(index + 1).copied()
    }

    /// Whether `node` is reachable from the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == self.root {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Whether `node` has an ancestor (excluding itself) matching `pred`.
    pub fn has_ancestor(&self, node: NodeId, pred: impl Fn(&Self, NodeId) -> bool) -> bool {
        let mut current = self.parent(node);
        while let Some(n) = current {
            if pred(self, n) {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// `node` and all its descendants in document order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Connected elements matching `pred`, in document order.
    pub fn select(&self, pred: impl Fn(&ElementData) -> bool) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&n| self.element(n).is_some_and(&pred))
            .collect()
    }

    /// Connected elements with the given tag.
    pub fn select_tag(&self, tag: &str) -> Vec<NodeId> {
        self.select(|el| el.tag == tag)
    }

    /// Connected elements carrying the given attribute.
    pub fn select_attr(&self, name: &str) -> Vec<NodeId> {
        self.select(|el| el.attr(name).is_some())
    }

    fn first_child_element(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .find(|&c| self.is_element(c, tag))
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.first_child_element(self.root, "html")
    }

    pub fn head(&self) -> Option<NodeId> {
        self.first_child_element(self.document_element()?, "head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.first_child_element(self.document_element()?, "body")
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, node: NodeId) -> String {
        self.descendants(node)
            .into_iter()
            .filter_map(|n| match self.data(n) {
                NodeData::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text of the first `<title>` element, trimmed.
    pub fn title(&self) -> String {
        self.select_tag("title")
            .first()
            .map(|&t| self.text_content(t).trim().to_string())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    fn push(&mut self, data: NodeData) -> NodeId {
        let node = Node {
            parent: None,
            children: Vec::new(),
            data,
        };
        if let Some(id) = self.free.pop() {
            self.nodes[id.0] = node;
            return id;
        }
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    pub(crate) fn create_node(&mut self, data: NodeData) -> NodeId {
        self.push(data)
    }

    /// Deep-copy `node` from `source` into this document, detached.
    ///
    /// Subtrees for which `skip` returns true are left out of the copy.
    pub fn import(
        &mut self,
        source: &Document,
        node: NodeId,
        skip: &dyn Fn(&Document, NodeId) -> bool,
    ) -> NodeId {
        let copy = self.push(source.data(node).clone());
        for &child in source.children(node) {
            if skip(source, child) {
                continue;
            }
            let child_copy = self.import(source, child, skip);
            self.attach(copy, child_copy, None);
        }
        copy
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    fn record(&mut self, node: NodeId, mutation: Mutation) {
        if self.is_connected(node) {
            self.mutations.push(mutation);
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = before
            .and_then(|b| children.iter().position(|&c| c == b))
            .unwrap_or(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent.take()?;
        self.nodes[parent.0].children.retain(|&c| c != node);
        Some(parent)
    }

    /// Append `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `reference` (or last when `None`
    /// or when `reference` is not a child of `parent`).
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if let Some(old_parent) = self.parent(child) {
            self.record(
                old_parent,
                Mutation::Removed {
                    parent: old_parent,
                    node: child,
                },
            );
        }
        self.attach(parent, child, reference);
        self.record(parent, Mutation::Inserted { parent, node: child });
    }

    /// Insert `child` into `parent` directly after `anchor`, or as the first
    /// child when `anchor` is `None`.
    pub fn insert_after(&mut self, parent: NodeId, child: NodeId, anchor: Option<NodeId>) {
        let reference = match anchor {
            Some(a) => self.next_sibling(a),
            None => self.children(parent).first().copied(),
        };
        if reference == Some(child) {
            return;
        }
        self.insert_before(parent, child, reference);
    }

    /// Detach `node` from its parent. No-op for detached nodes.
    pub fn remove(&mut self, node: NodeId) {
        let connected = self.is_connected(node);
        if let Some(parent) = self.detach(node) {
            if connected {
                self.mutations.push(Mutation::Removed { parent, node });
            }
        }
    }

    /// Remove every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) {
        for child in self.children(node).to_vec() {
            self.remove(child);
        }
    }

    /// Set an attribute. Setting an attribute to its current value is not a
    /// mutation.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let changed = match &mut self.nodes[node.0].data {
            NodeData::Element(el) => match el.attrs.iter_mut().find(|a| a.name == name) {
                Some(attr) if attr.value == value => false,
                Some(attr) => {
                    attr.value = value.to_string();
                    true
                }
                None => {
                    el.attrs.push(Attribute {
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                    true
                }
            },
            _ => false,
        };
        if changed {
            self.record(
                node,
                Mutation::AttributeSet {
                    node,
                    name: name.to_string(),
                },
            );
        }
    }

    /// Remove an attribute if present.
    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        let removed = match &mut self.nodes[node.0].data {
            NodeData::Element(el) => {
                let before = el.attrs.len();
                el.attrs.retain(|a| a.name != name);
                el.attrs.len() != before
            }
            _ => false,
        };
        if removed {
            self.record(
                node,
                Mutation::AttributeRemoved {
                    node,
                    name: name.to_string(),
                },
            );
        }
    }

    /// Replace the text of the first `<title>`, creating one in `<head>` if
    /// needed. No-op when the title already matches.
    pub fn set_title(&mut self, title: &str) {
        if self.title() == title {
            return;
        }
        let existing = self.select_tag("title").first().copied();
        let element = match existing {
            Some(t) => t,
            None => {
                let Some(head) = self.head() else { return };
                let t = self.create_element("title");
                self.append_child(head, t);
                t
            }
        };
        self.clear_children(element);
        let text = self.create_text(title);
        self.append_child(element, text);
    }

    // ------------------------------------------------------------------
    // Comparison and bookkeeping
    // ------------------------------------------------------------------

    /// Structural equality of two subtrees, possibly across documents.
    ///
    /// Attribute order is ignored; subtrees for which `skip` returns true
    /// are ignored on both sides.
    pub fn subtree_eq(
        &self,
        node: NodeId,
        other: &Document,
        other_node: NodeId,
        skip: &dyn Fn(&Document, NodeId) -> bool,
    ) -> bool {
        let same_data = match (self.data(node), other.data(other_node)) {
            (NodeData::Element(a), NodeData::Element(b)) => {
                a.tag == b.tag && attrs_eq(&a.attrs, &b.attrs)
            }
            (a, b) => a == b,
        };
        if !same_data {
            return false;
        }
        let ours: Vec<NodeId> = self
            .children(node)
            .iter()
            .copied()
            .filter(|&c| !skip(self, c))
            .collect();
        let theirs: Vec<NodeId> = other
            .children(other_node)
            .iter()
            .copied()
            .filter(|&c| !skip(other, c))
            .collect();
        ours.len() == theirs.len()
            && ours
                .iter()
                .zip(&theirs)
                .all(|(&a, &b)| self.subtree_eq(a, other, b, skip))
    }

    /// Number of mutations recorded since creation or the last `take_mutations`.
    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    /// Drain the mutation log.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    /// Number of slots in the arena, connected or not.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Release every node not connected to the root. Released slots are
    /// reused by later insertions, lowest first, and trailing ones are
    /// dropped. Ids of connected nodes are unchanged; ids of released nodes
    /// must not be used again. Returns the number of nodes released by this
    /// call.
    pub fn collect_garbage(&mut self) -> usize {
        let mut connected = vec![false; self.nodes.len()];
        for node in self.descendants(self.root) {
            connected[node.0] = true;
        }
        let mut already_free = vec![false; self.nodes.len()];
        for id in self.free.drain(..) {
            already_free[id.0] = true;
        }
        let released = (0..self.nodes.len())
            .filter(|&i| !connected[i] && !already_free[i])
            .count();

        while self.nodes.len() > 1 && !connected[self.nodes.len() - 1] {
            self.nodes.pop();
        }
        for index in (0..self.nodes.len()).rev() {
            if connected[index] {
                continue;
            }
            self.nodes[index] = Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Text(String::new()),
            };
            self.free.push(NodeId(index));
        }
        released
    }
}

fn attrs_eq(a: &[Attribute], b: &[Attribute]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let lookup: HashMap<&str, &str> = b
        .iter()
        .map(|attr| (attr.name.as_str(), attr.value.as_str()))
        .collect();
    a.iter()
        .all(|attr| lookup.get(attr.name.as_str()) == Some(&attr.value.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_skip(_: &Document, _: NodeId) -> bool {
        false
    }

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Home</title><meta name="description" content="home"></head>
<body><main data-bolt="main"><p>Home</p></main></body></html>"#;

    mod structure {
        use super::*;

        #[test]
        fn parse_exposes_head_body_and_title() {
            let doc = Document::parse(PAGE);
            assert!(doc.head().is_some());
            assert!(doc.body().is_some());
            assert_eq!(doc.title(), "Home");
        }

        #[test]
        fn select_attr_finds_regions_in_order() {
            let doc = Document::parse(
                r#"<body><div data-bolt="a"></div><section data-bolt="b"></section></body>"#,
            );
            let regions = doc.select_attr("data-bolt");
            assert_eq!(regions.len(), 2);
            assert_eq!(doc.attr(regions[0], "data-bolt"), Some("a"));
            assert_eq!(doc.tag(regions[1]), Some("section"));
        }

        #[test]
        fn removed_nodes_are_not_selected() {
            let mut doc = Document::parse(PAGE);
            let main = doc.select_attr("data-bolt")[0];
            doc.remove(main);
            assert!(doc.select_attr("data-bolt").is_empty());
            assert!(!doc.is_connected(main));
        }
    }

    mod mutations {
        use super::*;

        #[test]
        fn detached_changes_are_not_recorded() {
            let mut doc = Document::parse(PAGE);
            let div = doc.create_element("div");
            doc.set_attr(div, "class", "x");
            let text = doc.create_text("hi");
            doc.append_child(div, text);
            assert_eq!(doc.mutation_count(), 0);

            let body = doc.body().unwrap();
            doc.append_child(body, div);
            assert_eq!(doc.mutation_count(), 1);
        }

        #[test]
        fn setting_same_attribute_value_is_not_a_mutation() {
            let mut doc = Document::parse(PAGE);
            let main = doc.select_attr("data-bolt")[0];
            doc.set_attr(main, "data-bolt", "main");
            assert_eq!(doc.mutation_count(), 0);
            doc.set_attr(main, "class", "wide");
            doc.remove_attr(main, "class");
            doc.remove_attr(main, "class");
            assert_eq!(doc.mutation_count(), 2);
        }

        #[test]
        fn set_title_is_idempotent() {
            let mut doc = Document::parse(PAGE);
            doc.set_title("Home");
            assert_eq!(doc.mutation_count(), 0);
            doc.set_title("About");
            assert_eq!(doc.title(), "About");
            assert!(doc.mutation_count() > 0);
        }

        #[test]
        fn taking_mutations_empties_the_log() {
            let mut doc = Document::parse(PAGE);
            let main = doc.select_attr("data-bolt")[0];
            doc.set_attr(main, "class", "wide");
            assert_eq!(doc.take_mutations().len(), 1);
            assert_eq!(doc.mutation_count(), 0);
        }

        #[test]
        fn insert_after_none_prepends() {
            let mut doc = Document::parse(PAGE);
            let body = doc.body().unwrap();
            let first = doc.create_element("header");
            doc.insert_after(body, first, None);
            assert_eq!(doc.children(body)[0], first);

            let second = doc.create_element("nav");
            doc.insert_after(body, second, Some(first));
            assert_eq!(doc.children(body)[1], second);
        }
    }

    mod garbage {
        use super::*;

        #[test]
        fn removed_subtrees_are_released() {
            let mut doc = Document::parse(PAGE);
            doc.collect_garbage();
            let before = doc.arena_len();
            let main = doc.select_attr("data-bolt")[0];
            let released = doc.descendants(main).len();

            doc.remove(main);

            assert_eq!(doc.collect_garbage(), released);
            assert_eq!(doc.collect_garbage(), 0);
            assert!(doc.arena_len() <= before);
        }

        #[test]
        fn released_slots_are_reused() {
            let mut doc = Document::parse(PAGE);
            let body = doc.body().unwrap();
            let source = Document::parse(PAGE);
            let incoming = source.select_attr("data-bolt")[0];

            let mut sizes = Vec::new();
            for _ in 0..10 {
                doc.clear_children(body);
                let copy = doc.import(&source, incoming, &no_skip);
                doc.append_child(body, copy);
                doc.collect_garbage();
                sizes.push(doc.arena_len());
            }

            assert!(sizes.iter().all(|&n| n <= sizes[0]), "{:?}", sizes);
            assert_eq!(doc.text_content(body), "Home");
        }

        #[test]
        fn connected_ids_survive_collection() {
            let mut doc = Document::parse(PAGE);
            let main = doc.select_attr("data-bolt")[0];
            let p = doc.children(main)[0];
            doc.remove(p);
            doc.collect_garbage();

            let fresh = doc.create_element("section");
            doc.append_child(main, fresh);
            assert_eq!(doc.attr(main, "data-bolt"), Some("main"));
            assert_eq!(doc.children(main), &[fresh]);
            assert_eq!(doc.title(), "Home");
        }
    }

    mod import_and_compare {
        use super::*;

        #[test]
        fn imported_subtree_equals_source() {
            let source = Document::parse(PAGE);
            let mut target = Document::parse("<html><body></body></html>");
            let main = source.select_attr("data-bolt")[0];

            let copy = target.import(&source, main, &no_skip);
            assert!(!target.is_connected(copy));
            assert!(target.subtree_eq(copy, &source, main, &no_skip));
            assert_eq!(target.text_content(copy), "Home");
        }

        #[test]
        fn import_can_skip_scripts() {
            let source = Document::parse(
                r#"<body><div id="r"><script>run()</script><p>x</p></div></body>"#,
            );
            let mut target = Document::new();
            let div = source.select(|el| el.attr("id") == Some("r"))[0];
            let skip_scripts = |d: &Document, n: NodeId| d.is_element(n, "script");

            let copy = target.import(&source, div, &skip_scripts);
            assert_eq!(target.children(copy).len(), 1);
            assert!(target.subtree_eq(copy, &source, div, &skip_scripts));
            assert!(!target.subtree_eq(copy, &source, div, &no_skip));
        }

        #[test]
        fn attribute_order_does_not_matter() {
            let a = Document::parse(r#"<body><p class="x" id="y"></p></body>"#);
            let b = Document::parse(r#"<body><p id="y" class="x"></p></body>"#);
            assert!(a.subtree_eq(a.root(), &b, b.root(), &no_skip));
        }
    }
}
