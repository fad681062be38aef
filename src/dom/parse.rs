//! dom::parse
//!
//! HTML parsing via `scraper` (html5ever), converted into the arena model.

use std::collections::HashMap;

use scraper::{Html, Node as HtmlNode};

use super::{Attribute, Document, ElementData, NodeData};

/// Parse a full HTML document.
///
/// The parse tree is copied in two passes: first every node is created, then
/// parents are linked to their children in source order. This keeps the
/// conversion independent of the order in which the tree builder created
/// nodes (foster parenting and misnested formatting elements reparent nodes
/// after creation).
pub(super) fn parse_document(html: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut doc = Document::new();
    let mut ids = HashMap::new();

    for node in parsed.tree.nodes() {
        let data = match node.value() {
            HtmlNode::Document | HtmlNode::Fragment => {
                if node.parent().is_none() {
                    ids.insert(node.id(), doc.root());
                }
                continue;
            }
            HtmlNode::Doctype(doctype) => NodeData::Doctype {
                name: doctype.name().to_string(),
                public_id: doctype.public_id().to_string(),
                system_id: doctype.system_id().to_string(),
            },
            HtmlNode::Comment(comment) => NodeData::Comment(comment.to_string()),
            HtmlNode::Text(text) => NodeData::Text(text.to_string()),
            HtmlNode::Element(el) => NodeData::Element(ElementData {
                tag: el.name().to_ascii_lowercase(),
                attrs: el
                    .attrs()
                    .map(|(name, value)| Attribute {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
            }),
            _ => continue,
        };
        ids.insert(node.id(), doc.create_node(data));
    }

    for node in parsed.tree.nodes() {
        let Some(&parent) = ids.get(&node.id()) else {
            continue;
        };
        for child in node.children() {
            if let Some(&child_id) = ids.get(&child.id()) {
                doc.attach(parent, child_id, None);
            }
        }
    }

    doc
}
