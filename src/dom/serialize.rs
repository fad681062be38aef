//! dom::serialize
//!
//! HTML serialization of the arena model through html5ever's serializer,
//! so void elements, raw text elements and escaping follow the same rules
//! the parser was built on.

use std::io;

use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::{namespace_url, ns, LocalName, QualName};

use super::{Document, NodeData, NodeId};

/// A node borrowed from its document, as html5ever sees it.
struct NodeRef<'a> {
    doc: &'a Document,
    node: NodeId,
}

impl NodeRef<'_> {
    fn serialize_children<S>(&self, serializer: &mut S) -> io::Result<()>
    where
        S: Serializer,
    {
        for &child in self.doc.children(self.node) {
            NodeRef {
                doc: self.doc,
                node: child,
            }
            .serialize(serializer, TraversalScope::IncludeNode)?;
        }
        Ok(())
    }
}

impl Serialize for NodeRef<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        if let TraversalScope::ChildrenOnly(_) = traversal_scope {
            return self.serialize_children(serializer);
        }
        match self.doc.data(self.node) {
            NodeData::Document => self.serialize_children(serializer),
            NodeData::Doctype {
                name,
                public_id,
                system_id,
            } => serializer.write_doctype(&doctype_text(name, public_id, system_id)),
            NodeData::Comment(text) => serializer.write_comment(text),
            NodeData::Text(text) => serializer.write_text(text),
            NodeData::Element(el) => {
                let name = QualName::new(None, ns!(html), LocalName::from(el.tag.as_str()));
                let attrs: Vec<(QualName, &str)> = el
                    .attrs
                    .iter()
                    .map(|a| {
                        (
                            QualName::new(None, ns!(), LocalName::from(a.name.as_str())),
                            a.value.as_str(),
                        )
                    })
                    .collect();
                serializer.start_elem(name.clone(), attrs.iter().map(|(n, v)| (n, *v)))?;
                self.serialize_children(serializer)?;
                serializer.end_elem(name)
            }
        }
    }
}

/// The part of a doctype after `<!DOCTYPE `, identifiers included.
fn doctype_text(name: &str, public_id: &str, system_id: &str) -> String {
    match (public_id.is_empty(), system_id.is_empty()) {
        (true, true) => name.to_string(),
        (true, false) => format!("{} SYSTEM \"{}\"", name, system_id),
        (false, true) => format!("{} PUBLIC \"{}\"", name, public_id),
        (false, false) => format!("{} PUBLIC \"{}\" \"{}\"", name, public_id, system_id),
    }
}

pub(super) fn serialize(doc: &Document, node: NodeId) -> String {
    let traversal_scope = match doc.data(node) {
        NodeData::Document => TraversalScope::ChildrenOnly(None),
        _ => TraversalScope::IncludeNode,
    };
    let opts = SerializeOpts {
        traversal_scope,
        ..SerializeOpts::default()
    };

    let mut out = Vec::new();
    if let Err(e) = html5ever::serialize::serialize(&mut out, &NodeRef { doc, node }, opts) {
        tracing::error!("HTML serialization failed: {}", e);
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_void_and_raw_elements() {
        let doc = Document::parse(
            r#"<!DOCTYPE html><html><head><meta charset="utf-8"></head><body><script>a < b</script><p>x &amp; y</p></body></html>"#,
        );
        let html = doc.to_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<meta charset="utf-8">"#));
        assert!(!html.contains("</meta>"));
        assert!(html.contains("<script>a < b</script>"));
        assert!(html.contains("<p>x &amp; y</p>"));
    }

    #[test]
    fn escapes_attribute_quotes() {
        let mut doc = Document::parse("<body><div></div></body>");
        let div = doc.select_tag("div")[0];
        doc.set_attr(div, "style", r#"background-image: url("/a.png")"#);
        assert_eq!(
            doc.outer_html(div),
            r#"<div style="background-image: url(&quot;/a.png&quot;)"></div>"#
        );
    }

    #[test]
    fn doctype_identifiers_are_kept() {
        let legacy = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd">"#;
        let doc = Document::parse(&format!("{}<html><body></body></html>", legacy));
        assert!(doc.to_html().starts_with(legacy));
    }

    #[test]
    fn reparse_is_structurally_equal() {
        let doc = Document::parse(
            r#"<html><head><title>T</title></head><body><main data-bolt="main"><p>Hi</p></main></body></html>"#,
        );
        let again = Document::parse(&doc.to_html());
        let keep_all = |_: &Document, _: NodeId| false;
        assert!(doc.subtree_eq(doc.root(), &again, again.root(), &keep_all));
    }
}
