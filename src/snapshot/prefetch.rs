//! snapshot::prefetch
//!
//! Resolves the sub-resource behind an element marked for prefetch.
//!
//! | Element                          | Resource                  | `as`    |
//! |----------------------------------|---------------------------|---------|
//! | `img`                            | `src`                     | `image` |
//! | `video`                          | `src` or first `<source>` | `video` |
//! | `audio`                          | `src` or first `<source>` | `audio` |
//! | generic container (`div`, ...)   | CSS `background-image`    | `image` |
//! | `link rel=stylesheet`            | `href`                    | `style` |

use serde::Serialize;
use thiserror::Error;

use crate::dom::{Document, NodeId};

/// Tags treated as generic containers whose background image is preloaded.
const CONTAINERS: &[&str] = &[
    "div", "section", "article", "aside", "header", "footer", "main", "figure", "span",
];

/// What kind of resource a preload hint fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
    Style,
}

impl AssetKind {
    /// Value of the `as` attribute on a preload hint.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
            AssetKind::Audio => "audio",
            AssetKind::Style => "style",
        }
    }
}

/// A resolved sub-resource to preload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchTarget {
    pub node: NodeId,
    pub url: String,
    pub kind: AssetKind,
}

/// Why an element marked for prefetch could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedTarget {
    #[error("<{0}> elements cannot be prefetched")]
    Tag(String),

    #[error("<{0}> has no resource URL to prefetch")]
    MissingUrl(String),
}

/// Resolve the resource URL behind `node`.
pub fn resolve_target(doc: &Document, node: NodeId) -> Result<PrefetchTarget, UnsupportedTarget> {
    let tag = doc.tag(node).unwrap_or_default().to_string();

    let (url, kind) = match tag.as_str() {
        "img" => (doc.attr(node, "src").map(str::to_string), AssetKind::Image),
        "video" => (media_source(doc, node), AssetKind::Video),
        "audio" => (media_source(doc, node), AssetKind::Audio),
        "link" if is_stylesheet(doc, node) => {
            (doc.attr(node, "href").map(str::to_string), AssetKind::Style)
        }
        t if CONTAINERS.contains(&t) => (
            doc.attr(node, "style").and_then(background_image_url),
            AssetKind::Image,
        ),
        _ => return Err(UnsupportedTarget::Tag(tag)),
    };

    match url.filter(|u| !u.trim().is_empty()) {
        Some(url) => Ok(PrefetchTarget { node, url, kind }),
        None => Err(UnsupportedTarget::MissingUrl(tag)),
    }
}

fn is_stylesheet(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, "rel")
        .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")))
}

fn media_source(doc: &Document, node: NodeId) -> Option<String> {
    if let Some(src) = doc.attr(node, "src") {
        return Some(src.to_string());
    }
    doc.children(node)
        .iter()
        .find(|&&c| doc.is_element(c, "source"))
        .and_then(|&c| doc.attr(c, "src"))
        .map(str::to_string)
}

/// Extract the URL from a `background-image: url(...)` declaration.
pub fn background_image_url(style: &str) -> Option<String> {
    style.split(';').find_map(|decl| {
        let (prop, value) = decl.split_once(':')?;
        let prop = prop.trim();
        if !prop.eq_ignore_ascii_case("background-image") && !prop.eq_ignore_ascii_case("background")
        {
            return None;
        }
        let start = value.find("url(")? + "url(".len();
        let end = start + value[start..].find(')')?;
        let url = value[start..end].trim().trim_matches(|c| c == '"' || c == '\'');
        (!url.is_empty()).then(|| url.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(doc: &Document, tag: &str) -> NodeId {
        doc.select_tag(tag)[0]
    }

    #[test]
    fn image_uses_src() {
        let doc = Document::parse(r#"<body><img src="/hero.jpg"></body>"#);
        let target = resolve_target(&doc, first(&doc, "img")).unwrap();
        assert_eq!(target.url, "/hero.jpg");
        assert_eq!(target.kind, AssetKind::Image);
    }

    #[test]
    fn video_falls_back_to_source_child() {
        let doc = Document::parse(r#"<body><video><source src="/clip.mp4"></video></body>"#);
        let target = resolve_target(&doc, first(&doc, "video")).unwrap();
        assert_eq!(target.url, "/clip.mp4");
        assert_eq!(target.kind.as_str(), "video");
    }

    #[test]
    fn container_uses_background_image() {
        let doc = Document::parse(
            r#"<body><div style="color: red; background-image: url('/bg.png')"></div></body>"#,
        );
        let target = resolve_target(&doc, first(&doc, "div")).unwrap();
        assert_eq!(target.url, "/bg.png");
    }

    #[test]
    fn stylesheet_link_uses_href() {
        let doc = Document::parse(r#"<head><link rel="stylesheet" href="/site.css"></head>"#);
        let target = resolve_target(&doc, first(&doc, "link")).unwrap();
        assert_eq!(target.kind, AssetKind::Style);
        assert_eq!(target.url, "/site.css");
    }

    #[test]
    fn unsupported_tag_is_reported() {
        let doc = Document::parse(r#"<body><p data-bolt-prefetch>x</p></body>"#);
        assert_eq!(
            resolve_target(&doc, first(&doc, "p")),
            Err(UnsupportedTarget::Tag("p".to_string()))
        );
    }

    #[test]
    fn container_without_background_is_missing_url() {
        let doc = Document::parse(r#"<body><div></div></body>"#);
        assert!(matches!(
            resolve_target(&doc, first(&doc, "div")),
            Err(UnsupportedTarget::MissingUrl(_))
        ));
    }

    #[test]
    fn background_shorthand_is_understood() {
        assert_eq!(
            background_image_url(r#"background: #000 url("/a.png") no-repeat"#),
            Some("/a.png".to_string())
        );
        assert_eq!(background_image_url("color: red"), None);
    }
}
