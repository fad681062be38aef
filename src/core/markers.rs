//! core::markers
//!
//! Attribute names the engine reads from served HTML and writes into the
//! live document.
//!
//! # Served markers
//!
//! | Marker      | Default                | Meaning                                   |
//! |-------------|------------------------|-------------------------------------------|
//! | link        | `data-bolt-link`       | anchor is intercepted by the engine       |
//! | region      | `data-bolt`            | router region key                         |
//! | merge       | `data-bolt-merge`      | attribute-merge key                       |
//! | prefetch    | `data-bolt-prefetch`   | sub-resource to preload on prefetch       |
//! | protected   | `data-bolt-protected`  | the engine's own bootstrap script         |
//! | static      | `data-bolt-static`     | never touched by region reconciliation    |
//! | transition  | `data-bolt-transition` | explicit per-link transition name         |
//!
//! # Engine markers
//!
//! Elements the engine injects carry their own markers so later snapshots
//! can tell them apart from page content. These are fixed.

use serde::{Deserialize, Serialize};

/// Marks `rel=preload` hints injected by the prefetch cache.
pub const PRELOAD_HINT: &str = "data-bolt-preload";

/// Marks `type=module` scripts converted from module-preload links.
pub const CONVERTED_MODULE: &str = "data-bolt-module";

/// Holds the original `src` of a re-injected script (before cache busting).
pub const ORIGINAL_SRC: &str = "data-bolt-src";

/// Link-marker value that keeps the current scroll offset.
pub const STATIC_SCROLL: &str = "static";

/// Attribute toggled on the document element while a cycle is running.
pub const BUSY: &str = "aria-busy";

/// Configurable attribute names for served markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Markers {
    pub link: String,
    pub region: String,
    pub merge: String,
    pub prefetch: String,
    pub protected: String,
    pub static_region: String,
    pub transition: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            link: "data-bolt-link".to_string(),
            region: "data-bolt".to_string(),
            merge: "data-bolt-merge".to_string(),
            prefetch: "data-bolt-prefetch".to_string(),
            protected: "data-bolt-protected".to_string(),
            static_region: "data-bolt-static".to_string(),
            transition: "data-bolt-transition".to_string(),
        }
    }
}

impl Markers {
    /// All served marker names, in table order.
    pub fn all(&self) -> [&str; 7] {
        [
            &self.link,
            &self.region,
            &self.merge,
            &self.prefetch,
            &self.protected,
            &self.static_region,
            &self.transition,
        ]
    }
}
