//! host::memory
//!
//! In-memory [`Browser`] with a session history stack.
//!
//! # Example
//!
//! ```
//! use boltnav::host::{Browser, MemoryBrowser};
//! use serde_json::json;
//!
//! let browser = MemoryBrowser::new("https://site.test/");
//! browser.push_state(json!({ "n": 1 }), "https://site.test/about");
//! assert_eq!(browser.location(), "https://site.test/about");
//!
//! // Back returns the state a popstate event would carry.
//! assert_eq!(browser.back(), Some(None));
//! assert_eq!(browser.location(), "https://site.test/");
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::Browser;
use crate::core::types::ScrollPosition;

/// Recorded platform call for test verification.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserOp {
    PushState { url: String },
    ReplaceState { url: String },
    Assign { url: String },
    NativeTraversal,
    ScrollTo(ScrollPosition),
}

#[derive(Debug, Clone)]
struct Entry {
    url: String,
    state: Option<serde_json::Value>,
}

#[derive(Debug)]
struct Inner {
    entries: Vec<Entry>,
    index: usize,
    scroll: ScrollPosition,
    operations: Vec<BrowserOp>,
}

/// Session history and scroll held in memory.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryBrowser {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBrowser {
    /// A browser with one history entry at `url` and no state.
    pub fn new(url: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: vec![Entry {
                    url: url.to_string(),
                    state: None,
                }],
                index: 0,
                scroll: ScrollPosition::TOP,
                operations: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move back one entry. Returns the new entry's state (what a popstate
    /// event carries), or `None` if already at the first entry.
    pub fn back(&self) -> Option<Option<serde_json::Value>> {
        let mut inner = self.lock();
        if inner.index == 0 {
            return None;
        }
        inner.index -= 1;
        Some(inner.entries[inner.index].state.clone())
    }

    /// Move forward one entry. See [`MemoryBrowser::back`].
    pub fn forward(&self) -> Option<Option<serde_json::Value>> {
        let mut inner = self.lock();
        if inner.index + 1 >= inner.entries.len() {
            return None;
        }
        inner.index += 1;
        Some(inner.entries[inner.index].state.clone())
    }

    /// Simulate the user scrolling.
    pub fn set_scroll(&self, position: ScrollPosition) {
        self.lock().scroll = position;
    }

    pub fn history_len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn operations(&self) -> Vec<BrowserOp> {
        self.lock().operations.clone()
    }

    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }
}

impl Browser for MemoryBrowser {
    fn location(&self) -> String {
        let inner = self.lock();
        inner.entries[inner.index].url.clone()
    }

    fn history_state(&self) -> Option<serde_json::Value> {
        let inner = self.lock();
        inner.entries[inner.index].state.clone()
    }

    fn push_state(&self, state: serde_json::Value, url: &str) {
        let mut inner = self.lock();
        let next = inner.index + 1;
        inner.entries.truncate(next);
        inner.entries.push(Entry {
            url: url.to_string(),
            state: Some(state),
        });
        inner.index = next;
        inner.operations.push(BrowserOp::PushState {
            url: url.to_string(),
        });
    }

    fn replace_state(&self, state: serde_json::Value, url: &str) {
        let mut inner = self.lock();
        let index = inner.index;
        inner.entries[index] = Entry {
            url: url.to_string(),
            state: Some(state),
        };
        inner.operations.push(BrowserOp::ReplaceState {
            url: url.to_string(),
        });
    }

    fn assign(&self, url: &str) {
        let mut inner = self.lock();
        let next = inner.index + 1;
        inner.entries.truncate(next);
        inner.entries.push(Entry {
            url: url.to_string(),
            state: None,
        });
        inner.index = next;
        inner.scroll = ScrollPosition::TOP;
        inner.operations.push(BrowserOp::Assign {
            url: url.to_string(),
        });
    }

    fn native_traversal(&self) {
        self.lock().operations.push(BrowserOp::NativeTraversal);
    }

    fn scroll_position(&self) -> ScrollPosition {
        self.lock().scroll
    }

    fn scroll_to(&self, position: ScrollPosition) {
        let mut inner = self.lock();
        inner.scroll = position;
        inner.operations.push(BrowserOp::ScrollTo(position));
    }
}
