//! engine::events
//!
//! Lifecycle event bus.
//!
//! Handlers for one event kind fire synchronously at emit time, in
//! registration order. Emit never blocks on a handler: handlers that want to
//! hold up the engine do so through the intercept gate. Handlers may register
//! or remove listeners (including themselves) while being called.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use boltnav::engine::{EventBus, EventDetail, EventKind};
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! bus.once(EventKind::LoadComplete, move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! bus.emit(EventKind::LoadComplete, EventDetail::None);
//! bus.emit(EventKind::LoadComplete, EventDetail::None);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::core::types::NormalizedUrl;

/// Lifecycle events, in the order a forward navigation emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    PrefetchBefore,
    PrefetchComplete,
    NavigatePopBefore,
    NavigateBefore,
    NavigateComplete,
    RenderBefore,
    Loading,
    RenderComplete,
    LoadProgress,
    LoadComplete,
    /// The render watchdog expired before the cycle finished.
    LoadTimeout,
    /// A cycle has fully settled, including any deferred popstate.
    EngineComplete,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::PrefetchBefore,
        EventKind::PrefetchComplete,
        EventKind::NavigatePopBefore,
        EventKind::NavigateBefore,
        EventKind::NavigateComplete,
        EventKind::RenderBefore,
        EventKind::Loading,
        EventKind::RenderComplete,
        EventKind::LoadProgress,
        EventKind::LoadComplete,
        EventKind::LoadTimeout,
        EventKind::EngineComplete,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PrefetchBefore => "prefetch-before",
            EventKind::PrefetchComplete => "prefetch-complete",
            EventKind::NavigatePopBefore => "navigate-pop-before",
            EventKind::NavigateBefore => "navigate-before",
            EventKind::NavigateComplete => "navigate-complete",
            EventKind::RenderBefore => "render-before",
            EventKind::Loading => "loading",
            EventKind::RenderComplete => "render-complete",
            EventKind::LoadProgress => "load-progress",
            EventKind::LoadComplete => "load-complete",
            EventKind::LoadTimeout => "load-timeout",
            EventKind::EngineComplete => "engine-complete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload carried by an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventDetail {
    None,
    Url { url: NormalizedUrl },
    Route { from: NormalizedUrl, to: NormalizedUrl },
    Progress { total: usize, complete: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "event")]
    pub kind: EventKind,
    pub detail: EventDetail,
}

/// Event handler.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies a registered listener for [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenOptions {
    /// Remove the listener after its first call.
    pub once: bool,
}

struct Listener {
    id: ListenerId,
    handler: Handler,
    once: bool,
}

/// Publish/subscribe hub for lifecycle events.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EventKind, usize> =
            self.lock().iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Listener>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `handler` for `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F, options: ListenOptions) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().entry(kind).or_default().push(Listener {
            id,
            handler: Arc::new(handler),
            once: options.once,
        });
        id
    }

    /// Register `handler` for the next `kind` event only.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.on(kind, handler, ListenOptions { once: true })
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(list) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        before != list.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Call every handler registered for `kind`.
    pub fn emit(&self, kind: EventKind, detail: EventDetail) {
        let handlers: Vec<Handler> = {
            let mut listeners = self.lock();
            let Some(list) = listeners.get_mut(&kind) else {
                return;
            };
            let handlers = list.iter().map(|l| Arc::clone(&l.handler)).collect();
            list.retain(|l| !l.once);
            handlers
        };

        tracing::debug!(event = kind.name(), "emit");
        let event = Event { kind, detail };
        for handler in handlers {
            handler(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::clone(&log);
        let make = move |tag: &'static str| -> Handler {
            let log = Arc::clone(&shared);
            Arc::new(move |_: &Event| log.lock().unwrap().push(tag.to_string()))
        };
        (log, make)
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        bus.on(EventKind::Loading, move |e| a(e), ListenOptions::default());
        bus.on(EventKind::Loading, move |e| b(e), ListenOptions::default());

        bus.emit(EventKind::Loading, EventDetail::None);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn off_removes_only_that_listener() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let id = bus.on(EventKind::Loading, move |e| a(e), ListenOptions::default());
        bus.on(EventKind::Loading, move |e| b(e), ListenOptions::default());

        assert!(bus.off(EventKind::Loading, id));
        assert!(!bus.off(EventKind::Loading, id));
        bus.emit(EventKind::Loading, EventDetail::None);
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn kinds_are_isolated() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        bus.on(EventKind::RenderBefore, move |e| a(e), ListenOptions::default());
        bus.emit(EventKind::RenderComplete, EventDetail::None);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn handler_may_register_during_emit() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.once(EventKind::Loading, move |_| {
            inner.on(EventKind::Loading, |_| {}, ListenOptions::default());
        });
        bus.emit(EventKind::Loading, EventDetail::None);
        assert_eq!(bus.listener_count(EventKind::Loading), 1);
    }

    #[test]
    fn names_are_kebab_case() {
        for kind in EventKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::json!(kind.name()));
        }
    }
}
