//! Integration tests for the navigation lifecycle.
//!
//! These tests drive a full engine against in-memory hosts: pages come from
//! `MockFetcher`, scripts "load" through `MockScriptLoader`, and history and
//! scroll live in `MemoryBrowser`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use boltnav::core::config::{EngineConfig, PrefetchStrategy};
use boltnav::core::types::{HistoryEntry, NormalizedUrl, ScrollPosition};
use boltnav::dom::Document;
use boltnav::engine::{
    ActivationOutcome, Engine, Event, EventDetail, EventKind, Hosts, IgnoreReason, LinkActivation,
    Modifiers, NavigationOutcome, PopOutcome, Transition,
};
use boltnav::host::{Browser, BrowserOp, MemoryBrowser, MockFetcher, MockScriptLoader};

// =============================================================================
// Test Fixtures
// =============================================================================

const ORIGIN: &str = "https://site.test";

const HOME: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Home</title>
  <meta name="description" content="home page">
  <link rel="stylesheet" href="/site.css">
  <script src="/js/boltnav.js" data-bolt-protected></script>
</head>
<body>
  <nav>
    <a href="/about" data-bolt-link>About</a>
    <a href="/blog" data-bolt-link="static" data-bolt-transition="slide">Blog</a>
  </nav>
  <main data-bolt="main"><h1>Welcome</h1></main>
</body>
</html>"#;

const ABOUT: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>About</title>
  <meta name="description" content="about page">
  <link rel="stylesheet" href="/site.css">
  <link rel="stylesheet" href="/about.css">
  <script src="/js/boltnav.js" data-bolt-protected></script>
</head>
<body>
  <nav>
    <a href="/about" data-bolt-link>About</a>
    <a href="/blog" data-bolt-link="static" data-bolt-transition="slide">Blog</a>
  </nav>
  <main data-bolt="main"><h1>About Us</h1></main>
  <script src="/js/about.js"></script>
</body>
</html>"#;

const BLOG: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Blog</title>
  <link rel="stylesheet" href="/site.css">
  <script src="/js/boltnav.js" data-bolt-protected></script>
</head>
<body>
  <nav>
    <a href="/about" data-bolt-link>About</a>
    <a href="/blog" data-bolt-link="static" data-bolt-transition="slide">Blog</a>
  </nav>
  <main data-bolt="main"><h1>Latest posts</h1></main>
</body>
</html>"#;

const NOTICE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Notice</title>
  <link rel="stylesheet" href="/site.css">
  <script src="/js/boltnav.js" data-bolt-protected></script>
</head>
<body>
  <nav>
    <a href="/about" data-bolt-link>About</a>
    <a href="/blog" data-bolt-link="static" data-bolt-transition="slide">Blog</a>
  </nav>
  <main data-bolt="main"><div data-bolt-merge="toast" class="show">Saved</div><h1>Notice</h1></main>
</body>
</html>"#;

/// An engine wired to in-memory hosts, with handles to inspect them.
struct Site {
    engine: Engine,
    browser: MemoryBrowser,
    fetcher: MockFetcher,
    loader: MockScriptLoader,
    events: Arc<Mutex<Vec<Event>>>,
}

impl Site {
    fn new() -> Self {
        Self::with(EngineConfig::for_origin(ORIGIN), fetcher(), Document::parse(HOME))
    }

    fn with(config: EngineConfig, fetcher: MockFetcher, document: Document) -> Self {
        Self::with_loader(config, fetcher, MockScriptLoader::new(), document)
    }

    fn with_loader(
        config: EngineConfig,
        fetcher: MockFetcher,
        loader: MockScriptLoader,
        document: Document,
    ) -> Self {
        let browser = MemoryBrowser::new("https://site.test/");
        let hosts = Hosts {
            fetcher: Arc::new(fetcher.clone()),
            scripts: Arc::new(loader.clone()),
            browser: Arc::new(browser.clone()),
        };
        let engine = Engine::new(config, document, hosts).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in EventKind::ALL {
            let events = Arc::clone(&events);
            engine.on(kind, move |event| events.lock().unwrap().push(event.clone()));
        }

        Self {
            engine,
            browser,
            fetcher,
            loader,
            events,
        }
    }

    fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }

    fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    fn title(&self) -> String {
        self.engine.with_document(|doc| doc.title())
    }

    fn main_text(&self) -> String {
        self.engine.with_document(|doc| {
            let main = doc.select_attr("data-bolt")[0];
            doc.text_content(main).trim().to_string()
        })
    }

    fn busy(&self) -> Option<String> {
        self.engine.with_document(|doc| {
            doc.document_element()
                .and_then(|root| doc.attr(root, "aria-busy"))
                .map(str::to_string)
        })
    }

    fn pushed(&self) -> Vec<String> {
        self.browser
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                BrowserOp::PushState { url } => Some(url),
                _ => None,
            })
            .collect()
    }
}

fn fetcher() -> MockFetcher {
    MockFetcher::new()
        .with_page("https://site.test/", HOME)
        .with_page("https://site.test/about", ABOUT)
        .with_page("https://site.test/blog", BLOG)
}

fn rendered(path: &str) -> ActivationOutcome {
    ActivationOutcome::Navigated(NavigationOutcome::Rendered(NormalizedUrl::from_path(path)))
}

/// Pause the engine the next time `kind` is emitted.
fn pause_on(engine: &Engine, kind: EventKind) {
    let handle = engine.clone();
    engine.once(kind, move |_| handle.pause());
}

async fn until_paused(engine: &Engine) {
    while !engine.intercept().is_paused() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// Forward Navigation
// =============================================================================

mod forward {
    use super::*;

    #[tokio::test]
    async fn navigating_to_about_swaps_the_page() {
        let site = Site::new();

        let outcome = site.engine.navigate("/about").await;

        assert_eq!(outcome, rendered("/about"));
        assert_eq!(site.engine.current_url(), NormalizedUrl::from_path("/about"));
        assert_eq!(site.pushed(), vec!["https://site.test/about".to_string()]);
        assert_eq!(site.title(), "About");
        assert_eq!(site.main_text(), "About Us");

        site.engine.with_document(|doc| {
            let descriptions: Vec<_> = doc
                .select_tag("meta")
                .into_iter()
                .filter_map(|m| doc.attr(m, "content"))
                .collect();
            assert_eq!(descriptions, vec!["about page"]);

            let sheets: Vec<_> = doc
                .select_tag("link")
                .into_iter()
                .filter_map(|l| doc.attr(l, "href"))
                .collect();
            assert_eq!(sheets, vec!["/site.css", "/about.css"]);
        });
    }

    #[tokio::test]
    async fn page_scripts_are_injected_and_loaded() {
        let site = Site::new();
        site.engine.navigate("/about").await;

        let loaded = site.loader.loaded();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].starts_with("/js/about.js?_bolt="));

        site.engine.with_document(|doc| {
            let scripts: Vec<_> = doc
                .select_tag("script")
                .into_iter()
                .filter_map(|s| doc.attr(s, "data-bolt-src"))
                .collect();
            assert_eq!(scripts, vec!["/js/about.js"]);
        });
    }

    #[tokio::test]
    async fn events_follow_the_lifecycle_order() {
        let site = Site::new();
        site.engine.navigate("/about").await;

        assert_eq!(
            site.kinds(),
            vec![
                EventKind::NavigateBefore,
                EventKind::PrefetchBefore,
                EventKind::PrefetchComplete,
                EventKind::NavigateComplete,
                EventKind::RenderBefore,
                EventKind::Loading,
                EventKind::RenderComplete,
                EventKind::LoadProgress,
                EventKind::LoadProgress,
                EventKind::LoadComplete,
                EventKind::EngineComplete,
            ]
        );

        let events = site.events.lock().unwrap();
        assert_eq!(
            events[0].detail,
            EventDetail::Route {
                from: NormalizedUrl::root(),
                to: NormalizedUrl::from_path("/about"),
            }
        );
        let progress: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::LoadProgress)
            .map(|e| e.detail.clone())
            .collect();
        assert_eq!(
            progress,
            vec![
                EventDetail::Progress {
                    total: 1,
                    complete: 0
                },
                EventDetail::Progress {
                    total: 1,
                    complete: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn failed_script_still_completes_the_load() {
        let site = Site::with_loader(
            EngineConfig::for_origin(ORIGIN),
            fetcher(),
            MockScriptLoader::new().fail("/js/about.js"),
            Document::parse(HOME),
        );

        assert_eq!(site.engine.navigate("/about").await, rendered("/about"));
        assert_eq!(site.count(EventKind::LoadComplete), 1);
        assert!(!site.engine.is_locked());
    }

    #[tokio::test]
    async fn busy_flag_is_set_during_the_cycle() {
        let site = Site::new();
        let seen = Arc::new(Mutex::new(None));
        {
            let engine = site.engine.clone();
            let seen = Arc::clone(&seen);
            site.engine.once(EventKind::RenderBefore, move |_| {
                let busy = engine.with_document(|doc| {
                    doc.document_element()
                        .and_then(|root| doc.attr(root, "aria-busy"))
                        .map(str::to_string)
                });
                *seen.lock().unwrap() = busy;
            });
        }

        site.engine.navigate("/about").await;

        assert_eq!(seen.lock().unwrap().as_deref(), Some("true"));
        assert_eq!(site.busy().as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn scroll_resets_to_top_unless_the_link_is_static() {
        let site = Site::new();
        site.browser.set_scroll(ScrollPosition(0.0, 300.0));
        site.engine.navigate("/about").await;
        assert_eq!(site.browser.scroll_position(), ScrollPosition::TOP);

        site.browser.set_scroll(ScrollPosition(0.0, 300.0));
        let blog = site.engine.find_link("/blog").unwrap();
        let outcome = site
            .engine
            .activate(LinkActivation::new("/blog").on_link(blog))
            .await;

        assert_eq!(outcome, rendered("/blog"));
        assert_eq!(site.browser.scroll_position(), ScrollPosition(0.0, 300.0));
        let entry = HistoryEntry::from_state(&site.browser.history_state().unwrap()).unwrap();
        assert_eq!(entry.scroll, ScrollPosition(0.0, 300.0));
        assert_eq!(entry.page, NormalizedUrl::from_path("/blog"));
    }

    #[tokio::test]
    async fn engine_is_unlocked_when_load_complete_fires() {
        let site = Site::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        {
            let engine = site.engine.clone();
            let tx = Mutex::new(Some(tx));
            site.engine.once(EventKind::LoadComplete, move |_| {
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(engine.is_locked());
                }
            });
        }

        let (first, second) = tokio::join!(site.engine.navigate("/about"), async {
            let locked = rx.await.unwrap();
            (locked, site.engine.navigate("/blog").await)
        });

        assert_eq!(first, rendered("/about"));
        assert_eq!(second, (false, rendered("/blog")));
        assert_eq!(site.title(), "Blog");
    }

    #[tokio::test]
    async fn merge_element_inside_a_region_appears_once() {
        let site = Site::with(
            EngineConfig::for_origin(ORIGIN),
            fetcher().with_page("https://site.test/notice", NOTICE),
            Document::parse(HOME),
        );
        let toasts = |site: &Site| {
            site.engine.with_document(|doc| {
                doc.select_attr("data-bolt-merge")
                    .into_iter()
                    .filter(|&n| doc.attr(n, "data-bolt-merge") == Some("toast"))
                    .map(|n| doc.parent(n) == Some(doc.select_attr("data-bolt")[0]))
                    .collect::<Vec<_>>()
            })
        };

        assert_eq!(site.engine.navigate("/notice").await, rendered("/notice"));
        assert_eq!(toasts(&site), vec![true]);

        assert_eq!(site.engine.navigate("/about").await, rendered("/about"));
        assert!(toasts(&site).is_empty());

        assert_eq!(site.engine.navigate("/notice").await, rendered("/notice"));
        assert_eq!(toasts(&site), vec![true]);
    }

    #[tokio::test]
    async fn live_document_stays_bounded_across_navigations() {
        let site = Site::new();
        let mut sizes = Vec::new();

        for i in 0..24 {
            let path = if i % 2 == 0 { "/about" } else { "/" };
            assert_eq!(site.engine.navigate(path).await, rendered(path));
            let (mutations, size) = site
                .engine
                .with_document(|doc| (doc.mutation_count(), doc.arena_len()));
            assert_eq!(mutations, 0);
            sizes.push(size);
        }

        let first_round = sizes[..4].iter().max().copied().unwrap();
        assert!(sizes[4..].iter().all(|&n| n <= first_round), "{:?}", sizes);
    }
}

// =============================================================================
// Activations That Do Not Navigate
// =============================================================================

mod ignored {
    use super::*;

    #[tokio::test]
    async fn same_url_does_nothing() {
        let site = Site::new();

        for href in ["/", "/#top", "https://site.test/"] {
            assert_eq!(
                site.engine.navigate(href).await,
                ActivationOutcome::Ignored(IgnoreReason::SameUrl)
            );
        }

        assert!(site.kinds().is_empty());
        assert_eq!(site.fetcher.call_count(), 0);
        assert!(site.pushed().is_empty());
    }

    #[tokio::test]
    async fn modifier_keys_leave_the_click_to_the_platform() {
        let site = Site::new();
        let activation = LinkActivation::new("/about").with_modifiers(Modifiers {
            shift: true,
            ..Default::default()
        });

        assert_eq!(
            site.engine.activate(activation).await,
            ActivationOutcome::NotIntercepted
        );
        assert!(site.kinds().is_empty());
        assert_eq!(site.fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn external_links_are_not_intercepted() {
        let site = Site::new();
        assert_eq!(
            site.engine.navigate("https://elsewhere.test/about").await,
            ActivationOutcome::NotIntercepted
        );
        assert!(site.kinds().is_empty());
    }

    #[tokio::test]
    async fn second_navigation_is_rejected_while_locked() {
        let site = Site::with(
            EngineConfig::for_origin(ORIGIN),
            fetcher().with_delay(Duration::from_millis(50)),
            Document::parse(HOME),
        );

        let (first, second) = tokio::join!(site.engine.navigate("/about"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(site.engine.is_locked());
            site.engine.navigate("/blog").await
        });

        assert_eq!(first, rendered("/about"));
        assert_eq!(second, ActivationOutcome::Ignored(IgnoreReason::Locked));
        assert_eq!(site.fetcher.calls(), vec!["https://site.test/about".to_string()]);
        assert_eq!(site.count(EventKind::NavigateBefore), 1);
    }

    #[tokio::test]
    async fn disabled_engine_intercepts_nothing() {
        let site = Site::new();
        site.engine.disable();

        assert_eq!(
            site.engine.navigate("/about").await,
            ActivationOutcome::NotIntercepted
        );
        let state = site.browser.history_state();
        assert_eq!(site.engine.popstate(state).await, PopOutcome::Native);
        assert!(site.kinds().is_empty());
    }
}

// =============================================================================
// Prefetch
// =============================================================================

mod prefetch {
    use super::*;

    #[tokio::test]
    async fn prefetched_page_is_not_fetched_again() {
        let site = Site::new();

        let first = site.engine.prefetch("/about").await.unwrap();
        let second = site.engine.prefetch("/about").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert_eq!(site.engine.navigate("/about").await, rendered("/about"));
        assert_eq!(site.fetcher.call_count(), 1);
        assert_eq!(site.count(EventKind::PrefetchBefore), 1);
    }

    #[tokio::test]
    async fn hover_prefetches_once() {
        let site = Site::new();
        let about = site.engine.find_link("/about").unwrap();

        assert!(site.engine.link_hovered(about).await);
        assert!(!site.engine.link_touched(about).await);
        assert!(!site.engine.link_hovered(about).await);
        assert_eq!(site.fetcher.call_count(), 1);
        assert!(site.engine.cache().contains(&NormalizedUrl::from_path("/about")));
    }

    #[tokio::test]
    async fn viewport_strategy_prefetches_on_visibility() {
        let mut config = EngineConfig::for_origin(ORIGIN);
        config.strategy = PrefetchStrategy::Viewport;
        let site = Site::with(config, fetcher(), Document::parse(HOME));
        let about = site.engine.find_link("/about").unwrap();

        assert!(!site.engine.link_hovered(about).await);
        assert!(site.engine.link_visible(about).await);
        assert_eq!(site.fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn eager_strategy_prefetches_every_link() {
        let mut config = EngineConfig::for_origin(ORIGIN);
        config.strategy = PrefetchStrategy::Eager;
        let site = Site::with(config, fetcher(), Document::parse(HOME));

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(site.engine.cache().contains(&NormalizedUrl::from_path("/about")));
        assert!(site.engine.cache().contains(&NormalizedUrl::from_path("/blog")));
    }

    #[tokio::test]
    async fn links_are_rebound_after_render() {
        let site = Site::new();
        let before = site.engine.find_link("/about").unwrap();
        assert!(site.engine.link_hovered(before).await);
        assert!(!site.engine.link_hovered(before).await);

        site.engine.navigate("/blog").await;

        let after = site.engine.find_link("/about").unwrap();
        assert_eq!(site.engine.link_count(), 2);
        assert!(site.engine.link(after).is_some());
        assert!(site.engine.link_hovered(after).await);
    }
}

// =============================================================================
// Intercept Gate
// =============================================================================

mod intercept {
    use super::*;

    #[tokio::test]
    async fn pause_in_render_before_holds_the_cycle() {
        let site = Site::new();
        pause_on(&site.engine, EventKind::RenderBefore);
        let started = Instant::now();

        let (outcome, ()) = tokio::join!(site.engine.navigate("/about"), async {
            until_paused(&site.engine).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(site.kinds().last(), Some(&EventKind::RenderBefore));
            assert!(site.engine.is_locked());
            assert!(site.engine.resume());
        });

        assert_eq!(outcome, rendered("/about"));
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(site.count(EventKind::LoadComplete), 1);
        assert!(!site.engine.intercept().is_paused());
    }

    #[tokio::test]
    async fn transition_can_pause_before_the_fetch() {
        let site = Site::new();
        let routes = Arc::new(Mutex::new(Vec::new()));
        {
            let routes = Arc::clone(&routes);
            site.engine
                .register_transition(Transition::new("slide", move |engine, args| {
                    routes.lock().unwrap().push(args.to.clone());
                    engine.pause();
                }))
                .unwrap();
        }
        let blog = site.engine.find_link("/blog").unwrap();

        let (outcome, ()) = tokio::join!(
            site.engine.activate(LinkActivation::new("/blog").on_link(blog)),
            async {
                until_paused(&site.engine).await;
                assert_eq!(site.fetcher.call_count(), 0);
                site.engine.resume();
            }
        );

        assert_eq!(outcome, rendered("/blog"));
        assert_eq!(*routes.lock().unwrap(), vec![NormalizedUrl::from_path("/blog")]);
    }

    #[tokio::test]
    async fn watchdog_reports_a_slow_render() {
        let mut config = EngineConfig::for_origin(ORIGIN);
        config.render_timeout_ms = 30;
        let site = Site::with(config, fetcher(), Document::parse(HOME));
        pause_on(&site.engine, EventKind::Loading);

        tokio::join!(site.engine.navigate("/about"), async {
            until_paused(&site.engine).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            site.engine.resume();
        });

        assert_eq!(site.count(EventKind::LoadTimeout), 1);
        assert_eq!(site.count(EventKind::LoadComplete), 1);
    }

    #[tokio::test]
    async fn fast_render_never_times_out() {
        let mut config = EngineConfig::for_origin(ORIGIN);
        config.render_timeout_ms = 30;
        let site = Site::with(config, fetcher(), Document::parse(HOME));

        site.engine.navigate("/about").await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(site.count(EventKind::LoadTimeout), 0);
    }
}

// =============================================================================
// History Traversal
// =============================================================================

mod history {
    use super::*;

    #[tokio::test]
    async fn back_renders_the_cached_entry() {
        let site = Site::new();
        site.engine.navigate("/about").await;
        let calls = site.fetcher.call_count();

        let state = site.browser.back().unwrap();
        let outcome = site.engine.popstate(state).await;

        assert_eq!(
            outcome,
            PopOutcome::Navigated(NavigationOutcome::Rendered(NormalizedUrl::root()))
        );
        assert_eq!(site.title(), "Home");
        assert_eq!(site.main_text(), "Welcome");
        assert_eq!(site.fetcher.call_count(), calls);
        assert_eq!(site.count(EventKind::NavigatePopBefore), 1);
    }

    #[tokio::test]
    async fn entry_without_payload_is_left_to_the_platform() {
        let site = Site::new();

        assert_eq!(site.engine.popstate(None).await, PopOutcome::Native);
        assert_eq!(
            site.engine
                .popstate(Some(serde_json::json!({ "foreign": true })))
                .await,
            PopOutcome::Native
        );

        let traversals = site
            .browser
            .operations()
            .into_iter()
            .filter(|op| *op == BrowserOp::NativeTraversal)
            .count();
        assert_eq!(traversals, 2);
        assert!(site.kinds().is_empty());
    }

    #[tokio::test]
    async fn last_popstate_wins() {
        let site = Site::new();
        site.engine.navigate("/about").await;
        site.engine.navigate("/blog").await;
        pause_on(&site.engine, EventKind::RenderBefore);

        let to_about = site.browser.back().unwrap();
        let (first, deferred) = tokio::join!(site.engine.popstate(to_about), async {
            until_paused(&site.engine).await;
            let to_home = site.browser.back().unwrap();
            let outcome = site.engine.popstate(to_home).await;
            site.engine.resume();
            outcome
        });

        assert_eq!(deferred, PopOutcome::Deferred);
        assert_eq!(
            first,
            PopOutcome::Navigated(NavigationOutcome::Rendered(NormalizedUrl::from_path(
                "/about"
            )))
        );
        assert_eq!(site.engine.current_url(), NormalizedUrl::root());
        assert_eq!(site.title(), "Home");
        assert_eq!(site.count(EventKind::NavigatePopBefore), 2);
        assert!(!site.engine.is_locked());
    }

    #[tokio::test]
    async fn back_during_a_navigation_wins_over_it() {
        let site = Site::new();
        site.engine.navigate("/about").await;
        site.engine.pause();

        let (outcome, pop) = tokio::join!(site.engine.navigate("/blog"), async {
            while !site.engine.is_locked() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let to_home = site.browser.back().unwrap();
            let pop = site.engine.popstate(to_home).await;
            site.engine.resume();
            pop
        });

        assert_eq!(pop, PopOutcome::Deferred);
        assert_eq!(
            outcome,
            ActivationOutcome::Navigated(NavigationOutcome::Superseded(NormalizedUrl::from_path(
                "/blog"
            )))
        );
        assert_eq!(site.engine.current_url(), NormalizedUrl::root());
        assert_eq!(site.browser.location(), "https://site.test/");
        assert_eq!(site.title(), "Home");
        assert_eq!(site.pushed(), vec!["https://site.test/about".to_string()]);
        assert!(!site.engine.is_locked());
    }
}

// =============================================================================
// Failure Paths
// =============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn fetch_failure_falls_back_to_native_navigation() {
        let site = Site::with(
            EngineConfig::for_origin(ORIGIN),
            fetcher().fail("https://site.test/broken"),
            Document::parse(HOME),
        );

        let outcome = site.engine.navigate("/broken").await;

        assert_eq!(
            outcome,
            ActivationOutcome::Navigated(NavigationOutcome::NativeFallback(
                "https://site.test/broken".to_string()
            ))
        );
        assert!(site.browser.operations().contains(&BrowserOp::Assign {
            url: "https://site.test/broken".to_string()
        }));
        assert!(!site.engine.is_locked());
        assert_eq!(site.busy().as_deref(), Some("false"));
        assert_eq!(site.count(EventKind::NavigateComplete), 0);
        assert!(site.pushed().is_empty());
    }

    #[tokio::test]
    async fn missing_page_falls_back_too() {
        let site = Site::new();
        let outcome = site.engine.navigate("/nowhere").await;
        assert!(matches!(
            outcome,
            ActivationOutcome::Navigated(NavigationOutcome::NativeFallback(_))
        ));
        assert!(!site.engine.is_locked());
    }

    #[tokio::test]
    async fn render_failure_unlocks_the_engine() {
        let site = Site::with(EngineConfig::for_origin(ORIGIN), fetcher(), Document::new());

        let outcome = site.engine.navigate("/about").await;

        assert_eq!(
            outcome,
            ActivationOutcome::Navigated(NavigationOutcome::NativeFallback(
                "https://site.test/about".to_string()
            ))
        );
        assert!(!site.engine.is_locked());
        assert!(!site.engine.intercept().is_paused());
        assert_eq!(site.count(EventKind::LoadComplete), 0);
        assert_eq!(site.count(EventKind::EngineComplete), 1);

        // The engine accepts the next navigation.
        site.engine.navigate("/blog").await;
        assert_eq!(site.count(EventKind::NavigateBefore), 2);
    }
}
