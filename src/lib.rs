//! boltnav - document-swapping page navigation
//!
//! boltnav intercepts same-origin link activations, fetches (and caches) the
//! target page, and merges it into the live document instead of letting the
//! platform load it from scratch. Every navigation runs through a fixed
//! lifecycle of events that collaborators can observe and pause.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface (inspect, merge, visit)
//! - [`engine`] - Navigation controller, events, intercept gate, prefetch cache
//! - [`merge`] - Document merging and script reconciliation
//! - [`snapshot`] - Structural index of a page
//! - [`dom`] - Arena document tree with a mutation log
//! - [`host`] - Platform seams: fetching, script loading, history
//! - [`core`] - Configuration, marker attributes, URL types
//!
//! # Invariants
//!
//! 1. At most one render cycle runs at a time
//! 2. A page is fetched at most once per engine; later visits reuse the payload
//! 3. Merging identical pages mutates nothing
//! 4. Every failure path releases the engine lock

pub mod cli;
pub mod core;
pub mod dom;
pub mod engine;
pub mod host;
pub mod merge;
pub mod snapshot;
