//! core
//!
//! Shared domain types for boltnav.
//!
//! # Modules
//!
//! - [`config`] - Configuration schema and loading
//! - [`markers`] - Marker attribute names that opt elements into behavior
//! - [`types`] - Strong types: NormalizedUrl, UrlResolver, HistoryEntry

pub mod config;
pub mod markers;
pub mod types;
