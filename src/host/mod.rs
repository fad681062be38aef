//! host
//!
//! The platform the engine runs against.
//!
//! # Modules
//!
//! - `traits`: [`Fetcher`], [`ScriptLoader`] and [`Browser`] seams
//! - [`http`]: `reqwest`-backed fetcher and script loader
//! - [`memory`]: in-memory session history and scroll
//! - [`mock`]: deterministic fetcher and script loader for tests

pub mod http;
pub mod memory;
pub mod mock;
mod traits;

pub use http::{HttpFetcher, HttpScriptLoader};
pub use memory::{BrowserOp, MemoryBrowser};
pub use mock::{MockFetcher, MockScriptLoader};
pub use traits::*;
