//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each handler reads its inputs, runs the library operation and prints the
//! result on stdout. Diagnostics go through `tracing` on stderr.
//!
//! # Async Commands
//!
//! `visit` drives a real engine against the network and runs on a tokio
//! runtime created for the command. The other commands are synchronous.

mod completion;
mod inspect;
mod merge;
mod visit;

pub use completion::completion;
pub use inspect::inspect;
pub use merge::merge;
pub use visit::visit;

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};

use super::args::Command;
use crate::core::config::{Config, EngineConfig};
use crate::snapshot::{ProtectedScript, SnapshotExtractor};

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Inspect { file } => inspect(&config.engine, &file),
        Command::Merge { current, incoming } => merge(&config.engine, &current, &incoming),
        Command::Visit {
            url,
            paths,
            print_html,
        } => visit(&config.engine, &url, &paths, print_html),
        Command::Completion { shell } => completion(shell),
    }
}

fn read_html(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

/// Extractor for offline commands, honoring the configured markers and
/// protected script.
fn extractor(config: &EngineConfig) -> SnapshotExtractor {
    SnapshotExtractor::new(
        config.markers.clone(),
        config.protected_script.as_deref().map(ProtectedScript::new),
    )
}
