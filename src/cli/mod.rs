//! cli
//!
//! Command-line interface for boltnav.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration
//! - Delegate to command handlers
//!
//! The CLI layer is thin. Documents are merged by [`crate::merge`] and
//! navigations are driven through [`crate::engine`].

pub mod args;
pub mod commands;

pub use args::{Cli, Command, Shell};

use crate::core::config::Config;
use anyhow::{Context as _, Result};

/// Run the CLI application with already parsed arguments.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let loaded = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = loaded.config.loaded_from() {
        tracing::debug!("using config from {}", path.display());
    }

    commands::dispatch(cli.command, &loaded.config)
}
