//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Read engine settings from this file
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// boltnav - drive and inspect the document-swapping navigation engine
#[derive(Parser, Debug)]
#[command(name = "boltnav")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the snapshot of an HTML file as JSON
    Inspect {
        /// HTML file to snapshot
        file: PathBuf,
    },

    /// Merge one HTML page into another and print the result
    ///
    /// Runs every document pass and plans script changes, but loads no
    /// scripts.
    Merge {
        /// Page currently displayed
        current: PathBuf,
        /// Page being navigated to
        incoming: PathBuf,
    },

    /// Load a live page and navigate it through a sequence of paths
    Visit {
        /// Absolute URL of the starting page
        url: String,

        /// Same-origin paths to navigate to, in order
        paths: Vec<String>,

        /// Print the final document
        #[arg(long)]
        print_html: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
