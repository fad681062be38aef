//! inspect command - Print the snapshot of a page

use std::path::Path;

use anyhow::{Context as _, Result};

use super::{extractor, read_html};
use crate::core::config::EngineConfig;

/// Snapshot `file` and print the summary as pretty JSON.
pub fn inspect(config: &EngineConfig, file: &Path) -> Result<()> {
    let html = read_html(file)?;
    let page = extractor(config).incoming(&html);
    let summary = page.snapshot.summary(&page.document);

    let json = serde_json::to_string_pretty(&summary).context("Failed to serialize snapshot")?;
    println!("{}", json);
    Ok(())
}
