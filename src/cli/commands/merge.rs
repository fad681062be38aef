//! merge command - Merge an incoming page into a current one offline
//!
//! Runs the same document passes a navigation runs, in the same order, then
//! plans and injects script changes. Nothing is fetched or executed.

use std::path::Path;

use anyhow::{anyhow, Context as _, Result};

use super::{extractor, read_html};
use crate::core::config::EngineConfig;
use crate::dom::Document;
use crate::merge::{DocumentMerger, ScriptReconciler};

/// Merge `incoming` into `current` and print the merged document.
pub fn merge(config: &EngineConfig, current: &Path, incoming: &Path) -> Result<()> {
    let extractor = extractor(config);
    let mut live = Document::parse(&read_html(current)?);
    let next = extractor.incoming(&read_html(incoming)?);
    if next.document.body().is_none() {
        return Err(anyhow!("'{}' has no <body>", incoming.display()));
    }

    let merger = DocumentMerger::new(config.markers.clone());
    let before = extractor.extract(&live);
    merger
        .merge_links(&mut live, &before, &next)
        .context("Failed to merge head links")?;
    merger
        .merge_content(&mut live, &before, &next)
        .context("Failed to merge document content")?;

    let merged = extractor.extract(&live);
    let scripts = ScriptReconciler::new(config.cache_bust_param.clone());
    let plan = scripts.plan(&merged, &next.snapshot);
    let pending = scripts
        .apply(&mut live, &plan, &next.document)
        .context("Failed to apply script changes")?;

    tracing::info!(
        "merged {} mutations, {} scripts removed, {} injected",
        live.mutation_count(),
        plan.remove.len(),
        pending.len()
    );
    println!("{}", live.to_html());
    Ok(())
}
