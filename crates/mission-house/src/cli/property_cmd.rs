//! `mission-house property <url>`: acquire and enrich one listing.

use super::output;
use crate::pipeline::{AcquisitionPipeline, EnrichOptions};
use anyhow::{Context, Result};
use std::path::Path;

/// Run the property command.
///
/// With `html`, the listing is read from a saved page instead of loaded.
pub async fn run(
    pipeline: &AcquisitionPipeline,
    url: &str,
    html: Option<&Path>,
    skip_schools: bool,
) -> Result<()> {
    let property = match html {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            pipeline.property_from_html(&raw, Some(url))?
        }
        None => pipeline.acquire_property(url).await?,
    };

    let enriched = pipeline
        .enrich(property, EnrichOptions { skip_schools })
        .await
        .context("school lookup failed; rerun with --skip-schools to save without schools")?;

    output::print_json(&enriched);
    Ok(())
}
