//! `mission-house fetch <url>`: plain HTTP retrieval, no browser.

use super::output;
use crate::pipeline::AcquisitionPipeline;
use anyhow::Result;

pub async fn run(pipeline: &AcquisitionPipeline, url: &str) -> Result<()> {
    let result = pipeline.fetch(url).await?;
    tracing::info!(
        "{} -> {} ({} redirect(s), {} bytes)",
        result.url,
        result.final_url,
        result.redirect_chain.len(),
        result.body.len()
    );
    output::print_json(&result);
    Ok(())
}
