//! `mission-house schools <address>`: zoned primary and secondary schools.

use super::output;
use crate::pipeline::AcquisitionPipeline;
use anyhow::Result;

pub async fn run(pipeline: &AcquisitionPipeline, address: &str) -> Result<()> {
    let schools = pipeline.lookup_schools(address).await?;
    output::print_json(&schools);
    Ok(())
}
