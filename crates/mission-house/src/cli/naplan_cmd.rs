//! `mission-house naplan <school>`: NAPLAN results for a school.

use super::output;
use crate::pipeline::AcquisitionPipeline;
use crate::types::SchoolType;
use anyhow::Result;
use serde_json::json;

/// Run the lookup. The quality score uses `category`, or one inferred from
/// the school's name.
pub async fn run(pipeline: &AcquisitionPipeline, school: &str, category: Option<SchoolType>) -> Result<()> {
    let scores = pipeline.lookup_assessment(school).await?;
    let category = category.unwrap_or_else(|| SchoolType::infer_from_name(school));
    let quality = pipeline.scorer().score(&scores, category);

    output::print_json(&json!({
        "school": school,
        "category": category,
        "naplan": scores,
        "quality": quality,
    }));
    Ok(())
}
