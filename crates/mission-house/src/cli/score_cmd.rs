//! `mission-house score <scores.json>`: score saved NAPLAN results offline.

use super::output;
use crate::scoring::QualityScorer;
use crate::types::{AssessmentScoreSet, SchoolType};
use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;

pub async fn run(path: &Path, category: SchoolType) -> Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let scores: AssessmentScoreSet =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a score set", path.display()))?;

    let quality = QualityScorer::new().score(&scores, category);
    if quality.is_none() {
        tracing::warn!("no {category} year levels with scores in {}", path.display());
    }
    output::print_json(&json!({ "category": category, "quality": quality }));
    Ok(())
}
