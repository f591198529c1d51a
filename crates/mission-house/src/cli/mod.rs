//! CLI subcommand implementations for the `mission-house` binary.

pub mod fetch_cmd;
pub mod naplan_cmd;
pub mod output;
pub mod property_cmd;
pub mod schools_cmd;
pub mod score_cmd;

use crate::config::AcquireConfig;
use crate::pipeline::AcquisitionPipeline;
use crate::renderer::chromium::{find_chromium, ChromiumRenderer};
use crate::renderer::{NoopRenderer, Renderer};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Load configuration and build a pipeline.
///
/// Falls back to fetch-only mode when no Chromium binary can be found.
pub fn build_pipeline(config_path: Option<&Path>) -> Result<AcquisitionPipeline> {
    let config = AcquireConfig::load(config_path).context("failed to load configuration")?;

    let renderer: Arc<dyn Renderer> = if find_chromium(config.browser.chromium_path.as_ref()).is_some() {
        Arc::new(ChromiumRenderer::new(config.browser.clone()))
    } else {
        warn!("Chromium not found; browser flows are unavailable");
        Arc::new(NoopRenderer)
    };

    AcquisitionPipeline::new(config, renderer).context("failed to build acquisition pipeline")
}
