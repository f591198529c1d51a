//! Listing page behind an anti-automation challenge.

use super::{FlowStep, FlowTrace, SiteFlow};
use crate::config::PropertyFlowConfig;
use crate::deadline::Deadline;
use crate::error::{AcquireError, Result};
use crate::extraction::{extract_property, validate_property};
use crate::live::AutomationSession;
use crate::renderer::Readiness;
use crate::types::PropertyRecord;
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyState {
    Navigating,
    AwaitingChallenge,
    Rendering,
    Verifying,
    Done,
}

/// Loads a listing, sits out the challenge, and extracts the record.
pub struct PropertyPageFlow {
    url: String,
    config: PropertyFlowConfig,
}

/// Whether `url` looks like a listing page under `pattern`.
pub fn is_listing_url(url: &str, pattern: &str) -> Result<bool> {
    let re = Regex::new(pattern)
        .map_err(|e| AcquireError::InvalidTarget(format!("bad listing pattern {pattern}: {e}")))?;
    Ok(re.is_match(url))
}

impl PropertyPageFlow {
    /// Fails with `InvalidTarget` unless `url` is a listing page.
    pub fn new(url: impl Into<String>, config: PropertyFlowConfig) -> Result<Self> {
        let url = url.into();
        if !is_listing_url(&url, &config.url_pattern)? {
            return Err(AcquireError::InvalidTarget(format!(
                "not a realestate.com.au listing URL: {url}"
            )));
        }
        Ok(Self { url, config })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// A document counts as fully rendered when it carries a listing marker
    /// or is at least `min_content_bytes` long.
    pub fn is_sufficient(&self, html: &str) -> bool {
        html.len() >= self.config.min_content_bytes
            || self.config.content_markers.iter().any(|m| html.contains(m.as_str()))
    }
}

#[async_trait]
impl SiteFlow for PropertyPageFlow {
    type Output = PropertyRecord;

    fn name(&self) -> &'static str {
        "property"
    }

    async fn run(&self, session: &mut AutomationSession, deadline: &Deadline) -> Result<PropertyRecord> {
        let mut trace = FlowTrace::new(self.name(), PropertyState::Navigating);
        let challenge_timeout = session.config().challenge_timeout();
        let step_timeout = session.config().step_timeout();

        session
            .navigate(&self.url, Readiness::ContentLoaded, deadline)
            .await?;
        trace.step(
            FlowStep::Navigate { url: self.url.clone() },
            PropertyState::AwaitingChallenge,
        );

        session
            .await_challenge_resolution(challenge_timeout, deadline)
            .await?;
        trace.step(
            FlowStep::WaitFor { condition: "challenge navigation".into() },
            PropertyState::Rendering,
        );

        let ready = "document.readyState === 'complete'";
        session.wait_until(ready, step_timeout, deadline).await?;
        let mut html = session.html().await?;
        trace.step(FlowStep::Extract { what: "rendered document" }, PropertyState::Verifying);

        if !self.is_sufficient(&html) {
            let delay = Duration::from_millis(self.config.resample_delay_ms);
            tracing::warn!(
                "listing looks partially rendered ({} bytes); sampling again in {}ms",
                html.len(),
                delay.as_millis()
            );
            if deadline.remaining() > delay {
                deadline.sleep("content resample", delay).await?;
                let second = session.html().await?;
                trace.step(
                    FlowStep::Sleep { millis: self.config.resample_delay_ms },
                    PropertyState::Verifying,
                );
                if second.len() > html.len() {
                    html = second;
                }
            }
        }

        let record = extract_property(&html, &self.url, chrono::Utc::now().date_naive());
        validate_property(&record)?;
        trace.step(FlowStep::Extract { what: "property record" }, PropertyState::Done);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_url_check() {
        let config = PropertyFlowConfig::default();
        assert!(PropertyPageFlow::new(
            "https://www.realestate.com.au/property-house-vic-ashwood-1",
            config.clone()
        )
        .is_ok());
        assert!(PropertyPageFlow::new("http://realestate.com.au/property-unit-vic-x", config.clone()).is_ok());
        match PropertyPageFlow::new("https://www.domain.com.au/12-example-st", config) {
            Err(AcquireError::InvalidTarget(msg)) => assert!(msg.contains("domain.com.au")),
            other => panic!("expected invalid target, got {:?}", other.map(|f| f.url().to_string())),
        }
    }

    #[test]
    fn test_sufficiency_heuristic() {
        let flow = PropertyPageFlow::new(
            "https://www.realestate.com.au/property-house-vic-ashwood-1",
            PropertyFlowConfig::default(),
        )
        .unwrap();
        assert!(!flow.is_sufficient("<html><body>Checking your browser</body></html>"));
        assert!(flow.is_sufficient(r#"<h1 class="property-info-address">1 A St</h1>"#));
        assert!(flow.is_sufficient(&"x".repeat(50_000)));
    }
}
