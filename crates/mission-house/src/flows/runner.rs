//! Runs a flow under the retry policy.
//!
//! Each attempt gets its own session and its own deadline. A failed attempt
//! is snapshotted (best effort) before the session closes; the session is
//! closed on every path.

use super::SiteFlow;
use crate::config::{AcquireConfig, BrowserConfig};
use crate::deadline::Deadline;
use crate::error::Result;
use crate::live::AutomationSession;
use crate::renderer::Renderer;
use crate::retry::{DiagnosticsCapture, RetryPolicy};
use crate::types::FlowResult;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Launches sessions and drives flows through retries.
#[derive(Clone)]
pub struct FlowRunner {
    renderer: Arc<dyn Renderer>,
    browser: BrowserConfig,
    policy: RetryPolicy,
    diagnostics: DiagnosticsCapture,
}

impl FlowRunner {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        browser: BrowserConfig,
        policy: RetryPolicy,
        diagnostics: DiagnosticsCapture,
    ) -> Self {
        Self {
            renderer,
            browser,
            policy,
            diagnostics,
        }
    }

    pub fn from_config(renderer: Arc<dyn Renderer>, config: &AcquireConfig) -> Self {
        Self::new(
            renderer,
            config.browser.clone(),
            RetryPolicy::from_config(&config.retry),
            DiagnosticsCapture::new(&config.diagnostics),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `flow` until it succeeds or the policy gives up.
    ///
    /// The final error is `RetriesExhausted` carrying the attempt count and
    /// the last underlying failure.
    pub async fn run<F: SiteFlow>(&self, flow: &F) -> Result<FlowResult<F::Output>> {
        let last_snapshot: Mutex<Option<PathBuf>> = Mutex::new(None);
        let slot = &last_snapshot;

        let outcome = self
            .policy
            .run(flow.name(), move |attempt| self.attempt(flow, attempt, slot))
            .await;

        let snapshot = last_snapshot.lock().ok().and_then(|mut s| s.take());
        match outcome {
            Ok((payload, attempts)) => Ok(FlowResult::succeeded(payload, attempts, snapshot)),
            Err(e) => {
                if let Some(path) = snapshot {
                    warn!("{} failed; last snapshot at {}", flow.name(), path.display());
                }
                Err(e)
            }
        }
    }

    async fn attempt<F: SiteFlow>(
        &self,
        flow: &F,
        attempt: u32,
        last_snapshot: &Mutex<Option<PathBuf>>,
    ) -> Result<F::Output> {
        info!(
            "{} attempt {attempt}/{}",
            flow.name(),
            self.policy.max_attempts
        );
        let deadline = Deadline::after(self.browser.flow_budget());
        let mut session = AutomationSession::open(self.renderer.as_ref(), &self.browser).await?;

        let result = flow.run(&mut session, &deadline).await;

        if result.is_err() {
            if let Some(path) = self.diagnostics.capture(&session, flow.name()).await {
                if let Ok(mut slot) = last_snapshot.lock() {
                    *slot = Some(path);
                }
            }
        }

        if let Err(e) = session.close().await {
            warn!("closing {} session failed: {e}", flow.name());
        }
        result
    }
}
