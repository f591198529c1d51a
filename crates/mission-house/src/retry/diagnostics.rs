//! Best-effort failure snapshots.

use crate::config::DiagnosticsConfig;
use crate::live::AutomationSession;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Writes a full-page PNG of the session when a flow attempt fails.
///
/// Capture never fails the caller: errors and timeouts are logged and
/// reported as `None`.
#[derive(Debug, Clone)]
pub struct DiagnosticsCapture {
    enabled: bool,
    dir: PathBuf,
    prefix: String,
    timeout: Duration,
}

impl DiagnosticsCapture {
    pub fn new(config: &DiagnosticsConfig) -> Self {
        Self {
            enabled: config.enabled,
            dir: config.dir.clone(),
            prefix: config.prefix.clone(),
            timeout: config.capture_timeout(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::new(),
            prefix: String::new(),
            timeout: Duration::ZERO,
        }
    }

    /// `<dir>/<prefix>-<flow>-<timestamp>.png`
    pub fn path_for(&self, flow: &str, at: DateTime<Utc>) -> PathBuf {
        let stamp = at.format("%Y%m%dT%H%M%S%3fZ");
        self.dir.join(format!("{}-{}-{}.png", self.prefix, flow, stamp))
    }

    pub async fn capture(&self, session: &AutomationSession, flow: &str) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let path = self.path_for(flow, Utc::now());
        match tokio::time::timeout(self.timeout, session.snapshot(&path)).await {
            Ok(Ok(written)) => {
                tracing::info!("saved failure snapshot to {}", written.display());
                Some(written)
            }
            Ok(Err(e)) => {
                tracing::warn!("could not capture failure snapshot: {e}");
                None
            }
            Err(_) => {
                tracing::warn!(
                    "failure snapshot timed out after {}ms",
                    self.timeout.as_millis()
                );
                None
            }
        }
    }
}
