//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). Flows only
//! talk to these traits, which keeps them testable without a browser.

pub mod chromium;
pub mod stealth;

use crate::error::{AcquireError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// The document's load event fired.
    ContentLoaded,
    /// Loaded, and no new network resources for a quiet window.
    NetworkIdle,
}

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to reach the requested readiness in milliseconds.
    pub load_time_ms: u64,
}

/// Launches rendering sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Launch a browser with one page, ready for navigation.
    async fn launch(&self) -> Result<Box<dyn RenderContext>>;
    /// Number of sessions launched and not yet closed.
    fn active_contexts(&self) -> usize;
}

/// A live browser instance with one active page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL and wait for `readiness`, at most `timeout`.
    async fn navigate(
        &mut self,
        url: &str,
        readiness: Readiness,
        timeout: Duration,
    ) -> Result<NavigationResult>;
    /// Reload the current page from the network.
    async fn reload(&mut self, readiness: Readiness, timeout: Duration) -> Result<NavigationResult>;
    /// Wait for the next main-frame navigation. `false` when none happened in time.
    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<bool>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Number of elements matching `selector`.
    async fn element_count(&self, selector: &str) -> Result<usize>;
    /// Click the `index`-th element matching `selector`.
    async fn click(&self, selector: &str, index: usize) -> Result<()>;
    /// Focus the element and send `text` as key events.
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;
    /// Press a named key (e.g. "Enter") on the element.
    async fn press_key(&self, selector: &str, key: &str) -> Result<()>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Capture a full-page PNG.
    async fn screenshot(&self) -> Result<Vec<u8>>;
    /// Close the page and shut the browser down.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A renderer used when Chromium is unavailable.
///
/// Fetch-only paths (pasted HTML, plain retrieval) keep working; any flow
/// that needs a browser fails with [`AcquireError::Browser`].
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn launch(&self) -> Result<Box<dyn RenderContext>> {
        Err(AcquireError::Browser(
            "browser not available, fetch-only mode".to_string(),
        ))
    }

    fn active_contexts(&self) -> usize {
        0
    }
}
