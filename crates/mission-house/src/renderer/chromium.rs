//! Chromium-based renderer using chromiumoxide.

use super::stealth;
use super::{NavigationResult, Readiness, RenderContext, Renderer};
use crate::config::BrowserConfig;
use crate::error::{AcquireError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, EventFrameNavigated,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const CHROMIUM_ENV: &str = "MISSION_HOUSE_CHROMIUM_PATH";

/// Quiet window after which the network counts as idle.
const NETWORK_IDLE_MS: u64 = 1_000;

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    // 1. Configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // 2. MISSION_HOUSE_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 3. ~/.mission-house/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".mission-house/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".mission-house/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            ]
        } else {
            vec![
                home.join(".mission-house/chromium/chrome-linux64/chrome"),
                home.join(".mission-house/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 4. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 5. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

fn cdp_err(context: &str, e: impl std::fmt::Display) -> AcquireError {
    AcquireError::Browser(format!("{context}: {e}"))
}

/// Launches one headed (by default) Chromium per session.
pub struct ChromiumRenderer {
    config: BrowserConfig,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn launch_config(&self) -> Result<LaunchConfig> {
        let chrome_path = find_chromium(self.config.chromium_path.as_ref()).ok_or_else(|| {
            AcquireError::Browser(format!("Chromium not found; set {CHROMIUM_ENV}"))
        })?;

        let mut builder = LaunchConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(self.config.window_width, self.config.window_height)
            .args(stealth::LAUNCH_ARGS.iter().copied());

        // chromiumoxide launches headless unless told otherwise.
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder
            .build()
            .map_err(|e| AcquireError::Browser(format!("failed to build browser config: {e}")))
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn launch(&self) -> Result<Box<dyn RenderContext>> {
        let (browser, mut handler) = Browser::launch(self.launch_config()?)
            .await
            .map_err(|e| cdp_err("failed to launch Chromium", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("chromiumoxide handler event error: {e}");
                }
            }
        });

        let mut context = ChromiumContext {
            browser,
            page: None,
            handler_task,
            active_count: Arc::clone(&self.active_count),
        };
        self.active_count.fetch_add(1, Ordering::Relaxed);

        // Countermeasures must be in place before the first real navigation.
        if let Err(e) = context.prepare_page(&self.config.user_agent).await {
            let _ = Box::new(context).close().await;
            return Err(e);
        }

        Ok(Box::new(context))
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A launched browser and its single page.
pub struct ChromiumContext {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn prepare_page(&mut self, user_agent: &str) -> Result<()> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| cdp_err("failed to create page", e))?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            stealth::STEALTH_SCRIPT,
        ))
        .await
        .map_err(|e| cdp_err("failed to inject stealth script", e))?;

        let mut ua = SetUserAgentOverrideParams::new(user_agent);
        ua.accept_language = Some(stealth::ACCEPT_LANGUAGE.to_string());
        page.execute(ua)
            .await
            .map_err(|e| cdp_err("failed to override user agent", e))?;

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AcquireError::Browser("page not initialized".to_string()))
    }

    async fn wait_ready(&self, readiness: Readiness, budget: Duration) -> Result<()> {
        if readiness == Readiness::NetworkIdle {
            wait_for_network_idle(self.page()?, budget).await?;
        }
        Ok(())
    }

    async fn current_url(&self, fallback: &str) -> String {
        match self.page() {
            Ok(page) => page
                .url()
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| fallback.to_string()),
            Err(_) => fallback.to_string(),
        }
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(
        &mut self,
        url: &str,
        readiness: Readiness,
        timeout: Duration,
    ) -> Result<NavigationResult> {
        let start = Instant::now();
        let page = self.page()?;

        let result = tokio::time::timeout(timeout, async {
            page.goto(url)
                .await
                .map_err(|e| cdp_err("navigation failed", e))?;
            self.wait_ready(readiness, timeout.saturating_sub(start.elapsed()))
                .await
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(NavigationResult {
                final_url: self.current_url(url).await,
                load_time_ms: start.elapsed().as_millis() as u64,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AcquireError::timeout(format!("navigate {url}"), start.elapsed())),
        }
    }

    async fn reload(&mut self, readiness: Readiness, timeout: Duration) -> Result<NavigationResult> {
        let start = Instant::now();
        let page = self.page()?;

        let result = tokio::time::timeout(timeout, async {
            page.reload()
                .await
                .map_err(|e| cdp_err("reload failed", e))?;
            self.wait_ready(readiness, timeout.saturating_sub(start.elapsed()))
                .await
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(NavigationResult {
                final_url: self.current_url("").await,
                load_time_ms: start.elapsed().as_millis() as u64,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AcquireError::timeout("reload", start.elapsed())),
        }
    }

    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<bool> {
        let page = self.page()?;
        let mut events = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(|e| cdp_err("failed to subscribe to navigation events", e))?;

        let observed = tokio::time::timeout(timeout, async {
            while let Some(event) = events.next().await {
                // Only the main frame has no parent.
                if event.frame.parent_id.is_none() {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);

        if observed {
            let _ = tokio::time::timeout(timeout, page.wait_for_navigation()).await;
        }
        Ok(observed)
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| cdp_err("JS execution failed", e))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn element_count(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "document.querySelectorAll({}).length",
            serde_json::to_string(selector)?
        );
        let value = self.execute_js(&script).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn click(&self, selector: &str, index: usize) -> Result<()> {
        let elements = self
            .page()?
            .find_elements(selector)
            .await
            .map_err(|_| AcquireError::selector(selector))?;
        let element = elements
            .get(index)
            .ok_or_else(|| AcquireError::selector(format!("{selector} [{index}]")))?;
        element
            .click()
            .await
            .map_err(|e| cdp_err("click failed", e))?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| AcquireError::selector(selector))?;
        element
            .focus()
            .await
            .map_err(|e| cdp_err("focus failed", e))?;
        element
            .type_str(text)
            .await
            .map_err(|e| cdp_err("typing failed", e))?;
        Ok(())
    }

    async fn press_key(&self, selector: &str, key: &str) -> Result<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| AcquireError::selector(selector))?;
        element
            .press_key(key)
            .await
            .map_err(|e| cdp_err("key press failed", e))?;
        Ok(())
    }

    async fn get_html(&self) -> Result<String> {
        let value = self
            .execute_js("document.documentElement.outerHTML")
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AcquireError::Extraction("document HTML was not a string".to_string()))
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page()?
            .url()
            .await
            .map_err(|e| cdp_err("failed to get URL", e))?
            .unwrap_or_default();
        Ok(url)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page()?
            .screenshot(params)
            .await
            .map_err(|e| cdp_err("screenshot failed", e))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        this.active_count.fetch_sub(1, Ordering::Relaxed);
        if let Some(page) = this.page.take() {
            let _ = page.close().await;
        }
        let closed = this.browser.close().await;
        let _ = this.browser.wait().await;
        this.handler_task.abort();
        closed.map_err(|e| cdp_err("failed to close browser", e))?;
        Ok(())
    }
}

/// Poll resource timing until nothing new loads for a quiet window.
async fn wait_for_network_idle(page: &Page, budget: Duration) -> Result<()> {
    let timeout_ms = budget.as_millis().min(u128::from(u64::MAX)) as u64;
    let js = format!(
        r#"(async () => {{
            const timeoutMs = {timeout_ms};
            const idleMs = {NETWORK_IDLE_MS};
            const interval = 250;
            const start = Date.now();
            let lastCount = performance.getEntriesByType('resource').length;
            let stableMs = 0;
            while (Date.now() - start < timeoutMs) {{
                await new Promise(r => setTimeout(r, interval));
                const curCount = performance.getEntriesByType('resource').length;
                if (document.readyState === 'complete' && curCount === lastCount) {{
                    stableMs += interval;
                    if (stableMs >= idleMs) return true;
                }} else {{
                    stableMs = 0;
                }}
                lastCount = curCount;
            }}
            return false;
        }})()"#
    );

    let idle = page
        .evaluate(js)
        .await
        .map_err(|e| cdp_err("network-idle wait failed", e))?
        .value()
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if !idle {
        tracing::debug!("network did not settle within {timeout_ms}ms");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_chromium_prefers_existing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, b"").unwrap();
        assert_eq!(find_chromium(Some(&fake)), Some(fake));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigate_and_execute_js() {
        let renderer = ChromiumRenderer::new(BrowserConfig {
            headless: true,
            ..BrowserConfig::default()
        });
        let mut ctx = renderer.launch().await.expect("failed to launch");

        let nav = ctx
            .navigate(
                "data:text/html,<h1>Hello</h1><input id='q'>",
                Readiness::ContentLoaded,
                Duration::from_secs(10),
            )
            .await
            .expect("navigation failed");
        assert!(nav.load_time_ms < 10_000);

        let webdriver = ctx.execute_js("navigator.webdriver").await.unwrap();
        assert!(webdriver.is_null());

        ctx.type_text("#q", "abc").await.expect("typing failed");
        let value = ctx
            .execute_js("document.querySelector('#q').value")
            .await
            .unwrap();
        assert_eq!(value.as_str(), Some("abc"));

        let png = ctx.screenshot().await.expect("screenshot failed");
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);
    }
}
