//! Automation session for multi-step browser flows.
//!
//! A session owns one launched browser with one page for the length of a
//! single flow invocation. It layers the primitives flows need (deadline
//! bounded navigation, polling waits, human-like typing, typed in-page
//! extraction, snapshots) on top of a [`RenderContext`].

use crate::config::BrowserConfig;
use crate::deadline::Deadline;
use crate::error::{AcquireError, Result};
use crate::renderer::{NavigationResult, Readiness, RenderContext, Renderer};
use rand::Rng;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Bounds for the per-keystroke delay.
const TYPING_DELAY_MS: (u64, u64) = (50, 150);

/// One browser + one page, exclusively owned by a flow invocation.
pub struct AutomationSession {
    /// Unique session identifier.
    pub id: String,
    context: Box<dyn RenderContext>,
    config: BrowserConfig,
    created_at: Instant,
}

impl AutomationSession {
    /// Launch a session. Countermeasures are applied by the renderer before
    /// this returns.
    pub async fn open(renderer: &dyn Renderer, config: &BrowserConfig) -> Result<Self> {
        let context = renderer.launch().await?;
        let id = format!("sess-{}", uuid::Uuid::new_v4().simple());
        tracing::debug!("opened automation session {id}");
        Ok(Self {
            id,
            context,
            config: config.clone(),
            created_at: Instant::now(),
        })
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// How long the session has been alive.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Navigate and wait for `readiness`.
    pub async fn navigate(
        &mut self,
        url: &str,
        readiness: Readiness,
        deadline: &Deadline,
    ) -> Result<NavigationResult> {
        let timeout = self.config.navigation_timeout().min(deadline.remaining());
        let stage = format!("navigate {url}");
        let context = &mut self.context;
        deadline
            .run(&stage, context.navigate(url, readiness, timeout))
            .await
    }

    /// Full reload of the current page.
    pub async fn reload(&mut self, readiness: Readiness, deadline: &Deadline) -> Result<NavigationResult> {
        let timeout = self.config.navigation_timeout().min(deadline.remaining());
        let context = &mut self.context;
        deadline.run("reload", context.reload(readiness, timeout)).await
    }

    /// Wait for the navigation that follows an anti-automation challenge.
    ///
    /// Returns whether a navigation happened. Its absence is not an error:
    /// some documents render without showing a challenge at all.
    pub async fn await_challenge_resolution(
        &mut self,
        timeout: Duration,
        deadline: &Deadline,
    ) -> Result<bool> {
        let timeout = timeout.min(deadline.remaining());
        let navigated = self.context.wait_for_navigation(timeout).await?;
        if !navigated {
            let tolerated = AcquireError::ChallengeTimeout { waited: timeout };
            tracing::info!("{tolerated}; continuing with current document");
        }
        Ok(navigated)
    }

    /// Poll until the page URL differs from `previous`. Returns the new URL.
    pub async fn wait_for_url_change(
        &self,
        previous: &str,
        timeout: Duration,
        deadline: &Deadline,
    ) -> Result<String> {
        let step = deadline.narrow(timeout);
        loop {
            let current = self.context.get_url().await?;
            if current != previous {
                return Ok(current);
            }
            if step.is_expired() {
                return Err(AcquireError::timeout(
                    format!("leaving {previous}"),
                    step.elapsed(),
                ));
            }
            let _ = step.sleep("poll", self.config.poll_interval()).await;
        }
    }

    /// Poll a boolean JS expression until it holds.
    pub async fn wait_until(
        &self,
        condition: &str,
        timeout: Duration,
        deadline: &Deadline,
    ) -> Result<()> {
        let step = deadline.narrow(timeout);
        loop {
            let value = self.context.execute_js(condition).await?;
            if value.as_bool().unwrap_or(false) {
                return Ok(());
            }
            if step.is_expired() {
                return Err(AcquireError::timeout(
                    format!("waiting for `{condition}`"),
                    step.elapsed(),
                ));
            }
            // Sleeping past the step bound just ends the loop on the next check.
            let _ = step.sleep("poll", self.config.poll_interval()).await;
        }
    }

    /// Poll until `selector` matches at least one element.
    pub async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
        deadline: &Deadline,
    ) -> Result<()> {
        let step = deadline.narrow(timeout);
        loop {
            if self.context.element_count(selector).await? > 0 {
                return Ok(());
            }
            if step.is_expired() {
                if deadline.is_expired() {
                    return Err(AcquireError::timeout(
                        format!("waiting for {selector}"),
                        deadline.elapsed(),
                    ));
                }
                return Err(AcquireError::selector(selector));
            }
            let _ = step.sleep("poll", self.config.poll_interval()).await;
        }
    }

    /// The first selector in `candidates` present on the page.
    pub async fn first_present<'a>(&self, candidates: &'a [String]) -> Result<Option<&'a str>> {
        for selector in candidates {
            if self.context.element_count(selector).await? > 0 {
                return Ok(Some(selector.as_str()));
            }
        }
        Ok(None)
    }

    pub async fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.context.element_count(selector).await? > 0)
    }

    pub async fn click(&self, selector: &str, deadline: &Deadline) -> Result<()> {
        self.click_nth(selector, 0, deadline).await
    }

    pub async fn click_nth(&self, selector: &str, index: usize, deadline: &Deadline) -> Result<()> {
        let stage = format!("click {selector}");
        deadline
            .run_step(&stage, self.config.step_timeout(), self.context.click(selector, index))
            .await
    }

    /// Type `text` one character at a time with a randomized delay before
    /// each keystroke.
    pub async fn type_humanlike(&self, selector: &str, text: &str, deadline: &Deadline) -> Result<()> {
        for ch in text.chars() {
            deadline.sleep("typing", keystroke_delay()).await?;
            let mut buf = [0u8; 4];
            self.context.type_text(selector, ch.encode_utf8(&mut buf)).await?;
        }
        Ok(())
    }

    pub async fn press_key(&self, selector: &str, key: &str) -> Result<()> {
        self.context.press_key(selector, key).await
    }

    /// Set a `<select>` value and fire the events frameworks listen for.
    pub async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.value = {val};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = serde_json::to_string(selector)?,
            val = serde_json::to_string(value)?,
        );
        if self.context.execute_js(&script).await?.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(AcquireError::selector(selector))
        }
    }

    /// Scroll the element into the middle of the viewport.
    pub async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (el) el.scrollIntoView({{ behavior: 'instant', block: 'center' }}); return !!el; }})()",
            serde_json::to_string(selector)?
        );
        self.context.execute_js(&script).await?;
        Ok(())
    }

    /// Run an in-page extraction routine and deserialize its result.
    pub async fn extract<T: DeserializeOwned>(&self, evaluator: &str, deadline: &Deadline) -> Result<T> {
        let value = deadline
            .run_step("extract", self.config.step_timeout(), self.context.execute_js(evaluator))
            .await?;
        serde_json::from_value(value).map_err(|e| AcquireError::Extraction(e.to_string()))
    }

    pub async fn html(&self) -> Result<String> {
        self.context.get_html().await
    }

    pub async fn url(&self) -> Result<String> {
        self.context.get_url().await
    }

    /// Write a full-page PNG to `path`.
    pub async fn snapshot(&self, path: &Path) -> Result<PathBuf> {
        let png = self.context.screenshot().await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, png).await?;
        Ok(path.to_path_buf())
    }

    /// Close the page and release the browser.
    pub async fn close(self) -> Result<()> {
        tracing::debug!("closing automation session {} after {:?}", self.id, self.age());
        self.context.close().await
    }
}

fn keystroke_delay() -> Duration {
    let (lo, hi) = TYPING_DELAY_MS;
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}
