//! Scripted in-memory renderer for flow and pipeline tests.
//!
//! Every context launched by a [`ScriptedRenderer`] shares one [`Script`]:
//! page HTML, per-selector element counts, canned JS results and injected
//! failures. Calls are recorded in order so tests can assert on them.

#![allow(dead_code)]

use async_trait::async_trait;
use mission_house::config::{AcquireConfig, BrowserConfig};
use mission_house::error::{AcquireError, Result};
use mission_house::renderer::{NavigationResult, Readiness, RenderContext, Renderer};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct Script {
    pub html: String,
    /// Successive `get_html` results, ahead of `html`.
    pub html_samples: VecDeque<String>,
    pub url: String,
    /// Element counts by exact selector; unlisted selectors match once.
    pub counts: HashMap<String, usize>,
    /// Scripts containing the key answer with the queued values in order;
    /// the last value repeats. Anything else evaluates to `true`.
    pub js: Vec<(String, VecDeque<Value>)>,
    /// Clicking the selector moves the page to the URL.
    pub click_urls: HashMap<String, String>,
    /// The next N navigations fail with a network error.
    pub failing_navigations: u32,
    /// Whether a navigation follows the challenge page.
    pub challenge_navigates: bool,
    /// Characters typed, by selector.
    pub typed: HashMap<String, String>,
    pub calls: Vec<String>,
}

impl Script {
    pub fn answer(&mut self, fragment: &str, values: Vec<Value>) {
        self.js.push((fragment.to_string(), values.into()));
    }

    /// Queued answers still waiting for scripts containing `fragment`.
    pub fn pending(&self, fragment: &str) -> usize {
        self.js
            .iter()
            .find(|(f, _)| f == fragment)
            .map(|(_, queue)| queue.len())
            .unwrap_or(0)
    }

    fn evaluate(&mut self, script: &str) -> Value {
        for (fragment, queue) in self.js.iter_mut() {
            if script.contains(fragment.as_str()) {
                return if queue.len() > 1 {
                    queue.pop_front().unwrap_or(Value::Null)
                } else {
                    queue.front().cloned().unwrap_or(Value::Null)
                };
            }
        }
        Value::Bool(true)
    }
}

#[derive(Clone, Default)]
pub struct ScriptedRenderer {
    pub script: Arc<Mutex<Script>>,
    pub launches: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl ScriptedRenderer {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            ..Default::default()
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn typed(&self, selector: &str) -> String {
        self.script
            .lock()
            .unwrap()
            .typed
            .get(selector)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn launch(&self) -> Result<Box<dyn RenderContext>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedContext {
            script: Arc::clone(&self.script),
            closes: Arc::clone(&self.closes),
        }))
    }

    fn active_contexts(&self) -> usize {
        self.launches() - self.closes()
    }
}

pub struct ScriptedContext {
    script: Arc<Mutex<Script>>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedContext {
    fn with<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn navigate(&mut self, url: &str, _readiness: Readiness, _timeout: Duration) -> Result<NavigationResult> {
        self.with(|s| {
            s.calls.push(format!("navigate {url}"));
            if s.failing_navigations > 0 {
                s.failing_navigations -= 1;
                return Err(AcquireError::Network("connection reset".into()));
            }
            s.url = url.to_string();
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 5,
            })
        })
    }

    async fn reload(&mut self, _readiness: Readiness, _timeout: Duration) -> Result<NavigationResult> {
        self.with(|s| {
            s.calls.push("reload".to_string());
            Ok(NavigationResult {
                final_url: s.url.clone(),
                load_time_ms: 5,
            })
        })
    }

    async fn wait_for_navigation(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.with(|s| s.challenge_navigates))
    }

    async fn execute_js(&self, script: &str) -> Result<Value> {
        Ok(self.with(|s| s.evaluate(script)))
    }

    async fn element_count(&self, selector: &str) -> Result<usize> {
        Ok(self.with(|s| s.counts.get(selector).copied().unwrap_or(1)))
    }

    async fn click(&self, selector: &str, index: usize) -> Result<()> {
        self.with(|s| {
            s.calls.push(format!("click {selector}#{index}"));
            if let Some(url) = s.click_urls.get(selector) {
                s.url = url.clone();
            }
        });
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.with(|s| s.typed.entry(selector.to_string()).or_default().push_str(text));
        Ok(())
    }

    async fn press_key(&self, selector: &str, key: &str) -> Result<()> {
        self.with(|s| s.calls.push(format!("key {key} on {selector}")));
        Ok(())
    }

    async fn get_html(&self) -> Result<String> {
        Ok(self.with(|s| {
            s.calls.push("get_html".to_string());
            s.html_samples.pop_front().unwrap_or_else(|| s.html.clone())
        }))
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.with(|s| s.url.clone()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub const LISTING_URL: &str = "https://www.realestate.com.au/property-house-vic-burwood-141234567";

pub const LISTING_HTML: &str = r#"<!doctype html>
<html><body>
  <h1 class="property-info-address">5 Plain Court, Burwood, Vic 3125</h1>
  <p>3 bedroom, 2 bathroom family home close to schools.</p>
  <p>Indicative price: $900,000 - $950,000</p>
</body></html>"#;

/// Fast timings for tests: short polls, no diagnostics, quick retries.
pub fn test_config() -> AcquireConfig {
    let mut config = AcquireConfig::default();
    config.browser = BrowserConfig {
        poll_interval_ms: 10,
        step_timeout_ms: 500,
        navigation_timeout_ms: 1_000,
        challenge_timeout_ms: 100,
        ..BrowserConfig::default()
    };
    config.retry.base_delay_ms = 1;
    config.diagnostics.enabled = false;
    config
}

/// School panel answers for a primary then a secondary lookup.
pub fn school_panels(script: &mut Script) {
    script.answer(
        "header, segments, distance",
        vec![
            serde_json::json!({
                "header": "Burwood Heights Primary School",
                "segments": ["14 Hawthorn Road", " ", "Burwood VIC 3125"],
                "distance": "0.8 km"
            }),
            serde_json::json!({
                "header": "Box Hill High School",
                "segments": ["1180 Whitehorse Road", "Box Hill VIC 3128"],
                "distance": "2.4 km"
            }),
        ],
    );
}

/// NAPLAN search results: one plain link and one explicit profile
/// affordance, which leads to `profile_url`.
pub fn naplan_search(script: &mut Script, profile_url: &str) {
    script.answer(
        "kind: 'affordance'",
        vec![serde_json::json!([
            { "kind": "link", "index": 0, "text": "Burwood Heights Primary School" },
            { "kind": "affordance", "index": 3, "text": "View School Profile" }
        ])],
    );
    script
        .click_urls
        .insert("a, button".to_string(), profile_url.to_string());
}

/// Answer for the results-page evaluator.
pub fn naplan_results(script: &mut Script, page: Value) {
    script.answer("querySelectorAll('table')", vec![page]);
}

pub fn primary_results_page() -> Value {
    serde_json::json!({
        "text": "NAPLAN results 2025",
        "tables": [[
            ["", "Reading", "Writing", "Spelling", "Grammar & punctuation", "Numeracy"],
            ["Year 3", "432", "422", "418", "440", "408"],
            ["Year 5", "510", "484", "499", "505", "493"]
        ]]
    })
}
