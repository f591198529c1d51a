//! Configuration loading and resolution.
//!
//! Every section has built-in defaults, so a missing or partial JSON file is
//! fine. Resolution order for the file: explicit path, `MISSION_HOUSE_CONFIG`,
//! `./mission-house.json`, `~/.mission-house/config.json`.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on redirects followed by the fetcher.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Rendered listing pages shorter than this are treated as possibly partial.
pub const MIN_PROPERTY_CONTENT_BYTES: usize = 50_000;

const CONFIG_ENV: &str = "MISSION_HOUSE_CONFIG";

pub(crate) const CHROME_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                    AppleWebKit/537.36 (KHTML, like Gecko) \
                                    Chrome/131.0.0.0 Safari/537.36";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    pub fetch: FetchConfig,
    pub browser: BrowserConfig,
    pub retry: RetryConfig,
    pub diagnostics: DiagnosticsConfig,
    pub cache: CacheConfig,
    pub property: PropertyFlowConfig,
    pub schools: SchoolFlowConfig,
    pub naplan: NaplanFlowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    pub max_redirects: usize,
    /// Resolvers consulted before the system resolver. Empty disables the override.
    pub public_resolvers: Vec<IpAddr>,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            public_resolvers: vec![
                IpAddr::from([1, 1, 1, 1]),
                IpAddr::from([8, 8, 8, 8]),
            ],
            user_agent: CHROME_UA.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Off by default: challenge pages treat headless sessions with suspicion.
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub chromium_path: Option<PathBuf>,
    pub user_agent: String,
    pub navigation_timeout_ms: u64,
    pub step_timeout_ms: u64,
    pub challenge_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Budget for one whole flow invocation.
    pub flow_budget_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: 1440,
            window_height: 900,
            chromium_path: None,
            user_agent: CHROME_UA.to_string(),
            navigation_timeout_ms: 30_000,
            step_timeout_ms: 15_000,
            challenge_timeout_ms: 15_000,
            poll_interval_ms: 250,
            flow_budget_ms: 180_000,
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_millis(self.challenge_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn flow_budget(&self) -> Duration {
        Duration::from_millis(self.flow_budget_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub prefix: String,
    pub capture_timeout_ms: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("diagnostics"),
            prefix: "mission-house-error".to_string(),
            capture_timeout_ms: 10_000,
        }
    }
}

impl DiagnosticsConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_secs: 24 * 3600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyFlowConfig {
    /// Listing URLs must match this pattern.
    pub url_pattern: String,
    pub min_content_bytes: usize,
    /// Strings whose presence marks a fully rendered listing.
    pub content_markers: Vec<String>,
    pub resample_delay_ms: u64,
}

impl Default for PropertyFlowConfig {
    fn default() -> Self {
        Self {
            url_pattern: r"^https?://(www\.)?realestate\.com\.au/property-".to_string(),
            min_content_bytes: MIN_PROPERTY_CONTENT_BYTES,
            content_markers: vec![
                "property-info-address".to_string(),
                "primary-features".to_string(),
                "Indicative price".to_string(),
            ],
            resample_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchoolFlowConfig {
    pub url: String,
    /// Enrolment year picked in the year selector.
    pub target_year: String,
    pub year_selector: String,
    pub primary_type_selector: String,
    pub secondary_type_selector: String,
    pub address_input: String,
    pub suggestion_selector: String,
    pub result_header: String,
    pub address_segments: String,
    pub distance_selector: String,
    /// Label/value rows of the school details table.
    pub detail_rows: String,
    pub address_separator: String,
}

impl Default for SchoolFlowConfig {
    fn default() -> Self {
        Self {
            url: "https://www.findmyschool.vic.gov.au".to_string(),
            target_year: "2026".to_string(),
            year_selector: "#year-select".to_string(),
            primary_type_selector: "input[value='Primary']".to_string(),
            secondary_type_selector: "input[value='Secondary']".to_string(),
            address_input: "input#address-search".to_string(),
            suggestion_selector: ".esri-search__suggestions-list li".to_string(),
            result_header: "#SchoolInfo-header".to_string(),
            address_segments: "#SchoolInfo .address span".to_string(),
            distance_selector: "#NearestSchools .container .distance".to_string(),
            detail_rows: "#SchoolInfo table tr".to_string(),
            address_separator: ", ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NaplanFlowConfig {
    pub url: String,
    pub terms_checkbox: String,
    pub terms_label: String,
    pub accept_button: String,
    /// Tried in order; the first present input wins.
    pub search_inputs: Vec<String>,
    pub search_button: String,
    pub profile_affordance_text: String,
    pub school_link_selector: String,
    pub results_suffix: String,
    pub results_settle_ms: u64,
}

impl Default for NaplanFlowConfig {
    fn default() -> Self {
        Self {
            url: "https://www.myschool.edu.au/".to_string(),
            terms_checkbox: "#checkBoxTou".to_string(),
            terms_label: "label.tou-checkbox-inline".to_string(),
            accept_button: "button.accept".to_string(),
            search_inputs: vec![
                "input[type=\"text\"]".to_string(),
                "input.form-control".to_string(),
                "input[placeholder*=\"school\" i]".to_string(),
                "input[placeholder*=\"Search\" i]".to_string(),
            ],
            search_button: "button.myschool-search-button".to_string(),
            profile_affordance_text: "view school profile".to_string(),
            school_link_selector: "a[href*=\"/school/\"]".to_string(),
            results_suffix: "/naplan/results".to_string(),
            results_settle_ms: 2_000,
        }
    }
}

impl AcquireConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: AcquireConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Resolve and load the configuration, or defaults when no file exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match resolve_config_path(explicit) {
            Some(path) => {
                tracing::debug!("loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Find the configuration file to use, if any.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    let cwd = PathBuf::from("mission-house.json");
    if cwd.exists() {
        return Some(cwd);
    }

    let home = dirs::home_dir()?.join(".mission-house").join("config.json");
    home.exists().then_some(home)
}
