//! Error taxonomy for the acquisition pipeline.
//!
//! Every layer (fetcher, engine, flows, extraction) reports failures through
//! [`AcquireError`]. The retry orchestrator uses [`AcquireError::is_retryable`]
//! to decide between another attempt and escalation.

use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AcquireError>;

/// All errors that can occur while acquiring a record.
#[derive(thiserror::Error, Debug)]
pub enum AcquireError {
    /// Transport-level failure (DNS, connect, TLS, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a status outside 2xx.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// A deadline or per-layer timeout elapsed.
    #[error("timed out during {stage} after {}ms", elapsed.as_millis())]
    Timeout { stage: String, elapsed: Duration },

    /// No navigation followed the anti-automation challenge in time.
    ///
    /// The engine tolerates this condition and only logs it; the variant
    /// exists so callers that want the strict behavior can surface it.
    #[error("challenge was not resolved within {}ms", waited.as_millis())]
    ChallengeTimeout { waited: Duration },

    /// A required element never appeared. May indicate a layout change.
    #[error("selector not found: {selector}")]
    SelectorNotFound { selector: String },

    /// Extracted record failed validation.
    #[error("validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    /// Redirect chain exceeded the configured depth.
    #[error("redirect loop: more than {max} redirects starting at {url}")]
    RedirectLoop { max: usize, url: String },

    /// The rendering engine could not be launched or talked to.
    #[error("browser error: {0}")]
    Browser(String),

    /// The caller supplied a target the pipeline refuses to handle.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// In-page extraction returned data of an unexpected shape.
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A listing could not be loaded automatically. The page HTML can still
    /// be supplied by hand.
    #[error("could not load {url} ({cause}); save the page and pass its HTML with --html instead")]
    ManualEntryRequired {
        url: String,
        cause: Box<AcquireError>,
    },

    /// Every attempt failed; carries the last underlying error.
    #[error("{flow} failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        flow: String,
        attempts: u32,
        last: Box<AcquireError>,
    },
}

impl AcquireError {
    /// Build a timeout error for `stage`.
    pub fn timeout(stage: impl Into<String>, elapsed: Duration) -> Self {
        AcquireError::Timeout {
            stage: stage.into(),
            elapsed,
        }
    }

    /// Build a selector-not-found error.
    pub fn selector(selector: impl Into<String>) -> Self {
        AcquireError::SelectorNotFound {
            selector: selector.into(),
        }
    }

    /// Whether the orchestrator may try the flow again after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquireError::Network(_)
            | AcquireError::Timeout { .. }
            | AcquireError::ChallengeTimeout { .. }
            | AcquireError::SelectorNotFound { .. }
            | AcquireError::Browser(_)
            | AcquireError::Extraction(_) => true,
            AcquireError::Http { .. }
            | AcquireError::Validation { .. }
            | AcquireError::RedirectLoop { .. }
            | AcquireError::InvalidTarget(_)
            | AcquireError::Io(_)
            | AcquireError::Json(_)
            | AcquireError::ManualEntryRequired { .. }
            | AcquireError::RetriesExhausted { .. } => false,
        }
    }

    /// The innermost error, looking through wrapping variants.
    pub fn root(&self) -> &AcquireError {
        match self {
            AcquireError::RetriesExhausted { last, .. } => last.root(),
            AcquireError::ManualEntryRequired { cause, .. } => cause.root(),
            other => other,
        }
    }

    /// Attempt count when this is an exhausted-retries error.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            AcquireError::RetriesExhausted { attempts, .. } => Some(*attempts),
            AcquireError::ManualEntryRequired { cause, .. } => cause.attempts(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AcquireError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AcquireError::timeout("http request", Duration::ZERO)
        } else {
            AcquireError::Network(e.to_string())
        }
    }
}
