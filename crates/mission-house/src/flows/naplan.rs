//! NAPLAN results lookup on the school-profile database.

use super::{FlowStep, FlowTrace, SiteFlow};
use crate::config::NaplanFlowConfig;
use crate::deadline::Deadline;
use crate::error::{AcquireError, Result};
use crate::extraction::naplan::{parse_results, ResultsPage, RESULTS_EVALUATOR};
use crate::live::AutomationSession;
use crate::renderer::Readiness;
use crate::types::AssessmentScoreSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaplanState {
    Navigating,
    AcceptingTerms,
    Searching,
    AwaitingResults,
    SelectingProfile,
    NavigatingToResults,
    Extracting,
    Done,
}

/// Elements that any profile affordance may be.
const AFFORDANCE_SELECTOR: &str = "a, button";

/// How a search result leads to a school profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    /// An explicit "view school profile" control.
    Affordance,
    /// A link into a school page.
    Link,
}

/// A clickable search result, by position within its selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCandidate {
    pub kind: CandidateKind,
    pub index: usize,
    pub text: String,
}

/// Pick the profile to open.
///
/// An explicit affordance always wins. Otherwise the first link whose text
/// contains the first word of the query, case-insensitively. Two schools
/// sharing that word are not told apart.
pub fn select_profile<'a>(
    candidates: &'a [ProfileCandidate],
    query: &str,
    affordance_text: &str,
) -> Option<&'a ProfileCandidate> {
    let affordance_text = affordance_text.to_lowercase();
    if let Some(explicit) = candidates.iter().find(|c| {
        c.kind == CandidateKind::Affordance && c.text.to_lowercase().contains(&affordance_text)
    }) {
        return Some(explicit);
    }

    let query = query.to_lowercase();
    let token = query.split(' ').next().unwrap_or_default();
    candidates
        .iter()
        .find(|c| c.kind == CandidateKind::Link && c.text.to_lowercase().contains(token))
}

/// `<profile>/naplan/results`, ignoring one trailing slash on the profile.
pub fn results_url(profile_url: &str, suffix: &str) -> String {
    let base = profile_url.strip_suffix('/').unwrap_or(profile_url);
    format!("{base}{suffix}")
}

/// Searches a school by name and reads its results table.
pub struct NaplanLookupFlow {
    school_name: String,
    config: NaplanFlowConfig,
}

impl NaplanLookupFlow {
    pub fn new(school_name: impl Into<String>, config: NaplanFlowConfig) -> Self {
        Self {
            school_name: school_name.into(),
            config,
        }
    }

    fn candidates_evaluator(&self) -> Result<String> {
        Ok(format!(
            r#"(() => {{
    const text = el => (el.textContent || '').trim();
    const out = [];
    document.querySelectorAll({affordances}).forEach((el, index) => out.push({{ kind: 'affordance', index, text: text(el) }}));
    document.querySelectorAll({links}).forEach((el, index) => out.push({{ kind: 'link', index, text: text(el) }}));
    return out;
}})()"#,
            affordances = serde_json::to_string(AFFORDANCE_SELECTOR)?,
            links = serde_json::to_string(&self.config.school_link_selector)?,
        ))
    }

    fn results_ready_condition(&self) -> Result<String> {
        Ok(format!(
            r#"(() => {{
    const wanted = {text};
    const links = document.querySelectorAll({links}).length > 0;
    const explicit = Array.from(document.querySelectorAll({affordances}))
        .some(el => (el.textContent || '').toLowerCase().includes(wanted));
    return links || explicit;
}})()"#,
            text = serde_json::to_string(&self.config.profile_affordance_text.to_lowercase())?,
            links = serde_json::to_string(&self.config.school_link_selector)?,
            affordances = serde_json::to_string(AFFORDANCE_SELECTOR)?,
        ))
    }

    async fn accept_terms(
        &self,
        session: &AutomationSession,
        deadline: &Deadline,
        step_timeout: Duration,
    ) -> Result<()> {
        let cfg = &self.config;
        session.scroll_into_view(&cfg.terms_checkbox).await?;
        session
            .wait_for_selector(&cfg.terms_label, step_timeout, deadline)
            .await?;
        session.click(&cfg.terms_label, deadline).await?;

        // The accept button stays disabled until the checkbox registers.
        let enabled = format!(
            "(() => {{ const b = document.querySelector({}); return !!b && !b.disabled; }})()",
            serde_json::to_string(&cfg.accept_button)?
        );
        session.wait_until(&enabled, step_timeout, deadline).await?;
        session.click(&cfg.accept_button, deadline).await
    }

    async fn search(
        &self,
        session: &AutomationSession,
        deadline: &Deadline,
        step_timeout: Duration,
    ) -> Result<String> {
        let cfg = &self.config;
        let any_input = cfg.search_inputs.join(", ");
        session
            .wait_for_selector(&any_input, step_timeout, deadline)
            .await?;
        let input = session
            .first_present(&cfg.search_inputs)
            .await?
            .ok_or_else(|| AcquireError::selector(any_input.clone()))?
            .to_string();
        tracing::debug!("using search input {input}");

        session.click(&input, deadline).await?;
        session
            .type_humanlike(&input, &self.school_name, deadline)
            .await?;

        session
            .wait_for_selector(&cfg.search_button, step_timeout, deadline)
            .await?;
        session.click(&cfg.search_button, deadline).await?;
        Ok(input)
    }
}

#[async_trait]
impl SiteFlow for NaplanLookupFlow {
    type Output = AssessmentScoreSet;

    fn name(&self) -> &'static str {
        "naplan"
    }

    async fn run(&self, session: &mut AutomationSession, deadline: &Deadline) -> Result<AssessmentScoreSet> {
        let cfg = &self.config;
        let step_timeout = session.config().step_timeout();
        let navigation_timeout = session.config().navigation_timeout();
        let mut trace = FlowTrace::new(self.name(), NaplanState::Navigating);

        session.navigate(&cfg.url, Readiness::NetworkIdle, deadline).await?;
        trace.step(FlowStep::Navigate { url: cfg.url.clone() }, NaplanState::AcceptingTerms);

        self.accept_terms(session, deadline, step_timeout).await?;
        trace.step(
            FlowStep::Click { selector: cfg.accept_button.clone() },
            NaplanState::Searching,
        );

        let input = self.search(session, deadline, step_timeout).await?;
        trace.step(FlowStep::Type { selector: input }, NaplanState::AwaitingResults);

        session
            .wait_until(&self.results_ready_condition()?, step_timeout, deadline)
            .await?;
        trace.step(
            FlowStep::WaitFor { condition: "search results".into() },
            NaplanState::SelectingProfile,
        );

        let candidates: Vec<ProfileCandidate> = session
            .extract(&self.candidates_evaluator()?, deadline)
            .await?;
        let chosen = select_profile(&candidates, &self.school_name, &cfg.profile_affordance_text)
            .ok_or_else(|| AcquireError::selector(cfg.school_link_selector.clone()))?;
        let selector = match chosen.kind {
            CandidateKind::Affordance => AFFORDANCE_SELECTOR,
            CandidateKind::Link => cfg.school_link_selector.as_str(),
        };
        tracing::info!("opening school profile via \"{}\"", chosen.text);

        let search_url = session.url().await?;
        session.click_nth(selector, chosen.index, deadline).await?;
        let profile_url = session
            .wait_for_url_change(&search_url, navigation_timeout, deadline)
            .await?;
        trace.step(
            FlowStep::Click { selector: selector.to_string() },
            NaplanState::NavigatingToResults,
        );

        let target = results_url(&profile_url, &cfg.results_suffix);
        session.navigate(&target, Readiness::NetworkIdle, deadline).await?;
        deadline
            .sleep("results settle", Duration::from_millis(cfg.results_settle_ms))
            .await?;
        trace.step(FlowStep::Navigate { url: target }, NaplanState::Extracting);

        let page: ResultsPage = session.extract(RESULTS_EVALUATOR, deadline).await?;
        let scores = parse_results(&page);
        if scores.is_empty() {
            return Err(AcquireError::Extraction(format!(
                "no NAPLAN results table for {}",
                self.school_name
            )));
        }
        trace.step(FlowStep::Extract { what: "results table" }, NaplanState::Done);
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(kind: CandidateKind, index: usize, text: &str) -> ProfileCandidate {
        ProfileCandidate {
            kind,
            index,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_affordance_preferred() {
        let candidates = vec![
            candidate(CandidateKind::Link, 0, "Mount Waverley Primary School"),
            candidate(CandidateKind::Affordance, 7, "Home"),
            candidate(CandidateKind::Affordance, 12, "View School Profile"),
        ];
        let chosen = select_profile(&candidates, "Mount Waverley Primary School", "view school profile").unwrap();
        assert_eq!(chosen.kind, CandidateKind::Affordance);
        assert_eq!(chosen.index, 12);
    }

    #[test]
    fn test_link_fallback_uses_first_token() {
        let candidates = vec![
            candidate(CandidateKind::Link, 0, "Ashburton Primary School"),
            candidate(CandidateKind::Link, 1, "Mount Pleasant Road Nursery"),
            candidate(CandidateKind::Link, 2, "Mount Waverley Primary School"),
        ];
        // First-token matching picks the first "mount" link.
        let chosen = select_profile(&candidates, "Mount Waverley Primary School", "view school profile").unwrap();
        assert_eq!(chosen.index, 1);
    }

    #[test]
    fn test_no_candidate() {
        let candidates = vec![candidate(CandidateKind::Link, 0, "Ashburton Primary School")];
        assert!(select_profile(&candidates, "Glen Waverley", "view school profile").is_none());
    }

    #[test]
    fn test_results_url() {
        assert_eq!(
            results_url("https://myschool.edu.au/school/44601", "/naplan/results"),
            "https://myschool.edu.au/school/44601/naplan/results"
        );
        assert_eq!(
            results_url("https://myschool.edu.au/school/44601/", "/naplan/results"),
            "https://myschool.edu.au/school/44601/naplan/results"
        );
    }
}
