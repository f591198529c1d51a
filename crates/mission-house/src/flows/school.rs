//! Zoned-school lookup on the catchment locator.
//!
//! The locator keeps its form state between searches, so every school type
//! starts from a fresh full load of the page.

use super::{FlowStep, FlowTrace, SiteFlow};
use crate::config::SchoolFlowConfig;
use crate::deadline::Deadline;
use crate::error::{AcquireError, Result};
use crate::extraction::school::{build_school_record, SchoolPanel};
use crate::live::AutomationSession;
use crate::renderer::Readiness;
use crate::types::{SchoolRecord, SchoolType};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchoolState {
    Navigating,
    SelectingYear,
    SelectingType,
    EnteringAddress,
    AwaitingSuggestions,
    SelectingSuggestion,
    AwaitingResult,
    Extracting,
    Done,
}

/// Finds the zoned school for each requested type, in order.
pub struct SchoolCatchmentFlow {
    address: String,
    school_types: Vec<SchoolType>,
    config: SchoolFlowConfig,
}

impl SchoolCatchmentFlow {
    /// Primary then secondary.
    pub fn new(address: impl Into<String>, config: SchoolFlowConfig) -> Self {
        Self {
            address: address.into(),
            school_types: SchoolType::ALL.to_vec(),
            config,
        }
    }

    /// Look up a single school type.
    pub fn only(address: impl Into<String>, school_type: SchoolType, config: SchoolFlowConfig) -> Self {
        Self {
            address: address.into(),
            school_types: vec![school_type],
            config,
        }
    }

    fn type_selector(&self, school_type: SchoolType) -> &str {
        match school_type {
            SchoolType::Primary => &self.config.primary_type_selector,
            SchoolType::Secondary => &self.config.secondary_type_selector,
        }
    }

    async fn lookup(
        &self,
        session: &mut AutomationSession,
        deadline: &Deadline,
        school_type: SchoolType,
        fresh_load: bool,
    ) -> Result<SchoolRecord> {
        let cfg = &self.config;
        let step_timeout = session.config().step_timeout();
        let mut trace = FlowTrace::new(self.name(), SchoolState::Navigating);

        if fresh_load {
            session.navigate(&cfg.url, Readiness::NetworkIdle, deadline).await?;
            trace.step(FlowStep::Navigate { url: cfg.url.clone() }, SchoolState::SelectingYear);
        } else {
            session.reload(Readiness::NetworkIdle, deadline).await?;
            trace.step(FlowStep::Reload, SchoolState::SelectingYear);
        }

        session
            .wait_for_selector(&cfg.year_selector, step_timeout, deadline)
            .await?;
        session
            .select_option(&cfg.year_selector, &cfg.target_year)
            .await?;
        trace.step(
            FlowStep::Select {
                selector: cfg.year_selector.clone(),
                value: cfg.target_year.clone(),
            },
            SchoolState::SelectingType,
        );

        let type_selector = self.type_selector(school_type);
        session
            .wait_for_selector(type_selector, step_timeout, deadline)
            .await?;
        session.click(type_selector, deadline).await?;
        trace.step(
            FlowStep::Click { selector: type_selector.to_string() },
            SchoolState::EnteringAddress,
        );

        session
            .wait_for_selector(&cfg.address_input, step_timeout, deadline)
            .await?;
        session.click(&cfg.address_input, deadline).await?;
        session
            .type_humanlike(&cfg.address_input, &self.address, deadline)
            .await?;
        trace.step(
            FlowStep::Type { selector: cfg.address_input.clone() },
            SchoolState::AwaitingSuggestions,
        );

        session
            .wait_for_selector(&cfg.suggestion_selector, step_timeout, deadline)
            .await?;
        trace.step(
            FlowStep::WaitFor { condition: cfg.suggestion_selector.clone() },
            SchoolState::SelectingSuggestion,
        );

        session.click(&cfg.suggestion_selector, deadline).await?;
        trace.step(
            FlowStep::Click { selector: cfg.suggestion_selector.clone() },
            SchoolState::AwaitingResult,
        );

        session
            .wait_for_selector(&cfg.result_header, step_timeout, deadline)
            .await?;
        trace.step(
            FlowStep::WaitFor { condition: cfg.result_header.clone() },
            SchoolState::Extracting,
        );

        let panel: SchoolPanel = session
            .extract(&SchoolPanel::evaluator(cfg), deadline)
            .await?;
        let record = build_school_record(&panel, school_type, &cfg.address_separator);
        if !record.success {
            return Err(AcquireError::Extraction(format!(
                "{school_type} school panel had no name"
            )));
        }
        trace.step(FlowStep::Extract { what: "school panel" }, SchoolState::Done);
        tracing::info!("{school_type} school for {}: {}", self.address, record.name);
        Ok(record)
    }
}

#[async_trait]
impl SiteFlow for SchoolCatchmentFlow {
    type Output = Vec<SchoolRecord>;

    fn name(&self) -> &'static str {
        "schools"
    }

    async fn run(&self, session: &mut AutomationSession, deadline: &Deadline) -> Result<Vec<SchoolRecord>> {
        let mut records = Vec::with_capacity(self.school_types.len());
        for (i, school_type) in self.school_types.iter().enumerate() {
            let record = self.lookup(session, deadline, *school_type, i == 0).await?;
            records.push(record);
        }
        Ok(records)
    }
}
