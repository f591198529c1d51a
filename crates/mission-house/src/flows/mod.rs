//! Per-site automation flows.
//!
//! Each flow is an ordered state machine over [`AutomationSession`]
//! primitives. A flow owns no browser: the [`runner::FlowRunner`] opens a
//! fresh session per attempt, hands it to [`SiteFlow::run`], and closes it
//! afterwards whatever the outcome.
//!
//! Every step is logged together with the state it moves the flow into.

pub mod naplan;
pub mod property;
pub mod runner;
pub mod school;

pub use naplan::NaplanLookupFlow;
pub use property::PropertyPageFlow;
pub use runner::FlowRunner;
pub use school::SchoolCatchmentFlow;

use crate::deadline::Deadline;
use crate::error::Result;
use crate::live::AutomationSession;
use async_trait::async_trait;
use std::fmt;

/// A scripted interaction with one site.
#[async_trait]
pub trait SiteFlow: Send + Sync {
    type Output: Send;

    /// Short name used in logs and diagnostic file names.
    fn name(&self) -> &'static str;

    /// Drive `session` to the data and extract it.
    async fn run(&self, session: &mut AutomationSession, deadline: &Deadline) -> Result<Self::Output>;
}

/// One typed action taken by a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStep {
    Navigate { url: String },
    Reload,
    Click { selector: String },
    Type { selector: String },
    Select { selector: String, value: String },
    WaitFor { condition: String },
    Sleep { millis: u64 },
    Extract { what: &'static str },
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowStep::Navigate { url } => write!(f, "navigate {url}"),
            FlowStep::Reload => f.write_str("reload"),
            FlowStep::Click { selector } => write!(f, "click {selector}"),
            FlowStep::Type { selector } => write!(f, "type into {selector}"),
            FlowStep::Select { selector, value } => write!(f, "select {value} in {selector}"),
            FlowStep::WaitFor { condition } => write!(f, "wait for {condition}"),
            FlowStep::Sleep { millis } => write!(f, "sleep {millis}ms"),
            FlowStep::Extract { what } => write!(f, "extract {what}"),
        }
    }
}

/// State history of one flow run.
#[derive(Debug, Clone)]
pub struct FlowTrace<S> {
    flow: &'static str,
    state: S,
    steps: Vec<(FlowStep, S)>,
}

impl<S: Copy + fmt::Debug> FlowTrace<S> {
    pub fn new(flow: &'static str, initial: S) -> Self {
        Self {
            flow,
            state: initial,
            steps: Vec::new(),
        }
    }

    /// Record `step` and move into `next`.
    pub fn step(&mut self, step: FlowStep, next: S) {
        tracing::info!("[{}] {step} -> {next:?}", self.flow);
        self.steps.push((step, next));
        self.state = next;
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn steps(&self) -> &[(FlowStep, S)] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Light {
        Red,
        Green,
    }

    #[test]
    fn test_trace_records_transitions() {
        let mut trace = FlowTrace::new("demo", Light::Red);
        trace.step(FlowStep::Click { selector: "#go".into() }, Light::Green);
        assert_eq!(trace.state(), Light::Green);
        assert_eq!(trace.steps().len(), 1);
        assert_eq!(trace.steps()[0].0.to_string(), "click #go");
    }
}
