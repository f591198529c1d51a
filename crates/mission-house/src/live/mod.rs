//! Live browser sessions driven by multi-step flows.

pub mod session;

pub use session::AutomationSession;
