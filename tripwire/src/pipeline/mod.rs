//! The gate itself: sanitize, bind guardrails, invoke the protected agent.
//!
//! A [`Pipeline`] is stateless across runs. Each call to
//! [`Pipeline::run`] builds its own sanitized input, its own bound guardrail
//! set and its own [`TraceScope`](crate::telemetry::TraceScope), so one
//! pipeline can serve any number of concurrent requests.
//!
//! # Execution Modes
//!
//! Guardrails always run concurrently with each other and the first unsafe
//! verdict wins. [`GuardrailMode`] decides how they relate to the agent call:
//!
//! - **Blocking** (default): every guardrail must pass before the agent is
//!   called. A trip costs no agent tokens.
//! - **Parallel**: the agent call starts alongside the guardrails. A trip
//!   drops the in-flight call, or discards its response if it already
//!   finished.
//!
//! # Outcomes
//!
//! Rejections and trips are values ([`PipelineOutcome`]), not errors. Only
//! oracle failures, protocol violations and misconfiguration surface as
//! [`Error`](crate::Error).

mod outcome;
mod runner;

pub use outcome::{PipelineOutcome, PipelineReport, PipelineState};
pub use runner::Pipeline;

use serde::{Deserialize, Serialize};

/// When guardrails run relative to the protected agent call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardrailMode {
    /// Guardrails finish before the agent is called.
    #[default]
    Blocking,
    /// The agent runs concurrently with the guardrails.
    Parallel,
}

impl std::fmt::Display for GuardrailMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocking => f.write_str("blocking"),
            Self::Parallel => f.write_str("parallel"),
        }
    }
}
