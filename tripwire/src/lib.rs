//! Tripwire is an input-safety gate for LLM agents.
//!
//! User text is sanitized, then judged by independent guardrails before it
//! may reach the protected agent. Any guardrail that finds the input unsafe
//! trips the wire and the agent's response is never delivered.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tripwire::prelude::*;
//!
//! let oracle = Arc::new(OpenAiOracle::from_env()?);
//! let pipeline = Pipeline::new(oracle);
//!
//! match pipeline.run("Cuanto es 2+2", "math").await? {
//!     PipelineOutcome::Completed { response } => println!("{response}"),
//!     PipelineOutcome::GuardrailTripped { guardrail, reasoning } => {
//!         eprintln!("{guardrail}: {reasoning}");
//!     }
//!     PipelineOutcome::SanitizationRejected { reason } => eprintln!("{reason}"),
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod guardrail;
pub mod oracle;
pub mod pipeline;
pub mod prelude;
pub mod sanitize;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use pipeline::{GuardrailMode, Pipeline, PipelineOutcome, PipelineReport, PipelineState};
pub use sanitize::sanitize;
