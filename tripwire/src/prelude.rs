//! Common imports for building and running a gate.

pub use crate::config::{AgentConfig, GateConfig, OracleConfig};
pub use crate::context::RunContext;
pub use crate::error::{Error, OracleError, Result, SanitizeError};
pub use crate::guardrail::{
    GuardrailCheck, GuardrailKind, GuardrailRegistry, GuardrailSpec, InputGuardrail, RunParams,
    Verdict, build_guardrail,
};
pub use crate::oracle::{MockOracle, OpenAiOracle, Oracle, OracleRequest, SharedOracle};
pub use crate::pipeline::{GuardrailMode, Pipeline, PipelineOutcome, PipelineReport};
pub use crate::sanitize::Sanitizer;
