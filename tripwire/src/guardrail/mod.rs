//! Guardrails: independently instructed safety checks.
//!
//! A guardrail is a named check whose verdict comes from the oracle. The
//! lifecycle has three steps:
//!
//! - **[`GuardrailSpec`]**: a static definition held in the
//!   [`GuardrailRegistry`]. Its [`GuardrailKind`] says whether the run's topic
//!   is interpolated into the instructions.
//! - **[`BoundGuardrail`]**: produced per run by [`build_guardrail`], with the
//!   final instructions and the expected [`Verdict`] shape.
//! - **[`InputGuardrail`]**: a bound guardrail (or any custom
//!   [`GuardrailCheck`]) attached to the protected agent call. Running it
//!   yields a [`GuardrailResult`] whose tripwire is set on an unsafe verdict.
//!
//! # Tripwire Mechanism
//!
//! Guardrails are a conjunction of gates, not a vote: the first unsafe
//! verdict observed blocks the protected agent's response. A verdict that
//! cannot be parsed is a [`GuardrailProtocol`](crate::Error::GuardrailProtocol)
//! error and is never treated as safe.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tripwire::prelude::*;
//!
//! let spec = GuardrailRegistry::builtin().get("context").unwrap();
//! let bound = build_guardrail(spec, &RunParams::new("math"), Verdict::output_schema());
//! let guardrail = InputGuardrail::from_bound(bound, oracle.clone());
//!
//! let result = guardrail.run("Cuanto es 2+2", &RunContext::default()).await?;
//! assert!(!result.is_triggered());
//! ```

mod bound;
mod check;
mod registry;
mod spec;

pub use bound::{BoundGuardrail, RunParams, build_guardrail};
pub use check::{GuardrailCheck, GuardrailResult, InputGuardrail, OracleGuardrail, parse_verdict};
pub use registry::{
    CONTEXT_GUARDRAIL, GuardrailRegistry, INJECTION_GUARDRAIL, JAILBREAK_GUARDRAIL,
};
pub use spec::{GuardrailKind, GuardrailSpec};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::oracle::OutputSchema;

/// Name under which the verdict schema is sent to the oracle.
pub const VERDICT_SCHEMA_NAME: &str = "verdict";

/// The outcome of one guardrail evaluation.
///
/// `reasoning` explains this guardrail's concern only; it is never shared
/// with or derived from other guardrails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Verdict {
    /// Whether the input was judged unsafe.
    pub is_unsafe: bool,
    /// Justification scoped to the guardrail's concern.
    pub reasoning: String,
}

impl Verdict {
    /// A safe verdict.
    #[must_use]
    pub fn safe(reasoning: impl Into<String>) -> Self {
        Self {
            is_unsafe: false,
            reasoning: reasoning.into(),
        }
    }

    /// An unsafe verdict.
    #[must_use]
    pub fn unsafe_because(reasoning: impl Into<String>) -> Self {
        Self {
            is_unsafe: true,
            reasoning: reasoning.into(),
        }
    }

    /// The structured shape guardrails request from the oracle.
    #[must_use]
    pub fn output_schema() -> OutputSchema {
        OutputSchema::of::<Self>(VERDICT_SCHEMA_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_schema_shape() {
        let schema = Verdict::output_schema();
        assert_eq!(schema.name, VERDICT_SCHEMA_NAME);
        let doc = &schema.schema;
        assert_eq!(doc["properties"]["is_unsafe"]["type"], "boolean");
        assert_eq!(doc["properties"]["reasoning"]["type"], "string");
        assert_eq!(doc["additionalProperties"], false);

        let required: Vec<_> = doc["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"is_unsafe"));
        assert!(required.contains(&"reasoning"));
    }
}
