//! Binding a static spec to the parameters of one run.

use crate::oracle::OutputSchema;

use super::spec::{GuardrailKind, GuardrailSpec};

/// Run-time parameters available when binding guardrails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunParams {
    /// Topic the conversation is restricted to.
    pub topic: String,
}

impl RunParams {
    /// Create parameters for the given topic.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

/// A guardrail ready to be evaluated: final instructions plus expected shape.
///
/// Bound guardrails belong to a single pipeline run and are dropped with it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundGuardrail {
    identifier: String,
    name: String,
    instructions: String,
    output_schema: OutputSchema,
}

impl BoundGuardrail {
    /// Returns the spec identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the final instruction text.
    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Returns the expected verdict shape.
    #[must_use]
    pub const fn output_schema(&self) -> &OutputSchema {
        &self.output_schema
    }
}

/// Bind `spec` to `params`.
///
/// Contextual specs get the topic appended verbatim to their instructions;
/// static specs are used unchanged. No oracle call happens here.
#[must_use]
pub fn build_guardrail(
    spec: &GuardrailSpec,
    params: &RunParams,
    expected_shape: OutputSchema,
) -> BoundGuardrail {
    let instructions = match spec.kind {
        GuardrailKind::Static => spec.instruction_template.clone(),
        GuardrailKind::Contextual => format!("{}{}", spec.instruction_template, params.topic),
    };

    BoundGuardrail {
        identifier: spec.identifier.clone(),
        name: spec.name.clone(),
        instructions,
        output_schema: expected_shape,
    }
}
