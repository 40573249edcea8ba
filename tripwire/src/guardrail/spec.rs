//! Static guardrail definitions.

use serde::{Deserialize, Serialize};

/// How a guardrail's instructions are specialized per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailKind {
    /// Instructions are used as written.
    #[default]
    Static,
    /// The run's topic is appended verbatim to the instructions.
    Contextual,
}

/// A named check definition: what to ask the oracle, and under which name.
///
/// Specs are loaded once and never mutated. The `identifier` is the stable
/// lookup key; `name` is what shows up in logs and tripwire notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailSpec {
    /// Stable key, e.g. `"context"`.
    pub identifier: String,
    /// Display name, e.g. `"Out of context guardrail"`.
    pub name: String,
    /// Instruction text sent to the oracle.
    #[serde(alias = "instructions")]
    pub instruction_template: String,
    /// Specialization applied when the guardrail is bound.
    #[serde(default)]
    pub kind: GuardrailKind,
}

impl GuardrailSpec {
    /// Create a static spec.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        instruction_template: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            instruction_template: instruction_template.into(),
            kind: GuardrailKind::Static,
        }
    }

    /// Set the specialization kind.
    #[must_use]
    pub const fn kind(mut self, kind: GuardrailKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns `true` if the topic is interpolated at bind time.
    #[must_use]
    pub const fn is_contextual(&self) -> bool {
        matches!(self.kind, GuardrailKind::Contextual)
    }
}
