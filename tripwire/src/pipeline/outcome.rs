//! Terminal results of a pipeline run.

use serde::{Deserialize, Serialize};

use crate::telemetry::PipelineMetrics;

/// States of one pipeline run. `Succeeded`, `Tripped` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing has happened yet.
    Start,
    /// Cleaning the raw input.
    Sanitizing,
    /// Binding the configured guardrail specs.
    BuildingGuardrails,
    /// Guardrails and the protected agent are running.
    Invoking,
    /// The agent answered and no guardrail tripped.
    Succeeded,
    /// A guardrail judged the input unsafe.
    Tripped,
    /// Sanitization refused the input.
    Rejected,
}

impl PipelineState {
    /// Returns `true` for the three terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Tripped | Self::Rejected)
    }
}

/// How one pipeline run ended. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Sanitization refused the input; no oracle call was made.
    SanitizationRejected {
        /// Human-readable reason.
        reason: String,
    },
    /// A guardrail tripped; the agent's response was not delivered.
    GuardrailTripped {
        /// Display name of the guardrail.
        guardrail: String,
        /// The guardrail's reasoning.
        reasoning: String,
    },
    /// The protected agent answered and every guardrail passed.
    Completed {
        /// The agent's final response text.
        response: String,
    },
}

impl PipelineOutcome {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SanitizationRejected { .. } => "rejected",
            Self::GuardrailTripped { .. } => "tripped",
            Self::Completed { .. } => "completed",
        }
    }

    /// The terminal [`PipelineState`] this outcome corresponds to.
    #[must_use]
    pub const fn state(&self) -> PipelineState {
        match self {
            Self::SanitizationRejected { .. } => PipelineState::Rejected,
            Self::GuardrailTripped { .. } => PipelineState::Tripped,
            Self::Completed { .. } => PipelineState::Succeeded,
        }
    }

    /// Returns `true` if the agent's response was delivered.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Returns `true` if a guardrail tripped.
    #[must_use]
    pub const fn is_tripped(&self) -> bool {
        matches!(self, Self::GuardrailTripped { .. })
    }

    /// Returns `true` if sanitization rejected the input.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::SanitizationRejected { .. })
    }

    /// The agent's response, only for completed runs.
    #[must_use]
    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Completed { response } => Some(response),
            _ => None,
        }
    }
}

impl std::fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SanitizationRejected { reason } => write!(f, "Input rejected: {reason}"),
            Self::GuardrailTripped {
                guardrail,
                reasoning,
            } => write!(f, "Guardrail '{guardrail}' tripped: {reasoning}"),
            Self::Completed { response } => f.write_str(response),
        }
    }
}

/// Everything known about a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// The terminal outcome.
    pub outcome: PipelineOutcome,
    /// The trace id the run was correlated under.
    pub trace_id: String,
    /// The cleaned input, when sanitization succeeded.
    pub sanitized_input: Option<String>,
    /// Counters collected by the run's trace scope.
    pub metrics: PipelineMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        let terminal = [
            PipelineState::Succeeded,
            PipelineState::Tripped,
            PipelineState::Rejected,
        ];
        for state in terminal {
            assert!(state.is_terminal());
        }
        for state in [
            PipelineState::Start,
            PipelineState::Sanitizing,
            PipelineState::BuildingGuardrails,
            PipelineState::Invoking,
        ] {
            assert!(!state.is_terminal());
        }
    }

    #[test]
    fn test_outcome_accessors() {
        let tripped = PipelineOutcome::GuardrailTripped {
            guardrail: "Out of context guardrail".to_owned(),
            reasoning: "not about math".to_owned(),
        };
        assert!(tripped.is_tripped());
        assert_eq!(tripped.response(), None);
        assert_eq!(tripped.state(), PipelineState::Tripped);
        assert_eq!(
            tripped.to_string(),
            "Guardrail 'Out of context guardrail' tripped: not about math"
        );

        let done = PipelineOutcome::Completed {
            response: "4".to_owned(),
        };
        assert_eq!(done.response(), Some("4"));
        assert_eq!(done.kind(), "completed");
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = PipelineOutcome::SanitizationRejected {
            reason: "too long".to_owned(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "sanitization_rejected");
        assert_eq!(json["reason"], "too long");
    }
}
