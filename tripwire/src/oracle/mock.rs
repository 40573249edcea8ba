//! Scripted oracle for tests and offline runs.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::OracleError;

use super::{Oracle, OracleOutput, OracleRequest};

/// An [`Oracle`] that answers from a fixed script keyed by agent name.
///
/// Every request is recorded, so tests can assert how many oracle calls a
/// pipeline run issued and with which instructions.
///
/// ```rust,ignore
/// let oracle = MockOracle::new()
///     .respond("Out of context guardrail", json!({"is_unsafe": false, "reasoning": "on topic"}))
///     .respond("Assistant", "2 + 2 es igual a 4.");
/// ```
#[derive(Debug, Default)]
pub struct MockOracle {
    script: HashMap<String, Result<OracleOutput, OracleError>>,
    calls: Mutex<Vec<OracleRequest>>,
}

impl MockOracle {
    /// Create an empty script. Unscripted agents fail as unavailable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call from `agent_name` with `output`.
    #[must_use]
    pub fn respond(mut self, agent_name: impl Into<String>, output: impl Into<OracleOutput>) -> Self {
        self.script.insert(agent_name.into(), Ok(output.into()));
        self
    }

    /// Fail every call from `agent_name` with `error`.
    #[must_use]
    pub fn fail(mut self, agent_name: impl Into<String>, error: OracleError) -> Self {
        self.script.insert(agent_name.into(), Err(error));
        self
    }

    /// Snapshot of every request received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<OracleRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of requests received from `agent_name`.
    #[must_use]
    pub fn calls_for(&self, agent_name: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.agent_name == agent_name)
            .count()
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn run(&self, request: &OracleRequest) -> Result<OracleOutput, OracleError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        match self.script.get(&request.agent_name) {
            Some(answer) => answer.clone(),
            None => Err(OracleError::unavailable(format!(
                "no scripted response for '{}'",
                request.agent_name
            ))),
        }
    }
}
