//! Per-run invocation context shared by every guardrail of one pipeline run.

/// Default trace identifier used when the caller does not supply one.
pub const DEFAULT_TRACE_ID: &str = "pipeline";

/// Read-only context handed to each guardrail check.
///
/// One context is built per pipeline run and borrowed by every evaluation,
/// so all oracle calls of a run carry the same trace id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Trace correlation key. Observability only, never a control input.
    pub trace_id: String,
    /// Name of the protected agent the guardrails are attached to.
    pub agent_name: String,
    /// Topic the conversation is restricted to.
    pub topic: String,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_ID)
    }
}

impl RunContext {
    /// Create a context for the given trace id.
    #[must_use]
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            agent_name: String::new(),
            topic: String::new(),
        }
    }

    /// Set the protected agent name.
    #[must_use]
    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    /// Set the conversation topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}
