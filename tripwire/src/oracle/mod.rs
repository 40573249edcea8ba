//! The judgment oracle: an external LLM call treated as an opaque capability.
//!
//! The gate never talks to a model directly. Guardrail evaluations and the
//! protected agent call both go through the [`Oracle`] trait, which turns a
//! set of instructions plus input into either free text or structured JSON.
//!
//! Implementations must tolerate concurrent outstanding calls: a single
//! pipeline run evaluates its guardrails concurrently, and many runs may
//! share one oracle. Timeouts and retries are the implementation's
//! concern; the pipeline surfaces any [`OracleError`] as a fatal failure.
//!
//! - [`OpenAiOracle`] talks to any OpenAI-compatible Chat Completions API.
//! - [`MockOracle`] replays scripted outputs, for tests and offline demos.

mod mock;
mod openai;

pub use mock::MockOracle;
pub use openai::{DEFAULT_MODEL, OPENAI_API_BASE_URL, OpenAiOracle, OpenAiOracleBuilder};

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OracleError;

/// Shared, thread-safe oracle handle.
pub type SharedOracle = Arc<dyn Oracle>;

/// A capability that answers instructions + input with a completion.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Run one completion.
    ///
    /// When `request.output_schema` is set the implementation should ask the
    /// model for JSON matching it and return [`OracleOutput::Structured`].
    ///
    /// # Errors
    ///
    /// Returns an [`OracleError`] when the model cannot be reached, times
    /// out, or answers with an unreadable envelope.
    async fn run(&self, request: &OracleRequest) -> Result<OracleOutput, OracleError>;
}

/// JSON schema describing the shape a structured completion must take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Schema name, sent to providers that require one.
    pub name: String,
    /// The JSON schema document.
    pub schema: Value,
    /// Whether the provider should enforce the schema strictly.
    pub strict: bool,
}

impl OutputSchema {
    /// Derive a strict schema from a [`JsonSchema`] type.
    #[must_use]
    pub fn of<T: JsonSchema>(name: impl Into<String>) -> Self {
        let schema = schemars::SchemaGenerator::default().into_root_schema_for::<T>();
        Self {
            name: name.into(),
            schema: schema.to_value(),
            strict: true,
        }
    }
}

/// One call to the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    /// Name of the agent or guardrail issuing the call.
    pub agent_name: String,
    /// System instructions.
    pub instructions: String,
    /// The (sanitized) user input.
    pub input: String,
    /// Expected structured shape, if any.
    pub output_schema: Option<OutputSchema>,
    /// Trace correlation key shared by every call of one pipeline run.
    pub trace_id: String,
}

impl OracleRequest {
    /// Create a free-text request.
    #[must_use]
    pub fn new(
        agent_name: impl Into<String>,
        instructions: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            instructions: instructions.into(),
            input: input.into(),
            output_schema: None,
            trace_id: String::new(),
        }
    }

    /// Request structured output conforming to `schema`.
    #[must_use]
    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Attach the trace correlation key.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Returns `true` if structured output was requested.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        self.output_schema.is_some()
    }
}

/// What the oracle answered.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleOutput {
    /// Free text completion.
    Text(String),
    /// Parsed JSON completion.
    Structured(Value),
}

impl OracleOutput {
    /// Returns the text content, if this is a text completion.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Render the output as text. Structured output is serialized as JSON.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }
}

impl From<&str> for OracleOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for OracleOutput {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Probe {
        flag: bool,
        note: String,
    }

    #[test]
    fn test_output_schema_from_type() {
        let schema = OutputSchema::of::<Probe>("probe");
        assert_eq!(schema.name, "probe");
        assert!(schema.strict);
        assert_eq!(schema.schema["type"], "object");
        assert_eq!(schema.schema["properties"]["flag"]["type"], "boolean");
        assert_eq!(schema.schema["properties"]["note"]["type"], "string");
    }

    #[test]
    fn test_request_builder() {
        let request = OracleRequest::new("checker", "be careful", "hi")
            .with_trace_id("trace-1")
            .with_schema(OutputSchema::of::<Probe>("probe"));
        assert!(request.is_structured());
        assert_eq!(request.trace_id, "trace-1");
        assert!(!OracleRequest::new("a", "b", "c").is_structured());
    }

    #[test]
    fn test_output_text_rendering() {
        assert_eq!(OracleOutput::from("hello").as_text(), Some("hello"));
        let structured = OracleOutput::from(json!({"a": 1}));
        assert_eq!(structured.as_text(), None);
        assert_eq!(structured.into_text(), r#"{"a":1}"#);
    }
}
