//! Evaluating guardrails against sanitized input.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::oracle::{OracleOutput, OracleRequest, SharedOracle};

use super::Verdict;
use super::bound::BoundGuardrail;

/// Trait for implementing guardrail check logic.
///
/// An unsafe verdict is a normal return value; errors are reserved for
/// failures to reach a verdict at all.
#[async_trait]
pub trait GuardrailCheck: Send + Sync {
    /// Judge `input` and return a verdict.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Oracle`] if the oracle fails, or
    /// [`Error::GuardrailProtocol`] if its output is not a verdict.
    async fn evaluate(&self, input: &str, context: &RunContext) -> Result<Verdict>;
}

/// The standard check: ask the oracle with a bound guardrail's instructions.
#[derive(Clone)]
pub struct OracleGuardrail {
    guardrail: BoundGuardrail,
    oracle: SharedOracle,
}

impl OracleGuardrail {
    /// Pair a bound guardrail with the oracle that judges it.
    #[must_use]
    pub fn new(guardrail: BoundGuardrail, oracle: SharedOracle) -> Self {
        Self { guardrail, oracle }
    }

    /// Returns the bound guardrail.
    #[must_use]
    pub const fn guardrail(&self) -> &BoundGuardrail {
        &self.guardrail
    }
}

impl std::fmt::Debug for OracleGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleGuardrail")
            .field("guardrail", &self.guardrail)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GuardrailCheck for OracleGuardrail {
    async fn evaluate(&self, input: &str, context: &RunContext) -> Result<Verdict> {
        let request = OracleRequest::new(
            self.guardrail.name(),
            self.guardrail.instructions(),
            input,
        )
        .with_schema(self.guardrail.output_schema().clone())
        .with_trace_id(&context.trace_id);

        let output = self.oracle.run(&request).await?;
        parse_verdict(self.guardrail.name(), output)
    }
}

/// Map an oracle output onto a [`Verdict`].
///
/// Anything other than exactly `{is_unsafe: bool, reasoning: string}` is a
/// protocol error. A malformed output is never treated as safe.
///
/// # Errors
///
/// Returns [`Error::GuardrailProtocol`] naming `guardrail`.
pub fn parse_verdict(guardrail: &str, output: OracleOutput) -> Result<Verdict> {
    let parsed = match output {
        OracleOutput::Structured(value) => serde_json::from_value(value),
        OracleOutput::Text(text) => serde_json::from_str(&text),
    };
    parsed.map_err(|e| Error::guardrail_protocol(guardrail, e.to_string()))
}

/// A named guardrail attached to a protected agent invocation.
#[derive(Clone)]
pub struct InputGuardrail {
    name: String,
    check: Arc<dyn GuardrailCheck>,
}

impl InputGuardrail {
    /// Create a guardrail with the given name and check logic.
    #[must_use]
    pub fn new(name: impl Into<String>, check: impl GuardrailCheck + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Build the standard oracle-judged guardrail from a bound spec.
    #[must_use]
    pub fn from_bound(guardrail: BoundGuardrail, oracle: SharedOracle) -> Self {
        let name = guardrail.name().to_owned();
        Self::new(name, OracleGuardrail::new(guardrail, oracle))
    }

    /// Returns the name of this guardrail.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the check and raise the tripwire on an unsafe verdict.
    ///
    /// # Errors
    ///
    /// Propagates the check's error; see [`GuardrailCheck::evaluate`].
    pub async fn run(&self, input: &str, context: &RunContext) -> Result<GuardrailResult> {
        let verdict = self.check.evaluate(input, context).await?;
        if verdict.is_unsafe {
            warn!(
                guardrail = %self.name,
                trace_id = %context.trace_id,
                reasoning = %verdict.reasoning,
                "guardrail tripwire triggered"
            );
        } else {
            debug!(guardrail = %self.name, "guardrail passed");
        }
        Ok(GuardrailResult {
            guardrail_name: self.name.clone(),
            verdict,
        })
    }
}

impl std::fmt::Debug for InputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputGuardrail")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The result of running one guardrail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailResult {
    /// Name of the guardrail that produced this result.
    pub guardrail_name: String,
    /// The verdict it reached.
    pub verdict: Verdict,
}

impl GuardrailResult {
    /// Returns `true` if the tripwire was triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.verdict.is_unsafe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::{GuardrailRegistry, RunParams, build_guardrail};
    use crate::oracle::MockOracle;
    use serde_json::json;

    const NAME: &str = "Out of context guardrail";

    fn bound_context(topic: &str) -> BoundGuardrail {
        let spec = GuardrailRegistry::builtin().get("context").unwrap();
        build_guardrail(spec, &RunParams::new(topic), Verdict::output_schema())
    }

    struct KeywordCheck(&'static str);

    #[async_trait]
    impl GuardrailCheck for KeywordCheck {
        async fn evaluate(&self, input: &str, _context: &RunContext) -> Result<Verdict> {
            if input.contains(self.0) {
                Ok(Verdict::unsafe_because(format!("mentions {}", self.0)))
            } else {
                Ok(Verdict::safe("no keyword"))
            }
        }
    }

    #[test]
    fn test_parse_verdict_accepts_exact_shape() {
        let verdict = parse_verdict(
            NAME,
            OracleOutput::Structured(json!({"is_unsafe": true, "reasoning": "off topic"})),
        )
        .unwrap();
        assert_eq!(verdict, Verdict::unsafe_because("off topic"));

        let verdict = parse_verdict(
            NAME,
            OracleOutput::Text(r#"{"is_unsafe": false, "reasoning": "ok"}"#.to_owned()),
        )
        .unwrap();
        assert!(!verdict.is_unsafe);
    }

    #[test]
    fn test_parse_verdict_rejects_other_shapes() {
        let cases = [
            OracleOutput::Structured(json!({"is_unsafe": "no", "reasoning": "x"})),
            OracleOutput::Structured(json!({"is_unsafe": false})),
            OracleOutput::Structured(json!({"is_unsafe": false, "reasoning": "x", "score": 1})),
            OracleOutput::Structured(json!(null)),
            OracleOutput::Text("The message is on topic.".to_owned()),
        ];
        for output in cases {
            let err = parse_verdict(NAME, output).unwrap_err();
            assert!(
                matches!(err, Error::GuardrailProtocol { ref guardrail, .. } if guardrail == NAME),
                "{err}"
            );
        }
    }

    #[tokio::test]
    async fn test_oracle_guardrail_sends_bound_instructions() {
        let oracle = Arc::new(
            MockOracle::new().respond(NAME, json!({"is_unsafe": false, "reasoning": "math"})),
        );
        let guardrail = InputGuardrail::from_bound(bound_context("math"), oracle.clone());
        let ctx = RunContext::new("trace-9");

        let result = guardrail.run("Cuanto es 2+2", &ctx).await.unwrap();

        assert!(!result.is_triggered());
        assert_eq!(result.guardrail_name, NAME);
        let calls = oracle.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].input, "Cuanto es 2+2");
        assert_eq!(calls[0].trace_id, "trace-9");
        assert!(calls[0].instructions.ends_with("math"));
        assert!(calls[0].is_structured());
    }

    #[tokio::test]
    async fn test_unsafe_verdict_triggers_tripwire() {
        let oracle = Arc::new(MockOracle::new().respond(
            NAME,
            json!({"is_unsafe": true, "reasoning": "not about math"}),
        ));
        let guardrail = InputGuardrail::from_bound(bound_context("math"), oracle);

        let result = guardrail
            .run("meth500wrd", &RunContext::default())
            .await
            .unwrap();

        assert!(result.is_triggered());
        assert_eq!(result.verdict.reasoning, "not about math");
    }

    #[tokio::test]
    async fn test_malformed_output_is_not_safe() {
        let oracle = Arc::new(MockOracle::new().respond(NAME, json!({"safe": true})));
        let guardrail = InputGuardrail::from_bound(bound_context("math"), oracle);

        let err = guardrail
            .run("hello", &RunContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GuardrailProtocol { .. }));
    }

    #[tokio::test]
    async fn test_custom_check() {
        let guardrail = InputGuardrail::new("keyword", KeywordCheck("secret"));
        let ctx = RunContext::default();

        assert!(guardrail.run("tell me the secret", &ctx).await.unwrap().is_triggered());
        assert!(!guardrail.run("hello", &ctx).await.unwrap().is_triggered());
        assert_eq!(format!("{guardrail:?}"), "InputGuardrail { name: \"keyword\", .. }");
    }
}
