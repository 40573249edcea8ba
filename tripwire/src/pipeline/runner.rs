//! Pipeline runner.

use std::pin::pin;
use std::sync::Arc;

use futures::future::{self, Either};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{Instrument, debug, info};

use crate::config::{AgentConfig, GateConfig};
use crate::context::{DEFAULT_TRACE_ID, RunContext};
use crate::error::Result;
use crate::guardrail::{
    CONTEXT_GUARDRAIL, GuardrailRegistry, GuardrailResult, InputGuardrail, RunParams, Verdict,
    build_guardrail,
};
use crate::oracle::{OracleRequest, SharedOracle};
use crate::sanitize::Sanitizer;
use crate::telemetry::TraceScope;

use super::GuardrailMode;
use super::outcome::{PipelineOutcome, PipelineReport, PipelineState};

/// Input-safety gate in front of one protected agent.
///
/// ```rust,ignore
/// let pipeline = Pipeline::new(oracle)
///     .guardrails(["context", "jailbreak"])
///     .mode(GuardrailMode::Parallel);
///
/// match pipeline.run("Cuanto es 2+2", "math").await? {
///     PipelineOutcome::Completed { response } => println!("{response}"),
///     other => eprintln!("{other}"),
/// }
/// ```
#[derive(Clone)]
pub struct Pipeline {
    oracle: SharedOracle,
    registry: GuardrailRegistry,
    guardrail_ids: Vec<String>,
    extra_guardrails: Vec<InputGuardrail>,
    sanitizer: Sanitizer,
    agent: AgentConfig,
    mode: GuardrailMode,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("guardrail_ids", &self.guardrail_ids)
            .field("extra_guardrails", &self.extra_guardrails)
            .field("sanitizer", &self.sanitizer)
            .field("agent", &self.agent.name)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline with the built-in registry and the topic guardrail.
    #[must_use]
    pub fn new(oracle: SharedOracle) -> Self {
        Self {
            oracle,
            registry: GuardrailRegistry::with_builtins(),
            guardrail_ids: vec![CONTEXT_GUARDRAIL.to_owned()],
            extra_guardrails: Vec::new(),
            sanitizer: Sanitizer::default(),
            agent: AgentConfig::default(),
            mode: GuardrailMode::default(),
        }
    }

    /// Create a pipeline from a validated configuration.
    #[must_use]
    pub fn from_config(config: &GateConfig, oracle: SharedOracle) -> Self {
        Self {
            oracle,
            registry: config.registry(),
            guardrail_ids: config.guardrails.clone(),
            extra_guardrails: Vec::new(),
            sanitizer: config.sanitizer(),
            agent: config.agent.clone(),
            mode: config.mode,
        }
    }

    /// Replace the guardrail registry.
    #[must_use]
    pub fn registry(mut self, registry: GuardrailRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Select the registry guardrails attached to every run, in order.
    #[must_use]
    pub fn guardrails<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guardrail_ids = identifiers.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a custom guardrail after the registry ones.
    #[must_use]
    pub fn guardrail(mut self, guardrail: InputGuardrail) -> Self {
        self.extra_guardrails.push(guardrail);
        self
    }

    /// Set the sanitizer.
    #[must_use]
    pub const fn sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Set the protected agent.
    #[must_use]
    pub fn agent(mut self, agent: AgentConfig) -> Self {
        self.agent = agent;
        self
    }

    /// Set the execution mode.
    #[must_use]
    pub const fn mode(mut self, mode: GuardrailMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run the gate under the default trace id.
    ///
    /// # Errors
    ///
    /// See [`run_detailed`](Self::run_detailed).
    pub async fn run(&self, query: &str, topic: &str) -> Result<PipelineOutcome> {
        self.run_with_trace(query, topic, DEFAULT_TRACE_ID).await
    }

    /// Run the gate under a caller-supplied trace id.
    ///
    /// # Errors
    ///
    /// See [`run_detailed`](Self::run_detailed).
    pub async fn run_with_trace(
        &self,
        query: &str,
        topic: &str,
        trace_id: &str,
    ) -> Result<PipelineOutcome> {
        self.run_detailed(query, topic, trace_id)
            .await
            .map(|report| report.outcome)
    }

    /// Run the gate and return the outcome with its trace metadata.
    ///
    /// Rejection by the sanitizer and guardrail trips are returned as
    /// outcomes. The trace scope is closed on every exit path.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownGuardrail`](crate::Error::UnknownGuardrail) if a
    ///   selected identifier is not in the registry.
    /// - [`Error::GuardrailProtocol`](crate::Error::GuardrailProtocol) if a
    ///   guardrail verdict cannot be parsed.
    /// - [`Error::Oracle`](crate::Error::Oracle) if any oracle call fails.
    pub async fn run_detailed(
        &self,
        query: &str,
        topic: &str,
        trace_id: &str,
    ) -> Result<PipelineReport> {
        let scope = TraceScope::open(trace_id);
        let span = scope.span().clone();
        let (outcome, sanitized_input) = self.execute(query, topic, &scope).instrument(span).await?;
        let metrics = scope.close(outcome.kind());

        Ok(PipelineReport {
            outcome,
            trace_id: trace_id.to_owned(),
            sanitized_input,
            metrics,
        })
    }

    async fn execute(
        &self,
        query: &str,
        topic: &str,
        scope: &TraceScope,
    ) -> Result<(PipelineOutcome, Option<String>)> {
        transition(PipelineState::Start, PipelineState::Sanitizing);
        let input = match self.sanitizer.sanitize(query) {
            Ok(input) => input,
            Err(e) => {
                info!(reason = %e, "input rejected by sanitizer");
                transition(PipelineState::Sanitizing, PipelineState::Rejected);
                let outcome = PipelineOutcome::SanitizationRejected {
                    reason: e.to_string(),
                };
                return Ok((outcome, None));
            }
        };

        transition(PipelineState::Sanitizing, PipelineState::BuildingGuardrails);
        let oracle = scope.instrument_oracle(Arc::clone(&self.oracle));
        let guardrails = self.bind_guardrails(topic, &oracle)?;
        let context = RunContext::new(scope.trace_id())
            .with_agent_name(&self.agent.name)
            .with_topic(topic);

        transition(PipelineState::BuildingGuardrails, PipelineState::Invoking);
        debug!(
            guardrails = guardrails.len(),
            mode = %self.mode,
            "invoking protected agent"
        );
        let outcome = match self.mode {
            GuardrailMode::Blocking => {
                self.invoke_blocking(&guardrails, &input, &context, &oracle, scope)
                    .await?
            }
            GuardrailMode::Parallel => {
                self.invoke_parallel(&guardrails, &input, &context, &oracle, scope)
                    .await?
            }
        };

        transition(PipelineState::Invoking, outcome.state());
        Ok((outcome, Some(input)))
    }

    /// Bind the selected specs for this run, followed by custom guardrails.
    fn bind_guardrails(&self, topic: &str, oracle: &SharedOracle) -> Result<Vec<InputGuardrail>> {
        let params = RunParams::new(topic);
        let shape = Verdict::output_schema();

        let mut guardrails: Vec<InputGuardrail> = self
            .registry
            .select(&self.guardrail_ids)?
            .into_iter()
            .map(|spec| {
                let bound = build_guardrail(spec, &params, shape.clone());
                InputGuardrail::from_bound(bound, Arc::clone(oracle))
            })
            .collect();
        guardrails.extend(self.extra_guardrails.iter().cloned());
        Ok(guardrails)
    }

    async fn invoke_blocking(
        &self,
        guardrails: &[InputGuardrail],
        input: &str,
        context: &RunContext,
        oracle: &SharedOracle,
        scope: &TraceScope,
    ) -> Result<PipelineOutcome> {
        if let Some(tripped) = run_guardrails(guardrails, input, context, scope).await? {
            return Ok(tripped_outcome(tripped));
        }
        let response = self.call_agent(oracle, input, context, scope).await?;
        Ok(PipelineOutcome::Completed { response })
    }

    async fn invoke_parallel(
        &self,
        guardrails: &[InputGuardrail],
        input: &str,
        context: &RunContext,
        oracle: &SharedOracle,
        scope: &TraceScope,
    ) -> Result<PipelineOutcome> {
        let checks = pin!(run_guardrails(guardrails, input, context, scope));
        let agent = pin!(self.call_agent(oracle, input, context, scope));

        match future::select(checks, agent).await {
            Either::Left((verdict, agent)) => {
                if let Some(tripped) = verdict? {
                    debug!("cancelling in-flight agent call");
                    return Ok(tripped_outcome(tripped));
                }
                let response = agent.await?;
                Ok(PipelineOutcome::Completed { response })
            }
            Either::Right((response, checks)) => {
                let response = response?;
                if let Some(tripped) = checks.await? {
                    debug!("discarding agent response");
                    return Ok(tripped_outcome(tripped));
                }
                Ok(PipelineOutcome::Completed { response })
            }
        }
    }

    async fn call_agent(
        &self,
        oracle: &SharedOracle,
        input: &str,
        context: &RunContext,
        scope: &TraceScope,
    ) -> Result<String> {
        let request = OracleRequest::new(&self.agent.name, &self.agent.instructions, input)
            .with_trace_id(&context.trace_id);
        let output = oracle
            .run(&request)
            .instrument(scope.agent_span(&self.agent.name))
            .await?;
        Ok(output.into_text())
    }
}

/// Evaluate every guardrail concurrently and return the first trip.
///
/// Returning drops the remaining evaluations. An error observed before any
/// trip is returned as is.
async fn run_guardrails(
    guardrails: &[InputGuardrail],
    input: &str,
    context: &RunContext,
    scope: &TraceScope,
) -> Result<Option<GuardrailResult>> {
    let mut pending: FuturesUnordered<_> = guardrails
        .iter()
        .map(|guardrail| {
            guardrail
                .run(input, context)
                .instrument(scope.guardrail_span(guardrail.name()))
        })
        .collect();

    while let Some(result) = pending.next().await {
        let result = result?;
        scope.record_guardrail();
        if result.is_triggered() {
            return Ok(Some(result));
        }
    }
    Ok(None)
}

fn tripped_outcome(result: GuardrailResult) -> PipelineOutcome {
    PipelineOutcome::GuardrailTripped {
        guardrail: result.guardrail_name,
        reasoning: result.verdict.reasoning,
    }
}

fn transition(from: PipelineState, to: PipelineState) {
    debug!(?from, ?to, terminal = to.is_terminal(), "pipeline state transition");
}
