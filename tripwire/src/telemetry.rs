//! Telemetry for pipeline runs using the `tracing` ecosystem.
//!
//! Each pipeline run opens a [`TraceScope`]: a guard that owns the run's
//! `pipeline` span and counts the work done inside it. The scope emits a
//! single `pipeline_closed` event when the run ends, whether it completes,
//! is rejected, trips a guardrail, fails, or is cancelled mid-flight.
//!
//! The library never installs a subscriber. Binaries do, e.g.:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
//!     .init();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{Span, debug_span, info, info_span, warn};

use crate::error::OracleError;
use crate::oracle::{Oracle, OracleOutput, OracleRequest, SharedOracle};

/// Outcome label recorded when a scope is dropped without being closed.
const FAILED: &str = "failed";

/// Counters collected during one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    /// Oracle calls issued (guardrails plus the protected agent).
    pub oracle_calls: usize,
    /// Guardrail verdicts received.
    pub guardrails_evaluated: usize,
    /// Wall-clock duration of the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
}

impl std::fmt::Display for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "oracle calls: {}, guardrails evaluated: {}",
            self.oracle_calls, self.guardrails_evaluated
        )?;
        if let Some(d) = self.duration {
            write!(f, ", duration: {:.2}s", d.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Scoped trace of one pipeline run.
///
/// Counters take `&self` so concurrently running guardrails can share the
/// scope by reference.
#[derive(Debug)]
pub struct TraceScope {
    trace_id: String,
    span: Span,
    start: Instant,
    oracle_calls: Arc<AtomicUsize>,
    guardrails_evaluated: AtomicUsize,
    closed: bool,
}

impl TraceScope {
    /// Open a scope for the given trace id.
    #[must_use]
    pub fn open(trace_id: impl Into<String>) -> Self {
        let trace_id = trace_id.into();
        let span = info_span!("pipeline", trace_id = %trace_id);
        Self {
            trace_id,
            span,
            start: Instant::now(),
            oracle_calls: Arc::new(AtomicUsize::new(0)),
            guardrails_evaluated: AtomicUsize::new(0),
            closed: false,
        }
    }

    /// Returns the trace id.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Returns the run's root span.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// Create a child span for one guardrail evaluation.
    #[must_use]
    pub fn guardrail_span(&self, guardrail: &str) -> Span {
        debug_span!(parent: &self.span, "guardrail", guardrail = %guardrail)
    }

    /// Create a child span for the protected agent call.
    #[must_use]
    pub fn agent_span(&self, agent: &str) -> Span {
        debug_span!(parent: &self.span, "agent", agent = %agent)
    }

    /// Wrap `oracle` so every call it serves is counted in this scope.
    #[must_use]
    pub fn instrument_oracle(&self, oracle: SharedOracle) -> SharedOracle {
        Arc::new(CountingOracle {
            inner: oracle,
            calls: Arc::clone(&self.oracle_calls),
        })
    }

    /// Record a guardrail verdict.
    pub fn record_guardrail(&self) {
        self.guardrails_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters.
    #[must_use]
    pub fn metrics(&self) -> PipelineMetrics {
        PipelineMetrics {
            oracle_calls: self.oracle_calls.load(Ordering::Relaxed),
            guardrails_evaluated: self.guardrails_evaluated.load(Ordering::Relaxed),
            duration: None,
        }
    }

    /// Close the scope with an outcome label and return the final metrics.
    #[must_use]
    pub fn close(mut self, outcome: &str) -> PipelineMetrics {
        self.closed = true;
        self.emit(outcome)
    }

    fn emit(&self, outcome: &str) -> PipelineMetrics {
        let duration = self.start.elapsed();
        let metrics = PipelineMetrics {
            duration: Some(duration),
            ..self.metrics()
        };
        let _entered = self.span.enter();
        if outcome == FAILED {
            warn!(
                outcome,
                oracle_calls = metrics.oracle_calls,
                guardrails_evaluated = metrics.guardrails_evaluated,
                duration_ms = duration.as_millis(),
                "pipeline_closed"
            );
        } else {
            info!(
                outcome,
                oracle_calls = metrics.oracle_calls,
                guardrails_evaluated = metrics.guardrails_evaluated,
                duration_ms = duration.as_millis(),
                "pipeline_closed"
            );
        }
        metrics
    }
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        if !self.closed {
            self.emit(FAILED);
        }
    }
}

/// Oracle adapter that counts issued calls into a [`TraceScope`].
struct CountingOracle {
    inner: SharedOracle,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Oracle for CountingOracle {
    async fn run(&self, request: &OracleRequest) -> Result<OracleOutput, OracleError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.run(request).await
    }
}
