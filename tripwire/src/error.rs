//! Unified error types for the tripwire gate.
//!
//! Only failures live here. A tripped guardrail or a rejected input is a
//! normal [`PipelineOutcome`](crate::pipeline::PipelineOutcome), never an
//! [`Error`]:
//!
//! - [`SanitizeError`] is recovered by the pipeline into a rejection.
//! - [`OracleError`] covers connectivity, timeouts and HTTP failures of the
//!   judgment oracle. It is fatal for the current pipeline run.
//! - [`Error::GuardrailProtocol`] is raised when a guardrail's oracle output
//!   cannot be mapped onto a [`Verdict`](crate::guardrail::Verdict).

use std::time::Duration;

/// Result type alias for tripwire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the tripwire gate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The oracle failed to answer.
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// A guardrail's oracle output did not match the verdict shape.
    #[error("Guardrail '{guardrail}' returned a malformed verdict: {message}")]
    GuardrailProtocol {
        /// Display name of the guardrail.
        guardrail: String,
        /// What was wrong with the output.
        message: String,
    },

    /// A configured guardrail identifier is not in the registry.
    #[error("Unknown guardrail identifier '{0}'")]
    UnknownGuardrail(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Create a guardrail protocol error.
    #[must_use]
    pub fn guardrail_protocol(guardrail: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GuardrailProtocol {
            guardrail: guardrail.into(),
            message: message.into(),
        }
    }

    /// Create an unknown guardrail error.
    #[must_use]
    pub fn unknown_guardrail(identifier: impl Into<String>) -> Self {
        Self::UnknownGuardrail(identifier.into())
    }

    /// Returns `true` if the failure came from the oracle collaborator
    /// (unavailable, timed out, or answered with a bad HTTP status).
    #[must_use]
    pub const fn is_oracle_failure(&self) -> bool {
        matches!(self, Self::Oracle(_))
    }
}

/// Error raised by the sanitizer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SanitizeError {
    /// The cleaned input is longer than the configured bound.
    #[error("Input exceeds the maximum length of {max} characters (got {length})")]
    InputTooLong {
        /// Length of the cleaned input, in characters.
        length: usize,
        /// The configured bound.
        max: usize,
    },

    /// Strict mode found a character outside the allow-list.
    #[error("Input contains a disallowed character {character:?} at position {position}")]
    DisallowedCharacter {
        /// The offending character.
        character: char,
        /// Character index within the emoticon-stripped input.
        position: usize,
    },
}

/// Error type for oracle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum OracleError {
    /// Network or connection failure.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle did not answer in time.
    #[error("oracle timed out: {0}")]
    Timeout(String),

    /// The oracle answered with a non-success HTTP status.
    #[error("oracle returned HTTP {status}: {message}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The oracle's response envelope could not be read.
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),
}

impl OracleError {
    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a timeout error for the given elapsed budget.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout(format!("no answer after {}s", after.as_secs()))
    }

    /// Create a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Missing environment variable or field.
    #[error("missing: {0}")]
    Missing(String),

    /// Invalid value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a missing field error.
    #[inline]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    /// Create an invalid value error.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
