//! Gate configuration, loaded from JSON.
//!
//! Every field has a default, so an empty object (or no file at all) gives
//! the standard setup: a 100 character bound, the topic guardrail only, and
//! guardrails resolved before the protected agent is called.
//!
//! ```json
//! {
//!   "max_input_chars": 100,
//!   "guardrails": ["context", "jailbreak"],
//!   "mode": "parallel",
//!   "agent": { "name": "Math tutor", "instructions": "Answer math questions." },
//!   "oracle": { "model": "gpt-4o-mini", "timeout_secs": 30 },
//!   "custom_guardrails": [
//!     { "identifier": "pii", "name": "PII guardrail", "instructions": "..." }
//!   ]
//! }
//! ```
//!
//! Credentials are never read from this file; see
//! [`OpenAiOracle::from_env`](crate::oracle::OpenAiOracle::from_env).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::guardrail::{CONTEXT_GUARDRAIL, GuardrailRegistry, GuardrailSpec};
use crate::oracle::{DEFAULT_MODEL, OpenAiOracle, OpenAiOracleBuilder};
use crate::pipeline::GuardrailMode;
use crate::sanitize::{DEFAULT_MAX_CHARS, Sanitizer};

/// Top-level gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Maximum cleaned input length, in characters.
    pub max_input_chars: usize,
    /// Reject disallowed characters instead of dropping them.
    pub strict_characters: bool,
    /// Identifiers of the guardrails attached to every run, in order.
    pub guardrails: Vec<String>,
    /// When guardrails run relative to the protected agent.
    pub mode: GuardrailMode,
    /// The protected agent.
    pub agent: AgentConfig,
    /// Oracle connection settings.
    pub oracle: OracleConfig,
    /// Extra guardrail specs merged into the built-in registry.
    pub custom_guardrails: Vec<GuardrailSpec>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_CHARS,
            strict_characters: false,
            guardrails: vec![CONTEXT_GUARDRAIL.to_owned()],
            mode: GuardrailMode::default(),
            agent: AgentConfig::default(),
            oracle: OracleConfig::default(),
            custom_guardrails: Vec::new(),
        }
    }
}

impl GateConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text cannot be parsed or validated.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_input_chars == 0 {
            return Err(ConfigError::invalid("max_input_chars must be greater than 0"));
        }
        if self.oracle.model.trim().is_empty() {
            return Err(ConfigError::invalid("oracle.model must not be empty"));
        }
        if self.agent.name.trim().is_empty() {
            return Err(ConfigError::invalid("agent.name must not be empty"));
        }
        if let Some(spec) = self
            .custom_guardrails
            .iter()
            .find(|s| s.identifier.trim().is_empty() || s.name.trim().is_empty())
        {
            return Err(ConfigError::invalid(format!(
                "custom guardrail {spec:?} needs a non-empty identifier and name"
            )));
        }
        let registry = self.registry();
        if let Some(missing) = self.guardrails.iter().find(|id| registry.get(id).is_none()) {
            return Err(ConfigError::invalid(format!(
                "unknown guardrail identifier '{missing}'"
            )));
        }
        Ok(())
    }

    /// The built-in registry extended with `custom_guardrails`.
    #[must_use]
    pub fn registry(&self) -> GuardrailRegistry {
        self.custom_guardrails
            .iter()
            .cloned()
            .fold(GuardrailRegistry::with_builtins(), GuardrailRegistry::with_spec)
    }

    /// The sanitizer described by this configuration.
    #[must_use]
    pub const fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(self.max_input_chars).strict(self.strict_characters)
    }
}

/// The protected agent's identity and instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent name, used in logs and oracle requests.
    pub name: String,
    /// System instructions for the protected agent.
    pub instructions: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Assistant".to_owned(),
            instructions: "You are a helpful assistant. Answer the user's question concisely, \
                           in the language the question was asked in."
                .to_owned(),
        }
    }
}

/// Oracle connection settings (credentials excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Model identifier.
    pub model: String,
    /// Base URL override; `OPENAI_BASE_URL` applies when unset.
    pub base_url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            base_url: None,
            timeout_secs: Some(60),
        }
    }
}

impl OracleConfig {
    /// Apply these settings to an oracle builder.
    #[must_use]
    pub fn apply(&self, mut builder: OpenAiOracleBuilder) -> OpenAiOracleBuilder {
        builder = builder.model(&self.model);
        if let Some(ref base_url) = self.base_url {
            builder = builder.base_url(base_url);
        }
        if let Some(timeout) = self.timeout_secs {
            builder = builder.timeout_secs(timeout);
        }
        builder
    }

    /// Build an [`OpenAiOracle`] with the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `OPENAI_API_KEY` is not set.
    pub fn build_oracle(&self) -> ConfigResult<OpenAiOracle> {
        self.apply(OpenAiOracle::builder_from_env()?).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.max_input_chars, 100);
        assert_eq!(config.guardrails, ["context"]);
        assert_eq!(config.mode, GuardrailMode::Blocking);
        assert_eq!(config.oracle.model, DEFAULT_MODEL);
        assert!(config.validate().is_ok());
        assert_eq!(GateConfig::from_json("{}").unwrap(), config);
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = GateConfig::from_json(
            r#"{
                "max_input_chars": 250,
                "guardrails": ["context", "pii"],
                "mode": "parallel",
                "agent": {"name": "Math tutor"},
                "custom_guardrails": [
                    {"identifier": "pii", "name": "PII guardrail", "instructions": "Find PII."}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.max_input_chars, 250);
        assert_eq!(config.mode, GuardrailMode::Parallel);
        assert_eq!(config.agent.name, "Math tutor");
        assert_eq!(config.agent.instructions, AgentConfig::default().instructions);
        assert_eq!(config.registry().get("pii").unwrap().name, "PII guardrail");
        assert_eq!(config.sanitizer().max_chars(), 250);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            r#"{"max_input_chars": 0}"#,
            r#"{"oracle": {"model": " "}}"#,
            r#"{"agent": {"name": ""}}"#,
            r#"{"guardrails": ["nope"]}"#,
            r#"{"custom_guardrails": [{"identifier": "", "name": "x", "instructions": "y"}]}"#,
        ];
        for json in cases {
            let err = GateConfig::from_json(json).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{json}: {err}");
        }
        assert!(matches!(
            GateConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"strict_characters": true, "guardrails": []}}"#).unwrap();

        let config = GateConfig::load(file.path()).unwrap();
        assert!(config.sanitizer().is_strict());
        assert!(config.guardrails.is_empty());

        assert!(matches!(
            GateConfig::load("/nonexistent/tripwire.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_oracle_config_applies_to_builder() {
        let config = OracleConfig {
            model: "local-model".to_owned(),
            base_url: Some("http://localhost:11434/v1".to_owned()),
            timeout_secs: Some(5),
        };
        let oracle = config
            .apply(OpenAiOracle::builder().api_key("k"))
            .build()
            .unwrap();
        assert_eq!(oracle.model(), "local-model");
        assert_eq!(oracle.base_url(), "http://localhost:11434/v1");
    }
}
