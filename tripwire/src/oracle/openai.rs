//! Oracle backed by an OpenAI-compatible Chat Completions API.
//!
//! Structured requests are sent with a `json_schema` response format so the
//! model is constrained to the verdict shape. Works with OpenAI itself as
//! well as compatible gateways (Azure, vLLM, Ollama's `/v1` endpoint).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult, OracleError};

use super::{Oracle, OracleOutput, OracleRequest, OutputSchema};

/// Default `OpenAI` API base URL.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model used for guardrails and the protected agent.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Header carrying the pipeline trace id on every request.
const TRACE_HEADER: &str = "x-trace-id";

/// Chat Completions oracle.
///
/// Cheap to clone; clones share the underlying connection pool, which
/// serves concurrent guardrail calls.
///
/// ```rust,ignore
/// let oracle = OpenAiOracle::builder()
///     .api_key("sk-...")
///     .model("gpt-4o-mini")
///     .timeout_secs(30)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct OpenAiOracle {
    http_client: reqwest::Client,
    api_key: Arc<str>,
    base_url: Arc<str>,
    model: Arc<str>,
}

impl std::fmt::Debug for OpenAiOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiOracle")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl OpenAiOracle {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> OpenAiOracleBuilder {
        OpenAiOracleBuilder::default()
    }

    /// Create an oracle from environment variables.
    ///
    /// - `OPENAI_API_KEY` (required)
    /// - `OPENAI_BASE_URL` (optional)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `OPENAI_API_KEY` is not set.
    pub fn from_env() -> ConfigResult<Self> {
        Self::builder_from_env()?.build()
    }

    /// Builder pre-filled from environment variables, for further tuning.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `OPENAI_API_KEY` is not set.
    pub fn builder_from_env() -> ConfigResult<OpenAiOracleBuilder> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| ConfigError::missing("OPENAI_API_KEY"))?;
        let mut builder = Self::builder().api_key(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            builder = builder.base_url(base_url);
        }
        Ok(builder)
    }

    /// Returns the configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body<'a>(&'a self, request: &'a OracleRequest) -> ChatBody<'a> {
        let mut messages = Vec::with_capacity(2);
        if !request.instructions.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &request.instructions,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.input,
        });

        ChatBody {
            model: &self.model,
            messages,
            response_format: request.output_schema.as_ref().map(ResponseFormat::from),
        }
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn run(&self, request: &OracleRequest) -> Result<OracleOutput, OracleError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = self.build_body(request);

        debug!(
            agent = %request.agent_name,
            model = %self.model,
            structured = request.is_structured(),
            "Sending oracle request"
        );

        let mut builder = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);
        if !request.trace_id.is_empty() {
            builder = builder.header(TRACE_HEADER, &request.trace_id);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletion = response.json().await?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| OracleError::malformed("response contained no choices"))?;

        if let Some(refusal) = message.refusal {
            return Ok(OracleOutput::Text(refusal));
        }
        let content = message.content.unwrap_or_default();

        if request.is_structured() {
            if let Ok(value) = serde_json::from_str::<Value>(&content) {
                return Ok(OracleOutput::Structured(value));
            }
        }
        Ok(OracleOutput::Text(content))
    }
}

/// Builder for [`OpenAiOracle`].
#[derive(Debug, Default)]
pub struct OpenAiOracleBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

impl OpenAiOracleBuilder {
    /// Set the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the per-request timeout in seconds. Default is no timeout.
    #[must_use]
    pub const fn timeout_secs(mut self, timeout: u64) -> Self {
        self.timeout_secs = Some(timeout);
        self
    }

    /// Build the oracle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] without an API key, or
    /// [`ConfigError::Invalid`] if the HTTP client cannot be built.
    pub fn build(self) -> ConfigResult<OpenAiOracle> {
        let api_key = self.api_key.ok_or_else(|| ConfigError::missing("api_key"))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| OPENAI_API_BASE_URL.to_owned());
        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned());

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let http_client = builder
            .build()
            .map_err(|e| ConfigError::invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(OpenAiOracle {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a Value,
    strict: bool,
}

impl<'a> From<&'a OutputSchema> for ResponseFormat<'a> {
    fn from(schema: &'a OutputSchema) -> Self {
        Self {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: &schema.name,
                schema: &schema.schema,
                strict: schema.strict,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::Verdict;
    use mockito::Matcher;
    use serde_json::json;

    fn completion_body(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
        .to_string()
    }

    fn oracle_for(server: &mockito::Server) -> OpenAiOracle {
        OpenAiOracle::builder()
            .api_key("test-key")
            .base_url(server.url())
            .model("test-model")
            .timeout_secs(5)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults_and_redaction() {
        let oracle = OpenAiOracle::builder().api_key("sk-secret").build().unwrap();
        assert_eq!(oracle.base_url(), OPENAI_API_BASE_URL);
        assert_eq!(oracle.model(), DEFAULT_MODEL);
        let debug = format!("{oracle:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_builder_requires_api_key() {
        let err = OpenAiOracle::builder().build().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[tokio::test]
    async fn test_structured_request_uses_json_schema() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_header("x-trace-id", "pipeline")
            .match_body(Matcher::PartialJson(json!({
                "model": "test-model",
                "messages": [
                    {"role": "system", "content": "judge the input"},
                    {"role": "user", "content": "Cuanto es 2+2"}
                ],
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {"name": "verdict", "strict": true}
                }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body(
                r#"{"is_unsafe": false, "reasoning": "The question is about math."}"#,
            ))
            .create_async()
            .await;

        let request = OracleRequest::new("judge", "judge the input", "Cuanto es 2+2")
            .with_schema(Verdict::output_schema())
            .with_trace_id("pipeline");
        let output = oracle_for(&server).run(&request).await.unwrap();

        assert_eq!(
            output,
            OracleOutput::Structured(json!({
                "is_unsafe": false,
                "reasoning": "The question is about math."
            }))
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_text_request_returns_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("2 + 2 es igual a 4."))
            .create_async()
            .await;

        let output = oracle_for(&server)
            .run(&OracleRequest::new("Assistant", "help", "Cuanto es 2+2"))
            .await
            .unwrap();

        assert_eq!(output.as_text(), Some("2 + 2 es igual a 4."));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let err = oracle_for(&server)
            .run(&OracleRequest::new("judge", "x", "y"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            OracleError::HttpStatus {
                status: 429,
                message: "rate limited".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = oracle_for(&server)
            .run(&OracleRequest::new("judge", "x", "y"))
            .await
            .unwrap_err();

        assert!(matches!(err, OracleError::MalformedResponse(_)));
    }
}
