//! OpenAI-compatible chat-completion backend
//!
//! Works against any endpoint that accepts the `/v1/chat/completions` request
//! shape (SiliconFlow, DeepSeek, OpenRouter, a local vLLM). The generator and
//! the evaluator are two instances of this backend that differ only in model.

use crate::http_client::HttpClient;
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};
use async_trait::async_trait;
use itinera_config::Config;
use itinera_utils::error::LlmError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Which model of the configuration a backend talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRole {
    Generator,
    Evaluator,
}

/// HTTP request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

#[derive(Clone)]
pub struct OpenAiCompatibleBackend {
    client: Arc<HttpClient>,
    name: String,
    base_url: String,
    api_key: String,
    default_model: String,
    default_timeout: Duration,
    default_params: HttpParams,
}

impl std::fmt::Debug for OpenAiCompatibleBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleBackend")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleBackend {
    /// Create a backend with explicit settings.
    #[must_use]
    pub fn new(
        client: Arc<HttpClient>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        default_model: impl Into<String>,
        default_timeout: Duration,
        default_params: HttpParams,
    ) -> Self {
        Self {
            client,
            name: "openai-compatible".to_string(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            default_timeout,
            default_params,
        }
    }

    /// Create a backend from the `[llm]` section.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the API key environment
    /// variable is not set or empty.
    pub fn from_config(
        config: &Config,
        role: BackendRole,
        client: Arc<HttpClient>,
    ) -> Result<Self, LlmError> {
        let api_key_env = config.llm.api_key_env.as_str();
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                LlmError::Misconfiguration(format!(
                    "API key not found in environment variable '{api_key_env}'. \
                     Please set this variable or configure a different api_key_env in [llm]."
                ))
            })?;

        let model = match role {
            BackendRole::Generator => config.llm.model.as_str(),
            BackendRole::Evaluator => config.llm.evaluator_model(),
        };

        let params = HttpParams {
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        };

        let mut backend = Self::new(
            client,
            config.llm.base_url.clone(),
            api_key,
            model,
            config.llm.timeout(),
            params,
        );
        if role == BackendRole::Evaluator {
            backend.name = "openai-compatible-evaluator".to_string();
        }
        Ok(backend)
    }

    /// Resolve model, timeout and parameters for this invocation.
    ///
    /// `inv.model`, `inv.timeout`, `inv.metadata["max_tokens"]` and
    /// `inv.metadata["temperature"]` override the backend defaults.
    fn resolve_params(&self, inv: &LlmInvocation) -> (String, Duration, HttpParams) {
        let model = inv
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model.clone());

        let timeout = inv.timeout.unwrap_or(self.default_timeout);

        let max_tokens = inv
            .metadata
            .get("max_tokens")
            .and_then(serde_json::Value::as_u64)
            .map_or(self.default_params.max_tokens, |v| v as u32);

        let temperature = inv
            .metadata
            .get("temperature")
            .and_then(serde_json::Value::as_f64)
            .map_or(self.default_params.temperature, |v| v as f32);

        (
            model,
            timeout,
            HttpParams {
                max_tokens,
                temperature,
            },
        )
    }

    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage<'_>> {
        messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &msg.content,
            })
            .collect()
    }
}

/// Pull the first choice's text out of a response body.
fn extract_content(body: ChatResponse) -> Result<(String, Option<Usage>), LlmError> {
    let ChatResponse { choices, usage } = body;
    let choice = choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::MalformedResponse("response missing choices[0]".to_string()))?;

    let content = choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            LlmError::MalformedResponse("response missing content in choices[0]".to_string())
        })?;

    Ok((content, usage))
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let (model, timeout, params) = self.resolve_params(&inv);

        debug!(
            provider = %self.name,
            purpose = %inv.purpose,
            model = %model,
            max_tokens = params.max_tokens,
            temperature = params.temperature,
            timeout_secs = timeout.as_secs(),
            "Invoking chat completion"
        );

        let request_body = ChatRequest {
            model: &model,
            messages: Self::convert_messages(&inv.messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        };

        let request = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body);

        let response = self
            .client
            .execute(request, timeout, &self.name)
            .await
            .map_err(|failure| failure.into_llm_error(&self.name))?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(format!("failed to parse response: {e}")))?;

        let (content, usage) = extract_content(body)?;

        let mut result = LlmResult::new(content, self.name.clone(), model);
        if let Some(usage) = usage {
            result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }

        debug!(
            provider = %self.name,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Chat completion finished"
        );

        Ok(result)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
