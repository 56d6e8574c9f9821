//! Core types for the chat-completion capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use itinera_utils::error::LlmError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Input to a backend invocation.
///
/// `model` and `timeout` are optional; a backend substitutes its own defaults.
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    /// Short label for logs (`itinerary`, `intent`, `answer`, `evaluate`)
    pub purpose: String,
    pub model: Option<String>,
    pub timeout: Option<Duration>,
    /// Ordered conversation, oldest first
    pub messages: Vec<Message>,
    /// Provider-specific parameters (`max_tokens`, `temperature`)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LlmInvocation {
    #[must_use]
    pub fn new(purpose: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            purpose: purpose.into(),
            model: None,
            timeout: None,
            messages,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Text of the last user message, if any
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Result from a backend invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResult {
    /// Raw response text from the model
    pub raw_response: String,
    pub provider: String,
    pub model_used: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

impl LlmResult {
    #[must_use]
    pub fn new(
        raw_response: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = Some(input);
        self.tokens_output = Some(output);
        self
    }
}

/// A chat-completion capability.
///
/// Used both for generating answers and for scoring them. Implementations make
/// exactly one remote attempt per call; retries belong to the caller.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Name used in logs and results
    fn name(&self) -> &str;

    /// Invoke the model with the given conversation.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` for transport failures, provider auth/quota/outage
    /// responses, timeouts and malformed response bodies.
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_invocation_builder() {
        let inv = LlmInvocation::new(
            "answer",
            vec![
                Message::system("be brief"),
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
            ],
        )
        .with_model("m")
        .with_timeout(Duration::from_secs(5))
        .with_metadata("max_tokens", serde_json::json!(64));

        assert_eq!(inv.model.as_deref(), Some("m"));
        assert_eq!(inv.timeout, Some(Duration::from_secs(5)));
        assert_eq!(inv.last_user_message(), Some("second"));
        assert_eq!(inv.metadata["max_tokens"], 64);
    }
}
