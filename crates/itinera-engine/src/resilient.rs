//! Bounded-retry wrapper around a single generation call.
//!
//! Every failure is retried with [`BackoffPolicy`] waits plus jitter, up to
//! the policy's attempt ceiling. Once the attempts are spent the caller
//! never fails: [`ResilientCaller::call`] returns the output of a local
//! [`FallbackGenerator`] instead.

use std::sync::Arc;
use std::time::Duration;

use itinera_llm::{LlmBackend, LlmError, LlmInvocation, LlmResult};
use itinera_utils::redaction::redact_error_message;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::pacing::{Jitter, Sleeper, TokioSleeper};

/// Deterministic, side-effect free producer of a lower-quality result.
pub trait FallbackGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self) -> String;
}

/// Where the text of a [`CallOutcome`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSource {
    Generated,
    Fallback,
}

/// One remote attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// 1-based
    pub ordinal: u32,
    /// Redacted error text; `None` for the successful attempt
    pub error: Option<String>,
    /// Wait before the next attempt, if one followed
    pub delay_before_next: Option<Duration>,
}

/// Retry bookkeeping for one logical call.
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    last_error: Option<LlmError>,
    next_delay: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub text: String,
    pub source: OutputSource,
    pub attempts: Vec<AttemptRecord>,
}

impl CallOutcome {
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.source == OutputSource::Fallback
    }
}

/// Successful generation with the attempts it took.
#[derive(Debug, Clone)]
pub struct CallSuccess {
    pub result: LlmResult,
    pub attempts: Vec<AttemptRecord>,
}

/// Every attempt failed.
#[derive(Debug, thiserror::Error)]
#[error("generation failed after {} attempt(s): {last_error}", .attempts.len())]
pub struct RetriesExhausted {
    #[source]
    pub last_error: LlmError,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Clone)]
pub struct ResilientCaller {
    backend: Arc<dyn LlmBackend>,
    policy: BackoffPolicy,
    jitter: Jitter,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for ResilientCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientCaller")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl ResilientCaller {
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, policy: BackoffPolicy) -> Self {
        Self {
            backend,
            policy,
            jitter: Jitter::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Generate, or fall back once retries are spent. Never fails.
    pub async fn call(&self, inv: LlmInvocation, fallback: &dyn FallbackGenerator) -> CallOutcome {
        match self.attempt(inv).await {
            Ok(success) => CallOutcome {
                text: success.result.raw_response,
                source: OutputSource::Generated,
                attempts: success.attempts,
            },
            Err(exhausted) => {
                info!(
                    fallback = fallback.name(),
                    attempts = exhausted.attempts.len(),
                    "Generation unavailable, using fallback"
                );
                CallOutcome {
                    text: fallback.generate(),
                    source: OutputSource::Fallback,
                    attempts: exhausted.attempts,
                }
            }
        }
    }

    /// Run the retry loop without a fallback.
    ///
    /// # Errors
    ///
    /// Returns [`RetriesExhausted`] when all `max_attempts` attempts failed.
    /// Auth and misconfiguration errors are retried like any other.
    pub async fn attempt(&self, inv: LlmInvocation) -> Result<CallSuccess, RetriesExhausted> {
        let max_attempts = self.policy.max_attempts().max(1);
        let mut state = RetryState::default();
        let mut records = Vec::with_capacity(max_attempts as usize);

        loop {
            state.attempt += 1;
            debug!(
                backend = self.backend.name(),
                purpose = %inv.purpose,
                attempt = state.attempt,
                max_attempts,
                "Calling generation backend"
            );

            let error = match self.backend.invoke(inv.clone()).await {
                Ok(result) => {
                    records.push(AttemptRecord {
                        ordinal: state.attempt,
                        error: None,
                        delay_before_next: None,
                    });
                    return Ok(CallSuccess {
                        result,
                        attempts: records,
                    });
                }
                Err(e) => e,
            };

            let message = redact_error_message(&error.to_string());
            let retryable = state.attempt < max_attempts;
            state.next_delay =
                retryable.then(|| self.policy.delay(state.attempt) + self.jitter.sample());

            warn!(
                backend = self.backend.name(),
                purpose = %inv.purpose,
                attempt = state.attempt,
                max_attempts,
                transient = error.is_transient(),
                next_delay_ms = state.next_delay.map(|d| d.as_millis() as u64),
                error = %message,
                "Generation attempt failed"
            );

            records.push(AttemptRecord {
                ordinal: state.attempt,
                error: Some(message),
                delay_before_next: state.next_delay,
            });
            state.last_error = Some(error);

            match state.next_delay {
                Some(delay) => self.sleeper.sleep(delay).await,
                None => break,
            }
        }

        Err(RetriesExhausted {
            last_error: state
                .last_error
                .unwrap_or_else(|| LlmError::Transport("no attempt was made".to_string())),
            attempts: records,
        })
    }
}
