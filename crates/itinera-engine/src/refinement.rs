//! Generate → evaluate → refine loop with a score gate.
//!
//! Each attempt makes one generation call and at most one evaluation call.
//! A score at or above the threshold accepts the candidate. A lower score
//! appends the candidate and the evaluator's rationale to the conversation and
//! regenerates. An evaluator that fails, answers with nothing, or answers
//! without a readable score accepts the candidate as is. When attempts run
//! out the last candidate is returned; the fixed apology is used only when no
//! candidate was ever produced.

use std::sync::Arc;

use itinera_config::Config;
use itinera_llm::{LlmBackend, LlmInvocation, Message};
use itinera_utils::redaction::redact_error_message;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::parsing::{ScoreParse, parse_score};
use crate::prompt::{EVALUATOR_SYSTEM_PROMPT, EvaluationContext, evaluation_prompt, feedback_message};

/// Shown when every generation attempt failed.
pub const GENERATION_FAILED_APOLOGY: &str =
    "Sorry, the system ran into a problem. Please try again later.";

/// Shown when the loop is not allowed any attempt.
pub const NO_ANSWER_APOLOGY: &str = "Sorry, I could not give you a satisfactory answer. \
     Please try again later or rephrase your question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinementPolicy {
    pub max_attempts: u32,
    /// Inclusive, on the 1..=10 scale
    pub acceptance_threshold: u8,
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            acceptance_threshold: 6,
        }
    }
}

impl RefinementPolicy {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.refinement.max_attempts,
            acceptance_threshold: config.refinement.acceptance_threshold,
        }
    }
}

/// Loop states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementState {
    Generating,
    Evaluating,
    Accepted,
    Regenerating,
    Terminal,
}

/// What happened to one attempt's candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum AttemptVerdict {
    /// Score met the threshold
    Accepted,
    /// Score below the threshold; feedback was fed back
    Rejected,
    /// Evaluator reply had no readable score
    AcceptedUnscored,
    /// Evaluator call failed or came back empty
    AcceptedEvaluatorFailed { error: String },
    /// Generation itself failed; no candidate
    GenerationFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefinementAttempt {
    /// 1-based, increasing
    pub ordinal: u32,
    pub candidate: Option<String>,
    pub score: Option<u8>,
    /// Raw evaluator reply
    pub feedback: String,
    #[serde(flatten)]
    pub verdict: AttemptVerdict,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Accepted,
    /// Attempts ran out; the last candidate was kept
    Exhausted,
    /// No attempt produced a candidate
    GenerationFailed,
    /// Zero attempts allowed
    NoAttempts,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefinementOutcome {
    pub answer: String,
    pub termination: Termination,
    pub attempts: Vec<RefinementAttempt>,
}

impl RefinementOutcome {
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.termination == Termination::Accepted
    }

    #[must_use]
    pub fn generation_calls(&self) -> usize {
        self.attempts.len()
    }

    #[must_use]
    pub fn evaluation_calls(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| !matches!(a.verdict, AttemptVerdict::GenerationFailed { .. }))
            .count()
    }
}

#[derive(Clone)]
pub struct RefinementLoop {
    generator: Arc<dyn LlmBackend>,
    evaluator: Arc<dyn LlmBackend>,
    policy: RefinementPolicy,
}

impl std::fmt::Debug for RefinementLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefinementLoop")
            .field("generator", &self.generator.name())
            .field("evaluator", &self.evaluator.name())
            .field("policy", &self.policy)
            .finish()
    }
}

fn transition(ordinal: u32, state: RefinementState) {
    debug!(attempt = ordinal, state = ?state, "Refinement transition");
}

impl RefinementLoop {
    #[must_use]
    pub fn new(
        generator: Arc<dyn LlmBackend>,
        evaluator: Arc<dyn LlmBackend>,
        policy: RefinementPolicy,
    ) -> Self {
        Self {
            generator,
            evaluator,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> RefinementPolicy {
        self.policy
    }

    /// Run the loop on `conversation` (system prompt plus question, oldest
    /// first). `ctx` is what the evaluator sees alongside each candidate.
    pub async fn run(
        &self,
        conversation: Vec<Message>,
        ctx: &EvaluationContext<'_>,
    ) -> RefinementOutcome {
        let max_attempts = self.policy.max_attempts;
        if max_attempts == 0 {
            warn!("Refinement loop configured with zero attempts");
            return RefinementOutcome {
                answer: NO_ANSWER_APOLOGY.to_string(),
                termination: Termination::NoAttempts,
                attempts: Vec::new(),
            };
        }

        let mut messages = conversation;
        let mut attempts = Vec::with_capacity(max_attempts as usize);
        let mut last_candidate: Option<String> = None;

        for ordinal in 1..=max_attempts {
            transition(ordinal, RefinementState::Generating);
            let candidate = match self.generate(&messages).await {
                Ok(candidate) => candidate,
                Err(error) => {
                    warn!(attempt = ordinal, max_attempts, error = %error, "Answer generation failed");
                    attempts.push(RefinementAttempt {
                        ordinal,
                        candidate: None,
                        score: None,
                        feedback: String::new(),
                        verdict: AttemptVerdict::GenerationFailed { error },
                    });
                    continue;
                }
            };

            transition(ordinal, RefinementState::Evaluating);
            let (verdict, score, feedback) = self.evaluate(ctx, &candidate).await;
            let rejected = matches!(verdict, AttemptVerdict::Rejected);

            attempts.push(RefinementAttempt {
                ordinal,
                candidate: Some(candidate.clone()),
                score,
                feedback: feedback.clone(),
                verdict,
            });

            if !rejected {
                transition(ordinal, RefinementState::Accepted);
                info!(attempt = ordinal, score = ?score, "Answer accepted");
                return RefinementOutcome {
                    answer: candidate,
                    termination: Termination::Accepted,
                    attempts,
                };
            }

            transition(ordinal, RefinementState::Regenerating);
            info!(attempt = ordinal, score = ?score, threshold = self.policy.acceptance_threshold, "Answer below threshold");
            messages.push(Message::assistant(candidate.clone()));
            messages.push(feedback_message(score.unwrap_or_default(), &feedback));
            last_candidate = Some(candidate);
        }

        transition(max_attempts, RefinementState::Terminal);
        match last_candidate {
            Some(answer) => RefinementOutcome {
                answer,
                termination: Termination::Exhausted,
                attempts,
            },
            None => RefinementOutcome {
                answer: GENERATION_FAILED_APOLOGY.to_string(),
                termination: Termination::GenerationFailed,
                attempts,
            },
        }
    }

    async fn generate(&self, messages: &[Message]) -> Result<String, String> {
        let inv = LlmInvocation::new("answer", messages.to_vec());
        match self.generator.invoke(inv).await {
            Ok(result) if !result.raw_response.trim().is_empty() => Ok(result.raw_response),
            Ok(_) => Err("empty response".to_string()),
            Err(e) => Err(redact_error_message(&e.to_string())),
        }
    }

    /// One evaluator call, never retried.
    async fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        candidate: &str,
    ) -> (AttemptVerdict, Option<u8>, String) {
        let inv = LlmInvocation::new(
            "evaluate",
            vec![
                Message::system(EVALUATOR_SYSTEM_PROMPT),
                Message::user(evaluation_prompt(ctx, candidate)),
            ],
        );

        let reply = match self.evaluator.invoke(inv).await {
            Ok(result) => result.raw_response.trim().to_string(),
            Err(e) => {
                let error = redact_error_message(&e.to_string());
                warn!(error = %error, "Evaluation failed, accepting candidate");
                return (AttemptVerdict::AcceptedEvaluatorFailed { error }, None, String::new());
            }
        };

        if reply.is_empty() {
            warn!("Evaluator returned an empty reply, accepting candidate");
            let error = "empty response".to_string();
            return (AttemptVerdict::AcceptedEvaluatorFailed { error }, None, reply);
        }

        match parse_score(&reply) {
            ScoreParse::Parsed { score, .. } if score >= self.policy.acceptance_threshold => {
                (AttemptVerdict::Accepted, Some(score), reply)
            }
            ScoreParse::Parsed { score, .. } => (AttemptVerdict::Rejected, Some(score), reply),
            ScoreParse::Unparsed(_) => {
                warn!(reply = %reply, "Evaluator score unreadable, accepting candidate");
                (AttemptVerdict::AcceptedUnscored, None, reply)
            }
        }
    }
}
