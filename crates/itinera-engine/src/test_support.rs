//! Deterministic doubles for the generation backend, image providers, web
//! search and sleeper (enabled by `test-utils`).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use itinera_llm::{LlmBackend, LlmError, LlmInvocation, LlmResult};
use itinera_utils::error::ProviderError;

use crate::pacing::Sleeper;
use crate::providers::ImageProvider;
use crate::search::{SearchHit, SearchProvider};

/// Records requested waits and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().expect("sleeper lock").clone()
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.delays().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().expect("sleeper lock").push(duration);
    }
}

type Responder = Box<dyn Fn() -> Result<String, LlmError> + Send + Sync>;

/// Backend replaying a fixed script of replies, then a default responder.
pub struct ScriptedBackend {
    name: String,
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    default: Responder,
    invocations: Mutex<Vec<LlmInvocation>>,
}

impl ScriptedBackend {
    /// Replies in order; once the script runs out every call fails with a
    /// transport error.
    #[must_use]
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            name: "scripted".to_string(),
            script: Mutex::new(script.into()),
            default: Box::new(|| Err(LlmError::Transport("script exhausted".to_string()))),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Every call answers with `responder()`.
    #[must_use]
    pub fn always<F>(responder: F) -> Self
    where
        F: Fn() -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            default: Box::new(responder),
            ..Self::new(Vec::new())
        }
    }

    /// Every call panics the test if reached.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::always(|| panic!("backend must not be called"))
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.invocations.lock().expect("invocations lock").len()
    }

    #[must_use]
    pub fn invocations(&self) -> Vec<LlmInvocation> {
        self.invocations.lock().expect("invocations lock").clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        self.invocations
            .lock()
            .expect("invocations lock")
            .push(inv);
        let next = self.script.lock().expect("script lock").pop_front();
        let reply = next.unwrap_or_else(|| (self.default)())?;
        Ok(LlmResult::new(reply, self.name.clone(), "scripted-model"))
    }
}

enum ProviderBehavior {
    Empty,
    Match(String),
    Echo,
    Fail(Box<dyn Fn() -> ProviderError + Send + Sync>),
}

/// Image provider with a fixed behavior, counting calls and concurrency.
pub struct ScriptedProvider {
    name: String,
    behavior: ProviderBehavior,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    fn with_behavior(name: &str, behavior: ProviderBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Never finds anything.
    #[must_use]
    pub fn empty(name: &str) -> Self {
        Self::with_behavior(name, ProviderBehavior::Empty)
    }

    /// Always finds `url`.
    #[must_use]
    pub fn matching(name: &str, url: &str) -> Self {
        Self::with_behavior(name, ProviderBehavior::Match(url.to_string()))
    }

    /// Finds `https://img/{query}.jpg`.
    #[must_use]
    pub fn echo(name: &str) -> Self {
        Self::with_behavior(name, ProviderBehavior::Echo)
    }

    /// Always fails with `error()`.
    #[must_use]
    pub fn failing<F>(name: &str, error: F) -> Self
    where
        F: Fn() -> ProviderError + Send + Sync + 'static,
    {
        Self::with_behavior(name, ProviderBehavior::Fail(Box::new(error)))
    }

    /// Panics the test if queried.
    #[must_use]
    pub fn unreachable(name: &str) -> Self {
        Self::failing(name, || panic!("provider must not be called"))
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.behavior {
            ProviderBehavior::Empty => Ok(Vec::new()),
            ProviderBehavior::Match(url) => Ok(vec![url.clone()]),
            ProviderBehavior::Echo => Ok(vec![format!("https://img/{query}.jpg")]),
            ProviderBehavior::Fail(error) => Err(error()),
        }
    }
}

/// Web search returning the same hits (or error) for every query.
pub struct ScriptedSearch {
    result: Box<dyn Fn() -> Result<Vec<SearchHit>, ProviderError> + Send + Sync>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    #[must_use]
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            result: Box::new(move || Ok(hits.clone())),
            queries: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn failing<F>(error: F) -> Self
    where
        F: Fn() -> ProviderError + Send + Sync + 'static,
    {
        Self {
            result: Box::new(move || Err(error())),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Queries received, in order.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted-search"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        self.queries
            .lock()
            .expect("queries lock")
            .push(query.to_string());
        (self.result)()
    }
}
