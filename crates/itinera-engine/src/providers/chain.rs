use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use itinera_config::Config;
use itinera_utils::redaction::redact_error_message;
use tracing::{debug, info, warn};

use super::{ImageProvider, ProviderResult};
use crate::pacing::{Jitter, Sleeper, TokioSleeper};
use crate::travel::ItemCategory;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Providers consulted strictly in priority order.
///
/// One resolution runs up to `cycles` passes over the list. Within a pass the
/// first provider with a match wins and no later provider is queried; a fixed
/// delay separates consecutive providers, and a jittered pause separates
/// passes. An exhausted chain yields the category placeholder.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn ImageProvider>>,
    cycles: u32,
    call_timeout: Duration,
    inter_provider_delay: Duration,
    jitter: Jitter,
    sleeper: Arc<dyn Sleeper>,
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("ProviderChain")
            .field("providers", &names)
            .field("cycles", &self.cycles)
            .field("call_timeout", &self.call_timeout)
            .field("inter_provider_delay", &self.inter_provider_delay)
            .field("rate_limited", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl ProviderChain {
    /// A chain with one pass, a 10 s call timeout and no pacing.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        Self {
            providers,
            cycles: 1,
            call_timeout: Duration::from_secs(10),
            inter_provider_delay: Duration::ZERO,
            jitter: Jitter::none(),
            sleeper: Arc::new(TokioSleeper),
            limiter: None,
        }
    }

    /// Pacing and limits from the `[images]` and `[retry]` sections.
    #[must_use]
    pub fn from_config(config: &Config, providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        let (jitter_min, jitter_max) = config.jitter_bounds();
        Self::new(providers)
            .with_cycles(config.images.attempts)
            .with_call_timeout(config.images.timeout())
            .with_inter_provider_delay(config.images.inter_provider_delay())
            .with_jitter(Jitter::new(jitter_min, jitter_max))
            .with_rate_limit(config.images.requests_per_second)
    }

    #[must_use]
    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles.max(1);
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_inter_provider_delay(mut self, delay: Duration) -> Self {
        self.inter_provider_delay = delay;
        self
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

    /// Token bucket shared by every request this chain (and its clones) makes.
    /// Zero disables limiting.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.limiter = NonZeroU32::new(requests_per_second)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));
        self
    }

    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Upper bound on one [`resolve`](Self::resolve), rate limiting excluded:
    /// every call timing out plus every pause.
    #[must_use]
    pub fn max_resolution_time(&self) -> Duration {
        let providers = self.providers.len() as u32;
        if providers == 0 {
            return Duration::ZERO;
        }
        let calls = self.call_timeout * self.cycles * providers;
        let gaps = self.inter_provider_delay * self.cycles * (providers - 1);
        let pauses = self.jitter.bounds().1 * (self.cycles - 1);
        calls + gaps + pauses
    }

    /// Resolve `query` to one image reference. Never fails.
    pub async fn resolve(&self, query: &str, category: ItemCategory) -> ProviderResult {
        for cycle in 1..=self.cycles {
            if cycle > 1 {
                let pause = self.jitter.sample();
                debug!(query, cycle, pause_ms = pause.as_millis() as u64, "Retrying image search");
                self.sleeper.sleep(pause).await;
            }

            for (index, provider) in self.providers.iter().enumerate() {
                if index > 0 {
                    self.sleeper.sleep(self.inter_provider_delay).await;
                }
                if let Some(url) = self.query_provider(provider.as_ref(), query, cycle).await {
                    info!(provider = provider.name(), query, cycle, "Image found");
                    return ProviderResult::found(provider.name(), url);
                }
            }
        }

        info!(query, %category, "No provider found an image, using placeholder");
        ProviderResult::placeholder(category.placeholder())
    }

    async fn query_provider(
        &self,
        provider: &dyn ImageProvider,
        query: &str,
        cycle: u32,
    ) -> Option<String> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        match tokio::time::timeout(self.call_timeout, provider.search(query)).await {
            Ok(Ok(urls)) => {
                let best = urls.into_iter().find(|u| !u.trim().is_empty());
                if best.is_none() {
                    debug!(provider = provider.name(), query, cycle, "No match");
                }
                best
            }
            Ok(Err(e)) => {
                warn!(
                    provider = provider.name(),
                    query,
                    cycle,
                    error = %redact_error_message(&e.to_string()),
                    "Image provider failed"
                );
                None
            }
            Err(_) => {
                warn!(
                    provider = provider.name(),
                    query,
                    cycle,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "Image provider timed out"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSleeper, ScriptedProvider};
    use itinera_utils::error::ProviderError;

    fn chain_of(
        providers: &[Arc<ScriptedProvider>],
        sleeper: Arc<RecordingSleeper>,
    ) -> ProviderChain {
        let providers = providers
            .iter()
            .map(|p| p.clone() as Arc<dyn ImageProvider>)
            .collect();
        ProviderChain::new(providers)
            .with_inter_provider_delay(Duration::from_secs(1))
            .with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn test_second_provider_match_stops_the_chain() {
        let a = Arc::new(ScriptedProvider::empty("a"));
        let b = Arc::new(ScriptedProvider::matching("b", "https://img/b.jpg"));
        let c = Arc::new(ScriptedProvider::matching("c", "https://img/c.jpg"));
        let sleeper = Arc::new(RecordingSleeper::default());

        let result = chain_of(&[a.clone(), b.clone(), c.clone()], sleeper.clone())
            .resolve("Chengdu Jinli", ItemCategory::Attraction)
            .await;

        assert_eq!(result, ProviderResult::found("b", "https://img/b.jpg".into()));
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn test_first_provider_match_queries_nothing_else() {
        let a = Arc::new(ScriptedProvider::matching("a", "https://img/a.jpg"));
        let b = Arc::new(ScriptedProvider::matching("b", "https://img/b.jpg"));
        let sleeper = Arc::new(RecordingSleeper::default());

        let result = chain_of(&[a.clone(), b.clone()], sleeper.clone())
            .resolve("q", ItemCategory::Food)
            .await;

        assert_eq!(result.provider.as_deref(), Some("a"));
        assert_eq!(b.calls(), 0);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_all_empty_yields_category_placeholder() {
        let a = Arc::new(ScriptedProvider::empty("a"));
        let b = Arc::new(ScriptedProvider::failing("b", || {
            ProviderError::Status {
                status: 500,
                message: "down".into(),
            }
        }));
        let sleeper = Arc::new(RecordingSleeper::default());

        for category in [
            ItemCategory::Attraction,
            ItemCategory::Food,
            ItemCategory::FoodShop,
        ] {
            let result = chain_of(&[a.clone(), b.clone()], sleeper.clone())
                .resolve("q", category)
                .await;
            assert!(!result.found);
            assert_eq!(result.asset_ref(), category.placeholder());
        }
    }

    #[tokio::test]
    async fn test_cycles_pause_with_jitter_between_passes() {
        let a = Arc::new(ScriptedProvider::empty("a"));
        let b = Arc::new(ScriptedProvider::empty("b"));
        let sleeper = Arc::new(RecordingSleeper::default());
        let jitter = Jitter::new(Duration::from_millis(1500), Duration::from_millis(1500));

        let result = chain_of(&[a.clone(), b.clone()], sleeper.clone())
            .with_cycles(3)
            .with_jitter(jitter)
            .resolve("q", ItemCategory::FoodShop)
            .await;

        assert!(!result.found);
        assert_eq!((a.calls(), b.calls()), (3, 3));
        let one = Duration::from_secs(1);
        let pause = Duration::from_millis(1500);
        assert_eq!(sleeper.delays(), vec![one, pause, one, pause, one]);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_and_chain_moves_on() {
        let slow = Arc::new(ScriptedProvider::matching("slow", "https://img/slow.jpg")
            .with_latency(Duration::from_secs(5)));
        let fast = Arc::new(ScriptedProvider::matching("fast", "https://img/fast.jpg"));
        let sleeper = Arc::new(RecordingSleeper::default());

        let result = chain_of(&[slow.clone(), fast.clone()], sleeper)
            .with_call_timeout(Duration::from_millis(50))
            .resolve("q", ItemCategory::Attraction)
            .await;

        assert_eq!(result.provider.as_deref(), Some("fast"));
    }

    #[tokio::test]
    async fn test_empty_chain_is_placeholder() {
        let chain = ProviderChain::new(Vec::new()).with_cycles(3);
        let result = chain.resolve("q", ItemCategory::Other).await;
        assert_eq!(result.asset_ref(), ItemCategory::Other.placeholder());
        assert_eq!(chain.max_resolution_time(), Duration::ZERO);
    }

    #[test]
    fn test_max_resolution_time() {
        let providers: Vec<Arc<dyn ImageProvider>> = vec![
            Arc::new(ScriptedProvider::empty("a")),
            Arc::new(ScriptedProvider::empty("b")),
        ];
        let chain = ProviderChain::new(providers)
            .with_cycles(3)
            .with_call_timeout(Duration::from_secs(10))
            .with_inter_provider_delay(Duration::from_secs(1))
            .with_jitter(Jitter::default());
        // 3 * 2 * 10s + 3 * 1 * 1s + 2 * 3s
        assert_eq!(chain.max_resolution_time(), Duration::from_secs(69));
    }

    #[test]
    fn test_from_config() {
        let config = Config::builder()
            .image_attempts(2)
            .inter_provider_delay_ms(250)
            .build()
            .unwrap();
        let chain = ProviderChain::from_config(&config, Vec::new());
        assert_eq!(chain.cycles, 2);
        assert_eq!(chain.inter_provider_delay, Duration::from_millis(250));
        assert!(chain.limiter.is_some());
    }
}
