//! itinera - resilient orchestration core for an LLM-backed travel assistant
//!
//! The crate wraps unreliable generative backends and image search providers
//! behind bounded retries, ordered provider chains with placeholders, a
//! persistent result cache and a generate/evaluate refinement loop. Callers
//! always get an answer: either a generated one or a deterministic fallback.
//!
//! itinera can be used in two ways:
//! - **CLI**: `itinera plan --info travel.json`, `itinera ask "..."`
//! - **Library**: build a [`PlannerContext`] and call the planner, the
//!   intent extractor or the answerer directly
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use itinera::{Config, ItineraryPlanner, PlannerContext, TravelInfo, TravelRequest};
//!
//! # async fn demo() -> Result<(), itinera::ItineraError> {
//! let config = Config::builder().build()?;
//! let ctx = PlannerContext::from_config(config)?;
//! let request = TravelRequest::new("Chengdu", 3);
//! let outcome = ItineraryPlanner::new(&ctx)
//!     .plan(&request, TravelInfo::new("Chengdu", 3))
//!     .await?;
//! println!("{}", outcome.report.itinerary);
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! - [`Config`], [`ConfigBuilder`] and [`CliArgs`] - configuration
//! - [`PlannerContext`] - process-wide handles
//! - [`ItineraryPlanner`], [`IntentExtractor`], [`ConversationalAnswerer`]
//! - [`ResilientCaller`], [`ProviderChain`], [`RefinementLoop`] - the
//!   building blocks they are made of
//! - [`ItineraError`] and [`ExitCode`]
//!
//! Everything else is reachable through the member crates and is not covered
//! by semver guarantees.

pub use itinera_config::{CliArgs, Config, ConfigBuilder, ConfigSource};
pub use itinera_utils::canonicalization::emit_jcs;
pub use itinera_utils::error::{ItineraError, UserFriendlyError};
pub use itinera_utils::exit_codes::ExitCode;
pub use itinera_utils::{CacheKey, ResultCache};

pub use itinera_llm::{LlmBackend, LlmInvocation, LlmResult, Message, OpenAiCompatibleBackend};

pub use itinera_engine::{
    AnswerOutcome, BackoffPolicy, ContentGatherer, ConversationalAnswerer, FallbackGenerator,
    FallbackItinerary, ImageProvider, IntentExtractor, ItineraryPlanner, ItineraryReport,
    KeywordRetriever, OutputSource, PlanOutcome, PlannerContext, ProviderChain, ProviderResult,
    RefinementLoop, RefinementOutcome, RefinementPolicy, ResilientCaller, SearchHit,
    SearchProvider, Termination, TravelInfo, TravelIntent, TravelRequest,
};

#[doc(hidden)]
pub use itinera_engine as engine;
#[doc(hidden)]
pub use itinera_llm as llm;
#[doc(hidden)]
pub use itinera_utils as utils;

pub mod cli;
