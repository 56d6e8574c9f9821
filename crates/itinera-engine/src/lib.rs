//! Orchestration for itinera: retry with fallback, destination content
//! gathering, image provider chains, itinerary planning and the
//! generate/evaluate refinement loop.

pub mod answerer;
pub mod backoff;
pub mod context;
pub mod fallback;
pub mod gather;
pub mod intent;
pub mod pacing;
pub mod parsing;
pub mod planner;
pub mod prompt;
pub mod providers;
pub mod refinement;
pub mod resilient;
pub mod resolver;
pub mod search;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
pub mod travel;

pub use answerer::{
    AnswerOutcome, ConversationalAnswerer, KeywordRetriever, KnowledgePassage, KnowledgeRetriever,
};
pub use backoff::BackoffPolicy;
pub use context::PlannerContext;
pub use fallback::FallbackItinerary;
pub use gather::{ContentGatherer, GatheredSources, SearchTopic};
pub use intent::{IntentExtractor, TravelIntent};
pub use pacing::{Jitter, Sleeper, TokioSleeper};
pub use planner::{ItineraryPlanner, PlanOutcome};
pub use prompt::EvaluationContext;
pub use providers::{
    ImageProvider, PixabayProvider, ProviderChain, ProviderResult, UnsplashProvider,
};
pub use refinement::{
    AttemptVerdict, RefinementAttempt, RefinementLoop, RefinementOutcome, RefinementPolicy,
    Termination,
};
pub use resilient::{
    AttemptRecord, CallOutcome, CallSuccess, FallbackGenerator, OutputSource, ResilientCaller,
    RetriesExhausted,
};
pub use resolver::{AssetRequest, AssetResolver};
pub use search::{GoogleSearchProvider, SearchHit, SearchProvider};
pub use travel::{
    Item, ItemCategory, ItineraryReport, ReportItem, ReportSection, TravelInfo, TravelRequest,
};
