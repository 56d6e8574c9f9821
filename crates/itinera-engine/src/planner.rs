//! Cached itinerary planning: cache → content gathering → image resolution →
//! generation → report.

use chrono::Utc;
use itinera_llm::{LlmInvocation, Message};
use itinera_utils::CacheKey;
use itinera_utils::error::ItineraError;
use itinera_utils::logging::request_span;
use serde::Serialize;
use tracing::{Instrument, info};

use crate::context::PlannerContext;
use crate::fallback::FallbackItinerary;
use crate::gather::ContentGatherer;
use crate::prompt::{ITINERARY_SYSTEM_PROMPT, itinerary_user_message};
use crate::resilient::{AttemptRecord, OutputSource};
use crate::travel::{ItemCategory, ItineraryReport, ReportItem, ReportSection, TravelInfo, TravelRequest};

/// Cache namespace for itinerary reports
pub const ITINERARY_CACHE_KIND: &str = "itinerary";

#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub report: ItineraryReport,
    pub cache_hit: bool,
    pub itinerary_source: OutputSource,
    /// Generation attempts; empty on a cache hit
    pub attempts: Vec<AttemptRecord>,
}

pub struct ItineraryPlanner<'a> {
    ctx: &'a PlannerContext,
}

impl<'a> ItineraryPlanner<'a> {
    #[must_use]
    pub fn new(ctx: &'a PlannerContext) -> Self {
        Self { ctx }
    }

    /// Cache key for `request`.
    ///
    /// # Errors
    ///
    /// Returns `ItineraError::Cache` if the parameters cannot be canonicalized.
    pub fn cache_key(request: &TravelRequest) -> Result<CacheKey, ItineraError> {
        Ok(CacheKey::compute(ITINERARY_CACHE_KIND, &request.cache_params())?)
    }

    /// Plan a trip from supplied destination content. A cached report for
    /// the same city and day count is returned without contacting any
    /// backend or provider.
    ///
    /// The composed report is cached whether generation succeeded or the
    /// fallback itinerary was used.
    ///
    /// # Errors
    ///
    /// Returns `ItineraError::InvalidRequest` for an empty city or zero days.
    /// Backend and provider failures never surface here.
    pub async fn plan(
        &self,
        request: &TravelRequest,
        info: TravelInfo,
    ) -> Result<PlanOutcome, ItineraError> {
        let key = Self::validated_key(request)?;
        let span = request_span(ITINERARY_CACHE_KIND, key.digest());
        let outcome = async {
            match self.cached(request, &key) {
                Some(hit) => hit,
                None => self.generate(request, info, &key).await,
            }
        }
        .instrument(span)
        .await;
        Ok(outcome)
    }

    /// Plan a trip, gathering destination content with `gatherer` only when
    /// the cache has no report for the request.
    ///
    /// # Errors
    ///
    /// Same as [`plan`](Self::plan).
    pub async fn plan_destination(
        &self,
        request: &TravelRequest,
        gatherer: &ContentGatherer,
    ) -> Result<PlanOutcome, ItineraError> {
        let key = Self::validated_key(request)?;
        let span = request_span(ITINERARY_CACHE_KIND, key.digest());
        let outcome = async {
            match self.cached(request, &key) {
                Some(hit) => hit,
                None => {
                    let info = gatherer.gather(request).await;
                    self.generate(request, info, &key).await
                }
            }
        }
        .instrument(span)
        .await;
        Ok(outcome)
    }

    fn validated_key(request: &TravelRequest) -> Result<CacheKey, ItineraError> {
        if request.city.trim().is_empty() {
            return Err(ItineraError::InvalidRequest("city must not be empty".to_string()));
        }
        if request.days == 0 {
            return Err(ItineraError::InvalidRequest("days must be at least 1".to_string()));
        }
        Self::cache_key(request)
    }

    fn cached(&self, request: &TravelRequest, key: &CacheKey) -> Option<PlanOutcome> {
        let report = self.ctx.cache().get_payload::<ItineraryReport>(key)?;
        info!(city = %request.city, days = request.days, "Serving cached itinerary");
        Some(PlanOutcome {
            itinerary_source: report.itinerary_source,
            report,
            cache_hit: true,
            attempts: Vec::new(),
        })
    }

    async fn generate(
        &self,
        request: &TravelRequest,
        mut info: TravelInfo,
        key: &CacheKey,
    ) -> PlanOutcome {
        info.city = request.city.trim().to_string();
        info.days = request.days;

        let images_found = self.ctx.resolver().enrich(&mut info).await;

        let inv = LlmInvocation::new(
            "itinerary",
            vec![
                Message::system(ITINERARY_SYSTEM_PROMPT),
                Message::user(itinerary_user_message(&info)),
            ],
        );
        let outcome = self
            .ctx
            .caller()
            .call(inv, &FallbackItinerary::new(&info))
            .await;

        let report = compose_report(&info, outcome.text, outcome.source);
        self.ctx.cache().put(key, &report);

        info!(
            city = %info.city,
            days = info.days,
            source = ?outcome.source,
            images_found,
            attempts = outcome.attempts.len(),
            "Itinerary planned"
        );

        PlanOutcome {
            report,
            cache_hit: false,
            itinerary_source: outcome.source,
            attempts: outcome.attempts,
        }
    }
}

/// Assemble the renderer hand-off. Items without a reference get their
/// category placeholder.
#[must_use]
pub fn compose_report(info: &TravelInfo, itinerary: String, source: OutputSource) -> ItineraryReport {
    let sections = [
        ItemCategory::Attraction,
        ItemCategory::Food,
        ItemCategory::FoodShop,
    ]
    .into_iter()
    .filter(|category| !info.items(*category).is_empty())
    .map(|category| ReportSection {
        category,
        heading: category.heading().to_string(),
        items: info
            .items(category)
            .iter()
            .map(|item| ReportItem {
                name: item.name.clone(),
                description: item.description.clone(),
                asset_ref: item
                    .asset_ref
                    .clone()
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| category.placeholder().to_string()),
            })
            .collect(),
    })
    .collect();

    ItineraryReport {
        title: format!("{} {}-day travel guide", info.city.trim(), info.effective_days()),
        city: info.city.trim().to_string(),
        days: info.effective_days(),
        itinerary,
        itinerary_source: source,
        sections,
        generated_at: Utc::now(),
    }
}
