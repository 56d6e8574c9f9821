//! Destination content gathering: web search, model reranking and item
//! extraction, producing the [`TravelInfo`] an itinerary is planned from.
//!
//! Every stage degrades to empty content. A failed search leaves its topic
//! empty, a failed or unparseable extraction leaves its item lists empty, and
//! [`ContentGatherer::gather`] itself never fails.

use std::sync::Arc;

use itinera_llm::{LlmInvocation, Message};
use itinera_utils::redaction::redact_error_message;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::parsing::{JsonBlock, extract_json_block};
use crate::prompt::{BASE_ROUTE_SYSTEM_PROMPT, EXTRACTION_SYSTEM_PROMPT, RERANK_SYSTEM_PROMPT};
use crate::resilient::ResilientCaller;
use crate::search::{SearchHit, SearchProvider};
use crate::travel::{Item, TravelInfo, TravelRequest};

/// What a web search is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTopic {
    Guides,
    Attractions,
    MustEat,
    LocalFood,
}

impl SearchTopic {
    /// Search order.
    pub const ALL: [Self; 4] = [Self::Guides, Self::Attractions, Self::MustEat, Self::LocalFood];

    #[must_use]
    pub fn query(self, city: &str, days: u32) -> String {
        match self {
            Self::Guides => format!("{city} {days}-day travel guide best route"),
            Self::Attractions => format!("{city} must-see attractions top 10"),
            Self::MustEat => format!("{city} must-eat food street snacks recommended"),
            Self::LocalFood => format!("{city} local specialties traditional food"),
        }
    }

    fn subject(self, city: &str, days: u32) -> String {
        match self {
            Self::Guides => format!("{days}-day travel guides for {city}"),
            Self::Attractions => format!("the most worthwhile attractions in {city}"),
            Self::MustEat => format!("the most distinctive dishes of {city}"),
            Self::LocalFood => format!("the traditional local specialities of {city}"),
        }
    }
}

/// Reranked search results per topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatheredSources {
    pub guides: Vec<SearchHit>,
    pub attractions: Vec<SearchHit>,
    pub must_eat: Vec<SearchHit>,
    pub local_food: Vec<SearchHit>,
}

impl GatheredSources {
    fn slot_mut(&mut self, topic: SearchTopic) -> &mut Vec<SearchHit> {
        match topic {
            SearchTopic::Guides => &mut self.guides,
            SearchTopic::Attractions => &mut self.attractions,
            SearchTopic::MustEat => &mut self.must_eat,
            SearchTopic::LocalFood => &mut self.local_food,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guides.is_empty()
            && self.attractions.is_empty()
            && self.must_eat.is_empty()
            && self.local_food.is_empty()
    }

    /// Descriptions attractions are extracted from.
    fn attraction_text(&self) -> String {
        join_descriptions(self.attractions.iter().chain(&self.guides))
    }

    /// Descriptions dishes and restaurants are extracted from.
    fn food_text(&self) -> String {
        join_descriptions(self.must_eat.iter().chain(&self.local_food))
    }
}

fn join_descriptions<'a>(hits: impl Iterator<Item = &'a SearchHit>) -> String {
    hits.map(|hit| hit.description.trim())
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds [`TravelInfo`] for a destination from web search and model calls.
#[derive(Clone)]
pub struct ContentGatherer {
    caller: ResilientCaller,
    search: Option<Arc<dyn SearchProvider>>,
}

impl std::fmt::Debug for ContentGatherer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentGatherer")
            .field("caller", &self.caller)
            .field("search", &self.search.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl ContentGatherer {
    /// Without a search provider the extraction calls run on the model's own
    /// knowledge of the destination.
    #[must_use]
    pub fn new(caller: ResilientCaller, search: Option<Arc<dyn SearchProvider>>) -> Self {
        Self { caller, search }
    }

    /// Gather attractions, dishes, restaurants and a base route for
    /// `request`. Never fails.
    pub async fn gather(&self, request: &TravelRequest) -> TravelInfo {
        let city = request.city.trim();
        let days = request.days.max(1);

        let sources = self.collect_sources(city, days).await;
        let base_route = self.base_route(city, days, &sources).await;

        let attractions = match self
            .extract(attraction_prompt(city, &sources.attraction_text()))
            .await
        {
            Some(value) => items_at(&value, &["attractions"]),
            None => Vec::new(),
        };
        let (foods, food_shops) = match self.extract(food_prompt(city, &sources.food_text())).await {
            Some(value) => (
                items_at(&value, &["foods"]),
                items_at(&value, &["food_shop", "food_shops"]),
            ),
            None => (Vec::new(), Vec::new()),
        };

        info!(
            city,
            days,
            attractions = attractions.len(),
            foods = foods.len(),
            food_shops = food_shops.len(),
            base_route = base_route.is_some(),
            "Destination content gathered"
        );

        TravelInfo {
            city: city.to_string(),
            days,
            attractions,
            foods,
            food_shops,
            base_route,
        }
    }

    /// Search and rerank every topic in [`SearchTopic::ALL`] order.
    pub async fn collect_sources(&self, city: &str, days: u32) -> GatheredSources {
        let mut sources = GatheredSources::default();
        let Some(search) = &self.search else {
            debug!(city, "No search provider configured");
            return sources;
        };
        for topic in SearchTopic::ALL {
            *sources.slot_mut(topic) = self.search_topic(search.as_ref(), topic, city, days).await;
        }
        sources
    }

    async fn search_topic(
        &self,
        search: &dyn SearchProvider,
        topic: SearchTopic,
        city: &str,
        days: u32,
    ) -> Vec<SearchHit> {
        let query = topic.query(city, days);
        let hits = match search.search(&query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(
                    provider = search.name(),
                    topic = ?topic,
                    error = %redact_error_message(&e.to_string()),
                    "Web search failed"
                );
                return Vec::new();
            }
        };
        if hits.is_empty() {
            return Vec::new();
        }

        let keep = rerank_limit(days);
        let listing = serde_json::to_string_pretty(&hits).unwrap_or_default();
        let prompt = format!(
            "Select at most {keep} results about {}, most relevant first:\n{listing}",
            topic.subject(city, days)
        );
        let Some(reply) = self.ask("rerank", RERANK_SYSTEM_PROMPT, prompt).await else {
            return Vec::new();
        };
        let mut ranked = ranked_hits(&reply);
        ranked.truncate(keep);
        debug!(topic = ?topic, found = hits.len(), kept = ranked.len(), "Search results reranked");
        ranked
    }

    async fn base_route(&self, city: &str, days: u32, sources: &GatheredSources) -> Option<Value> {
        let material = serde_json::to_string(sources).unwrap_or_default();
        let prompt = format!(
            "Using the material below, draft a {days}-day route for {city}.\n{material}\n\
             Reply as {{\"base_guide\": \"route text\"}}."
        );
        let reply = self.ask("base_route", BASE_ROUTE_SYSTEM_PROMPT, prompt).await?;
        let value = extract_json_block(&reply).into_value()?;
        match value.get("base_guide") {
            Some(route) => Some(route.clone()),
            None => Some(value),
        }
    }

    async fn extract(&self, prompt: String) -> Option<Value> {
        let reply = self.ask("extract", EXTRACTION_SYSTEM_PROMPT, prompt).await?;
        match extract_json_block(&reply) {
            JsonBlock::Parsed(value) => Some(value),
            JsonBlock::Unparsed(_) => {
                warn!("Extraction reply was not JSON");
                None
            }
        }
    }

    async fn ask(&self, purpose: &str, system: &str, user: String) -> Option<String> {
        let inv = LlmInvocation::new(purpose, vec![Message::system(system), Message::user(user)]);
        match self.caller.attempt(inv).await {
            Ok(success) => Some(success.result.raw_response),
            Err(exhausted) => {
                warn!(purpose, error = %exhausted, "Gathering call unavailable");
                None
            }
        }
    }
}

/// Results kept per topic after reranking.
fn rerank_limit(days: u32) -> usize {
    usize::try_from(days.clamp(2, 5)).unwrap_or(2)
}

fn attraction_prompt(city: &str, text: &str) -> String {
    let material = source_or_knowledge(city, text);
    format!(
        "List the specific attractions in {city}, as many as the material supports, each \
         with a short description.\n{material}\n\
         Reply as {{\"attractions\": [{{\"name\": \"...\", \"description\": \"...\"}}]}}."
    )
}

fn food_prompt(city: &str, text: &str) -> String {
    let material = source_or_knowledge(city, text);
    format!(
        "List the specific dishes and the named restaurants or food shops in {city}, each \
         with a short description.\n{material}\n\
         Reply as {{\"foods\": [{{\"name\": \"...\", \"description\": \"...\"}}], \
         \"food_shop\": [{{\"name\": \"...\", \"description\": \"...\"}}]}}."
    )
}

fn source_or_knowledge(city: &str, text: &str) -> String {
    if text.trim().is_empty() {
        format!("No search material is available; use well-known examples from {city}.")
    } else {
        format!("Material:\n{text}")
    }
}

/// Reranked hits from `{"related_results": [...]}` or a bare array.
fn ranked_hits(reply: &str) -> Vec<SearchHit> {
    let Some(value) = extract_json_block(reply).into_value() else {
        warn!("Rerank reply was not JSON");
        return Vec::new();
    };
    let list = match value {
        Value::Array(list) => list,
        Value::Object(mut obj) => match obj.remove("related_results") {
            Some(Value::Array(list)) => list,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    list.into_iter()
        .filter_map(|v| serde_json::from_value::<SearchHit>(v).ok())
        .filter(|hit| !hit.title.trim().is_empty() || !hit.description.trim().is_empty())
        .collect()
}

/// Items under the first of `keys` holding an array; malformed entries and
/// blank names are dropped.
fn items_at(value: &Value, keys: &[&str]) -> Vec<Item> {
    let Some(list) = keys.iter().find_map(|k| value.get(*k).and_then(Value::as_array)) else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|v| serde_json::from_value::<Item>(v.clone()).ok())
        .filter(|item| !item.name.trim().is_empty())
        .map(|mut item| {
            item.name = item.name.trim().to_string();
            item
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::pacing::Jitter;
    use crate::test_support::{RecordingSleeper, ScriptedBackend, ScriptedSearch};
    use itinera_llm::LlmError;
    use itinera_utils::error::ProviderError;

    const RANKED: &str = r#"```json
{"related_results": [{"title": "Jinli", "description": "Jinli old street", "url": "https://a/1"}]}
```"#;
    const ATTRACTIONS: &str =
        r#"{"attractions": [{"name": "Jinli", "description": "Old street"}, {"name": " "}]}"#;
    const FOODS: &str = r#"```json
{"foods": [{"name": "Hotpot", "description": "Spicy"}], "food_shop": [{"name": "Chen Mapo", "description": "Tofu"}]}
```"#;

    fn gatherer(
        backend: Arc<ScriptedBackend>,
        search: Option<Arc<dyn SearchProvider>>,
    ) -> ContentGatherer {
        let caller = ResilientCaller::new(backend, BackoffPolicy::default())
            .with_jitter(Jitter::none())
            .with_sleeper(Arc::new(RecordingSleeper::default()));
        ContentGatherer::new(caller, search)
    }

    #[tokio::test]
    async fn test_gather_with_search_builds_travel_info() {
        let search = Arc::new(ScriptedSearch::with_hits(vec![SearchHit::new(
            "Top sights",
            "Jinli old street",
            "https://a/1",
        )]));
        let mut script: Vec<Result<String, LlmError>> =
            SearchTopic::ALL.iter().map(|_| Ok(RANKED.to_string())).collect();
        script.push(Ok(r#"{"base_guide": "Day1: Jinli"}"#.to_string()));
        script.push(Ok(ATTRACTIONS.to_string()));
        script.push(Ok(FOODS.to_string()));
        let backend = Arc::new(ScriptedBackend::new(script));

        let info = gatherer(backend.clone(), Some(search.clone()))
            .gather(&TravelRequest::new(" Chengdu ", 3))
            .await;

        assert_eq!(info.city, "Chengdu");
        assert_eq!(info.days, 3);
        assert_eq!(info.attractions, vec![Item::new("Jinli", "Old street")]);
        assert_eq!(info.foods, vec![Item::new("Hotpot", "Spicy")]);
        assert_eq!(info.food_shops, vec![Item::new("Chen Mapo", "Tofu")]);
        assert_eq!(info.base_route, Some(Value::String("Day1: Jinli".into())));

        assert_eq!(
            search.queries(),
            SearchTopic::ALL.iter().map(|t| t.query("Chengdu", 3)).collect::<Vec<_>>()
        );
        let purposes: Vec<_> = backend.invocations().iter().map(|i| i.purpose.clone()).collect();
        assert_eq!(
            purposes,
            vec!["rerank", "rerank", "rerank", "rerank", "base_route", "extract", "extract"]
        );
        let extraction = &backend.invocations()[5].messages[1].content;
        assert!(extraction.contains("Jinli old street"));
    }

    #[tokio::test]
    async fn test_search_failure_skips_rerank() {
        let search = Arc::new(ScriptedSearch::failing(|| ProviderError::Status {
            status: 429,
            message: "quota".into(),
        }));
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(r#"{"base_guide": "route"}"#.to_string()),
            Ok(ATTRACTIONS.to_string()),
            Ok(FOODS.to_string()),
        ]));

        let info = gatherer(backend.clone(), Some(search.clone()))
            .gather(&TravelRequest::new("Chengdu", 2))
            .await;

        assert_eq!(search.queries().len(), 4);
        assert_eq!(backend.calls(), 3);
        assert_eq!(info.attractions.len(), 1);
        let extraction = &backend.invocations()[1].messages[1].content;
        assert!(extraction.contains("No search material is available"));
    }

    #[tokio::test]
    async fn test_unparseable_replies_give_empty_lists() {
        let backend = Arc::new(ScriptedBackend::always(|| Ok("Sorry, I cannot help.".to_string())));

        let info = gatherer(backend.clone(), None)
            .gather(&TravelRequest::new("Chengdu", 2))
            .await;

        assert_eq!(backend.calls(), 3);
        assert!(info.attractions.is_empty());
        assert!(info.foods.is_empty());
        assert!(info.food_shops.is_empty());
        assert_eq!(info.base_route, None);
    }

    #[tokio::test]
    async fn test_backend_outage_still_returns_info() {
        let backend = Arc::new(ScriptedBackend::always(|| {
            Err(LlmError::ProviderOutage("503".into()))
        }));

        let info = gatherer(backend.clone(), None)
            .gather(&TravelRequest::new("Chengdu", 0))
            .await;

        assert_eq!(backend.calls(), 9);
        assert_eq!(info.days, 1);
        assert!(info.attractions.is_empty());
    }

    #[test]
    fn test_ranked_hits_shapes() {
        let bare = ranked_hits(r#"[{"title": "A", "description": "a"}, 7]"#);
        assert_eq!(bare, vec![SearchHit::new("A", "a", "")]);

        assert!(ranked_hits(r#"{"other": []}"#).is_empty());
        assert!(ranked_hits("not json").is_empty());
    }

    #[test]
    fn test_items_at_accepts_plural_shop_key() {
        let value: Value =
            serde_json::from_str(r#"{"food_shops": [{"name": "Chen Mapo", "describe": "Tofu"}]}"#)
                .unwrap();
        assert_eq!(
            items_at(&value, &["food_shop", "food_shops"]),
            vec![Item::new("Chen Mapo", "Tofu")]
        );
    }

    #[test]
    fn test_rerank_limit_bounds() {
        assert_eq!(rerank_limit(1), 2);
        assert_eq!(rerank_limit(3), 3);
        assert_eq!(rerank_limit(30), 5);
    }
}
