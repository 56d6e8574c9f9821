//! End-to-end flows through the public facade with scripted backends and
//! providers: intent → plan → cached plan, intent → search → gathered plan,
//! and a refined answer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use itinera::engine::test_support::{RecordingSleeper, ScriptedBackend, ScriptedProvider};
use itinera::engine::travel::Item;
use itinera::llm::{LlmError, Role};
use itinera::utils::error::ProviderError;
use itinera::utils::test_support::temp_cache;
use itinera::{
    Config, ImageProvider, ItineraryPlanner, KeywordRetriever, OutputSource, PlannerContext,
    ResultCache, SearchHit, SearchProvider, Termination, TravelInfo, TravelRequest,
};

/// Finds one attraction page; every other query comes back empty.
#[derive(Default)]
struct AttractionSearch {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl SearchProvider for AttractionSearch {
    fn name(&self) -> &str {
        "attraction-search"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        if query.contains("attractions") {
            Ok(vec![SearchHit::new(
                "Xi'an top sights",
                "The Terracotta Army and the City Wall are unmissable.",
                "https://travel.example/xian",
            )])
        } else {
            Ok(Vec::new())
        }
    }
}

fn test_config() -> Config {
    Config::builder()
        .retry_jitter_ms(0, 0)
        .inter_provider_delay_ms(0)
        .image_pacing(2, 1000)
        .build()
        .unwrap()
}

fn chengdu() -> TravelInfo {
    let mut info = TravelInfo::new("", 0);
    for (name, desc) in [
        ("Jinli", "Old street"),
        ("Wuhou Shrine", "Three Kingdoms temple"),
        ("Panda Base", "Giant pandas"),
        ("People's Park", "Teahouses"),
    ] {
        info.attractions.push(Item::new(name, desc));
    }
    info.foods.push(Item::new("Hotpot", "Spicy"));
    info.food_shops.push(Item::new("Chen Mapo", "Original mapo tofu"));
    info
}

#[tokio::test]
async fn intent_feeds_planner_and_second_plan_is_served_from_cache() {
    let (_dir, cache) = temp_cache();
    let cache_dir = cache.cache_dir().to_owned();

    let generator = Arc::new(ScriptedBackend::new(vec![
        Ok(r#"```json
{"city": "Chengdu", "days": 3, "need_more_info": false, "response": "Planning 3 days in Chengdu"}
```"#
            .to_string()),
        Err(LlmError::ProviderOutage("503".into())),
        Ok("Day1: Jinli at dusk".to_string()),
    ]));
    let evaluator = Arc::new(ScriptedBackend::unreachable());
    let slow = Arc::new(ScriptedProvider::echo("echo").with_latency(Duration::from_millis(20)));
    let providers: Vec<Arc<dyn ImageProvider>> = vec![slow.clone()];
    let sleeper = Arc::new(RecordingSleeper::default());
    let ctx = PlannerContext::new(test_config(), cache, generator.clone(), evaluator, providers)
        .with_sleeper(sleeper.clone());

    let intent = ctx
        .intent_extractor()
        .extract("Three days in Chengdu please")
        .await;
    let (city, days) = intent.destination().unwrap();
    let request = TravelRequest::new(city, days);

    let outcome = ItineraryPlanner::new(&ctx)
        .plan(&request, chengdu())
        .await
        .unwrap();

    assert!(!outcome.cache_hit);
    assert_eq!(outcome.itinerary_source, OutputSource::Generated);
    assert_eq!(outcome.report.itinerary, "Day1: Jinli at dusk");
    assert_eq!(outcome.report.days, 3);
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(4)]);

    // Six items, two workers.
    assert_eq!(slow.calls(), 6);
    assert!(slow.max_in_flight() <= 2);
    assert_eq!(
        outcome.report.sections[2].items[0].asset_ref,
        "https://img/Chengdu Chen Mapo restaurant.jpg"
    );

    let untouched = Arc::new(ScriptedBackend::unreachable());
    let never: Arc<dyn ImageProvider> = Arc::new(ScriptedProvider::unreachable("never"));
    let cached_ctx = PlannerContext::new(
        test_config(),
        ResultCache::new(cache_dir),
        untouched.clone(),
        untouched.clone(),
        vec![never],
    );
    let again = ItineraryPlanner::new(&cached_ctx)
        .plan(&TravelRequest::new("Chengdu ", 3), chengdu())
        .await
        .unwrap();

    assert!(again.cache_hit);
    assert_eq!(again.report, outcome.report);
    assert_eq!(untouched.calls(), 0);
}

#[tokio::test]
async fn intent_drives_search_gathering_and_planning() {
    let (_dir, cache) = temp_cache();
    let generator = Arc::new(ScriptedBackend::new(vec![
        Ok(r#"{"city": "Xi'an", "days": 2, "need_more_info": false, "response": "ok"}"#.to_string()),
        Ok(r#"{"related_results": [{"title": "Xi'an top sights", "description": "The Terracotta Army and the City Wall are unmissable.", "url": "https://travel.example/xian"}]}"#.to_string()),
        Ok(r#"{"base_guide": "Day1 Terracotta Army, Day2 City Wall"}"#.to_string()),
        Ok(r#"```json
{"attractions": [{"name": "Terracotta Army", "description": "Qin warriors"}, {"name": "City Wall", "description": "Cycle the ramparts"}]}
```"#.to_string()),
        Ok(r#"{"foods": [{"name": "Roujiamo", "description": "Stewed pork bun"}], "food_shop": []}"#.to_string()),
        Ok("Day1: Terracotta Army. Day2: City Wall.".to_string()),
    ]));
    let search = Arc::new(AttractionSearch::default());
    let provider: Arc<dyn ImageProvider> = Arc::new(ScriptedProvider::echo("echo"));
    let ctx = PlannerContext::new(
        test_config(),
        cache,
        generator.clone(),
        Arc::new(ScriptedBackend::unreachable()),
        vec![provider],
    )
    .with_sleeper(Arc::new(RecordingSleeper::default()))
    .with_search(search.clone());

    let intent = ctx.intent_extractor().extract("Two days in Xi'an").await;
    let (city, days) = intent.destination().unwrap();
    let outcome = ItineraryPlanner::new(&ctx)
        .plan_destination(&TravelRequest::new(city, days), &ctx.gatherer())
        .await
        .unwrap();

    assert_eq!(search.queries.lock().unwrap().len(), 4);
    assert_eq!(generator.calls(), 6);
    assert_eq!(outcome.itinerary_source, OutputSource::Generated);
    assert_eq!(outcome.report.title, "Xi'an 2-day travel guide");
    let names: Vec<_> = outcome.report.sections[0]
        .items
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(names, vec!["Terracotta Army", "City Wall"]);
    assert_eq!(
        outcome.report.sections[1].items[0].asset_ref,
        "https://img/Xi'an Roujiamo food.jpg"
    );

    let itinerary_prompt = &generator.invocations()[5].messages[1].content;
    assert!(itinerary_prompt.contains("Terracotta Army"));
    assert!(itinerary_prompt.contains("Roujiamo"));
}

#[tokio::test]
async fn answer_is_refined_with_evaluator_feedback_and_knowledge() {
    let (_dir, cache) = temp_cache();
    let generator = Arc::new(ScriptedBackend::new(vec![
        Ok("Go anytime.".to_string()),
        Ok("Visit Jinli after 7pm when the lanterns are lit.".to_string()),
    ]));
    let evaluator = Arc::new(ScriptedBackend::new(vec![
        Ok("3 Too vague, mention the evening lanterns.".to_string()),
        Ok("9 Specific and grounded.".to_string()),
    ]));
    let ctx = PlannerContext::new(
        test_config(),
        cache,
        generator.clone(),
        evaluator.clone(),
        Vec::new(),
    );

    let retriever = KeywordRetriever::from_text(
        "Jinli lanterns are lit every evening after 7pm.\n\nThe Panda Base opens at 7:30am.",
    );
    let outcome = ctx
        .answerer()
        .with_retriever(Arc::new(retriever))
        .answer("When is Jinli best?", None, true)
        .await;

    assert_eq!(outcome.termination, Termination::Accepted);
    assert_eq!(
        outcome.answer,
        "Visit Jinli after 7pm when the lanterns are lit."
    );
    assert_eq!(outcome.attempts.len(), 2);
    assert!(outcome.knowledge[0].text.contains("lanterns"));
    assert_eq!(generator.calls(), 2);
    assert_eq!(evaluator.calls(), 2);

    let second = &generator.invocations()[1];
    let roles: Vec<Role> = second.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User]
    );
    assert!(second.messages[3].content.contains("scored 3"));
    assert!(second.messages[1].content.contains("lanterns are lit"));
}

#[tokio::test]
async fn unparseable_intent_reply_asks_for_more_information() {
    let (_dir, cache) = temp_cache();
    let generator = Arc::new(ScriptedBackend::new(vec![Ok(
        "I would love to help with that!".to_string(),
    )]));
    let ctx = PlannerContext::new(
        test_config(),
        cache,
        generator,
        Arc::new(ScriptedBackend::unreachable()),
        Vec::new(),
    );

    let intent = ctx.intent_extractor().extract("somewhere warm").await;

    assert!(intent.need_more_info);
    assert!(intent.destination().is_none());
}
