//! Destination and trip-length extraction from a free-text query.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use itinera_llm::{LlmInvocation, Message};

use crate::parsing::{JsonBlock, extract_json_block};
use crate::prompt::INTENT_SYSTEM_PROMPT;
use crate::resilient::ResilientCaller;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelIntent {
    pub city: Option<String>,
    pub days: Option<u32>,
    pub need_more_info: bool,
    /// Reply to show the user
    pub response: Option<String>,
    /// The original query
    pub query: String,
}

impl TravelIntent {
    /// The intent returned when nothing usable came back.
    #[must_use]
    pub fn need_more_info(query: &str) -> Self {
        Self {
            city: None,
            days: None,
            need_more_info: true,
            response: None,
            query: query.to_string(),
        }
    }

    /// City and days, when both are known.
    #[must_use]
    pub fn destination(&self) -> Option<(&str, u32)> {
        match (&self.city, self.days) {
            (Some(city), Some(days)) if !self.need_more_info => Some((city.as_str(), days)),
            _ => None,
        }
    }

    /// Read the model's JSON object. Missing or malformed fields become
    /// `None`; `need_more_info` is forced on when city or days is missing.
    fn from_json(value: &Value, query: &str) -> Option<Self> {
        let obj = value.as_object()?;

        let city = obj
            .get("city")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let days = match obj.get("days") {
            Some(Value::Number(n)) => n.as_u64().and_then(|d| u32::try_from(d).ok()),
            Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
            _ => None,
        }
        .filter(|d| *d > 0);

        let flagged = obj
            .get("need_more_info")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let response = obj
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self {
            need_more_info: flagged || city.is_none() || days.is_none(),
            city,
            days,
            response,
            query: query.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IntentExtractor {
    caller: ResilientCaller,
}

impl IntentExtractor {
    #[must_use]
    pub fn new(caller: ResilientCaller) -> Self {
        Self { caller }
    }

    /// Never fails: exhausted retries and unparseable replies both yield
    /// [`TravelIntent::need_more_info`].
    pub async fn extract(&self, query: &str) -> TravelIntent {
        let inv = LlmInvocation::new(
            "intent",
            vec![Message::system(INTENT_SYSTEM_PROMPT), Message::user(query)],
        );

        let reply = match self.caller.attempt(inv).await {
            Ok(success) => success.result.raw_response,
            Err(exhausted) => {
                warn!(error = %exhausted, "Intent extraction unavailable");
                return TravelIntent::need_more_info(query);
            }
        };

        let intent = match extract_json_block(&reply) {
            JsonBlock::Parsed(value) => TravelIntent::from_json(&value, query),
            JsonBlock::Unparsed(_) => None,
        };

        match intent {
            Some(intent) => {
                info!(
                    city = intent.city.as_deref().unwrap_or("-"),
                    days = intent.days,
                    need_more_info = intent.need_more_info,
                    "Extracted travel intent"
                );
                intent
            }
            None => {
                warn!("Intent reply was not a JSON object");
                TravelIntent::need_more_info(query)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::pacing::Jitter;
    use crate::test_support::{RecordingSleeper, ScriptedBackend};
    use itinera_llm::LlmError;
    use std::sync::Arc;

    fn extractor(backend: Arc<ScriptedBackend>) -> IntentExtractor {
        IntentExtractor::new(
            ResilientCaller::new(backend, BackoffPolicy::default())
                .with_jitter(Jitter::none())
                .with_sleeper(Arc::new(RecordingSleeper::default())),
        )
    }

    #[tokio::test]
    async fn test_complete_intent() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(
            "```json\n{\"city\": \"Beijing\", \"days\": 3, \"need_more_info\": false, \"response\": \"Planning now\"}\n```"
                .to_string(),
        )]));

        let intent = extractor(backend.clone())
            .extract("Three days in Beijing please")
            .await;

        assert_eq!(intent.destination(), Some(("Beijing", 3)));
        assert_eq!(intent.response.as_deref(), Some("Planning now"));
        assert_eq!(intent.query, "Three days in Beijing please");

        let inv = &backend.invocations()[0];
        assert_eq!(inv.purpose, "intent");
        assert_eq!(inv.last_user_message(), Some("Three days in Beijing please"));
    }

    #[tokio::test]
    async fn test_missing_days_forces_need_more_info() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(
            r#"{"city": "Beijing", "days": null, "need_more_info": false}"#.to_string(),
        )]));

        let intent = extractor(backend).extract("Beijing").await;

        assert!(intent.need_more_info);
        assert_eq!(intent.city.as_deref(), Some("Beijing"));
        assert_eq!(intent.days, None);
        assert_eq!(intent.destination(), None);
    }

    #[tokio::test]
    async fn test_string_days_are_accepted() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(
            r#"{"city": "Xi'an", "days": "2", "need_more_info": false}"#.to_string(),
        )]));
        let intent = extractor(backend).extract("Xi'an for 2 days").await;
        assert_eq!(intent.destination(), Some(("Xi'an", 2)));
    }

    #[tokio::test]
    async fn test_prose_reply_is_need_more_info() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(
            "I'm not sure where you want to go.".to_string(),
        )]));
        let intent = extractor(backend).extract("hello").await;
        assert_eq!(intent, TravelIntent::need_more_info("hello"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_is_need_more_info() {
        let backend = Arc::new(ScriptedBackend::always(|| {
            Err(LlmError::ProviderOutage("503".into()))
        }));
        let intent = extractor(backend.clone()).extract("Chengdu 4 days").await;
        assert_eq!(intent, TravelIntent::need_more_info("Chengdu 4 days"));
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        assert!(TravelIntent::from_json(&serde_json::json!([1, 2]), "q").is_none());
    }
}
