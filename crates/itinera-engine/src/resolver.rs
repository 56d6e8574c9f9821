//! Bounded-concurrency image resolution for a batch of items.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::info;

use crate::providers::{ProviderChain, ProviderResult};
use crate::travel::{ItemCategory, TravelInfo};

/// One item needing an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub query: String,
    pub category: ItemCategory,
}

impl AssetRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, category: ItemCategory) -> Self {
        Self {
            query: query.into(),
            category,
        }
    }
}

/// Resolves items through a shared [`ProviderChain`] with at most
/// `concurrency` resolutions in flight. Results come back in input order.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    chain: Arc<ProviderChain>,
    concurrency: usize,
}

impl AssetResolver {
    #[must_use]
    pub fn new(chain: Arc<ProviderChain>, concurrency: usize) -> Self {
        Self {
            chain,
            concurrency: concurrency.max(1),
        }
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn resolve_all(&self, requests: Vec<AssetRequest>) -> Vec<ProviderResult> {
        stream::iter(requests)
            .map(|request| {
                let chain = Arc::clone(&self.chain);
                async move { chain.resolve(&request.query, request.category).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Fill in `asset_ref` for every attraction, food and restaurant that has
    /// none. Items that already carry a reference are left untouched.
    ///
    /// Returns how many items were resolved to a real (non-placeholder) image.
    pub async fn enrich(&self, info: &mut TravelInfo) -> usize {
        let categories = [
            ItemCategory::Attraction,
            ItemCategory::Food,
            ItemCategory::FoodShop,
        ];

        let mut slots = Vec::new();
        let mut requests = Vec::new();
        for category in categories {
            for (index, item) in info.items(category).iter().enumerate() {
                if item.needs_asset() {
                    slots.push((category, index));
                    requests.push(AssetRequest::new(
                        category.search_query(&info.city, &item.name),
                        category,
                    ));
                }
            }
        }

        if requests.is_empty() {
            return 0;
        }

        let total = requests.len();
        let results = self.resolve_all(requests).await;
        let mut found = 0;
        for ((category, index), result) in slots.into_iter().zip(results) {
            found += usize::from(result.found);
            if let Some(item) = info
                .items_mut(category)
                .and_then(|items| items.get_mut(index))
            {
                item.asset_ref = result.resource_ref;
            }
        }

        info!(
            city = %info.city,
            total,
            found,
            placeholders = total - found,
            "Resolved item images"
        );
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ImageProvider;
    use crate::test_support::ScriptedProvider;
    use crate::travel::Item;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_input_order_under_concurrency() {
        let provider = Arc::new(ScriptedProvider::echo("echo").with_latency(Duration::from_millis(5)));
        let chain = Arc::new(ProviderChain::new(vec![provider.clone() as Arc<dyn ImageProvider>]));
        let resolver = AssetResolver::new(chain, 4);

        let requests: Vec<_> = (0..10)
            .map(|i| AssetRequest::new(format!("q{i}"), ItemCategory::Attraction))
            .collect();
        let results = resolver.resolve_all(requests).await;

        let refs: Vec<_> = results.iter().map(|r| r.asset_ref().to_string()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("https://img/q{i}.jpg")).collect();
        assert_eq!(refs, expected);
        assert_eq!(provider.calls(), 10);
        assert!(provider.max_in_flight() <= 4);
    }

    #[tokio::test]
    async fn test_concurrency_one_is_sequential() {
        let provider = Arc::new(ScriptedProvider::echo("echo").with_latency(Duration::from_millis(2)));
        let chain = Arc::new(ProviderChain::new(vec![provider.clone() as Arc<dyn ImageProvider>]));
        let resolver = AssetResolver::new(chain, 0);
        assert_eq!(resolver.concurrency(), 1);

        let requests = vec![
            AssetRequest::new("a", ItemCategory::Food),
            AssetRequest::new("b", ItemCategory::Food),
        ];
        resolver.resolve_all(requests).await;
        assert_eq!(provider.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_enrich_fills_missing_refs_only() {
        let provider = Arc::new(ScriptedProvider::echo("echo"));
        let chain = Arc::new(ProviderChain::new(vec![provider.clone() as Arc<dyn ImageProvider>]));
        let resolver = AssetResolver::new(chain, 2);

        let mut info = TravelInfo::new("Chengdu", 2);
        info.attractions.push(Item::new("Jinli", "Old street"));
        let mut preset = Item::new("Panda Base", "Pandas");
        preset.asset_ref = Some("https://img/preset.jpg".into());
        info.attractions.push(preset);
        info.foods.push(Item::new("Hotpot", "Spicy"));
        info.food_shops.push(Item::new("Chen Mapo", "Tofu"));

        let found = resolver.enrich(&mut info).await;

        assert_eq!(found, 3);
        assert_eq!(provider.calls(), 3);
        assert_eq!(
            info.attractions[0].asset_ref.as_deref(),
            Some("https://img/Chengdu Jinli.jpg")
        );
        assert_eq!(
            info.attractions[1].asset_ref.as_deref(),
            Some("https://img/preset.jpg")
        );
        assert_eq!(
            info.foods[0].asset_ref.as_deref(),
            Some("https://img/Chengdu Hotpot food.jpg")
        );
        assert_eq!(
            info.food_shops[0].asset_ref.as_deref(),
            Some("https://img/Chengdu Chen Mapo restaurant.jpg")
        );
    }

    #[tokio::test]
    async fn test_enrich_uses_placeholders_when_nothing_matches() {
        let chain = Arc::new(ProviderChain::new(vec![
            Arc::new(ScriptedProvider::empty("none")) as Arc<dyn ImageProvider>
        ]));
        let resolver = AssetResolver::new(chain, 2);
        let mut info = TravelInfo::new("Chengdu", 1);
        info.foods.push(Item::new("Hotpot", ""));

        assert_eq!(resolver.enrich(&mut info).await, 0);
        assert_eq!(
            info.foods[0].asset_ref.as_deref(),
            Some(ItemCategory::Food.placeholder())
        );
    }
}
