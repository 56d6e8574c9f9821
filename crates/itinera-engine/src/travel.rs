//! Request, input and report types shared by the planner and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resilient::OutputSource;

/// Placeholder used when no category applies
pub const GENERIC_PLACEHOLDER: &str = "https://via.placeholder.com/400x300/gray/white?text=No+image";

/// A request for an itinerary. Two requests with the same trimmed city and
/// day count share a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelRequest {
    pub city: String,
    pub days: u32,
}

impl TravelRequest {
    #[must_use]
    pub fn new(city: impl Into<String>, days: u32) -> Self {
        Self {
            city: city.into(),
            days,
        }
    }

    /// Normalized parameters hashed into the cache key.
    #[must_use]
    pub fn cache_params(&self) -> serde_json::Value {
        serde_json::json!({
            "city": self.city.trim(),
            "days": self.days,
        })
    }
}

/// Kind of sub-item that needs an illustrative image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Attraction,
    Food,
    FoodShop,
    Other,
}

impl ItemCategory {
    /// Image reference used when every provider came back empty.
    #[must_use]
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Attraction => "https://via.placeholder.com/400x300/4CAF50/white?text=Attraction",
            Self::Food => "https://via.placeholder.com/400x300/FF9800/white?text=Food",
            Self::FoodShop => "https://via.placeholder.com/400x300/2196F3/white?text=Restaurant",
            Self::Other => GENERIC_PLACEHOLDER,
        }
    }

    /// Image search query for an item of this category.
    #[must_use]
    pub fn search_query(self, city: &str, name: &str) -> String {
        let city = city.trim();
        let name = name.trim();
        match self {
            Self::Attraction | Self::Other => format!("{city} {name}"),
            Self::Food => format!("{city} {name} food"),
            Self::FoodShop => format!("{city} {name} restaurant"),
        }
    }

    #[must_use]
    pub fn heading(self) -> &'static str {
        match self {
            Self::Attraction => "Attractions",
            Self::Food => "Local food",
            Self::FoodShop => "Restaurants",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Attraction => "attraction",
            Self::Food => "food",
            Self::FoodShop => "food_shop",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// An attraction, dish or restaurant gathered for a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default, alias = "describe")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(default, alias = "image_url", skip_serializing_if = "Option::is_none")]
    pub asset_ref: Option<String>,
}

impl Item {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            distance: None,
            asset_ref: None,
        }
    }

    /// Whether an image still has to be looked up for this item.
    #[must_use]
    pub fn needs_asset(&self) -> bool {
        self.asset_ref
            .as_deref()
            .is_none_or(|r| r.trim().is_empty())
    }
}

/// Destination content the itinerary is generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelInfo {
    pub city: String,
    pub days: u32,
    #[serde(default)]
    pub attractions: Vec<Item>,
    #[serde(default)]
    pub foods: Vec<Item>,
    #[serde(default, alias = "food_shop")]
    pub food_shops: Vec<Item>,
    /// Free-form base route produced upstream, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_route: Option<serde_json::Value>,
}

impl TravelInfo {
    #[must_use]
    pub fn new(city: impl Into<String>, days: u32) -> Self {
        Self {
            city: city.into(),
            days,
            attractions: Vec::new(),
            foods: Vec::new(),
            food_shops: Vec::new(),
            base_route: None,
        }
    }

    #[must_use]
    pub fn items(&self, category: ItemCategory) -> &[Item] {
        match category {
            ItemCategory::Attraction => &self.attractions,
            ItemCategory::Food => &self.foods,
            ItemCategory::FoodShop => &self.food_shops,
            ItemCategory::Other => &[],
        }
    }

    pub(crate) fn items_mut(&mut self, category: ItemCategory) -> Option<&mut Vec<Item>> {
        match category {
            ItemCategory::Attraction => Some(&mut self.attractions),
            ItemCategory::Food => Some(&mut self.foods),
            ItemCategory::FoodShop => Some(&mut self.food_shops),
            ItemCategory::Other => None,
        }
    }

    /// Day count used for planning; never below 1.
    #[must_use]
    pub fn effective_days(&self) -> u32 {
        self.days.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem {
    pub name: String,
    pub description: String,
    pub asset_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub category: ItemCategory,
    pub heading: String,
    pub items: Vec<ReportItem>,
}

/// Structured result handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryReport {
    pub title: String,
    pub city: String,
    pub days: u32,
    pub itinerary: String,
    pub itinerary_source: OutputSource,
    pub sections: Vec<ReportSection>,
    pub generated_at: DateTime<Utc>,
}
