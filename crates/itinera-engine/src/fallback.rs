//! Deterministic day-by-day plan used when generation is unavailable.

use crate::resilient::FallbackGenerator;
use crate::travel::{Item, TravelInfo};

const MAX_ATTRACTIONS_PER_SLOT: usize = 3;

/// Round-robin itinerary built from the gathered items, no network.
///
/// Each day gets breakfast, a morning block, lunch, an afternoon block, dinner
/// and lodging. Attraction blocks hold `max(1, min(3, attractions / days))`
/// entries; meals take one food each. Both lists wrap around, so items repeat
/// when there are fewer than the plan needs.
#[derive(Debug, Clone, Copy)]
pub struct FallbackItinerary<'a> {
    info: &'a TravelInfo,
}

/// Cycles through a list, wrapping at the end.
struct RoundRobin<'a> {
    items: &'a [Item],
    next: usize,
}

impl<'a> RoundRobin<'a> {
    fn new(items: &'a [Item]) -> Self {
        Self { items, next: 0 }
    }

    fn take(&mut self) -> Option<&'a Item> {
        let item = self.items.get(self.next)?;
        self.next = (self.next + 1) % self.items.len();
        Some(item)
    }
}

impl<'a> FallbackItinerary<'a> {
    #[must_use]
    pub fn new(info: &'a TravelInfo) -> Self {
        Self { info }
    }

    #[must_use]
    pub fn attractions_per_slot(&self) -> usize {
        let days = self.info.effective_days() as usize;
        (self.info.attractions.len() / days).clamp(1, MAX_ATTRACTIONS_PER_SLOT)
    }

    #[must_use]
    pub fn render(&self) -> String {
        let days = self.info.effective_days();
        let per_slot = self.attractions_per_slot();
        let mut foods = RoundRobin::new(&self.info.foods);
        let mut spots = RoundRobin::new(&self.info.attractions);

        let mut lines = vec![format!("# {} {}-day itinerary", self.info.city.trim(), days)];

        for day in 1..=days {
            lines.push(String::new());
            lines.push(format!("## Day{day}:"));
            lines.push(meal_line("Breakfast", foods.take(), "Local breakfast"));
            lines.push("- Morning:".to_string());
            push_attractions(&mut lines, &mut spots, per_slot);
            lines.push(meal_line("Lunch", foods.take(), "Local lunch"));
            lines.push("- Afternoon:".to_string());
            push_attractions(&mut lines, &mut spots, per_slot);
            lines.push(meal_line("Dinner", foods.take(), "Local dinner"));
            lines.push("- Lodging: Comfortable hotel".to_string());
        }

        lines.join("\n")
    }
}

fn meal_line(label: &str, food: Option<&Item>, generic: &str) -> String {
    match food {
        Some(item) if !item.name.trim().is_empty() => format!("- {label}: {}", item.name.trim()),
        _ => format!("- {label}: {generic}"),
    }
}

fn push_attractions(lines: &mut Vec<String>, spots: &mut RoundRobin<'_>, count: usize) {
    for _ in 0..count {
        let Some(spot) = spots.take() else { break };
        let description = if spot.description.trim().is_empty() {
            "Famous attraction"
        } else {
            spot.description.trim()
        };
        lines.push(format!("  * {}: {description}", spot.name.trim()));
    }
}

impl FallbackGenerator for FallbackItinerary<'_> {
    fn name(&self) -> &str {
        "round-robin-itinerary"
    }

    fn generate(&self) -> String {
        self.render()
    }
}
