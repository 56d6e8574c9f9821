//! Prompt text for the generation and evaluation calls.

use std::fmt::Write as _;

use itinera_llm::Message;

use crate::travel::{Item, TravelInfo};

pub const ITINERARY_SYSTEM_PROMPT: &str = "\
You are a professional travel planner. Using the trip length and the attractions and \
local food the user provides (distance, description, image URL, expected duration), \
produce a detailed itinerary.

1. Organise the output as Day1, Day2, ... until the requested number of days is covered.
2. Start every day with breakfast, preferring local specialities, then list the morning \
activity, lunch, the afternoon activity, dinner and any evening activity, and finish \
with lodging or the return trip.
3. For each attraction or dish give its name, a description, the expected duration if \
known, and its image URL if there is one.
4. Estimate travel time between stops.
5. Keep the answer concise and organised while covering everything the user asked for.";

pub const INTENT_SYSTEM_PROMPT: &str = r#"You extract travel intent. From the user's message, find the destination city and the trip length in days, and decide whether more information is needed.

Reply with JSON only, in this shape:
{"city": "city name", "days": number, "need_more_info": boolean, "response": "short reply to the user"}

- "city" is the first city mentioned, or null if there is none.
- "days" is the first trip length as a number, or null. Convert "a week" to 7, "two weeks" to 14.
- "need_more_info" is true when city or days is null, false otherwise.
- "response" tells the user what happens next or what is still missing.

Example:
User: I want to spend three days in Beijing and see the Great Wall.
{"city": "Beijing", "days": 3, "need_more_info": false, "response": "Found Beijing, building your plan now."}

User: I want to go to Beijing.
{"city": "Beijing", "days": null, "need_more_info": true, "response": "How many days are you planning to stay?"}"#;

pub const ANSWER_SYSTEM_PROMPT: &str = "\
You are a knowledgeable travel assistant. Answer travel questions accurately and \
helpfully, using any image description or reference material supplied with the question.";

pub const EVALUATOR_SYSTEM_PROMPT: &str = "\
You grade answers to travel questions. Reply with a single integer score from 1 to 10 \
followed by a brief rationale.";

pub const RERANK_SYSTEM_PROMPT: &str = "\
You rank web search results for a travel planner. Keep only the results most relevant \
to the request, best first, and reply with JSON only: \
{\"related_results\": [{\"title\": \"...\", \"description\": \"...\", \"url\": \"...\"}]}";

pub const EXTRACTION_SYSTEM_PROMPT: &str = "\
You extract travel information from text. Reply with JSON only, in exactly the shape requested.";

pub const BASE_ROUTE_SYSTEM_PROMPT: &str = "\
You draft travel routes from gathered material. Reply with JSON only: \
{\"base_guide\": \"route text\"}";

/// User message for itinerary generation.
#[must_use]
pub fn itinerary_user_message(info: &TravelInfo) -> String {
    let days = info.effective_days();
    let mut out = format!(
        "I am travelling to {} for {days} day(s). Here is the information I have gathered:\n",
        info.city.trim()
    );

    push_items(&mut out, "Attractions", &info.attractions);
    push_items(&mut out, "Local food", &info.foods);
    push_items(&mut out, "Restaurants", &info.food_shops);

    let _ = write!(
        out,
        "\nPlan a {days}-day itinerary from the information above. Each day runs from \
         breakfast to dinner and notes how to get between stops. If several combinations \
         of attractions work, recommend the best route. Use this format:\n\n\
         Day1:\n- Breakfast:\n- Morning:\n- Lunch:\n- Afternoon:\n- Dinner:\n...\n\n\
         Day{days}:\n...\n"
    );
    out
}

fn push_items(out: &mut String, heading: &str, items: &[Item]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n- {heading}:");
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, item.name.trim());
        if let Some(distance) = item.distance.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "     - Distance: {distance}");
        }
        if !item.description.trim().is_empty() {
            let _ = writeln!(out, "     - Description: {}", item.description.trim());
        }
        if let Some(asset) = item.asset_ref.as_deref().filter(|a| !a.is_empty()) {
            let _ = writeln!(out, "     - Image URL: {asset}");
        }
    }
}

/// Question text sent to the answerer, with optional image description and
/// retrieved knowledge.
#[must_use]
pub fn full_question(question: &str, image_description: Option<&str>, knowledge: &str) -> String {
    let mut out = format!("User question: {question}\n\n");
    if let Some(desc) = image_description.filter(|d| !d.trim().is_empty()) {
        let _ = write!(out, "Image description: {desc}\n\n");
    }
    if !knowledge.trim().is_empty() {
        let _ = write!(out, "Reference material:\n{knowledge}\n\n");
    }
    out.push_str("Answer the user's travel question using the information above.");
    out
}

/// Context the evaluator sees besides the candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationContext<'a> {
    pub question: &'a str,
    pub image_description: Option<&'a str>,
    pub knowledge: &'a str,
}

#[must_use]
pub fn evaluation_prompt(ctx: &EvaluationContext<'_>, candidate: &str) -> String {
    let image = ctx
        .image_description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("No image");
    let knowledge = if ctx.knowledge.trim().is_empty() {
        "No reference material used"
    } else {
        ctx.knowledge
    };
    format!(
        "Evaluate the quality of this question and answer.\n\n\
         [Question]\n{}\n\n[Image]\n{image}\n\n[Reference material]\n{knowledge}\n\n\
         [Answer]\n{candidate}\n\n\
         [Scoring]\nScore accuracy, completeness and clarity from 1 to 10 and briefly explain.\n\n\
         Reply with only a number followed by a short rationale.",
        ctx.question
    )
}

/// Corrective message appended after a low score.
#[must_use]
pub fn feedback_message(score: u8, evaluation: &str) -> Message {
    Message::user(format!(
        "Your answer scored {score}, which is not good enough. Improve it using this feedback: {evaluation}"
    ))
}
