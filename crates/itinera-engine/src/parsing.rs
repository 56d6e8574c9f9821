//! Lenient parsers for model output.
//!
//! All tolerance for sloppy model formatting lives here; callers only see the
//! tagged results.

use serde_json::Value;

/// Score range the evaluator is asked to use.
pub const SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Outcome of reading an evaluator reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreParse {
    Parsed { score: u8, rationale: String },
    Unparsed(String),
}

impl ScoreParse {
    #[must_use]
    pub fn score(&self) -> Option<u8> {
        match self {
            Self::Parsed { score, .. } => Some(*score),
            Self::Unparsed(_) => None,
        }
    }
}

/// Read a leading integer score from `text`.
///
/// The first whitespace-delimited token is the score, with one trailing `.`,
/// `,`, `:` or `;` tolerated. The remaining text is the rationale. Zero and
/// negative integers parse as score 0, which no threshold accepts; integers
/// above 10 are `Unparsed`.
#[must_use]
pub fn parse_score(text: &str) -> ScoreParse {
    let trimmed = text.trim();
    let (token, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim()),
        None => (trimmed, ""),
    };
    let token = token
        .strip_suffix(['.', ',', ':', ';'])
        .unwrap_or(token);

    let parsed = match token.parse::<i64>() {
        Ok(n) if n < i64::from(*SCORE_RANGE.start()) => Some(0),
        Ok(n) => u8::try_from(n).ok().filter(|s| SCORE_RANGE.contains(s)),
        Err(_) => None,
    };
    match parsed {
        Some(score) => ScoreParse::Parsed {
            score,
            rationale: rest.to_string(),
        },
        None => ScoreParse::Unparsed(text.to_string()),
    }
}

/// Outcome of pulling a JSON document out of model output.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonBlock {
    Parsed(Value),
    Unparsed(String),
}

impl JsonBlock {
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Parsed(v) => Some(v),
            Self::Unparsed(_) => None,
        }
    }
}

/// Accepts a ```` ```json ```` fence, a bare ```` ``` ```` fence or raw JSON.
#[must_use]
pub fn extract_json_block(text: &str) -> JsonBlock {
    let candidate = fenced_body(text).unwrap_or(text).trim();
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => JsonBlock::Parsed(value),
        Err(_) => JsonBlock::Unparsed(text.to_string()),
    }
}

fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    let end = after.find("```").unwrap_or(after.len());
    Some(&after[..end])
}
