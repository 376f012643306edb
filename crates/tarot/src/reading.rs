//! The finished card reading and its generation metadata

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::AddAssign;

use crate::card::Card;
use crate::spread::{Spread, CARD_LIST_TOKEN};

/// Token counts reported by the generation service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Request parameters and response details of a generation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    /// Identifier the service assigned to the response
    pub generation_id: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    /// Wall-clock time spent waiting on the service
    pub response_ms: u64,
    pub usage: Usage,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl Metadata {
    /// Fold in a chained call: usage and timing add up, identity stays
    pub fn accumulate(&mut self, other: &Metadata) {
        self.usage += other.usage;
        self.response_ms += other.response_ms;
    }
}

/// A completed reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardReading {
    pub spread_type: String,
    pub cards: Vec<Card>,
    /// Caller-facing parameters only; derived card tokens are dropped
    pub parameters: BTreeMap<String, String>,
    pub prompt: String,
    pub response: String,
    pub summary: Option<String>,
    pub metadata: Metadata,
}

impl CardReading {
    pub fn new(spread: &Spread, response: String, metadata: Metadata) -> Self {
        let parameters = spread
            .parameters
            .iter()
            .filter(|(name, _)| !is_card_token(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self {
            spread_type: spread.spread_type.clone(),
            cards: spread.cards.clone(),
            parameters,
            prompt: spread.prompt.clone(),
            response,
            summary: None,
            metadata,
        }
    }

    /// Attach the result of a chained summarization call
    pub fn attach_summary(&mut self, summary: String, metadata: &Metadata) {
        self.summary = Some(summary);
        self.metadata.accumulate(metadata);
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

/// `card_list` or `card_<n>`
fn is_card_token(name: &str) -> bool {
    if name == CARD_LIST_TOKEN {
        return true;
    }
    match name.strip_prefix("card_") {
        Some(position) => !position.is_empty() && position.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}
