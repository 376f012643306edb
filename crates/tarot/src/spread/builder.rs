//! Spread builder
//!
//! Validates a card list and parameter set against a template, then fills in
//! the template's bracketed tokens ("mad libs" style) to produce the prompt.
//!
//! Two checks run independently. The parameter check catches callers that
//! leave out a required parameter; the unresolved-token check catches
//! templates that reference a token nothing declares.

use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::card::{self, Card};
use crate::error::{Result, TarotError};
use crate::spread::registry::{SpreadRegistry, SpreadTemplate};

/// Token naming the comma-joined list of every card
pub const CARD_LIST_TOKEN: &str = "card_list";

/// A fully built spread, ready to send for generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Spread {
    pub spread_type: String,
    pub cards: Vec<Card>,
    /// Caller parameters, defaults, and derived card tokens
    pub parameters: BTreeMap<String, String>,
    pub prompt: String,
}

impl Spread {
    /// Comma-joined display names of the spread's cards
    pub fn card_list(&self) -> String {
        join_cards(&self.cards)
    }
}

/// Builds spreads from the templates of a registry
#[derive(Debug, Clone)]
pub struct SpreadBuilder {
    registry: SpreadRegistry,
}

impl SpreadBuilder {
    pub fn new(registry: SpreadRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SpreadRegistry {
        &self.registry
    }

    /// Build the spread for `spread_type` from `cards` and caller parameters
    pub fn build(
        &self,
        spread_type: &str,
        cards: &[Card],
        parameters: &BTreeMap<String, String>,
    ) -> Result<Spread> {
        let template = self
            .registry
            .get(spread_type)
            .ok_or_else(|| TarotError::UnknownSpreadType(spread_type.to_string()))?;

        validate_card_count(template, cards)?;
        validate_parameters(template, parameters)?;

        let tokens = derive_tokens(template, cards, parameters);
        let prompt = render(&template.template, &tokens)?;

        tracing::debug!(spread_type, cards = cards.len(), "spread built");

        Ok(Spread {
            spread_type: template.spread_type.clone(),
            cards: cards.to_vec(),
            parameters: tokens,
            prompt,
        })
    }
}

fn validate_card_count(template: &SpreadTemplate, cards: &[Card]) -> Result<()> {
    match template.card_count {
        Some(expected) if cards.len() != expected => Err(TarotError::WrongCardCount {
            spread_type: template.spread_type.clone(),
            expected,
            actual: cards.len(),
        }),
        // Without a fixed count the command layer has already bounded the draw
        _ => Ok(()),
    }
}

fn validate_parameters(template: &SpreadTemplate, parameters: &BTreeMap<String, String>) -> Result<()> {
    let missing: Vec<String> = template
        .required_parameters()
        .filter(|name| !parameters.contains_key(*name))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(TarotError::MissingParameters {
            spread_type: template.spread_type.clone(),
            missing,
        })
    }
}

/// Caller parameters, then declared defaults for anything absent, then
/// `card_1..card_k` and `card_list`
fn derive_tokens(
    template: &SpreadTemplate,
    cards: &[Card],
    parameters: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut tokens = parameters.clone();

    for (name, spec) in &template.parameters {
        if let Some(default) = &spec.default {
            tokens.entry(name.clone()).or_insert_with(|| default.clone());
        }
    }

    for (position, card) in cards.iter().enumerate() {
        tokens.insert(format!("card_{}", position + 1), card::display_name(*card).to_string());
    }
    tokens.insert(CARD_LIST_TOKEN.to_string(), join_cards(cards));

    tokens
}

fn join_cards(cards: &[Card]) -> String {
    cards
        .iter()
        .map(|card| card::display_name(*card))
        .collect::<Vec<_>>()
        .join(", ")
}

fn token_pattern() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\[([^\[\]]+)\]").expect("token pattern is a valid regex"))
}

/// Collapse whitespace to single spaces, then replace every `[key]` with its
/// value in one pass so the order of keys cannot matter. The rendered prompt
/// must be free of bracketed tokens, whether left over from the template or
/// introduced by a substituted value.
pub fn render(template: &str, tokens: &BTreeMap<String, String>) -> Result<String> {
    let normalized = template.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut unresolved: Option<String> = None;
    let prompt = token_pattern().replace_all(&normalized, |caps: &Captures| {
        let key = &caps[1];
        match tokens.get(key) {
            Some(value) => value.clone(),
            None => {
                unresolved.get_or_insert_with(|| key.to_string());
                caps[0].to_string()
            }
        }
    });

    if let Some(token) = unresolved {
        return Err(TarotError::UnresolvedToken(token));
    }

    if let Some(leftover) = token_pattern().captures(&prompt) {
        return Err(TarotError::UnresolvedToken(leftover[1].to_string()));
    }

    Ok(prompt.trim().to_string())
}
