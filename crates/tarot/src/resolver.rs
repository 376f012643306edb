//! Card name resolution
//!
//! Maps free-text names ("the pope", "DeuceOfCoins", "KING OF DISCS") to canonical
//! cards, suits, and ranks. Matching is exact after normalization (lower case,
//! whitespace removed). The only inference is splitting an unknown card name
//! around "of" into a rank alias and a suit alias.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::card::{self, Card, Rank, Suit};
use crate::error::{AliasCategory, Result, TarotError};

/// Built-in alias configuration
pub const BUILTIN_ALIASES: &str = include_str!("../config/aliases.toml");

/// Alias configuration as read from disk: canonical id -> extra aliases
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AliasConfig {
    #[serde(default)]
    pub cards: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub suits: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub ranks: BTreeMap<String, Vec<String>>,
}

impl AliasConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TarotError::Config(format!("invalid alias config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            TarotError::Config(format!("failed to read alias config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }
}

/// Lower-case and strip all whitespace
pub fn normalize(alias: &str) -> String {
    alias
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Read-only alias tables, built once at startup
#[derive(Debug, Clone)]
pub struct CardResolver {
    cards: HashMap<String, Card>,
    suits: HashMap<String, Suit>,
    ranks: HashMap<String, Rank>,
}

impl CardResolver {
    /// Build the alias tables. Any configured alias that collides with one
    /// already registered in the same category, including a canonical name,
    /// is rejected.
    pub fn new(config: &AliasConfig) -> Result<Self> {
        let mut cards = HashMap::new();
        let mut suits = HashMap::new();
        let mut ranks = HashMap::new();

        // Identity aliases
        for card in card::all() {
            cards.insert(normalize(card::name(card)), card);
        }
        for suit in Suit::ALL {
            suits.insert(normalize(suit.as_str()), suit);
        }
        for rank in Rank::ALL {
            ranks.insert(normalize(rank.as_str()), rank);
        }

        register(&mut cards, AliasCategory::Card, &config.cards, card::from_name)?;
        register(&mut suits, AliasCategory::Suit, &config.suits, Suit::from_name)?;
        register(&mut ranks, AliasCategory::Rank, &config.ranks, Rank::from_name)?;

        tracing::debug!(
            cards = cards.len(),
            suits = suits.len(),
            ranks = ranks.len(),
            "alias tables loaded"
        );

        Ok(Self { cards, suits, ranks })
    }

    /// Resolver over the aliases shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::new(&AliasConfig::from_toml(BUILTIN_ALIASES)?)
    }

    /// Resolver over an alias file on disk
    pub fn load(path: &Path) -> Result<Self> {
        Self::new(&AliasConfig::load(path)?)
    }

    pub fn resolve_card(&self, name: &str) -> Result<Card> {
        lookup(&self.cards, AliasCategory::Card, name)
    }

    pub fn resolve_suit(&self, name: &str) -> Result<Suit> {
        lookup(&self.suits, AliasCategory::Suit, name)
    }

    pub fn resolve_rank(&self, name: &str) -> Result<Rank> {
        lookup(&self.ranks, AliasCategory::Rank, name)
    }

    /// Best-effort card resolution: a known alias, or else "<rank>of<suit>"
    /// where both halves are known aliases. Never fails, only misses.
    pub fn resolve_optional_card(&self, name: &str) -> Option<Card> {
        let alias = normalize(name);
        if let Some(card) = self.cards.get(&alias) {
            return Some(*card);
        }

        // Aliases may contain "of" themselves, so every occurrence is a
        // candidate split point
        alias.match_indices("of").find_map(|(at, _)| {
            let rank = self.ranks.get(&alias[..at])?;
            let suit = self.suits.get(&alias[at + 2..])?;
            let canonical = format!("{}Of{}", rank.as_str(), suit.as_str());
            self.cards.get(&normalize(&canonical)).copied()
        })
    }

    /// Resolve a caller-supplied card list, rejecting unknown names and any
    /// card given more than once
    pub fn resolve_card_list<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Card>> {
        let mut resolved: Vec<Card> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let card = self
                .resolve_optional_card(name)
                .ok_or_else(|| TarotError::UnknownCard(name.to_string()))?;
            if resolved.contains(&card) {
                return Err(TarotError::DuplicateCard(card.to_string()));
            }
            resolved.push(card);
        }
        Ok(resolved)
    }
}

fn register<T: Copy>(
    table: &mut HashMap<String, T>,
    category: AliasCategory,
    configured: &BTreeMap<String, Vec<String>>,
    parse: impl Fn(&str) -> Result<T>,
) -> Result<()> {
    for (canonical, aliases) in configured {
        let target = parse(canonical)?;
        for alias in aliases {
            let key = normalize(alias);
            if table.contains_key(&key) {
                return Err(TarotError::DuplicateAlias { category, alias: key });
            }
            table.insert(key, target);
        }
    }
    Ok(())
}

fn lookup<T: Copy>(table: &HashMap<String, T>, category: AliasCategory, name: &str) -> Result<T> {
    table
        .get(&normalize(name))
        .copied()
        .ok_or_else(|| TarotError::UnrecognizedAlias {
            category,
            alias: name.to_string(),
        })
}
