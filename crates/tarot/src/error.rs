//! Error types for the tarot crate

use thiserror::Error;

/// Which alias table a lookup or registration was made against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasCategory {
    Card,
    Suit,
    Rank,
}

impl AliasCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Suit => "suit",
            Self::Rank => "rank",
        }
    }
}

impl std::fmt::Display for AliasCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tarot-specific errors
#[derive(Error, Debug)]
pub enum TarotError {
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Unrecognized {category} alias: {alias}")]
    UnrecognizedAlias {
        category: AliasCategory,
        alias: String,
    },

    #[error("Duplicate {category} alias for {alias}")]
    DuplicateAlias {
        category: AliasCategory,
        alias: String,
    },

    #[error("Unknown spread type: {0}")]
    UnknownSpreadType(String),

    #[error("{spread_type} tarot card spread expects exactly {expected} card[s], got {actual}")]
    WrongCardCount {
        spread_type: String,
        expected: usize,
        actual: usize,
    },

    #[error("{spread_type} tarot card spread is missing required parameter[s]: {}", .missing.join(", "))]
    MissingParameters {
        spread_type: String,
        missing: Vec<String>,
    },

    #[error("Prompt template still has unresolved token \"{0}\"")]
    UnresolvedToken(String),

    #[error("Unknown card: {0}")]
    UnknownCard(String),

    #[error("Duplicate card: {0}")]
    DuplicateCard(String),

    #[error("Only [{min}-{max}] cards allowed in the tarot card spread")]
    CardCountOutOfRange { min: usize, max: usize, actual: usize },

    #[error("Cannot draw {requested} card[s], only {remaining} left in the deck")]
    NotEnoughCards { requested: usize, remaining: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TarotError>;
