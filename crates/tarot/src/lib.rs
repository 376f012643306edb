//! tarot - The 78 card tarot deck and the spread templating engine behind tarobot
//!
//! A tarot deck consists of 78 cards: the 22 cards of the major arcana and the
//! 56 cards of the minor arcana. The minor arcana has 4 suits (Wands, Cups,
//! Swords, and Pentacles) of 14 cards each, Ace through Ten plus the Page,
//! Knight, Queen, and King.
//!
//! The crate is split the same way a reading is put together:
//!
//! - [`card`] - the fixed card table and its naming rules
//! - [`deck`] - a shuffled deck to draw from
//! - [`resolver`] - free-text card names to canonical cards
//! - [`spread`] - spread templates and the prompt builder
//! - [`reading`] - the finished reading record

pub mod card;
pub mod deck;
pub mod error;
pub mod reading;
pub mod resolver;
pub mod spread;

pub use card::{Arcana, Card, MajorArcana, Rank, Suit};
pub use deck::Deck;
pub use error::{Result, TarotError};
pub use reading::{CardReading, Metadata, Usage};
pub use resolver::{AliasConfig, CardResolver};
pub use spread::{Spread, SpreadBuilder, SpreadRegistry, SpreadTemplate};
