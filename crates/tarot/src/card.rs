//! The card model
//!
//! Every card is addressed by an ordinal in `[0, 78)`. Ordinals `[0, 22)` are the
//! major arcana in their traditional order. Ordinals `[22, 78)` are the minor
//! arcana, laid out suit by suit as `22 + 14 * suit + rank`.
//!
//! Classification and naming live in free functions over a table that is built
//! once from the suit x rank cross product; the [`Card`] type itself is plain data.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{Result, TarotError};

/// Number of cards in a full tarot deck
pub const CARD_COUNT: usize = 78;

/// Number of major arcana cards
pub const MAJOR_COUNT: usize = 22;

/// Number of ranks in each minor arcana suit
pub const RANKS_PER_SUIT: usize = 14;

/// Major/minor classification of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arcana {
    Major,
    Minor,
}

/// The four suits of the minor arcana
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    Wands,
    Cups,
    Swords,
    Pentacles,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Wands, Suit::Cups, Suit::Swords, Suit::Pentacles];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wands => "Wands",
            Self::Cups => "Cups",
            Self::Swords => "Swords",
            Self::Pentacles => "Pentacles",
        }
    }

    /// Exact, case-sensitive lookup by canonical name
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|suit| suit.as_str() == name)
            .ok_or_else(|| TarotError::UnknownIdentifier(name.to_string()))
    }
}

/// The fourteen ranks of a minor arcana suit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Page,
    Knight,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Rank; RANKS_PER_SUIT] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Page,
        Rank::Knight,
        Rank::Queen,
        Rank::King,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ace => "Ace",
            Self::Two => "Two",
            Self::Three => "Three",
            Self::Four => "Four",
            Self::Five => "Five",
            Self::Six => "Six",
            Self::Seven => "Seven",
            Self::Eight => "Eight",
            Self::Nine => "Nine",
            Self::Ten => "Ten",
            Self::Page => "Page",
            Self::Knight => "Knight",
            Self::Queen => "Queen",
            Self::King => "King",
        }
    }

    /// Exact, case-sensitive lookup by canonical name
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|rank| rank.as_str() == name)
            .ok_or_else(|| TarotError::UnknownIdentifier(name.to_string()))
    }
}

/// The 22 cards of the major arcana, in ordinal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MajorArcana {
    TheFool,
    TheMagician,
    TheHighPriestess,
    TheEmpress,
    TheEmperor,
    TheHierophant,
    TheLovers,
    TheChariot,
    Justice,
    TheHermit,
    TheWheelOfFortune,
    Strength,
    TheHangedMan,
    Death,
    Temperance,
    TheDevil,
    TheTower,
    TheStar,
    TheMoon,
    TheSun,
    Judgement,
    TheWorld,
}

impl MajorArcana {
    pub const ALL: [MajorArcana; MAJOR_COUNT] = [
        MajorArcana::TheFool,
        MajorArcana::TheMagician,
        MajorArcana::TheHighPriestess,
        MajorArcana::TheEmpress,
        MajorArcana::TheEmperor,
        MajorArcana::TheHierophant,
        MajorArcana::TheLovers,
        MajorArcana::TheChariot,
        MajorArcana::Justice,
        MajorArcana::TheHermit,
        MajorArcana::TheWheelOfFortune,
        MajorArcana::Strength,
        MajorArcana::TheHangedMan,
        MajorArcana::Death,
        MajorArcana::Temperance,
        MajorArcana::TheDevil,
        MajorArcana::TheTower,
        MajorArcana::TheStar,
        MajorArcana::TheMoon,
        MajorArcana::TheSun,
        MajorArcana::Judgement,
        MajorArcana::TheWorld,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TheFool => "TheFool",
            Self::TheMagician => "TheMagician",
            Self::TheHighPriestess => "TheHighPriestess",
            Self::TheEmpress => "TheEmpress",
            Self::TheEmperor => "TheEmperor",
            Self::TheHierophant => "TheHierophant",
            Self::TheLovers => "TheLovers",
            Self::TheChariot => "TheChariot",
            Self::Justice => "Justice",
            Self::TheHermit => "TheHermit",
            Self::TheWheelOfFortune => "TheWheelOfFortune",
            Self::Strength => "Strength",
            Self::TheHangedMan => "TheHangedMan",
            Self::Death => "Death",
            Self::Temperance => "Temperance",
            Self::TheDevil => "TheDevil",
            Self::TheTower => "TheTower",
            Self::TheStar => "TheStar",
            Self::TheMoon => "TheMoon",
            Self::TheSun => "TheSun",
            Self::Judgement => "Judgement",
            Self::TheWorld => "TheWorld",
        }
    }
}

/// A single tarot card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Card {
    Major(MajorArcana),
    Minor(Rank, Suit),
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(display_name(*self))
    }
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(display_name(*self))
    }
}

/// One row of the card table
struct CardEntry {
    card: Card,
    /// Compact identifier, e.g. "SixOfSwords"
    name: String,
    /// Title case display form, e.g. "Six of Swords"
    display: String,
}

static CARD_TABLE: OnceLock<Vec<CardEntry>> = OnceLock::new();

fn table() -> &'static [CardEntry] {
    CARD_TABLE.get_or_init(|| {
        let mut entries = Vec::with_capacity(CARD_COUNT);

        for major in MajorArcana::ALL {
            entries.push(CardEntry {
                card: Card::Major(major),
                name: major.as_str().to_string(),
                display: split_words(major.as_str()),
            });
        }

        for suit in Suit::ALL {
            for rank in Rank::ALL {
                entries.push(CardEntry {
                    card: Card::Minor(rank, suit),
                    name: format!("{}Of{}", rank.as_str(), suit.as_str()),
                    display: format!("{} of {}", rank.as_str(), suit.as_str()),
                });
            }
        }

        entries
    })
}

/// "TheWheelOfFortune" -> "The Wheel of Fortune"
fn split_words(compact: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for ch in compact.chars() {
        match words.last_mut() {
            Some(word) if !ch.is_uppercase() => word.push(ch),
            _ => words.push(ch.to_string()),
        }
    }

    words
        .into_iter()
        .map(|w| if w == "Of" { "of".to_string() } else { w })
        .collect::<Vec<_>>()
        .join(" ")
}

/// All 78 cards in ordinal order
pub fn all() -> impl Iterator<Item = Card> {
    table().iter().map(|entry| entry.card)
}

/// The card's position in the fixed enumeration
pub fn ordinal(card: Card) -> usize {
    match card {
        Card::Major(major) => major as usize,
        Card::Minor(rank, suit) => MAJOR_COUNT + RANKS_PER_SUIT * (suit as usize) + rank as usize,
    }
}

/// Look up a card by ordinal, `None` outside `[0, 78)`
pub fn from_ordinal(ordinal: usize) -> Option<Card> {
    table().get(ordinal).map(|entry| entry.card)
}

pub fn arcana(card: Card) -> Arcana {
    match card {
        Card::Major(_) => Arcana::Major,
        Card::Minor(..) => Arcana::Minor,
    }
}

/// The card's suit, `None` for the major arcana
pub fn suit(card: Card) -> Option<Suit> {
    match card {
        Card::Major(_) => None,
        Card::Minor(_, suit) => Some(suit),
    }
}

/// The card's rank, `None` for the major arcana
pub fn rank(card: Card) -> Option<Rank> {
    match card {
        Card::Major(_) => None,
        Card::Minor(rank, _) => Some(rank),
    }
}

/// Canonical human-readable form, e.g. "Six of Swords"
pub fn display_name(card: Card) -> &'static str {
    &table()[ordinal(card)].display
}

/// Canonical identifier, e.g. "SixOfSwords"
pub fn name(card: Card) -> &'static str {
    &table()[ordinal(card)].name
}

/// Exact, case-sensitive lookup by canonical identifier
pub fn from_name(name: &str) -> Result<Card> {
    table()
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.card)
        .ok_or_else(|| TarotError::UnknownIdentifier(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ordinal_round_trip() {
        for i in 0..CARD_COUNT {
            let card = from_ordinal(i).unwrap();
            assert_eq!(ordinal(card), i);
        }
        assert_eq!(from_ordinal(CARD_COUNT), None);
    }

    #[test]
    fn test_minor_encoding_round_trip() {
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                let i = MAJOR_COUNT + RANKS_PER_SUIT * (suit as usize) + rank as usize;
                let card = from_ordinal(i).unwrap();
                assert_eq!(arcana(card), Arcana::Minor);
                assert_eq!(suit_of(card), Some(suit));
                assert_eq!(rank_of(card), Some(rank));
            }
        }
    }

    // The module's `suit`/`rank` functions share names with loop variables above
    fn suit_of(card: Card) -> Option<Suit> {
        super::suit(card)
    }

    fn rank_of(card: Card) -> Option<Rank> {
        super::rank(card)
    }

    #[test]
    fn test_major_has_no_suit_or_rank() {
        for i in 0..MAJOR_COUNT {
            let card = from_ordinal(i).unwrap();
            assert_eq!(arcana(card), Arcana::Major);
            assert_eq!(suit_of(card), None);
            assert_eq!(rank_of(card), None);
        }
    }

    #[test]
    fn test_display_names_unique() {
        let names: HashSet<&str> = all().map(display_name).collect();
        assert_eq!(names.len(), CARD_COUNT);
        assert_eq!(all().count(), CARD_COUNT);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Card::Major(MajorArcana::TheFool)), "The Fool");
        assert_eq!(
            display_name(Card::Major(MajorArcana::TheWheelOfFortune)),
            "The Wheel of Fortune"
        );
        assert_eq!(display_name(Card::Minor(Rank::Six, Suit::Swords)), "Six of Swords");
        assert_eq!(Card::Minor(Rank::King, Suit::Pentacles).to_string(), "King of Pentacles");
    }

    #[test]
    fn test_known_ordinals() {
        assert_eq!(ordinal(Card::Major(MajorArcana::TheWheelOfFortune)), 10);
        assert_eq!(ordinal(Card::Minor(Rank::Ace, Suit::Wands)), 22);
        assert_eq!(ordinal(Card::Minor(Rank::King, Suit::Pentacles)), 77);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(from_name("TheHierophant").unwrap(), Card::Major(MajorArcana::TheHierophant));
        assert_eq!(from_name("TwoOfPentacles").unwrap(), Card::Minor(Rank::Two, Suit::Pentacles));
        assert_eq!(name(Card::Minor(Rank::Two, Suit::Pentacles)), "TwoOfPentacles");

        // Lookup is exact
        assert!(matches!(from_name("thehierophant"), Err(TarotError::UnknownIdentifier(_))));
        assert!(from_name("Two of Pentacles").is_err());
    }

    #[test]
    fn test_suit_and_rank_from_name() {
        assert_eq!(Suit::from_name("Cups").unwrap(), Suit::Cups);
        assert_eq!(Rank::from_name("Knight").unwrap(), Rank::Knight);
        assert!(Suit::from_name("Coins").is_err());
        assert!(Rank::from_name("Jack").is_err());
    }

    #[test]
    fn test_serialize_as_display_name() {
        let json = serde_json::to_string(&Card::Minor(Rank::Six, Suit::Swords)).unwrap();
        assert_eq!(json, "\"Six of Swords\"");
    }
}
