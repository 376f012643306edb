//! A shuffled tarot deck that cards are drawn from without replacement

use rand::seq::SliceRandom;
use rand::Rng;

use crate::card::{self, Card};
use crate::error::{Result, TarotError};

/// A deck holding one of each card, in random order
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    /// A full deck shuffled with the thread-local RNG
    pub fn new() -> Self {
        Self::with_rng(&mut rand::thread_rng())
    }

    /// A full deck shuffled with the given RNG (Fisher-Yates, unbiased)
    pub fn with_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut cards: Vec<Card> = card::all().collect();
        cards.shuffle(rng);
        Self { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Cards still in the deck, in deck order
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Draw `count` cards uniformly at random from what is left
    pub fn draw(&mut self, count: usize) -> Result<Vec<Card>> {
        self.draw_with_rng(count, &mut rand::thread_rng())
    }

    /// Draw with an explicit RNG. Fails without touching the deck if `count`
    /// exceeds the remaining cards.
    pub fn draw_with_rng<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Result<Vec<Card>> {
        if count > self.cards.len() {
            return Err(TarotError::NotEnoughCards {
                requested: count,
                remaining: self.cards.len(),
            });
        }

        let mut drawn = Vec::with_capacity(count);
        for _ in 0..count {
            let index = rng.gen_range(0..self.cards.len());
            drawn.push(self.cards.swap_remove(index));
        }
        Ok(drawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CARD_COUNT;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_new_deck_is_complete() {
        let deck = Deck::new();
        assert_eq!(deck.len(), CARD_COUNT);

        let unique: HashSet<Card> = deck.cards().iter().copied().collect();
        assert_eq!(unique.len(), CARD_COUNT);
    }

    #[test]
    fn test_new_deck_is_shuffled() {
        let identity: Vec<Card> = card::all().collect();
        // 78! orderings; ten identity shuffles in a row will not happen
        let shuffled = (0..10).any(|_| Deck::new().cards() != identity.as_slice());
        assert!(shuffled);
    }

    #[test]
    fn test_draw_removes_cards() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut deck = Deck::with_rng(&mut rng);

        let drawn = deck.draw_with_rng(5, &mut rng).unwrap();
        assert_eq!(drawn.len(), 5);
        assert_eq!(deck.len(), CARD_COUNT - 5);

        let unique: HashSet<Card> = drawn.iter().copied().collect();
        assert_eq!(unique.len(), 5);
        for card in &drawn {
            assert!(!deck.cards().contains(card));
        }

        // Remaining + drawn is still the full deck
        let mut everything: HashSet<Card> = deck.cards().iter().copied().collect();
        everything.extend(drawn);
        assert_eq!(everything.len(), CARD_COUNT);
    }

    #[test]
    fn test_draw_whole_deck() {
        let mut deck = Deck::new();
        let drawn = deck.draw(CARD_COUNT).unwrap();
        assert_eq!(drawn.len(), CARD_COUNT);
        assert!(deck.is_empty());
    }

    #[test]
    fn test_draw_too_many() {
        let mut deck = Deck::new();
        deck.draw(76).unwrap();

        let err = deck.draw(3).unwrap_err();
        assert!(matches!(
            err,
            TarotError::NotEnoughCards {
                requested: 3,
                remaining: 2
            }
        ));
        assert_eq!(deck.len(), 2);
    }
}
