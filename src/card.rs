use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DECK_SIZE: usize = 108;
pub const HAND_SIZE: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
    Wild,
}

/// The four colors a card can carry once it is on the table.
pub const PLAYABLE_COLORS: [Color; 4] = [Color::Red, Color::Blue, Color::Green, Color::Yellow];

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Wild => "wild",
        };
        write!(f, "{name}")
    }
}

/// Face value of a card. On the wire this is `"0"`..`"9"`, `"skip"`,
/// `"reverse"`, `"draw2"`, `"wild"` or `"wild4"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Value {
    Number(u8),
    Skip,
    Reverse,
    Draw2,
    Wild,
    Wild4,
}

impl Value {
    pub fn is_wild(&self) -> bool {
        matches!(self, Value::Wild | Value::Wild4)
    }

    /// Cards forced on the next player, if this value carries a draw effect.
    pub fn draw_amount(&self) -> Option<u32> {
        match self {
            Value::Draw2 => Some(2),
            Value::Wild4 => Some(4),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Skip => write!(f, "skip"),
            Value::Reverse => write!(f, "reverse"),
            Value::Draw2 => write!(f, "draw2"),
            Value::Wild => write!(f, "wild"),
            Value::Wild4 => write!(f, "wild4"),
        }
    }
}

impl From<Value> for String {
    fn from(value: Value) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Value {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.as_str() {
            "skip" => Ok(Value::Skip),
            "reverse" => Ok(Value::Reverse),
            "draw2" => Ok(Value::Draw2),
            "wild" => Ok(Value::Wild),
            "wild4" => Ok(Value::Wild4),
            digits => match digits.parse::<u8>() {
                Ok(n) if n <= 9 => Ok(Value::Number(n)),
                _ => Err(format!("unknown card value: {raw}")),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub color: Color,
    pub value: Value,
}

impl Card {
    pub const fn new(color: Color, value: Value) -> Self {
        Self { color, value }
    }

    pub const fn number(color: Color, n: u8) -> Self {
        Self::new(color, Value::Number(n))
    }

    pub fn is_wild(&self) -> bool {
        self.value.is_wild()
    }

    /// Returns the card as it lies on the discard pile once a color was chosen.
    /// Non-wild cards are returned unchanged.
    pub fn with_color(self, color: Color) -> Self {
        if self.is_wild() {
            Card::new(color, self.value)
        } else {
            self
        }
    }

    /// Returns a played wild card to its in-hand form.
    pub fn reset_color(self) -> Self {
        if self.is_wild() {
            Card::new(Color::Wild, self.value)
        } else {
            self
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wild() && self.color == Color::Wild {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.color, self.value)
        }
    }
}

/// Builds the 108-card deck in its canonical unshuffled order: per color one
/// zero, two each of 1-9, two each of skip/reverse/draw2; then 4 wild and
/// 4 wild4.
pub fn generate_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for color in PLAYABLE_COLORS {
        deck.push(Card::number(color, 0));
        for n in 1..=9 {
            deck.push(Card::number(color, n));
            deck.push(Card::number(color, n));
        }
        for value in [Value::Skip, Value::Reverse, Value::Draw2] {
            deck.push(Card::new(color, value));
            deck.push(Card::new(color, value));
        }
    }
    deck.extend(std::iter::repeat(Card::new(Color::Wild, Value::Wild)).take(4));
    deck.extend(std::iter::repeat(Card::new(Color::Wild, Value::Wild4)).take(4));
    deck
}

/// Uniform Fisher-Yates permutation of `deck`.
pub fn shuffle_deck<R: Rng + ?Sized>(mut deck: Vec<Card>, rng: &mut R) -> Vec<Card> {
    deck.shuffle(rng);
    deck
}

/// Enforces `color == wild <=> value in {wild, wild4}` for cards in a deck or hand.
pub fn is_valid_card(card: &Card) -> bool {
    (card.color == Color::Wild) == card.value.is_wild()
}

/// Cards on the discard pile may be wilds that already carry their chosen color.
pub fn is_valid_discard(card: &Card) -> bool {
    card.value.is_wild() || card.color != Color::Wild
}

/// Replaces a card that broke the color/value invariant with a valid one.
/// Wild values keep their value and get the wild color back; colored values
/// that arrived with the wild color fall back to red.
pub fn repair_card(card: Card) -> Card {
    if is_valid_card(&card) {
        card
    } else if card.value.is_wild() {
        Card::new(Color::Wild, card.value)
    } else {
        Card::new(Color::Red, card.value)
    }
}

/// Pops `n` cards off the top (the end) of `deck`. Returns fewer when the deck
/// runs short; callers reshuffle before dealing when that matters.
pub fn deal_cards_to_player(deck: &mut Vec<Card>, n: usize) -> Vec<Card> {
    let take = n.min(deck.len());
    let mut cards = deck.split_off(deck.len() - take);
    cards.reverse();
    cards
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn counts(cards: &[Card]) -> HashMap<Card, usize> {
        let mut map = HashMap::new();
        for card in cards {
            *map.entry(*card).or_insert(0) += 1;
        }
        map
    }

    #[test]
    fn test_deck_composition() {
        let deck = generate_deck();
        assert_eq!(deck.len(), DECK_SIZE);

        let by_card = counts(&deck);
        for color in PLAYABLE_COLORS {
            assert_eq!(by_card[&Card::number(color, 0)], 1);
            for n in 1..=9 {
                assert_eq!(by_card[&Card::number(color, n)], 2);
            }
            for value in [Value::Skip, Value::Reverse, Value::Draw2] {
                assert_eq!(by_card[&Card::new(color, value)], 2);
            }
            assert_eq!(deck.iter().filter(|c| c.color == color).count(), 25);
        }
        assert_eq!(by_card[&Card::new(Color::Wild, Value::Wild)], 4);
        assert_eq!(by_card[&Card::new(Color::Wild, Value::Wild4)], 4);
        assert!(deck.iter().all(is_valid_card));
    }

    #[test]
    fn test_deck_order_before_shuffle() {
        let deck = generate_deck();
        assert_eq!(deck[0], Card::number(Color::Red, 0));
        assert_eq!(deck[1], Card::number(Color::Red, 1));
        assert_eq!(deck[25], Card::number(Color::Blue, 0));
        assert_eq!(deck[100], Card::new(Color::Wild, Value::Wild));
        assert_eq!(deck[107], Card::new(Color::Wild, Value::Wild4));
    }

    #[test]
    fn test_is_valid_card_biconditional() {
        assert!(is_valid_card(&Card::number(Color::Green, 4)));
        assert!(is_valid_card(&Card::new(Color::Wild, Value::Wild4)));
        assert!(!is_valid_card(&Card::new(Color::Wild, Value::Skip)));
        assert!(!is_valid_card(&Card::new(Color::Blue, Value::Wild)));
        assert!(is_valid_discard(&Card::new(Color::Blue, Value::Wild)));
        assert!(!is_valid_discard(&Card::new(Color::Wild, Value::Number(3))));
    }

    #[test]
    fn test_repair_card() {
        assert_eq!(
            repair_card(Card::new(Color::Yellow, Value::Wild4)),
            Card::new(Color::Wild, Value::Wild4)
        );
        assert_eq!(
            repair_card(Card::new(Color::Wild, Value::Number(7))),
            Card::number(Color::Red, 7)
        );
        let fine = Card::new(Color::Green, Value::Reverse);
        assert_eq!(repair_card(fine), fine);
    }

    #[test]
    fn test_deal_pops_from_top() {
        let mut deck = vec![
            Card::number(Color::Red, 1),
            Card::number(Color::Red, 2),
            Card::number(Color::Red, 3),
        ];
        let dealt = deal_cards_to_player(&mut deck, 2);
        assert_eq!(dealt, vec![Card::number(Color::Red, 3), Card::number(Color::Red, 2)]);
        assert_eq!(deck, vec![Card::number(Color::Red, 1)]);

        let rest = deal_cards_to_player(&mut deck, 5);
        assert_eq!(rest.len(), 1);
        assert!(deck.is_empty());
    }

    #[test]
    fn test_card_wire_shape() {
        let card = Card::new(Color::Blue, Value::Draw2);
        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(json, r#"{"color":"blue","value":"draw2"}"#);

        let seven: Card = serde_json::from_str(r#"{"color":"red","value":"7"}"#).unwrap();
        assert_eq!(seven, Card::number(Color::Red, 7));

        assert!(serde_json::from_str::<Card>(r#"{"color":"red","value":"12"}"#).is_err());
    }

    #[test]
    fn test_with_color_only_touches_wilds() {
        let wild = Card::new(Color::Wild, Value::Wild);
        assert_eq!(wild.with_color(Color::Green), Card::new(Color::Green, Value::Wild));
        assert_eq!(wild.with_color(Color::Green).reset_color(), wild);
        let five = Card::number(Color::Red, 5);
        assert_eq!(five.with_color(Color::Green), five);
    }

    proptest! {
        #[test]
        fn shuffle_is_a_permutation(seed in any::<u64>()) {
            let deck = generate_deck();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let shuffled = shuffle_deck(deck.clone(), &mut rng);
            prop_assert_eq!(shuffled.len(), deck.len());
            prop_assert_eq!(counts(&shuffled), counts(&deck));
        }
    }
}
