use std::cmp::Reverse;

use rand::RngCore;

use crate::card::{Card, Value};

use super::BotPlayer;

/// Hard opponent: dumps the most expensive card it may legally play.
/// Wilds first, then draw cards, then skip/reverse, then the highest number.
pub struct GreedyPlayer;

impl GreedyPlayer {
    fn rank(card: &Card) -> (u8, u8) {
        match card.value {
            Value::Wild | Value::Wild4 => (3, 0),
            Value::Draw2 => (2, 0),
            Value::Skip | Value::Reverse => (1, 0),
            Value::Number(n) => (0, n),
        }
    }
}

impl BotPlayer for GreedyPlayer {
    fn decide(&self, hand: &[Card], legal: &[usize], _rng: &mut dyn RngCore) -> usize {
        // min_by_key keeps the first of equal ranks
        legal
            .iter()
            .copied()
            .min_by_key(|&index| Reverse(Self::rank(&hand[index])))
            .unwrap_or(legal[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Color;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_greedy_ranking() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let hand = [
            Card::number(Color::Red, 3),
            Card::number(Color::Red, 8),
            Card::new(Color::Red, Value::Skip),
            Card::new(Color::Red, Value::Draw2),
        ];
        assert_eq!(GreedyPlayer.decide(&hand, &[0, 1, 2, 3], &mut rng), 3);
        assert_eq!(GreedyPlayer.decide(&hand, &[0, 1, 2], &mut rng), 2);
        assert_eq!(GreedyPlayer.decide(&hand, &[0, 1], &mut rng), 1);
    }
}
