use rand::{Rng, RngCore};

use crate::card::Card;

use super::{BotPlayer, GreedyPlayer, RandomPlayer};

/// Medium opponent: flips between the greedy choice and a random one.
pub struct WeightedRandomPlayer {
    pub greedy_probability: f64,
}

impl Default for WeightedRandomPlayer {
    fn default() -> Self {
        Self {
            greedy_probability: 0.5,
        }
    }
}

impl BotPlayer for WeightedRandomPlayer {
    fn decide(&self, hand: &[Card], legal: &[usize], rng: &mut dyn RngCore) -> usize {
        if rng.gen_bool(self.greedy_probability.clamp(0.0, 1.0)) {
            GreedyPlayer.decide(hand, legal, rng)
        } else {
            RandomPlayer.decide(hand, legal, rng)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Color;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_always_legal() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let hand = [
            Card::number(Color::Red, 3),
            Card::number(Color::Blue, 8),
            Card::number(Color::Red, 6),
        ];
        let player = WeightedRandomPlayer::default();
        for _ in 0..50 {
            let pick = player.decide(&hand, &[0, 2], &mut rng);
            assert!(pick == 0 || pick == 2);
        }
    }

    #[test]
    fn test_probability_one_is_greedy() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let hand = [Card::number(Color::Red, 3), Card::number(Color::Red, 6)];
        let player = WeightedRandomPlayer {
            greedy_probability: 1.0,
        };
        assert_eq!(player.decide(&hand, &[0, 1], &mut rng), 1);
    }
}
