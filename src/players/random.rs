use rand::seq::SliceRandom;
use rand::RngCore;

use crate::card::Card;

use super::BotPlayer;

/// Uniform choice among the legal cards.
pub struct RandomPlayer;

impl BotPlayer for RandomPlayer {
    fn decide(&self, _hand: &[Card], legal: &[usize], rng: &mut dyn RngCore) -> usize {
        legal.choose(rng).copied().unwrap_or(legal[0])
    }
}
