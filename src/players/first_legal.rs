use rand::RngCore;

use crate::card::Card;

use super::BotPlayer;

/// Easy opponent: always the first legal card in hand order.
pub struct FirstLegalPlayer;

impl BotPlayer for FirstLegalPlayer {
    fn decide(&self, _hand: &[Card], legal: &[usize], _rng: &mut dyn RngCore) -> usize {
        legal[0]
    }
}
