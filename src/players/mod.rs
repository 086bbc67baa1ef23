// Players module - computer opponents
//
// Each difficulty maps to a `BotPlayer` that picks among the legal cards.
// `take_turn` drives a whole computer turn against a `Match`, drawing and
// passing as needed, and reports every step so it can be replicated.

use itertools::Itertools;
use log::debug;
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::card::{Card, Color, PLAYABLE_COLORS};
use crate::errors::GameResult;
use crate::game::{DrawOutcome, Match, PlayOutcome};
use crate::rules::{legal_card_indices, PlayContext};

pub mod first_legal;
pub mod greedy;
pub mod random;
pub mod weighted_random;

pub use self::first_legal::FirstLegalPlayer;
pub use self::greedy::GreedyPlayer;
pub use self::random::RandomPlayer;
pub use self::weighted_random::WeightedRandomPlayer;

/// Picks one of the `legal` indices into `hand`. `legal` is never empty.
pub trait BotPlayer {
    fn decide(&self, hand: &[Card], legal: &[usize], rng: &mut dyn RngCore) -> usize;
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn bot(self) -> Box<dyn BotPlayer + Send + Sync> {
        match self {
            Difficulty::Easy => Box::new(FirstLegalPlayer),
            Difficulty::Medium => Box::new(WeightedRandomPlayer::default()),
            Difficulty::Hard => Box::new(GreedyPlayer),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputerMove {
    Play {
        card_index: usize,
        chosen_color: Option<Color>,
    },
    Draw,
}

pub fn get_computer_move(
    hand: &[Card],
    top: &Card,
    context: &PlayContext<'_>,
    difficulty: Difficulty,
    rng: &mut dyn RngCore,
) -> ComputerMove {
    let legal = legal_card_indices(hand, top, context);
    if legal.is_empty() {
        return ComputerMove::Draw;
    }

    let card_index = difficulty.bot().decide(hand, &legal, rng);
    let chosen_color = hand[card_index].is_wild().then(|| {
        let rest: Vec<Card> = hand
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != card_index)
            .map(|(_, card)| *card)
            .collect();
        choose_color(&rest, rng)
    });

    ComputerMove::Play {
        card_index,
        chosen_color,
    }
}

/// Most frequent colored suit in `hand`, ties going to the earlier color in
/// `PLAYABLE_COLORS`. A hand without colored cards gets a random color.
pub fn choose_color(hand: &[Card], rng: &mut dyn RngCore) -> Color {
    let counts = hand
        .iter()
        .filter(|card| card.color != Color::Wild)
        .map(|card| card.color)
        .counts();

    PLAYABLE_COLORS
        .iter()
        .filter_map(|color| counts.get(color).map(|count| (*color, *count)))
        .fold(None, |best: Option<(Color, usize)>, (color, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((color, count)),
        })
        .map(|(color, _)| color)
        .or_else(|| PLAYABLE_COLORS.choose(rng).copied())
        .unwrap_or(Color::Red)
}

/// One replicable step of a computer turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnStep {
    Played(PlayOutcome),
    Drew(DrawOutcome),
    Passed { seat: usize },
    CalledUno { seat: usize },
}

/// Plays out the current seat's turn for a computer player.
pub fn take_turn(
    game: &mut Match,
    seat: usize,
    difficulty: Difficulty,
    rng: &mut dyn RngCore,
) -> GameResult<Vec<TurnStep>> {
    let mut steps = Vec::new();

    loop {
        let top = match game.top_card() {
            Some(top) => *top,
            None => break,
        };
        let hand = game.hand(seat).to_vec();
        let next = get_computer_move(&hand, &top, &game.play_context(), difficulty, rng);

        match next {
            ComputerMove::Play {
                card_index,
                chosen_color,
            } => {
                let outcome = game.play_card(seat, card_index, chosen_color)?;
                debug!("🤖 seat {} played {}", seat, outcome.card);
                let round_over = outcome.round_result.is_some();
                steps.push(TurnStep::Played(outcome));
                if !round_over && game.hand(seat).len() == 1 {
                    game.call_uno(seat)?;
                    steps.push(TurnStep::CalledUno { seat });
                }
                break;
            }
            ComputerMove::Draw
                if (game.draws_this_turn > 0 && !game.can_draw_more)
                    || (!game.stack.is_active() && !game.cards_available()) =>
            {
                game.pass_turn(seat)?;
                steps.push(TurnStep::Passed { seat });
                break;
            }
            ComputerMove::Draw => match game.draw_card(seat) {
                Ok(outcome) => {
                    let turn_passed = outcome.turn_passed;
                    steps.push(TurnStep::Drew(outcome));
                    if turn_passed {
                        break;
                    }
                }
                Err(_) if game.draws_this_turn > 0 => {
                    game.pass_turn(seat)?;
                    steps.push(TurnStep::Passed { seat });
                    break;
                }
                Err(err) => return Err(err),
            },
        }
    }

    Ok(steps)
}
