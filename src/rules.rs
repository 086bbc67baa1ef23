// Rule engine: what may be played, what a play does, and what a hand is worth.
//
// Everything here is pure. `resolve_play` describes the consequences of a play
// as data and the match applies them, so the same code serves local moves,
// the computer players and the headless simulator.

use serde::{Deserialize, Serialize};

use crate::card::{Card, Color, Value};
use crate::config::ScoringConfig;
use crate::turn::{Direction, TurnState};

/// An in-progress draw2/wild4 chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackState {
    pub stacked_cards: Vec<Card>,
    pub can_stack: bool,
}

impl StackState {
    pub fn is_active(&self) -> bool {
        self.can_stack && !self.stacked_cards.is_empty()
    }

    /// Value that started the chain.
    pub fn head(&self) -> Option<Value> {
        self.stacked_cards.first().map(|card| card.value)
    }

    /// Cards owed by whoever breaks the chain: 2 per draw2, 4 per wild or wild4.
    pub fn total(&self) -> u32 {
        self.stacked_cards.iter().map(|card| chain_weight(card.value)).sum()
    }

    pub fn clear(&mut self) {
        self.stacked_cards.clear();
        self.can_stack = false;
    }
}

fn chain_weight(value: Value) -> u32 {
    match value {
        Value::Draw2 => 2,
        Value::Wild | Value::Wild4 => 4,
        _ => 0,
    }
}

/// Whether `card` may extend a chain that started with `head`.
pub fn extends_chain(card: &Card, head: Value) -> bool {
    match card.value {
        Value::Draw2 => head == Value::Draw2,
        Value::Wild4 => matches!(head, Value::Draw2 | Value::Wild4),
        _ => false,
    }
}

/// Plain matching rule: same color, same value, or a wild.
pub fn matches_top(card: &Card, top: &Card) -> bool {
    card.color == Color::Wild || card.color == top.color || card.value == top.value
}

/// Constraints on the player about to act.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayContext<'a> {
    pub stack: Option<&'a StackState>,
    /// Set when the player drew this turn and may only play that card.
    pub drawn_card: Option<Card>,
}

impl<'a> PlayContext<'a> {
    pub fn new(stack: &'a StackState, drawn_card: Option<Card>) -> Self {
        Self {
            stack: Some(stack),
            drawn_card,
        }
    }
}

pub fn can_play(card: &Card, top: &Card, context: &PlayContext<'_>) -> bool {
    if let Some(stack) = context.stack.filter(|stack| stack.is_active()) {
        return stack.head().is_some_and(|head| extends_chain(card, head));
    }
    if let Some(drawn) = context.drawn_card {
        return *card == drawn && matches_top(card, top);
    }
    matches_top(card, top)
}

/// Indices of the cards in `hand` that are legal right now.
pub fn legal_card_indices(hand: &[Card], top: &Card, context: &PlayContext<'_>) -> Vec<usize> {
    hand.iter()
        .enumerate()
        .filter(|(_, card)| can_play(card, top, context))
        .map(|(index, _)| index)
        .collect()
}

/// Whether `hand` holds a card that extends the chain in `stack`.
pub fn holds_extension(hand: &[Card], stack: &StackState) -> bool {
    stack
        .head()
        .is_some_and(|head| hand.iter().any(|card| extends_chain(card, head)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Penalty {
    pub target: usize,
    pub count: u32,
}

/// Consequences of a play, applied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayEffects {
    pub next_player_index: usize,
    pub direction: Direction,
    pub reversed: bool,
    pub skipped: Option<usize>,
    pub penalty: Option<Penalty>,
    pub stack: StackState,
    /// A wild was played without a color; the turn stays put until one is chosen.
    pub awaiting_color: bool,
}

/// Inputs `resolve_play` reads besides the card itself.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub turn: TurnState,
    pub stack: &'a StackState,
    pub stacking_enabled: bool,
    /// Hands in seat order; only consulted to see whether a chain can continue.
    pub hands: &'a [&'a [Card]],
}

pub fn resolve_play(card: &Card, context: &RuleContext<'_>) -> PlayEffects {
    let turn = context.turn;
    let mut effects = PlayEffects {
        next_player_index: turn.next_index(),
        direction: turn.direction,
        reversed: false,
        skipped: None,
        penalty: None,
        stack: StackState::default(),
        awaiting_color: false,
    };

    if card.is_wild() && card.color == Color::Wild {
        effects.next_player_index = turn.current_player_index;
        effects.stack = context.stack.clone();
        effects.awaiting_color = true;
        return effects;
    }

    match card.value {
        Value::Number(_) | Value::Wild => {}
        Value::Skip => {
            effects.skipped = Some(turn.next_index());
            effects.next_player_index = turn.skip_index();
        }
        Value::Reverse => {
            let (direction, next) = turn.reversed();
            effects.direction = direction;
            effects.reversed = true;
            effects.next_player_index = next;
        }
        Value::Draw2 | Value::Wild4 => {
            let victim = turn.next_index();
            if context.stacking_enabled {
                let mut stack = context.stack.clone();
                stack.stacked_cards.push(*card);
                let victim_hand = context.hands.get(victim).copied().unwrap_or(&[]);
                if holds_extension(victim_hand, &stack) {
                    stack.can_stack = true;
                    effects.stack = stack;
                    effects.next_player_index = victim;
                } else {
                    effects.penalty = Some(Penalty {
                        target: victim,
                        count: stack.total(),
                    });
                    effects.skipped = Some(victim);
                    effects.next_player_index = turn.skip_index();
                }
            } else {
                effects.penalty = Some(Penalty {
                    target: victim,
                    count: card.value.draw_amount().unwrap_or(0),
                });
                effects.skipped = Some(victim);
                effects.next_player_index = turn.skip_index();
            }
        }
    }

    effects
}

/// Points left in a hand, credited to the round winner.
pub fn calculate_points(hand: &[Card], scoring: &ScoringConfig) -> u32 {
    hand.iter().map(|card| scoring.card_points(card.value)).sum()
}

/// Round and game verdict once a hand has emptied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub winner: String,
    pub points: u32,
    pub total_score: u32,
    pub game_over: bool,
}

/// Sums every losing hand for `winner` and checks the game target against the
/// winner's score after crediting.
pub fn score_round<'a>(
    winner: &str,
    hands: impl IntoIterator<Item = (&'a String, &'a Vec<Card>)>,
    previous_score: u32,
    points_to_win: u32,
    scoring: &ScoringConfig,
) -> RoundResult {
    let points = hands
        .into_iter()
        .filter(|(name, _)| name.as_str() != winner)
        .map(|(_, hand)| calculate_points(hand, scoring))
        .sum::<u32>();
    let total_score = previous_score + points;
    RoundResult {
        winner: winner.to_string(),
        points,
        total_score,
        game_over: total_score >= points_to_win,
    }
}
