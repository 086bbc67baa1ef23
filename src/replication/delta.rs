// Turns the outcome of a local action into the messages peers need to mirror
// it. Every message carries post-state, never the intent.

use crate::actions::{
    DrawCardsPayload, DrawReason, GameAction, PlayCardPayload, RoundWinPayload, SpecialCardPayload,
    SpecialEffect, StackingPayload, TableDelta, TurnChangePayload, TurnFlags, UnoCallPayload,
    WildColorPayload,
};
use crate::card::Card;
use crate::game::{DrawOutcome, Match, PlayOutcome};
use crate::ordered_hashmap::OrderedHashMap;
use crate::players::TurnStep;
use crate::rules::PlayEffects;

fn seat_name(game: &Match, seat: usize) -> String {
    game.players
        .get(seat)
        .map(|p| p.name.clone())
        .unwrap_or_default()
}

pub fn turn_flags(game: &Match) -> TurnFlags {
    TurnFlags {
        must_play_drawn_card: game.must_play_drawn_card,
        drawn_card: game.drawn_card,
        can_draw_more: game.can_draw_more,
        draws_this_turn: game.draws_this_turn,
        awaiting_color: game.awaiting_color,
    }
}

/// Captures the current values of the fields an action touched.
pub fn capture(game: &Match, touched: &[String], with_deck: bool) -> TableDelta {
    let mut player_hands = OrderedHashMap::new();
    let mut said_uno = OrderedHashMap::new();
    for player in &game.players {
        if !touched.contains(&player.name) {
            continue;
        }
        if let Some(hand) = game.hands.get(&player.name) {
            player_hands.insert(player.name.clone(), hand.clone());
        }
        if let Some(flag) = game.said_uno.get(&player.name) {
            said_uno.insert(player.name.clone(), *flag);
        }
    }

    TableDelta {
        player_hands,
        discard_pile: Some(game.discard_pile.clone()),
        deck: with_deck.then(|| game.deck.clone()),
        said_uno,
        current_player_index: game.turn.current_player_index,
        direction: game.turn.direction,
        stack: game.stack.clone(),
        flags: turn_flags(game),
    }
}

fn all_names(game: &Match) -> Vec<String> {
    game.players.iter().map(|p| p.name.clone()).collect()
}

fn effect_actions(game: &Match, card: Card, effects: &PlayEffects) -> Vec<GameAction> {
    let mut actions = Vec::new();
    if let Some(skipped) = effects.skipped.filter(|_| effects.penalty.is_none()) {
        actions.push(GameAction::SpecialCard(SpecialCardPayload {
            card,
            effect: SpecialEffect::Skip {
                skipped: seat_name(game, skipped),
            },
        }));
    }
    if effects.reversed {
        actions.push(GameAction::SpecialCard(SpecialCardPayload {
            card,
            effect: SpecialEffect::Reverse {
                direction: effects.direction,
            },
        }));
    }
    if let Some(penalty) = effects.penalty {
        actions.push(GameAction::SpecialCard(SpecialCardPayload {
            card,
            effect: SpecialEffect::DrawPenalty {
                target: seat_name(game, penalty.target),
                count: penalty.count,
            },
        }));
    }
    if effects.stack.is_active() {
        actions.push(GameAction::Stacking(StackingPayload {
            stack: effects.stack.clone(),
            total: effects.stack.total(),
            current_player_index: effects.next_player_index,
        }));
    }
    actions
}

fn round_win_action(game: &Match, outcome: &PlayOutcome) -> Option<GameAction> {
    outcome.round_result.as_ref().map(|result| {
        GameAction::RoundWin(RoundWinPayload {
            result: result.clone(),
            scores: game.scores.clone(),
            status: game.status.clone(),
        })
    })
}

pub fn play_actions(game: &Match, outcome: &PlayOutcome) -> Vec<GameAction> {
    let penalised = !outcome.penalty_cards.is_empty();
    let touched = if penalised {
        all_names(game)
    } else {
        vec![seat_name(game, outcome.seat)]
    };

    let mut actions = vec![GameAction::PlayCard(PlayCardPayload {
        card: outcome.card,
        jumped_in: outcome.jumped_in,
        delta: capture(game, &touched, penalised),
    })];
    if let Some(effects) = &outcome.effects {
        actions.extend(effect_actions(game, outcome.card, effects));
    }
    actions.extend(round_win_action(game, outcome));
    actions
}

pub fn color_actions(game: &Match, outcome: &PlayOutcome) -> Vec<GameAction> {
    let penalised = !outcome.penalty_cards.is_empty();
    let touched = if penalised { all_names(game) } else { Vec::new() };

    let mut actions = vec![GameAction::WildColorSelect(WildColorPayload {
        color: outcome.card.color,
        delta: capture(game, &touched, penalised),
    })];
    if let Some(effects) = &outcome.effects {
        actions.extend(effect_actions(game, outcome.card, effects));
    }
    actions
}

pub fn draw_actions(game: &Match, outcome: &DrawOutcome, reason: DrawReason) -> Vec<GameAction> {
    let player_name = seat_name(game, outcome.seat);
    let mut actions = vec![GameAction::DrawCards(DrawCardsPayload {
        player_name: player_name.clone(),
        count: outcome.cards.len(),
        reason,
        delta: capture(game, &[player_name], true),
    })];
    if outcome.turn_passed {
        actions.push(turn_change_action(game));
    }
    actions
}

pub fn uno_penalty_actions(game: &Match, player_name: &str, cards: &[Card]) -> Vec<GameAction> {
    let name = player_name.to_string();
    vec![GameAction::DrawCards(DrawCardsPayload {
        player_name: name.clone(),
        count: cards.len(),
        reason: DrawReason::UnoPenalty,
        delta: capture(game, &[name], true),
    })]
}

pub fn pass_actions(game: &Match) -> Vec<GameAction> {
    vec![
        GameAction::PassTurn(capture(game, &[], false)),
        turn_change_action(game),
    ]
}

pub fn turn_change_action(game: &Match) -> GameAction {
    GameAction::TurnChange(TurnChangePayload {
        current_player_index: game.turn.current_player_index,
        direction: game.turn.direction,
    })
}

pub fn uno_call_action(player_name: &str, said_uno: bool) -> GameAction {
    GameAction::UnoCall(UnoCallPayload {
        player_name: player_name.to_string(),
        said_uno,
    })
}

pub fn snapshot_action(game: &Match) -> GameAction {
    GameAction::GameStateSync(Box::new(game.snapshot()))
}

pub fn new_round_action(game: &Match) -> GameAction {
    GameAction::NewRoundStarted(Box::new(game.snapshot()))
}

/// Messages for one step of a computer turn.
pub fn step_actions(game: &Match, step: &TurnStep) -> Vec<GameAction> {
    match step {
        TurnStep::Played(outcome) => play_actions(game, outcome),
        TurnStep::Drew(outcome) => {
            let reason = if outcome.broke_chain {
                DrawReason::ChainBroken
            } else {
                DrawReason::Turn
            };
            draw_actions(game, outcome, reason)
        }
        TurnStep::Passed { .. } => pass_actions(game),
        TurnStep::CalledUno { seat } => vec![uno_call_action(&seat_name(game, *seat), true)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Color, Value};
    use crate::config::{RoomSettings, ScoringConfig};
    use crate::game::MatchPlayer;

    fn game() -> Match {
        let players = vec![
            MatchPlayer::human("a", "Alice"),
            MatchPlayer::human("b", "Bob"),
            MatchPlayer::human("c", "Cara"),
        ];
        let mut game =
            Match::start_seeded(players, RoomSettings::default(), ScoringConfig::default(), 21)
                .unwrap();
        game.discard_pile = vec![Card::number(Color::Red, 5)];
        game
    }

    #[test]
    fn test_plain_play_carries_hand_and_pile() {
        let mut game = game();
        game.hands.insert(
            "Alice".to_string(),
            vec![Card::number(Color::Red, 2), Card::number(Color::Blue, 2)],
        );
        let outcome = game.play_card(0, 0, None).unwrap();
        let actions = play_actions(&game, &outcome);
        assert_eq!(actions.len(), 1);

        let GameAction::PlayCard(payload) = &actions[0] else {
            panic!("expected PLAY_CARD, got {:?}", actions[0]);
        };
        assert_eq!(payload.card, Card::number(Color::Red, 2));
        assert_eq!(payload.delta.player_hands.len(), 1);
        assert_eq!(
            payload.delta.player_hands.get(&"Alice".to_string()),
            Some(&vec![Card::number(Color::Blue, 2)])
        );
        assert_eq!(payload.delta.discard_pile.as_ref().map(Vec::len), Some(2));
        assert!(payload.delta.deck.is_none());
        assert_eq!(payload.delta.current_player_index, 1);
    }

    #[test]
    fn test_skip_emits_special_card() {
        let mut game = game();
        game.hands.insert(
            "Alice".to_string(),
            vec![Card::new(Color::Red, Value::Skip), Card::number(Color::Blue, 2)],
        );
        let outcome = game.play_card(0, 0, None).unwrap();
        let actions = play_actions(&game, &outcome);
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[1],
            GameAction::SpecialCard(SpecialCardPayload {
                card: Card::new(Color::Red, Value::Skip),
                effect: SpecialEffect::Skip {
                    skipped: "Bob".to_string()
                },
            })
        );
    }

    #[test]
    fn test_penalty_play_ships_deck_and_all_hands() {
        let mut game = game();
        game.settings.stacking_enabled = false;
        game.hands.insert(
            "Alice".to_string(),
            vec![Card::new(Color::Red, Value::Draw2), Card::number(Color::Blue, 2)],
        );
        let outcome = game.play_card(0, 0, None).unwrap();
        let actions = play_actions(&game, &outcome);
        let GameAction::PlayCard(payload) = &actions[0] else {
            panic!("expected PLAY_CARD");
        };
        assert_eq!(payload.delta.player_hands.len(), 3);
        assert_eq!(payload.delta.deck.as_ref(), Some(&game.deck));
        assert!(actions.iter().any(|a| matches!(
            a,
            GameAction::SpecialCard(SpecialCardPayload {
                effect: SpecialEffect::DrawPenalty { count: 2, .. },
                ..
            })
        )));
    }

    #[test]
    fn test_pass_emits_turn_change() {
        let mut game = game();
        game.deck.push(Card::number(Color::Green, 1));
        game.hands.insert("Alice".to_string(), vec![Card::number(Color::Blue, 2)]);
        let drawn = game.draw_card(0).unwrap();
        let actions = draw_actions(&game, &drawn, DrawReason::Turn);
        assert_eq!(actions.len(), 1);

        game.pass_turn(0).unwrap();
        let actions = pass_actions(&game);
        assert_eq!(actions[1].kind(), "TURN_CHANGE");
        let GameAction::TurnChange(change) = &actions[1] else {
            panic!("expected TURN_CHANGE");
        };
        assert_eq!(change.current_player_index, 1);
    }
}
