// Applies messages from other participants to the local match.

use std::fmt;

use log::{debug, warn};

use crate::actions::{ActionMessage, GameAction, TableDelta};
use crate::card::{is_valid_card, is_valid_discard, repair_card, Card};
use crate::config::{MAX_PLAYERS, MIN_PLAYERS};
use crate::game::{Match, MatchSnapshot};
use crate::ordered_hashmap::OrderedHashMap;

/// User-facing status produced while handling traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    CardReplaced { original: Card, replacement: Card },
    MessageDropped { kind: &'static str, reason: String },
    Disconnected,
    Reconnected,
    SyncTimedOut,
    UnoPenalty { player_name: String, cards: usize },
    HostChanged { host: String },
    StateRepaired { details: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::CardReplaced {
                original,
                replacement,
            } => write!(f, "Received an invalid card ({:?}), replaced with {}", original, replacement),
            Notice::MessageDropped { kind, reason } => write!(f, "Could not send {kind}: {reason}"),
            Notice::Disconnected => write!(f, "Connection lost"),
            Notice::Reconnected => write!(f, "Reconnected"),
            Notice::SyncTimedOut => write!(f, "Sync timed out, continuing with local state"),
            Notice::UnoPenalty { player_name, cards } => {
                write!(f, "{player_name} forgot to call UNO and draws {cards}")
            }
            Notice::HostChanged { host } => write!(f, "{host} is now the host"),
            Notice::StateRepaired { details } => write!(f, "Received game state was repaired: {details}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ignored {
    OwnMessage,
    WrongRoom,
    NoMatch,
    Stale { local: u64, received: u64 },
    Malformed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Updated { notices: Vec<Notice> },
    /// The local match was replaced by a full snapshot.
    Replaced { notices: Vec<Notice> },
    SyncRequested { requester: String },
    Ignored(Ignored),
}

/// Checks cards arriving from the network; broken ones are swapped for a
/// valid stand-in and reported.
#[derive(Default)]
struct Sanitizer {
    notices: Vec<Notice>,
}

impl Sanitizer {
    fn held(&mut self, cards: &mut [Card]) {
        for card in cards.iter_mut() {
            if !is_valid_card(card) {
                self.replace(card);
            }
        }
    }

    fn played(&mut self, cards: &mut [Card]) {
        for card in cards.iter_mut() {
            if !is_valid_discard(card) {
                self.replace(card);
            }
        }
    }

    fn replace(&mut self, card: &mut Card) {
        let replacement = repair_card(*card);
        warn!("Replacing invalid card {:?} with {}", card, replacement);
        self.notices.push(Notice::CardReplaced {
            original: *card,
            replacement,
        });
        *card = replacement;
    }

    fn delta(&mut self, delta: &mut TableDelta) {
        // Hands are keyed by name; values are fixed up in place.
        let names: Vec<String> = delta.player_hands.keys().cloned().collect();
        for name in names {
            if let Some(hand) = delta.player_hands.get_mut(&name) {
                self.held(hand);
            }
        }
        if let Some(deck) = delta.deck.as_mut() {
            self.held(deck);
        }
        if let Some(pile) = delta.discard_pile.as_mut() {
            self.played(pile);
        }
        self.played(&mut delta.stack.stacked_cards);
        if let Some(card) = delta.flags.drawn_card.as_mut() {
            self.held(std::slice::from_mut(card));
        }
    }

    fn repaired(&mut self, details: String) {
        warn!("Repairing received snapshot: {}", details);
        self.notices.push(Notice::StateRepaired { details });
    }

    /// Fixes up a full snapshot so that every seat has a hand, an UNO flag
    /// and a score, and the turn points at a seat. A seat count outside the
    /// playable range cannot be repaired.
    fn snapshot(&mut self, snapshot: &mut MatchSnapshot) -> Result<(), String> {
        let player_count = snapshot.players.len();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
            return Err(format!("{player_count} players"));
        }

        let names: Vec<String> = snapshot.player_hands.keys().cloned().collect();
        for name in names {
            if let Some(hand) = snapshot.player_hands.get_mut(&name) {
                self.held(hand);
            }
        }
        self.held(&mut snapshot.deck);
        self.played(&mut snapshot.discard_pile);
        self.played(&mut snapshot.stack.stacked_cards);
        if let Some(card) = snapshot.drawn_card.as_mut() {
            self.held(std::slice::from_mut(card));
        }

        if snapshot.current_player_index >= player_count {
            self.repaired(format!(
                "turn index {} out of range for {} players, reset to 0",
                snapshot.current_player_index, player_count
            ));
            snapshot.current_player_index = 0;
        }

        // Rebuild the per-player tables in seat order.
        let mut hands = OrderedHashMap::new();
        let mut said_uno = OrderedHashMap::new();
        let mut scores = OrderedHashMap::new();
        for player in &snapshot.players {
            let name = player.name.clone();
            let hand = snapshot.player_hands.remove(&name).unwrap_or_else(|| {
                self.repaired(format!("no hand for {name}"));
                Vec::new()
            });
            hands.insert(name.clone(), hand);
            said_uno.insert(
                name.clone(),
                snapshot.said_uno.get(&name).copied().unwrap_or(false),
            );
            scores.insert(name.clone(), snapshot.scores.get(&name).copied().unwrap_or(0));
        }
        let strays: Vec<String> = snapshot.player_hands.keys().cloned().collect();
        if !strays.is_empty() {
            self.repaired(format!("dropped hands of unknown players {}", strays.join(", ")));
        }
        snapshot.player_hands = hands;
        snapshot.said_uno = said_uno;
        snapshot.scores = scores;
        Ok(())
    }
}

fn apply_delta(game: &mut Match, delta: TableDelta) {
    let player_count = game.players.len();
    for (name, hand) in delta.player_hands.iter() {
        if game.hands.contains_key(name) {
            game.hands.insert(name.clone(), hand.clone());
        } else {
            warn!("Delta references unknown player {}", name);
        }
    }
    for (name, flag) in delta.said_uno.iter() {
        if game.said_uno.contains_key(name) {
            game.said_uno.insert(name.clone(), *flag);
        }
    }
    if let Some(pile) = delta.discard_pile {
        game.discard_pile = pile;
    }
    if let Some(deck) = delta.deck {
        game.deck = deck;
    }
    if delta.current_player_index < player_count {
        game.turn.current_player_index = delta.current_player_index;
    } else {
        warn!(
            "Turn index {} out of range for {} players",
            delta.current_player_index, player_count
        );
    }
    game.turn.direction = delta.direction;
    game.stack = delta.stack;
    game.must_play_drawn_card = delta.flags.must_play_drawn_card;
    game.drawn_card = delta.flags.drawn_card;
    game.can_draw_more = delta.flags.can_draw_more;
    game.draws_this_turn = delta.flags.draws_this_turn;
    game.awaiting_color = delta.flags.awaiting_color;
}

/// Applies `message` from another participant. Deltas overwrite the fields
/// they carry; snapshots replace the whole match. Deltas whose version is not
/// newer than the local one are dropped.
pub fn apply_remote(
    game: &mut Option<Match>,
    message: ActionMessage,
    room_id: &str,
    local_player_id: &str,
) -> Applied {
    if message.room_id != room_id {
        debug!("Ignoring {} for room {}", message.action.kind(), message.room_id);
        return Applied::Ignored(Ignored::WrongRoom);
    }
    if message.player_id == local_player_id {
        return Applied::Ignored(Ignored::OwnMessage);
    }

    let mut sanitizer = Sanitizer::default();
    let version = message.version;

    match message.action {
        GameAction::RequestSync => {
            return Applied::SyncRequested {
                requester: message.player_id,
            }
        }
        GameAction::GameStateSync(mut snapshot) | GameAction::NewRoundStarted(mut snapshot) => {
            if let Err(reason) = sanitizer.snapshot(&mut snapshot) {
                warn!("Rejecting snapshot from {}: {}", message.player_name, reason);
                return Applied::Ignored(Ignored::Malformed { reason });
            }
            snapshot.version = version.max(snapshot.version);
            match game {
                Some(existing) => existing.restore(*snapshot),
                None => *game = Some(Match::from_snapshot(*snapshot)),
            }
            return Applied::Replaced {
                notices: sanitizer.notices,
            };
        }
        _ => {}
    }

    let Some(local) = game.as_mut() else {
        debug!("No match to apply {} to", message.action.kind());
        return Applied::Ignored(Ignored::NoMatch);
    };
    if version <= local.version {
        debug!(
            "Dropping stale {} (v{} <= local v{})",
            message.action.kind(),
            version,
            local.version
        );
        return Applied::Ignored(Ignored::Stale {
            local: local.version,
            received: version,
        });
    }

    match message.action {
        GameAction::PlayCard(mut payload) => {
            sanitizer.delta(&mut payload.delta);
            apply_delta(local, payload.delta);
        }
        GameAction::DrawCards(mut payload) => {
            sanitizer.delta(&mut payload.delta);
            apply_delta(local, payload.delta);
        }
        GameAction::PassTurn(mut delta) => {
            sanitizer.delta(&mut delta);
            apply_delta(local, delta);
        }
        GameAction::WildColorSelect(mut payload) => {
            sanitizer.delta(&mut payload.delta);
            apply_delta(local, payload.delta);
        }
        GameAction::UnoCall(payload) => {
            if local.said_uno.contains_key(&payload.player_name) {
                local.said_uno.insert(payload.player_name, payload.said_uno);
            }
        }
        GameAction::SpecialCard(payload) => {
            debug!("{} played {} ({:?})", message.player_name, payload.card, payload.effect);
        }
        GameAction::Stacking(mut payload) => {
            sanitizer.played(&mut payload.stack.stacked_cards);
            local.stack = payload.stack;
            if payload.current_player_index < local.players.len() {
                local.turn.current_player_index = payload.current_player_index;
            }
        }
        GameAction::TurnChange(payload) => {
            if payload.current_player_index < local.players.len() {
                local.turn.current_player_index = payload.current_player_index;
            }
            local.turn.direction = payload.direction;
        }
        GameAction::RoundWin(payload) => {
            local.scores = payload.scores;
            local.status = payload.status;
        }
        GameAction::RequestSync
        | GameAction::GameStateSync(_)
        | GameAction::NewRoundStarted(_) => {}
    }

    local.version = version;
    Applied::Updated {
        notices: sanitizer.notices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{PlayCardPayload, UnoCallPayload};
    use crate::card::{Color, Value};
    use crate::config::{RoomSettings, ScoringConfig};
    use crate::game::MatchPlayer;
    use crate::replication::delta::{play_actions, snapshot_action};

    const ROOM: &str = "room";

    fn pair() -> (Match, Option<Match>) {
        let players = vec![MatchPlayer::human("a", "Alice"), MatchPlayer::human("b", "Bob")];
        let host =
            Match::start_seeded(players, RoomSettings::default(), ScoringConfig::default(), 4)
                .unwrap();
        let peer = Some(Match::from_snapshot(host.snapshot()));
        (host, peer)
    }

    fn from_alice(action: GameAction, version: u64) -> ActionMessage {
        ActionMessage::new(ROOM, action, "a", "Alice", version)
    }

    #[test]
    fn test_play_delta_mirrors_sender() {
        let (mut alice, mut bob) = pair();
        alice.discard_pile = vec![Card::number(Color::Red, 5)];
        alice.hands.insert(
            "Alice".to_string(),
            vec![Card::number(Color::Red, 1), Card::number(Color::Blue, 1)],
        );
        let sync = from_alice(snapshot_action(&alice), alice.version);
        apply_remote(&mut bob, sync, ROOM, "b");

        let outcome = alice.play_card(0, 0, None).unwrap();
        let actions = play_actions(&alice, &outcome);
        let applied = apply_remote(&mut bob, from_alice(actions[0].clone(), alice.version), ROOM, "b");
        assert_eq!(applied, Applied::Updated { notices: vec![] });

        let bob = bob.unwrap();
        assert_eq!(bob.hand(0), &[Card::number(Color::Blue, 1)]);
        assert_eq!(bob.discard_pile, alice.discard_pile);
        assert_eq!(bob.turn.current_player_index, 1);
        assert_eq!(bob.version, alice.version);
    }

    #[test]
    fn test_own_messages_are_ignored() {
        let (alice, mut bob) = pair();
        let message = ActionMessage::new(ROOM, snapshot_action(&alice), "b", "Bob", 1);
        assert_eq!(
            apply_remote(&mut bob, message, ROOM, "b"),
            Applied::Ignored(Ignored::OwnMessage)
        );
    }

    #[test]
    fn test_other_room_is_ignored() {
        let (alice, mut bob) = pair();
        let message = ActionMessage::new("elsewhere", snapshot_action(&alice), "a", "Alice", 1);
        assert_eq!(
            apply_remote(&mut bob, message, ROOM, "b"),
            Applied::Ignored(Ignored::WrongRoom)
        );
    }

    #[test]
    fn test_stale_delta_dropped() {
        let (_, mut bob) = pair();
        if let Some(game) = bob.as_mut() {
            game.version = 5;
        }
        let action = GameAction::UnoCall(UnoCallPayload {
            player_name: "Alice".to_string(),
            said_uno: true,
        });
        assert_eq!(
            apply_remote(&mut bob, from_alice(action, 5), ROOM, "b"),
            Applied::Ignored(Ignored::Stale {
                local: 5,
                received: 5
            })
        );
    }

    #[test]
    fn test_delta_without_match_is_ignored() {
        let mut nothing: Option<Match> = None;
        let action = GameAction::UnoCall(UnoCallPayload {
            player_name: "Alice".to_string(),
            said_uno: true,
        });
        assert_eq!(
            apply_remote(&mut nothing, from_alice(action, 1), ROOM, "b"),
            Applied::Ignored(Ignored::NoMatch)
        );
    }

    #[test]
    fn test_snapshot_applies_even_when_older() {
        let (alice, mut bob) = pair();
        if let Some(game) = bob.as_mut() {
            game.version = 40;
            game.deck.clear();
        }
        let applied = apply_remote(&mut bob, from_alice(snapshot_action(&alice), 0), ROOM, "b");
        assert!(matches!(applied, Applied::Replaced { .. }));
        assert_eq!(bob.unwrap().snapshot(), alice.snapshot());
    }

    #[test]
    fn test_invalid_cards_are_replaced_with_notice() {
        let (alice, mut bob) = pair();
        let mut delta = crate::replication::delta::capture(&alice, &["Alice".to_string()], false);
        delta
            .player_hands
            .insert("Alice".to_string(), vec![Card::new(Color::Wild, Value::Number(3))]);
        let action = GameAction::PlayCard(PlayCardPayload {
            card: Card::number(Color::Red, 3),
            jumped_in: false,
            delta,
        });
        let applied = apply_remote(&mut bob, from_alice(action, alice.version + 1), ROOM, "b");
        let Applied::Updated { notices } = applied else {
            panic!("expected update, got {:?}", applied);
        };
        assert_eq!(
            notices,
            vec![Notice::CardReplaced {
                original: Card::new(Color::Wild, Value::Number(3)),
                replacement: Card::number(Color::Red, 3),
            }]
        );
        assert_eq!(bob.unwrap().hand(0), &[Card::number(Color::Red, 3)]);
    }

    #[test]
    fn test_snapshot_turn_index_out_of_range_is_reset() {
        let (alice, mut bob) = pair();
        let mut snapshot = alice.snapshot();
        snapshot.current_player_index = 99;
        let action = GameAction::GameStateSync(Box::new(snapshot));

        let applied = apply_remote(&mut bob, from_alice(action, alice.version), ROOM, "b");
        let Applied::Replaced { notices } = applied else {
            panic!("expected replacement, got {:?}", applied);
        };
        assert_eq!(notices.len(), 1);
        assert!(matches!(notices[0], Notice::StateRepaired { .. }));

        let mut bob = bob.unwrap();
        assert_eq!(bob.turn.current_player_index, 0);
        // The repaired match is playable: the turn moves on normally.
        bob.discard_pile = vec![Card::number(Color::Red, 5)];
        bob.hands.insert(
            "Alice".to_string(),
            vec![Card::number(Color::Red, 1), Card::number(Color::Blue, 1)],
        );
        bob.play_card(0, 0, None).unwrap();
        assert_eq!(bob.turn.current_player_index, 1);
    }

    #[test]
    fn test_snapshot_invalid_cards_are_replaced() {
        let (alice, mut bob) = pair();
        let mut snapshot = alice.snapshot();
        snapshot
            .player_hands
            .insert("Bob".to_string(), vec![Card::new(Color::Wild, Value::Number(3))]);
        snapshot.deck.push(Card::new(Color::Blue, Value::Wild4));
        let action = GameAction::NewRoundStarted(Box::new(snapshot));

        let applied = apply_remote(&mut bob, from_alice(action, alice.version), ROOM, "b");
        let Applied::Replaced { notices } = applied else {
            panic!("expected replacement, got {:?}", applied);
        };
        assert_eq!(notices.len(), 2);
        assert!(notices
            .iter()
            .all(|notice| matches!(notice, Notice::CardReplaced { .. })));

        let bob = bob.unwrap();
        assert!(bob.hand(1).iter().all(is_valid_card));
        assert!(bob.deck.iter().all(is_valid_card));
    }

    #[test]
    fn test_snapshot_player_tables_follow_seats() {
        let (alice, mut bob) = pair();
        let mut snapshot = alice.snapshot();
        snapshot.player_hands.remove(&"Bob".to_string());
        snapshot.player_hands.insert("Mallory".to_string(), vec![Card::number(Color::Red, 1)]);
        snapshot.said_uno.remove(&"Alice".to_string());
        let action = GameAction::GameStateSync(Box::new(snapshot));

        let applied = apply_remote(&mut bob, from_alice(action, alice.version), ROOM, "b");
        let Applied::Replaced { notices } = applied else {
            panic!("expected replacement, got {:?}", applied);
        };
        assert_eq!(notices.len(), 2);

        let bob = bob.unwrap();
        let names: Vec<&str> = bob.hands.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert!(bob.hand(1).is_empty());
        assert_eq!(bob.said_uno.get(&"Alice".to_string()), Some(&false));
        assert_eq!(bob.hand(0), alice.hand(0));
    }

    #[test]
    fn test_snapshot_without_enough_players_is_rejected() {
        let (alice, mut bob) = pair();
        let before = bob.as_ref().map(Match::snapshot);
        let mut snapshot = alice.snapshot();
        snapshot.players.truncate(1);
        let action = GameAction::GameStateSync(Box::new(snapshot));

        let applied = apply_remote(&mut bob, from_alice(action, alice.version), ROOM, "b");
        assert!(matches!(applied, Applied::Ignored(Ignored::Malformed { .. })));
        assert_eq!(bob.as_ref().map(Match::snapshot), before);
    }

    #[test]
    fn test_request_sync_is_reported() {
        let (_, mut bob) = pair();
        let message = ActionMessage::new(ROOM, GameAction::RequestSync, "c", "Cara", 0);
        assert_eq!(
            apply_remote(&mut bob, message, ROOM, "b"),
            Applied::SyncRequested {
                requester: "c".to_string()
            }
        );
    }
}
