use std::sync::Arc;

use uno_sync::card::{Value, HAND_SIZE};
use uno_sync::config::{RoomSettings, ScoringConfig, Timing};
use uno_sync::game::{Match, MatchPlayer};
use uno_sync::replication::{apply_remote, delta, Applied, ConnectionState, Participant};
use uno_sync::session::RoomRegistry;
use uno_sync::{ActionMessage, Color};

/// Alice hosts a two-seat room, Bob joins by code, Alice deals.
async fn started_pair(seed: u64) -> (Participant, Participant) {
    let relay = Arc::new(RoomRegistry::default());
    let mut alice = Participant::new("a", "Alice", relay.clone(), Timing::default()).with_seed(seed);
    let mut bob = Participant::new("b", "Bob", relay.clone(), Timing::default());
    alice.connect().await.unwrap();
    bob.connect().await.unwrap();

    let room = alice
        .create_room("Friday night", 2, RoomSettings::default())
        .await
        .unwrap();
    bob.join_room(&room.code).await.unwrap();
    alice.pump().await;
    alice.start_game().await.unwrap();
    bob.pump().await;
    (alice, bob)
}

/// Index of a number card in `seat`'s hand matching the top card's color.
fn color_match(game: &Match, seat: usize) -> Option<usize> {
    let top = game.top_card()?;
    game.hand(seat)
        .iter()
        .position(|card| card.color == top.color && matches!(card.value, Value::Number(_)))
}

async fn pair_with_color_match() -> (Participant, Participant, usize) {
    for seed in 0..200 {
        let (alice, bob) = started_pair(seed).await;
        if let Some(index) = alice.game().and_then(|game| color_match(game, 0)) {
            return (alice, bob, index);
        }
    }
    panic!("no seed dealt Alice a matching number card");
}

#[tokio::test]
async fn test_two_players_stay_in_step() {
    let (mut alice, mut bob, index) = pair_with_color_match().await;

    {
        let a = alice.game().unwrap();
        let b = bob.game().unwrap();
        assert_eq!(a.hands.get(&"Alice".to_string()), b.hands.get(&"Alice".to_string()));
        assert_eq!(a.hands.get(&"Bob".to_string()), b.hands.get(&"Bob".to_string()));
        assert_eq!(a.hand(0).len(), HAND_SIZE);
        assert_eq!(b.discard_pile.len(), 1);
        assert!(matches!(b.discard_pile[0].value, Value::Number(_)));
        assert_eq!(b.turn.current_player_index, 0);
    }

    alice.play_card(index, None).await.unwrap();
    bob.pump().await;

    let a = alice.game().unwrap();
    let b = bob.game().unwrap();
    assert_eq!(b.hand(0).len(), HAND_SIZE - 1);
    assert_eq!(b.discard_pile.len(), 2);
    assert_eq!(b.turn.current_player_index, 1);
    assert_eq!(a.discard_pile, b.discard_pile);
    assert_eq!(a.hands.get(&"Alice".to_string()), b.hands.get(&"Alice".to_string()));
    assert_eq!(a.version, b.version);
}

#[tokio::test]
async fn test_reconnect_resyncs_from_host() {
    let (mut alice, mut bob, index) = pair_with_color_match().await;

    bob.disconnect();
    alice.play_card(index, None).await.unwrap();
    assert_eq!(bob.game().unwrap().discard_pile.len(), 1);

    bob.connect().await.unwrap();
    assert_eq!(bob.state(), ConnectionState::Resyncing);
    assert!(bob.sync_in_progress());

    alice.pump().await;
    bob.pump().await;

    assert_eq!(bob.state(), ConnectionState::Connected);
    assert!(!bob.sync_in_progress());
    assert_eq!(
        bob.game().map(Match::snapshot),
        alice.game().map(Match::snapshot)
    );
}

#[tokio::test(start_paused = true)]
async fn test_sync_timeout_keeps_local_state() {
    let (mut alice, mut bob) = started_pair(9).await;
    alice.disconnect();
    let before = bob.game().map(Match::snapshot);

    bob.disconnect();
    bob.connect().await.unwrap();
    assert_eq!(bob.state(), ConnectionState::Resyncing);

    // Nobody answers; the timeout fires after five seconds.
    bob.step().await;
    assert!(!bob.sync_in_progress());
    assert_eq!(bob.state(), ConnectionState::Connected);
    assert_eq!(bob.game().map(Match::snapshot), before);
}

#[tokio::test]
async fn test_snapshot_applied_twice_is_idempotent() {
    let players = vec![MatchPlayer::human("a", "Alice"), MatchPlayer::human("b", "Bob")];
    let host = Match::start_seeded(players, RoomSettings::default(), ScoringConfig::default(), 42)
        .unwrap();
    let message = ActionMessage::new("room", delta::snapshot_action(&host), "a", "Alice", host.version);

    let mut local = None;
    assert!(matches!(
        apply_remote(&mut local, message.clone(), "room", "b"),
        Applied::Replaced { .. }
    ));
    let once = local.as_ref().map(Match::snapshot);
    apply_remote(&mut local, message, "room", "b");
    let twice = local.as_ref().map(Match::snapshot);

    assert_eq!(once, twice);
    assert_eq!(once, Some(host.snapshot()));
}

#[tokio::test]
async fn test_wild_color_chosen_after_play() {
    for seed in 0..200 {
        let (mut alice, mut bob) = started_pair(seed).await;
        let Some(index) = alice
            .game()
            .and_then(|game| game.hand(0).iter().position(|card| card.value == Value::Wild))
        else {
            continue;
        };

        alice.play_card(index, None).await.unwrap();
        bob.pump().await;
        assert!(bob.game().unwrap().awaiting_color);

        alice.select_wild_color(Color::Green).await.unwrap();
        bob.pump().await;
        let game = bob.game().unwrap();
        assert!(!game.awaiting_color);
        assert_eq!(game.top_card().map(|card| card.color), Some(Color::Green));
        assert_eq!(game.turn.current_player_index, 1);
        return;
    }
    panic!("no seed dealt Alice a wild");
}
