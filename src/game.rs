// Match aggregate: deck, discard pile, hands, turn, stacking chain, UNO flags
// and scores for one game. Every local action and every replicated delta ends
// up mutating a `Match`; the rule engine decides, this module applies.

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::card::{
    deal_cards_to_player, generate_deck, shuffle_deck, Card, Color, Value, HAND_SIZE,
};
use crate::config::{RoomSettings, ScoringConfig, MAX_PLAYERS, MIN_PLAYERS};
use crate::errors::{GameError, GameResult, PlayerId};
use crate::ordered_hashmap::OrderedHashMap;
use crate::players::Difficulty;
use crate::rules::{
    can_play, matches_top, resolve_play, score_round, PlayContext, PlayEffects, RoundResult,
    RuleContext, StackState,
};
use crate::turn::{Direction, TurnState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "difficulty")]
pub enum SeatKind {
    Human,
    Computer(Difficulty),
}

/// A seat at the table. Seating order is fixed for the life of the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPlayer {
    pub id: PlayerId,
    pub name: String,
    pub kind: SeatKind,
}

impl MatchPlayer {
    pub fn human(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: SeatKind::Human,
        }
    }

    pub fn computer(id: impl Into<PlayerId>, name: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: SeatKind::Computer(difficulty),
        }
    }

    pub fn is_computer(&self) -> bool {
        matches!(self.kind, SeatKind::Computer(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum MatchStatus {
    InProgress,
    RoundOver { winner: String },
    Finished { winner: String },
}

/// Full replicated state of a match, as carried by a state sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub players: Vec<MatchPlayer>,
    pub deck: Vec<Card>,
    pub player_hands: OrderedHashMap<String, Vec<Card>>,
    pub discard_pile: Vec<Card>,
    pub current_player_index: usize,
    pub direction: Direction,
    pub said_uno: OrderedHashMap<String, bool>,
    pub stack: StackState,
    pub scores: OrderedHashMap<String, u32>,
    pub settings: RoomSettings,
    pub scoring: ScoringConfig,
    pub must_play_drawn_card: bool,
    pub drawn_card: Option<Card>,
    pub can_draw_more: bool,
    pub draws_this_turn: u32,
    pub awaiting_color: bool,
    pub status: MatchStatus,
    pub round: u32,
    pub version: u64,
}

/// Result of a successful play.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayOutcome {
    pub seat: usize,
    /// The card as it now lies on the discard pile.
    pub card: Card,
    /// `None` while a wild waits for its color.
    pub effects: Option<PlayEffects>,
    pub penalty_cards: Vec<Card>,
    pub round_result: Option<RoundResult>,
    pub jumped_in: bool,
}

/// Result of a successful draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawOutcome {
    pub seat: usize,
    pub cards: Vec<Card>,
    pub broke_chain: bool,
    /// The drawn card can be played right away.
    pub playable: bool,
    pub turn_passed: bool,
}

#[derive(Debug, Clone)]
pub struct Match {
    pub players: Vec<MatchPlayer>,
    pub deck: Vec<Card>,
    pub discard_pile: Vec<Card>,
    pub hands: OrderedHashMap<String, Vec<Card>>,
    pub turn: TurnState,
    pub stack: StackState,
    pub said_uno: OrderedHashMap<String, bool>,
    pub scores: OrderedHashMap<String, u32>,
    pub settings: RoomSettings,
    pub scoring: ScoringConfig,
    pub must_play_drawn_card: bool,
    pub drawn_card: Option<Card>,
    pub can_draw_more: bool,
    pub draws_this_turn: u32,
    pub awaiting_color: bool,
    pub status: MatchStatus,
    pub round: u32,
    pub version: u64,
    rng: ChaCha8Rng,
}

impl Match {
    /// Starts a new game: scores at zero, first round dealt.
    pub fn start(
        players: Vec<MatchPlayer>,
        settings: RoomSettings,
        scoring: ScoringConfig,
    ) -> GameResult<Self> {
        Self::start_with_rng(players, settings, scoring, ChaCha8Rng::from_entropy())
    }

    pub fn start_seeded(
        players: Vec<MatchPlayer>,
        settings: RoomSettings,
        scoring: ScoringConfig,
        seed: u64,
    ) -> GameResult<Self> {
        Self::start_with_rng(players, settings, scoring, ChaCha8Rng::seed_from_u64(seed))
    }

    fn start_with_rng(
        players: Vec<MatchPlayer>,
        settings: RoomSettings,
        scoring: ScoringConfig,
        rng: ChaCha8Rng,
    ) -> GameResult<Self> {
        if players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                min_players: MIN_PLAYERS,
                player_count: players.len(),
            });
        }
        if players.len() > MAX_PLAYERS {
            return Err(GameError::TooManyPlayers {
                max_players: MAX_PLAYERS,
                player_count: players.len(),
            });
        }

        let scores = players.iter().map(|p| (p.name.clone(), 0)).collect();
        let mut game = Match {
            turn: TurnState::new(players.len()),
            players,
            deck: Vec::new(),
            discard_pile: Vec::new(),
            hands: OrderedHashMap::new(),
            stack: StackState::default(),
            said_uno: OrderedHashMap::new(),
            scores,
            settings,
            scoring,
            must_play_drawn_card: false,
            drawn_card: None,
            can_draw_more: false,
            draws_this_turn: 0,
            awaiting_color: false,
            status: MatchStatus::InProgress,
            round: 0,
            version: 0,
            rng,
        };
        game.deal_round();
        info!(
            "🃏 Match started with {} players: {:?}",
            game.players.len(),
            game.players.iter().map(|p| &p.name).collect::<Vec<_>>()
        );
        Ok(game)
    }

    /// Rebuilds a match from a replicated snapshot.
    pub fn from_snapshot(snapshot: MatchSnapshot) -> Self {
        let mut game = Match {
            players: Vec::new(),
            deck: Vec::new(),
            discard_pile: Vec::new(),
            hands: OrderedHashMap::new(),
            turn: TurnState::new(0),
            stack: StackState::default(),
            said_uno: OrderedHashMap::new(),
            scores: OrderedHashMap::new(),
            settings: RoomSettings::default(),
            scoring: ScoringConfig::default(),
            must_play_drawn_card: false,
            drawn_card: None,
            can_draw_more: false,
            draws_this_turn: 0,
            awaiting_color: false,
            status: MatchStatus::InProgress,
            round: 0,
            version: 0,
            rng: ChaCha8Rng::from_entropy(),
        };
        game.restore(snapshot);
        game
    }

    /// Starts the next round after a round win. Scores carry over.
    pub fn new_round(&mut self) -> GameResult<()> {
        match self.status {
            MatchStatus::RoundOver { .. } => {
                self.deal_round();
                self.version += 1;
                Ok(())
            }
            MatchStatus::InProgress => Err(GameError::RoundOver),
            MatchStatus::Finished { .. } => Err(GameError::NoActiveGame),
        }
    }

    fn deal_round(&mut self) {
        self.deck = shuffle_deck(generate_deck(), &mut self.rng);
        self.discard_pile.clear();
        self.hands = OrderedHashMap::new();
        self.said_uno = OrderedHashMap::new();
        for player in &self.players {
            let hand = deal_cards_to_player(&mut self.deck, HAND_SIZE);
            self.hands.insert(player.name.clone(), hand);
            self.said_uno.insert(player.name.clone(), false);
        }

        // The first top card must be a plain number; anything else goes under the deck.
        // Each card is looked at once at most.
        for _ in 0..self.deck.len() {
            let Some(card) = self.deck.pop() else { break };
            if matches!(card.value, Value::Number(_)) {
                self.discard_pile.push(card);
                break;
            }
            self.deck.insert(0, card);
        }

        self.turn = TurnState::new(self.players.len());
        self.stack.clear();
        self.reset_turn_flags();
        self.awaiting_color = false;
        self.status = MatchStatus::InProgress;
        self.round += 1;
        debug!(
            "Round {} dealt, top card {:?}, {} cards left in deck",
            self.round,
            self.top_card(),
            self.deck.len()
        );
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            players: self.players.clone(),
            deck: self.deck.clone(),
            player_hands: self.hands.clone(),
            discard_pile: self.discard_pile.clone(),
            current_player_index: self.turn.current_player_index,
            direction: self.turn.direction,
            said_uno: self.said_uno.clone(),
            stack: self.stack.clone(),
            scores: self.scores.clone(),
            settings: self.settings.clone(),
            scoring: self.scoring,
            must_play_drawn_card: self.must_play_drawn_card,
            drawn_card: self.drawn_card,
            can_draw_more: self.can_draw_more,
            draws_this_turn: self.draws_this_turn,
            awaiting_color: self.awaiting_color,
            status: self.status.clone(),
            round: self.round,
            version: self.version,
        }
    }

    /// Overwrites every replicated field with the snapshot's.
    pub fn restore(&mut self, snapshot: MatchSnapshot) {
        self.turn = TurnState {
            current_player_index: snapshot.current_player_index,
            direction: snapshot.direction,
            player_count: snapshot.players.len(),
        };
        self.players = snapshot.players;
        self.deck = snapshot.deck;
        self.hands = snapshot.player_hands;
        self.discard_pile = snapshot.discard_pile;
        self.said_uno = snapshot.said_uno;
        self.stack = snapshot.stack;
        self.scores = snapshot.scores;
        self.settings = snapshot.settings;
        self.scoring = snapshot.scoring;
        self.must_play_drawn_card = snapshot.must_play_drawn_card;
        self.drawn_card = snapshot.drawn_card;
        self.can_draw_more = snapshot.can_draw_more;
        self.draws_this_turn = snapshot.draws_this_turn;
        self.awaiting_color = snapshot.awaiting_color;
        self.status = snapshot.status;
        self.round = snapshot.round;
        self.version = snapshot.version;
    }

    pub fn top_card(&self) -> Option<&Card> {
        self.discard_pile.last()
    }

    pub fn seat_of(&self, name: &str) -> Option<usize> {
        self.players.iter().position(|p| p.name == name)
    }

    pub fn seat_of_id(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn current_player(&self) -> Option<&MatchPlayer> {
        self.players.get(self.turn.current_player_index)
    }

    pub fn hand(&self, seat: usize) -> &[Card] {
        self.players
            .get(seat)
            .and_then(|p| self.hands.get(&p.name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn score_of(&self, name: &str) -> u32 {
        self.scores.get(&name.to_string()).copied().unwrap_or(0)
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == MatchStatus::InProgress
    }

    /// Constraints on the seat about to act.
    pub fn play_context(&self) -> PlayContext<'_> {
        let drawn = if self.must_play_drawn_card {
            self.drawn_card
        } else {
            None
        };
        PlayContext::new(&self.stack, drawn)
    }

    /// Players holding one card who have not called UNO.
    pub fn players_missing_uno(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| self.hands.get(&p.name).is_some_and(|h| h.len() == 1))
            .filter(|p| !self.said_uno.get(&p.name).copied().unwrap_or(false))
            .map(|p| p.name.clone())
            .collect()
    }

    fn player(&self, seat: usize) -> GameResult<&MatchPlayer> {
        self.players
            .get(seat)
            .ok_or_else(|| GameError::unknown_player(format!("seat {seat}")))
    }

    fn ensure_playing(&self) -> GameResult<()> {
        match self.status {
            MatchStatus::InProgress => Ok(()),
            MatchStatus::RoundOver { .. } => Err(GameError::RoundOver),
            MatchStatus::Finished { .. } => Err(GameError::NoActiveGame),
        }
    }

    fn ensure_turn(&self, seat: usize) -> GameResult<()> {
        if self.turn.is_turn_of(seat) {
            return Ok(());
        }
        let current = self
            .current_player()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Err(GameError::not_player_turn(current, self.player(seat)?.name.clone()))
    }

    fn reset_turn_flags(&mut self) {
        self.must_play_drawn_card = false;
        self.drawn_card = None;
        self.can_draw_more = false;
        self.draws_this_turn = 0;
    }

    /// Draws `count` cards from the deck, reshuffling the discard pile (minus
    /// its top card) underneath when the deck runs short.
    fn draw_from_deck(&mut self, count: usize) -> Vec<Card> {
        if self.deck.len() < count && self.discard_pile.len() > 1 {
            let top = self.discard_pile.pop();
            let recycled: Vec<Card> = self.discard_pile.drain(..).map(Card::reset_color).collect();
            let mut refill = shuffle_deck(recycled, &mut self.rng);
            refill.append(&mut self.deck);
            self.deck = refill;
            self.discard_pile.extend(top);
            debug!("♻️ Reshuffled discard pile, deck now {} cards", self.deck.len());
        }
        deal_cards_to_player(&mut self.deck, count)
    }

    fn give_cards(&mut self, seat: usize, count: usize) -> GameResult<Vec<Card>> {
        let name = self.player(seat)?.name.clone();
        let cards = self.draw_from_deck(count);
        if let Some(hand) = self.hands.get_mut(&name) {
            hand.extend(cards.iter().copied());
            if hand.len() > 1 {
                self.said_uno.insert(name, false);
            }
        }
        Ok(cards)
    }

    /// Whether a draw could yield a card, counting a reshuffle of the
    /// discard pile under its top card.
    pub fn cards_available(&self) -> bool {
        !self.deck.is_empty() || self.discard_pile.len() > 1
    }

    /// Plays the card at `card_index` from `seat`'s hand. A wild played
    /// without `chosen_color` leaves the turn waiting for `select_wild_color`.
    pub fn play_card(
        &mut self,
        seat: usize,
        card_index: usize,
        chosen_color: Option<Color>,
    ) -> GameResult<PlayOutcome> {
        self.ensure_playing()?;
        if self.awaiting_color {
            return Err(GameError::ColorChoicePending);
        }
        let name = self.player(seat)?.name.clone();
        let hand = self.hand(seat);
        let card = *hand.get(card_index).ok_or(GameError::CardIndexOutOfRange {
            index: card_index,
            hand_size: hand.len(),
        })?;
        let top = *self.top_card().ok_or(GameError::NoActiveGame)?;

        let jumped_in = !self.turn.is_turn_of(seat);
        if jumped_in {
            let can_jump = self.settings.jump_in_enabled
                && !self.stack.is_active()
                && !card.is_wild()
                && card == top;
            if !can_jump {
                self.ensure_turn(seat)?;
            }
            info!("⚡ {} jumps in with {}", name, card);
            self.turn.current_player_index = seat;
            self.reset_turn_flags();
        } else if !can_play(&card, &top, &self.play_context()) {
            return Err(GameError::IllegalPlay { card });
        }

        if let Some(color) = chosen_color.filter(|_| card.is_wild()) {
            if color == Color::Wild {
                return Err(GameError::InvalidColorChoice {
                    color: color.to_string(),
                });
            }
        }

        let played = match chosen_color {
            Some(color) if card.is_wild() => card.with_color(color),
            _ => card,
        };
        if let Some(hand) = self.hands.get_mut(&name) {
            hand.remove(card_index);
        }
        self.discard_pile.push(played);
        self.reset_turn_flags();
        debug!("{} played {}", name, played);

        let mut outcome = PlayOutcome {
            seat,
            card: played,
            effects: None,
            penalty_cards: Vec::new(),
            round_result: None,
            jumped_in,
        };

        if self.hand(seat).is_empty() {
            outcome.penalty_cards = self.final_card_penalty(&played)?;
            self.stack.clear();
            outcome.round_result = Some(self.finish_round(seat));
            self.version += 1;
            return Ok(outcome);
        }

        let effects = self.effects_of(&played);
        if effects.awaiting_color {
            self.awaiting_color = true;
        } else {
            outcome.penalty_cards = self.apply_effects(&effects)?;
            outcome.effects = Some(effects);
        }
        self.version += 1;
        Ok(outcome)
    }

    /// Supplies the color for a wild waiting on top of the discard pile and
    /// applies its effects.
    pub fn select_wild_color(&mut self, seat: usize, color: Color) -> GameResult<PlayOutcome> {
        self.ensure_playing()?;
        if !self.awaiting_color {
            return Err(GameError::NoColorChoicePending);
        }
        self.ensure_turn(seat)?;
        if color == Color::Wild {
            return Err(GameError::InvalidColorChoice {
                color: color.to_string(),
            });
        }

        let top = self
            .discard_pile
            .last_mut()
            .ok_or(GameError::NoColorChoicePending)?;
        *top = top.with_color(color);
        let played = *top;
        self.awaiting_color = false;

        let effects = self.effects_of(&played);
        let penalty_cards = self.apply_effects(&effects)?;
        self.version += 1;
        Ok(PlayOutcome {
            seat,
            card: played,
            effects: Some(effects),
            penalty_cards,
            round_result: None,
            jumped_in: false,
        })
    }

    fn effects_of(&self, card: &Card) -> PlayEffects {
        let hands: Vec<&[Card]> = (0..self.players.len()).map(|seat| self.hand(seat)).collect();
        resolve_play(
            card,
            &RuleContext {
                turn: self.turn,
                stack: &self.stack,
                stacking_enabled: self.settings.stacking_enabled,
                hands: &hands,
            },
        )
    }

    fn apply_effects(&mut self, effects: &PlayEffects) -> GameResult<Vec<Card>> {
        self.turn.direction = effects.direction;
        self.stack = effects.stack.clone();
        let mut penalty_cards = Vec::new();
        if let Some(penalty) = effects.penalty {
            penalty_cards = self.give_cards(penalty.target, penalty.count as usize)?;
            debug!(
                "Seat {} draws {} penalty cards",
                penalty.target,
                penalty_cards.len()
            );
        }
        self.turn.current_player_index = effects.next_player_index;
        Ok(penalty_cards)
    }

    /// A draw card that empties its player's hand still lands on the next
    /// player, together with whatever chain it closed.
    fn final_card_penalty(&mut self, played: &Card) -> GameResult<Vec<Card>> {
        let Some(amount) = played.value.draw_amount() else {
            return Ok(Vec::new());
        };
        let count = if self.stack.is_active() {
            self.stack.total() + amount
        } else {
            amount
        };
        let victim = self.turn.next_index();
        self.give_cards(victim, count as usize)
    }

    fn finish_round(&mut self, winner_seat: usize) -> RoundResult {
        let winner = self.players[winner_seat].name.clone();
        let result = score_round(
            &winner,
            self.hands.iter(),
            self.score_of(&winner),
            self.settings.points_to_win,
            &self.scoring,
        );
        self.scores.insert(winner.clone(), result.total_score);
        self.status = if result.game_over {
            MatchStatus::Finished {
                winner: winner.clone(),
            }
        } else {
            MatchStatus::RoundOver {
                winner: winner.clone(),
            }
        };
        info!(
            "🏆 {} wins round {} for {} points (total {}){}",
            winner,
            self.round,
            result.points,
            result.total_score,
            if result.game_over { ", game over" } else { "" }
        );
        result
    }

    /// Draws for `seat`. Facing an active chain this breaks it: the whole
    /// total is drawn and the turn passes.
    pub fn draw_card(&mut self, seat: usize) -> GameResult<DrawOutcome> {
        self.ensure_playing()?;
        if self.awaiting_color {
            return Err(GameError::ColorChoicePending);
        }
        self.ensure_turn(seat)?;

        if self.stack.is_active() {
            let total = self.stack.total() as usize;
            let cards = self.give_cards(seat, total)?;
            self.stack.clear();
            self.reset_turn_flags();
            self.turn.advance();
            self.version += 1;
            info!("Seat {} breaks the chain and draws {}", seat, cards.len());
            return Ok(DrawOutcome {
                seat,
                cards,
                broke_chain: true,
                playable: false,
                turn_passed: true,
            });
        }

        if self.draws_this_turn > 0 && !self.can_draw_more {
            return Err(GameError::draw_not_allowed("already drew this turn"));
        }
        if !self.cards_available() {
            return Err(GameError::draw_not_allowed("no cards left to draw"));
        }

        let cards = self.give_cards(seat, 1)?;
        let top = *self.top_card().ok_or(GameError::NoActiveGame)?;
        let drawn = cards.last().copied();
        let playable = drawn.is_some_and(|card| matches_top(&card, &top));

        self.draws_this_turn += 1;
        self.drawn_card = drawn;
        self.must_play_drawn_card = true;
        self.can_draw_more = self.settings.unlimited_draw_enabled && !playable;
        self.version += 1;

        Ok(DrawOutcome {
            seat,
            cards,
            broke_chain: false,
            playable,
            turn_passed: false,
        })
    }

    /// Ends `seat`'s turn after drawing without playing.
    pub fn pass_turn(&mut self, seat: usize) -> GameResult<()> {
        self.ensure_playing()?;
        if self.awaiting_color {
            return Err(GameError::ColorChoicePending);
        }
        self.ensure_turn(seat)?;
        if self.stack.is_active() {
            return Err(GameError::pass_not_allowed("a draw chain must be answered"));
        }
        // With nothing left to draw, passing is the only way out of the turn.
        if self.draws_this_turn == 0 && self.cards_available() {
            return Err(GameError::pass_not_allowed("draw a card first"));
        }
        if self.can_draw_more && self.cards_available() {
            return Err(GameError::pass_not_allowed("keep drawing until a card fits"));
        }
        if self.settings.force_play_enabled {
            let top = self.top_card().copied();
            let drawn_playable = self
                .drawn_card
                .zip(top)
                .is_some_and(|(drawn, top)| matches_top(&drawn, &top));
            if drawn_playable {
                return Err(GameError::pass_not_allowed("the drawn card must be played"));
            }
        }

        self.reset_turn_flags();
        self.turn.advance();
        self.version += 1;
        Ok(())
    }

    pub fn call_uno(&mut self, seat: usize) -> GameResult<()> {
        self.ensure_playing()?;
        let name = self.player(seat)?.name.clone();
        let hand_size = self.hand(seat).len();
        if hand_size != 1 {
            return Err(GameError::UnoNotAllowed {
                player_id: name,
                hand_size,
            });
        }
        self.said_uno.insert(name, true);
        self.version += 1;
        Ok(())
    }

    /// Penalty for missing the UNO call: two cards, flag cleared. Returns
    /// `None` when the player called in time or no longer holds one card.
    pub fn apply_uno_penalty(&mut self, name: &str) -> GameResult<Option<Vec<Card>>> {
        self.ensure_playing()?;
        let seat = self
            .seat_of(name)
            .ok_or_else(|| GameError::unknown_player(name))?;
        let said = self.said_uno.get(&name.to_string()).copied().unwrap_or(false);
        if said || self.hand(seat).len() != 1 {
            return Ok(None);
        }
        let cards = self.give_cards(seat, 2)?;
        self.said_uno.insert(name.to_string(), false);
        self.version += 1;
        info!("🔔 {} forgot to call UNO and draws {}", name, cards.len());
        Ok(Some(cards))
    }
}
