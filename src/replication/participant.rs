use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::actions::{ActionMessage, DrawReason, GameAction};
use crate::card::Color;
use crate::config::{RoomSettings, ScoringConfig, Timing};
use crate::errors::{GameError, NetworkError, PlayerId, RoomError, UnoError, UnoResult};
use crate::game::{Match, MatchPlayer, MatchStatus, SeatKind};
use crate::players::{self, Difficulty};
use crate::session::{Relay, Room, RoomConfig, RoomEvent, RoomMember, Subscription};

use super::delta;
use super::reducer::{apply_remote, Applied, Notice};
use super::timers::{TimerKey, Timers};

/// Upper bound on computer turns run back to back.
const MAX_COMPUTER_TURNS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Resyncing,
    /// Left the room explicitly. Terminal.
    Left,
}

enum Incoming {
    Room(RoomEvent),
    Timer(TimerKey),
    RoomClosed,
}

/// One player's view of a match. Owns the local state, applies local actions
/// optimistically, publishes their deltas and reduces what other players
/// send. All mutation happens on the task that owns the participant.
pub struct Participant {
    player_id: PlayerId,
    player_name: String,
    relay: Arc<dyn Relay>,
    timing: Timing,
    scoring: ScoringConfig,
    state: ConnectionState,
    room: Option<Room>,
    subscription: Option<Subscription>,
    game: Option<Match>,
    is_host: bool,
    sync_in_progress: bool,
    timers: Timers,
    pending_joins: VecDeque<String>,
    retries: HashMap<u64, ActionMessage>,
    next_retry_id: u64,
    notices: Vec<Notice>,
    rng: ChaCha8Rng,
}

impl Participant {
    pub fn new(
        player_id: impl Into<PlayerId>,
        player_name: impl Into<String>,
        relay: Arc<dyn Relay>,
        timing: Timing,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            relay,
            timing,
            scoring: ScoringConfig::default(),
            state: ConnectionState::Disconnected,
            room: None,
            subscription: None,
            game: None,
            is_host: false,
            sync_in_progress: false,
            timers: Timers::new(),
            pending_joins: VecDeque::new(),
            retries: HashMap::new(),
            next_retry_id: 0,
            notices: Vec::new(),
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn game(&self) -> Option<&Match> {
        self.game.as_ref()
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn sync_in_progress(&self) -> bool {
        self.sync_in_progress
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn is_online(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Resyncing
        )
    }

    // Connection lifecycle

    /// Brings the transport up. Re-subscribes to the current room, replays
    /// joins queued while offline and, for non-hosts in a running match,
    /// asks the host for a full sync.
    pub async fn connect(&mut self) -> UnoResult<()> {
        match self.state {
            ConnectionState::Left => {
                return Err(UnoError::Validation("participant has left".to_string()))
            }
            ConnectionState::Connected | ConnectionState::Resyncing => return Ok(()),
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
        }
        self.state = ConnectionState::Connecting;

        if let Some(room_id) = self.room.as_ref().map(|room| room.id.clone()) {
            match self.subscribe(&room_id).await {
                Ok(()) => {}
                Err(err) => {
                    self.state = ConnectionState::Disconnected;
                    return Err(err);
                }
            }
        }
        self.state = ConnectionState::Connected;
        info!("🔌 {} connected", self.player_name);

        while let Some(id_or_code) = self.pending_joins.pop_front() {
            if let Err(err) = self.join_now(&id_or_code).await {
                warn!("Queued join of {} failed: {}", id_or_code, err);
                self.notices.push(Notice::MessageDropped {
                    kind: "JOIN",
                    reason: err.to_string(),
                });
            }
        }

        if self.room.is_some() && self.game.is_some() {
            if self.is_host {
                self.ensure_host_sync();
                self.refresh_uno_reminders();
            } else {
                self.request_sync().await;
            }
        }
        Ok(())
    }

    /// Drops the transport. Scheduled work is cancelled; the match stays.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Left {
            return;
        }
        self.subscription = None;
        self.timers.cancel_all();
        self.retries.clear();
        self.sync_in_progress = false;
        self.state = ConnectionState::Disconnected;
        self.notices.push(Notice::Disconnected);
        warn!("🔌 {} disconnected", self.player_name);
    }

    async fn subscribe(&mut self, room_id: &str) -> UnoResult<()> {
        let subscription = self.relay.subscribe(room_id, &self.player_id).await?;
        self.subscription = Some(subscription);
        let room = self.relay.get_room(room_id).await?;
        self.is_host = room.is_host(&self.player_id);
        self.room = Some(room);
        Ok(())
    }

    // Rooms

    pub async fn create_room(
        &mut self,
        name: impl Into<String>,
        max_players: usize,
        settings: RoomSettings,
    ) -> UnoResult<Room> {
        if !self.is_online() {
            return Err(NetworkError::Disconnected.into());
        }
        let room = self
            .relay
            .create_room(RoomConfig {
                name: name.into(),
                max_players,
                settings,
                host: RoomMember::new(self.player_id.clone(), self.player_name.clone()),
            })
            .await?;
        self.subscribe(&room.id).await?;
        Ok(room)
    }

    /// Joins by id or code. While offline the request is queued and `None`
    /// is returned; it is replayed on the next `connect`.
    pub async fn join_room(&mut self, id_or_code: &str) -> UnoResult<Option<Room>> {
        if self.state == ConnectionState::Left {
            return Err(UnoError::Validation("participant has left".to_string()));
        }
        if !self.is_online() {
            info!("Queueing join of {} until reconnected", id_or_code);
            self.pending_joins.push_back(id_or_code.to_string());
            return Ok(None);
        }
        self.join_now(id_or_code).await.map(Some)
    }

    async fn join_now(&mut self, id_or_code: &str) -> UnoResult<Room> {
        let member = RoomMember::new(self.player_id.clone(), self.player_name.clone());
        let room = self.relay.join_room(id_or_code, member).await?;
        self.subscribe(&room.id).await?;
        Ok(room)
    }

    /// Leaves the room for good: timers cancelled, feed dropped, match gone.
    pub async fn leave_room(&mut self) -> UnoResult<()> {
        self.timers.cancel_all();
        self.retries.clear();
        self.subscription = None;
        self.game = None;
        self.sync_in_progress = false;
        self.pending_joins.clear();
        let room = self.room.take();
        self.state = ConnectionState::Left;
        if let Some(room) = room {
            self.relay.leave_room(&room.id, &self.player_id).await?;
            info!("🚪 {} left room {}", self.player_name, room.code);
        }
        Ok(())
    }

    // Starting play

    /// Host only: deals a new game to the room's current members.
    pub async fn start_game(&mut self) -> UnoResult<()> {
        let room_id = self
            .room
            .as_ref()
            .map(|room| room.id.clone())
            .ok_or(GameError::NoActiveGame)?;
        let room = self.relay.get_room(&room_id).await?;
        room.can_start(&self.player_id)?;

        let players = room
            .players
            .iter()
            .map(|member| MatchPlayer::human(member.id.clone(), member.name.clone()))
            .collect();
        self.install_new_game(players, room.settings.clone())?;
        self.room = Some(room);
        self.is_host = true;

        self.publish_snapshot(true).await;
        self.after_change().await;
        Ok(())
    }

    /// Single-player game against computer opponents; no room involved.
    pub async fn start_solo(
        &mut self,
        opponents: &[(String, Difficulty)],
        settings: RoomSettings,
    ) -> UnoResult<()> {
        let mut players = vec![MatchPlayer::human(
            self.player_id.clone(),
            self.player_name.clone(),
        )];
        for (index, (name, difficulty)) in opponents.iter().enumerate() {
            players.push(MatchPlayer::computer(format!("cpu-{index}"), name.clone(), *difficulty));
        }
        self.install_new_game(players, settings)?;
        self.is_host = true;
        self.after_change().await;
        Ok(())
    }

    fn install_new_game(&mut self, players: Vec<MatchPlayer>, settings: RoomSettings) -> UnoResult<()> {
        let seed: u64 = self.rng.gen();
        let mut game = Match::start_seeded(players, settings, self.scoring, seed)?;
        if let Some(previous) = &self.game {
            game.version = previous.version + 1;
        }
        self.timers
            .cancel_where(|key| matches!(key, TimerKey::UnoReminder(_)));
        self.game = Some(game);
        Ok(())
    }

    /// Host only: deals the next round after a round win.
    pub async fn next_round(&mut self) -> UnoResult<()> {
        if !self.is_host {
            return Err(RoomError::not_host("start a new round").into());
        }
        self.game_mut()?.new_round()?;
        self.timers
            .cancel_where(|key| matches!(key, TimerKey::UnoReminder(_)));
        self.publish_snapshot(true).await;
        self.after_change().await;
        Ok(())
    }

    // Local actions

    fn game_mut(&mut self) -> Result<&mut Match, GameError> {
        self.game.as_mut().ok_or(GameError::NoActiveGame)
    }

    fn my_seat(&self) -> Result<usize, GameError> {
        let game = self.game.as_ref().ok_or(GameError::NoActiveGame)?;
        game.seat_of_id(&self.player_id)
            .ok_or_else(|| GameError::unknown_player(self.player_id.clone()))
    }

    pub async fn play_card(&mut self, card_index: usize, chosen_color: Option<Color>) -> UnoResult<()> {
        let seat = self.my_seat()?;
        let game = self.game_mut()?;
        let outcome = game.play_card(seat, card_index, chosen_color)?;
        let actions = delta::play_actions(game, &outcome);
        self.publish(actions).await;
        self.after_change().await;
        Ok(())
    }

    pub async fn select_wild_color(&mut self, color: Color) -> UnoResult<()> {
        let seat = self.my_seat()?;
        let game = self.game_mut()?;
        let outcome = game.select_wild_color(seat, color)?;
        let actions = delta::color_actions(game, &outcome);
        self.publish(actions).await;
        self.after_change().await;
        Ok(())
    }

    pub async fn draw_card(&mut self) -> UnoResult<()> {
        let seat = self.my_seat()?;
        let game = self.game_mut()?;
        let outcome = game.draw_card(seat)?;
        let reason = if outcome.broke_chain {
            DrawReason::ChainBroken
        } else {
            DrawReason::Turn
        };
        let actions = delta::draw_actions(game, &outcome, reason);
        self.publish(actions).await;
        self.after_change().await;
        Ok(())
    }

    pub async fn pass_turn(&mut self) -> UnoResult<()> {
        let seat = self.my_seat()?;
        let game = self.game_mut()?;
        game.pass_turn(seat)?;
        let actions = delta::pass_actions(game);
        self.publish(actions).await;
        self.after_change().await;
        Ok(())
    }

    pub async fn call_uno(&mut self) -> UnoResult<()> {
        let seat = self.my_seat()?;
        let game = self.game_mut()?;
        game.call_uno(seat)?;
        let action = delta::uno_call_action(&self.player_name, true);
        self.publish(vec![action]).await;
        self.after_change().await;
        Ok(())
    }

    /// Asks the host for a full snapshot. Gives up quietly after the sync
    /// timeout.
    pub async fn request_sync(&mut self) {
        if self.room.is_none() || self.is_host {
            return;
        }
        self.sync_in_progress = true;
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Resyncing;
        }
        self.timers
            .schedule(TimerKey::SyncTimeout, self.timing.sync_timeout);
        self.publish(vec![GameAction::RequestSync]).await;
    }

    // Publishing

    /// Sends `actions` in order. Each message takes the next state version;
    /// the first takes the match's current one.
    async fn publish(&mut self, actions: Vec<GameAction>) {
        let Some(room_id) = self.room.as_ref().map(|room| room.id.clone()) else {
            return;
        };
        let base = self.game.as_ref().map(|game| game.version).unwrap_or(0);
        let count = actions.len() as u64;

        for (offset, action) in actions.into_iter().enumerate() {
            let version = base + offset as u64;
            let message = ActionMessage::new(
                room_id.clone(),
                action,
                self.player_id.clone(),
                self.player_name.clone(),
                version,
            );
            self.send(message).await;
        }
        if let Some(game) = self.game.as_mut() {
            if count > 0 {
                game.version = base + count - 1;
            }
        }
    }

    async fn publish_snapshot(&mut self, new_round: bool) {
        let Some(game) = self.game.as_ref() else {
            return;
        };
        let action = if new_round {
            delta::new_round_action(game)
        } else {
            delta::snapshot_action(game)
        };
        self.publish(vec![action]).await;
    }

    async fn send(&mut self, message: ActionMessage) {
        if !self.is_online() {
            warn!("Dropping {} while offline", message.action.kind());
            self.notices.push(Notice::MessageDropped {
                kind: message.action.kind(),
                reason: NetworkError::Disconnected.to_string(),
            });
            return;
        }
        let room_id = message.room_id.clone();
        if let Err(err) = self
            .relay
            .broadcast(&room_id, message.clone(), Some(&self.player_id))
            .await
        {
            warn!("Send of {} failed ({}), retrying once", message.action.kind(), err);
            self.next_retry_id += 1;
            let id = self.next_retry_id;
            self.retries.insert(id, message);
            self.timers
                .schedule(TimerKey::SendRetry(id), self.timing.send_retry_delay);
        }
    }

    // Inbound

    /// Handles everything already queued, without waiting. Returns the number
    /// of events handled.
    pub async fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            if let Some(event) = self.subscription.as_mut().and_then(Subscription::try_recv) {
                self.handle_room_event(event).await;
            } else if let Some(key) = self.timers.try_next() {
                self.handle_timer(key).await;
            } else {
                return handled;
            }
            handled += 1;
        }
    }

    /// Waits for the next room event or timer and handles it.
    pub async fn step(&mut self) {
        let incoming = {
            let timers = &mut self.timers;
            match self.subscription.as_mut() {
                Some(subscription) => tokio::select! {
                    event = subscription.recv() => match event {
                        Some(event) => Incoming::Room(event),
                        None => Incoming::RoomClosed,
                    },
                    key = timers.next() => Incoming::Timer(key),
                },
                None => Incoming::Timer(timers.next().await),
            }
        };

        match incoming {
            Incoming::Room(event) => self.handle_room_event(event).await,
            Incoming::Timer(key) => self.handle_timer(key).await,
            Incoming::RoomClosed => {
                warn!("Room feed closed for {}", self.player_name);
                self.disconnect();
            }
        }
    }

    pub async fn handle_room_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::PlayerJoined { player, .. } => {
                debug!("{} joined", player.name);
                if let Some(room) = self.room.as_mut() {
                    if !room.is_member(&player.id) {
                        room.players.push(player);
                    }
                }
            }
            RoomEvent::PlayerLeft { player_id, .. } => {
                if let Some(room) = self.room.as_mut() {
                    room.players.retain(|p| p.id != player_id);
                }
            }
            RoomEvent::HostChanged { host, .. } => {
                let became_host = host == self.player_id && !self.is_host;
                self.is_host = host == self.player_id;
                if let Some(room) = self.room.as_mut() {
                    room.host = host.clone();
                }
                self.notices.push(Notice::HostChanged { host });
                if became_host {
                    info!("👑 {} took over as host", self.player_name);
                    self.after_change().await;
                }
            }
            RoomEvent::Action(message) => self.handle_message(message).await,
        }
    }

    async fn handle_message(&mut self, message: ActionMessage) {
        let Some(room_id) = self.room.as_ref().map(|room| room.id.clone()) else {
            debug!("Ignoring {} outside a room", message.action.kind());
            return;
        };

        match apply_remote(&mut self.game, message, &room_id, &self.player_id) {
            Applied::Updated { notices } => {
                self.notices.extend(notices);
                self.after_change().await;
            }
            Applied::Replaced { notices } => {
                self.notices.extend(notices);
                if self.sync_in_progress {
                    self.sync_in_progress = false;
                    self.timers.cancel(&TimerKey::SyncTimeout);
                }
                if self.state == ConnectionState::Resyncing {
                    self.state = ConnectionState::Connected;
                    self.notices.push(Notice::Reconnected);
                }
                self.after_change().await;
            }
            Applied::SyncRequested { requester } => {
                if self.is_host && self.game.is_some() {
                    info!("Sync requested by {}", requester);
                    self.publish_snapshot(false).await;
                } else {
                    debug!("Ignoring sync request from {}: not host", requester);
                }
            }
            Applied::Ignored(reason) => debug!("Ignored inbound message: {:?}", reason),
        }
    }

    pub async fn handle_timer(&mut self, key: TimerKey) {
        match key {
            TimerKey::UnoReminder(player_name) => {
                if !self.is_host {
                    return;
                }
                let Some(game) = self.game.as_mut() else {
                    return;
                };
                match game.apply_uno_penalty(&player_name) {
                    Ok(Some(cards)) => {
                        let actions = delta::uno_penalty_actions(game, &player_name, &cards);
                        self.notices.push(Notice::UnoPenalty {
                            player_name,
                            cards: cards.len(),
                        });
                        self.publish(actions).await;
                        self.after_change().await;
                    }
                    Ok(None) => {}
                    Err(err) => debug!("UNO reminder for {} skipped: {}", player_name, err),
                }
            }
            TimerKey::HostSync => {
                let active = self
                    .game
                    .as_ref()
                    .is_some_and(|game| !matches!(game.status, MatchStatus::Finished { .. }));
                if self.is_host && active && self.is_online() {
                    self.publish_snapshot(false).await;
                    self.timers
                        .schedule(TimerKey::HostSync, self.timing.host_sync_interval);
                }
            }
            TimerKey::SyncTimeout => {
                if self.sync_in_progress {
                    warn!("No sync received within {:?}", self.timing.sync_timeout);
                    self.sync_in_progress = false;
                    self.notices.push(Notice::SyncTimedOut);
                }
                if self.state == ConnectionState::Resyncing {
                    self.state = ConnectionState::Connected;
                }
            }
            TimerKey::SendRetry(id) => {
                let Some(message) = self.retries.remove(&id) else {
                    return;
                };
                if !self.is_online() {
                    return;
                }
                let room_id = message.room_id.clone();
                let kind = message.action.kind();
                if let Err(err) = self
                    .relay
                    .broadcast(&room_id, message, Some(&self.player_id))
                    .await
                {
                    warn!("Retry of {} failed, dropping: {}", kind, err);
                    self.notices.push(Notice::MessageDropped {
                        kind,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    // Host duties

    async fn after_change(&mut self) {
        if !self.is_host {
            return;
        }
        if let Err(err) = self.drive_computers().await {
            warn!("Computer turn failed: {}", err);
        }
        self.refresh_uno_reminders();
        self.ensure_host_sync();
    }

    fn ensure_host_sync(&mut self) {
        let active = self
            .game
            .as_ref()
            .is_some_and(|game| !matches!(game.status, MatchStatus::Finished { .. }));
        if self.is_host
            && active
            && self.room.is_some()
            && self.is_online()
            && !self.timers.is_scheduled(&TimerKey::HostSync)
        {
            self.timers
                .schedule(TimerKey::HostSync, self.timing.host_sync_interval);
        }
    }

    /// Keeps one grace timer per player sitting on one card without having
    /// called UNO.
    fn refresh_uno_reminders(&mut self) {
        let missing = match self.game.as_ref() {
            Some(game) if game.is_in_progress() => game.players_missing_uno(),
            _ => Vec::new(),
        };
        self.timers.cancel_where(|key| match key {
            TimerKey::UnoReminder(name) => !missing.contains(name),
            _ => false,
        });
        for name in missing {
            let key = TimerKey::UnoReminder(name);
            if !self.timers.is_scheduled(&key) {
                self.timers.schedule(key, self.timing.uno_grace);
            }
        }
    }

    async fn drive_computers(&mut self) -> UnoResult<()> {
        for _ in 0..MAX_COMPUTER_TURNS {
            let Some(game) = self.game.as_mut() else {
                break;
            };
            if !game.is_in_progress() {
                break;
            }
            let seat = game.turn.current_player_index;
            let Some(SeatKind::Computer(difficulty)) = game.players.get(seat).map(|p| p.kind) else {
                break;
            };

            let steps = players::take_turn(game, seat, difficulty, &mut self.rng)?;
            let actions: Vec<GameAction> = steps
                .iter()
                .flat_map(|step| delta::step_actions(game, step))
                .collect();
            self.publish(actions).await;
        }
        Ok(())
    }
}
