use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{RoomSettings, MAX_PLAYERS, MIN_PLAYERS};
use crate::errors::{PlayerId, RoomError, RoomId, RoomResult};

pub const ROOM_CODE_LENGTH: usize = 6;
/// Room code alphabet without the easily confused I, O, 0 and 1.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    pub id: PlayerId,
    pub name: String,
}

impl RoomMember {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// What the host asks for when creating a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    pub name: String,
    pub max_players: usize,
    #[serde(default)]
    pub settings: RoomSettings,
    pub host: RoomMember,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub code: String,
    pub max_players: usize,
    /// Members in join order.
    pub players: Vec<RoomMember>,
    pub host: PlayerId,
    pub settings: RoomSettings,
}

impl Room {
    pub fn new(id: RoomId, code: String, config: RoomConfig) -> RoomResult<Self> {
        if config.name.trim().is_empty() {
            return Err(RoomError::InvalidConfiguration {
                details: "room name must not be empty".to_string(),
            });
        }
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&config.max_players) {
            return Err(RoomError::InvalidConfiguration {
                details: format!(
                    "max players must be between {MIN_PLAYERS} and {MAX_PLAYERS}, got {}",
                    config.max_players
                ),
            });
        }
        Ok(Self {
            id,
            name: config.name,
            code,
            max_players: config.max_players,
            host: config.host.id.clone(),
            players: vec![config.host],
            settings: config.settings,
        })
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn is_member(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host == player_id
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn add_member(&mut self, member: RoomMember) -> RoomResult<()> {
        if self.is_member(&member.id) {
            return Err(RoomError::AlreadyJoined {
                player_id: member.id,
            });
        }
        if self.is_full() {
            return Err(RoomError::RoomFull {
                max_players: self.max_players,
            });
        }
        if self
            .players
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(&member.name))
        {
            return Err(RoomError::NameTaken { name: member.name });
        }
        self.players.push(member);
        Ok(())
    }

    /// Removes a member. When the host leaves, the earliest remaining member
    /// takes over; the new host is returned.
    pub fn remove_member(&mut self, player_id: &str) -> RoomResult<Option<PlayerId>> {
        let position = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or_else(|| RoomError::not_a_member(player_id))?;
        self.players.remove(position);

        if self.host == player_id {
            if let Some(next) = self.players.first() {
                self.host = next.id.clone();
                return Ok(Some(self.host.clone()));
            }
        }
        Ok(None)
    }

    /// Only the host may start, and only with enough players.
    pub fn can_start(&self, player_id: &str) -> RoomResult<()> {
        if !self.is_host(player_id) {
            return Err(RoomError::not_host("start the game"));
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers {
                min_players: MIN_PLAYERS,
                player_count: self.players.len(),
            });
        }
        Ok(())
    }
}

pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LENGTH)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}
