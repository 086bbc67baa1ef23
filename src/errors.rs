use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::card::Card;

pub type PlayerId = String;
pub type RoomId = String;

/// Top-level error type for the UNO core
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnoError {
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Room error: {0}")]
    Room(#[from] RoomError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Rule and turn violations raised while mutating a match
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameError {
    #[error("No game in progress")]
    NoActiveGame,

    #[error("Not player's turn: current={current_player}, attempted={attempted_player}")]
    NotPlayerTurn { current_player: PlayerId, attempted_player: PlayerId },

    #[error("Player not in match: {player_id}")]
    UnknownPlayer { player_id: PlayerId },

    #[error("Card index {index} out of range for hand of {hand_size}")]
    CardIndexOutOfRange { index: usize, hand_size: usize },

    #[error("Card {card} cannot be played now")]
    IllegalPlay { card: Card },

    #[error("A wild color must be chosen first")]
    ColorChoicePending,

    #[error("No wild color choice is pending")]
    NoColorChoicePending,

    #[error("Color {color} cannot be chosen for a wild card")]
    InvalidColorChoice { color: String },

    #[error("Cannot draw: {reason}")]
    DrawNotAllowed { reason: String },

    #[error("Cannot pass: {reason}")]
    PassNotAllowed { reason: String },

    #[error("Player {player_id} cannot call UNO holding {hand_size} cards")]
    UnoNotAllowed { player_id: PlayerId, hand_size: usize },

    #[error("Round is over")]
    RoundOver,

    #[error("Not enough players: need {min_players}, have {player_count}")]
    NotEnoughPlayers { min_players: usize, player_count: usize },

    #[error("Too many players: at most {max_players}, have {player_count}")]
    TooManyPlayers { max_players: usize, player_count: usize },
}

/// Join/start preconditions and membership errors, reported to the requester only
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoomError {
    #[error("Room not found: {room}")]
    RoomNotFound { room: String },

    #[error("Room is full ({max_players} players)")]
    RoomFull { max_players: usize },

    #[error("Name already taken in room: {name}")]
    NameTaken { name: String },

    #[error("Player already in room: {player_id}")]
    AlreadyJoined { player_id: PlayerId },

    #[error("Player not in room: {player_id}")]
    NotAMember { player_id: PlayerId },

    #[error("Only the host can {operation}")]
    NotHost { operation: String },

    #[error("Not enough players to start: need {min_players}, have {player_count}")]
    NotEnoughPlayers { min_players: usize, player_count: usize },

    #[error("Invalid room configuration: {details}")]
    InvalidConfiguration { details: String },

    #[error("Could not allocate a unique room code")]
    CodeSpaceExhausted,
}

/// Transport and wire format errors
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetworkError {
    #[error("Not connected to the relay")]
    Disconnected,

    #[error("Send failed: {details}")]
    SendFailed { details: String },

    #[error("Message serialization failed: {details}")]
    SerializationFailed { details: String },

    #[error("Message deserialization failed: {details}")]
    DeserializationFailed { details: String },
}

pub type UnoResult<T> = Result<T, UnoError>;
pub type GameResult<T> = Result<T, GameError>;
pub type RoomResult<T> = Result<T, RoomError>;

impl GameError {
    pub fn not_player_turn(current: impl Into<PlayerId>, attempted: impl Into<PlayerId>) -> Self {
        Self::NotPlayerTurn {
            current_player: current.into(),
            attempted_player: attempted.into(),
        }
    }

    pub fn unknown_player(player_id: impl Into<PlayerId>) -> Self {
        Self::UnknownPlayer {
            player_id: player_id.into(),
        }
    }

    pub fn draw_not_allowed(reason: impl Into<String>) -> Self {
        Self::DrawNotAllowed {
            reason: reason.into(),
        }
    }

    pub fn pass_not_allowed(reason: impl Into<String>) -> Self {
        Self::PassNotAllowed {
            reason: reason.into(),
        }
    }
}

impl RoomError {
    pub fn not_found(room: impl Into<String>) -> Self {
        Self::RoomNotFound { room: room.into() }
    }

    pub fn not_host(operation: impl Into<String>) -> Self {
        Self::NotHost {
            operation: operation.into(),
        }
    }

    pub fn not_a_member(player_id: impl Into<PlayerId>) -> Self {
        Self::NotAMember {
            player_id: player_id.into(),
        }
    }
}

impl NetworkError {
    pub fn send_failed(details: impl Into<String>) -> Self {
        Self::SendFailed {
            details: details.into(),
        }
    }

    pub fn deserialization_failed(details: impl Into<String>) -> Self {
        Self::DeserializationFailed {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::DeserializationFailed {
            details: err.to_string(),
        }
    }
}
