// UNO multiplayer core
//
// Cards and rules are pure; `game::Match` applies them to a table. The
// replication layer keeps each participant's copy of a match in step over a
// room relay, and the session layer owns rooms and message fan-out.

// Cards, turn order and rules
pub mod card;
pub mod rules;
pub mod turn;

// Match state and computer players
pub mod game;
pub mod ordered_hashmap;
pub mod players;

// Wire protocol and replication
pub mod actions;
pub mod replication;

// Rooms and the relay server
pub mod session;
pub mod websocket;

pub mod config;
pub mod errors;

pub use crate::actions::{ActionMessage, GameAction};
pub use crate::card::{Card, Color, Value};
pub use crate::errors::{GameError, NetworkError, RoomError, UnoError, UnoResult};
pub use crate::game::{Match, MatchPlayer, MatchSnapshot, MatchStatus};
pub use crate::replication::{ConnectionState, Notice, Participant};
pub use crate::session::{Relay, Room, RoomEvent, RoomRegistry};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
