use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::card::Value;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 10;
pub const DEFAULT_POINTS_TO_WIN: u32 = 500;

/// House rules chosen by the host when creating a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub points_to_win: u32,
    pub stacking_enabled: bool,
    pub unlimited_draw_enabled: bool,
    pub force_play_enabled: bool,
    pub jump_in_enabled: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            points_to_win: DEFAULT_POINTS_TO_WIN,
            stacking_enabled: true,
            unlimited_draw_enabled: false,
            force_play_enabled: false,
            jump_in_enabled: false,
        }
    }
}

/// Points a card left in a losing hand is worth to the round winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfig {
    pub number_multiplier: u32,
    pub action_points: u32,
    pub wild_points: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            number_multiplier: 1,
            action_points: 20,
            wild_points: 50,
        }
    }
}

impl ScoringConfig {
    pub fn card_points(&self, value: Value) -> u32 {
        match value {
            Value::Number(n) => n as u32 * self.number_multiplier,
            Value::Skip | Value::Reverse | Value::Draw2 => self.action_points,
            Value::Wild | Value::Wild4 => self.wild_points,
        }
    }
}

/// Delays for the scheduled tasks a participant runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub uno_grace: Duration,
    pub host_sync_interval: Duration,
    pub sync_timeout: Duration,
    pub send_retry_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            uno_grace: Duration::from_secs(5),
            host_sync_interval: Duration::from_secs(10),
            sync_timeout: Duration::from_secs(5),
            send_retry_delay: Duration::from_millis(500),
        }
    }
}

/// Command line options for the relay server.
#[derive(Debug, Clone, Parser)]
#[command(name = "uno-relay", version, about = "Room relay for multiplayer UNO")]
pub struct ServerConfig {
    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// TCP port to listen on
    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Capacity of each room's broadcast channel
    #[arg(long, default_value_t = 256)]
    pub channel_capacity: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
