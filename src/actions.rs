use serde::{Deserialize, Serialize};

use crate::card::{Card, Color};
use crate::errors::{PlayerId, RoomId};
use crate::game::{MatchSnapshot, MatchStatus};
use crate::ordered_hashmap::OrderedHashMap;
use crate::rules::{RoundResult, StackState};
use crate::turn::Direction;

/// Per-turn draw/color flags, replicated alongside the turn index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnFlags {
    pub must_play_drawn_card: bool,
    pub drawn_card: Option<Card>,
    pub can_draw_more: bool,
    pub draws_this_turn: u32,
    pub awaiting_color: bool,
}

/// Post-action values of the fields an action touched. Receivers overwrite
/// their copies with these; nothing is replayed through the rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDelta {
    /// Complete resulting hands of every player the action changed.
    #[serde(default, skip_serializing_if = "OrderedHashMap::is_empty")]
    pub player_hands: OrderedHashMap<String, Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard_pile: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "OrderedHashMap::is_empty")]
    pub said_uno: OrderedHashMap<String, bool>,
    pub current_player_index: usize,
    pub direction: Direction,
    pub stack: StackState,
    pub flags: TurnFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrawReason {
    /// Ordinary draw on the player's own turn.
    Turn,
    /// Drew the accumulated total of a chain instead of extending it.
    ChainBroken,
    /// Missed the UNO call.
    UnoPenalty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "effect")]
pub enum SpecialEffect {
    Skip { skipped: String },
    Reverse { direction: Direction },
    DrawPenalty { target: String, count: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayCardPayload {
    pub card: Card,
    pub jumped_in: bool,
    pub delta: TableDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawCardsPayload {
    pub player_name: String,
    pub count: usize,
    pub reason: DrawReason,
    pub delta: TableDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnoCallPayload {
    pub player_name: String,
    pub said_uno: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WildColorPayload {
    pub color: Color,
    pub delta: TableDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialCardPayload {
    pub card: Card,
    pub effect: SpecialEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackingPayload {
    pub stack: StackState,
    pub total: u32,
    pub current_player_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnChangePayload {
    pub current_player_index: usize,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundWinPayload {
    pub result: RoundResult,
    pub scores: OrderedHashMap<String, u32>,
    pub status: MatchStatus,
}

/// Every kind of message participants exchange about a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameAction {
    PlayCard(PlayCardPayload),
    DrawCards(DrawCardsPayload),
    PassTurn(TableDelta),
    UnoCall(UnoCallPayload),
    WildColorSelect(WildColorPayload),
    SpecialCard(SpecialCardPayload),
    Stacking(StackingPayload),
    TurnChange(TurnChangePayload),
    NewRoundStarted(Box<MatchSnapshot>),
    RoundWin(RoundWinPayload),
    GameStateSync(Box<MatchSnapshot>),
    RequestSync,
}

impl GameAction {
    pub fn kind(&self) -> &'static str {
        match self {
            GameAction::PlayCard(_) => "PLAY_CARD",
            GameAction::DrawCards(_) => "DRAW_CARDS",
            GameAction::PassTurn(_) => "PASS_TURN",
            GameAction::UnoCall(_) => "UNO_CALL",
            GameAction::WildColorSelect(_) => "WILD_COLOR_SELECT",
            GameAction::SpecialCard(_) => "SPECIAL_CARD",
            GameAction::Stacking(_) => "STACKING",
            GameAction::TurnChange(_) => "TURN_CHANGE",
            GameAction::NewRoundStarted(_) => "NEW_ROUND_STARTED",
            GameAction::RoundWin(_) => "ROUND_WIN",
            GameAction::GameStateSync(_) => "GAME_STATE_SYNC",
            GameAction::RequestSync => "REQUEST_SYNC",
        }
    }
}

/// Wire envelope:
/// `{ roomId, action, data, playerId, playerName, version }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMessage {
    pub room_id: RoomId,
    #[serde(flatten)]
    pub action: GameAction,
    /// Originating participant.
    pub player_id: PlayerId,
    pub player_name: String,
    #[serde(default)]
    pub version: u64,
}

impl ActionMessage {
    pub fn new(
        room_id: impl Into<RoomId>,
        action: GameAction,
        player_id: impl Into<PlayerId>,
        player_name: impl Into<String>,
        version: u64,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            action,
            player_id: player_id.into(),
            player_name: player_name.into(),
            version,
        }
    }

    pub fn to_json(&self) -> Result<String, crate::errors::NetworkError> {
        serde_json::to_string(self).map_err(|e| crate::errors::NetworkError::SerializationFailed {
            details: e.to_string(),
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, crate::errors::NetworkError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Value;

    fn delta() -> TableDelta {
        let mut player_hands = OrderedHashMap::new();
        player_hands.insert("Alice".to_string(), vec![Card::number(Color::Blue, 3)]);
        TableDelta {
            player_hands,
            discard_pile: Some(vec![Card::number(Color::Red, 5), Card::number(Color::Red, 9)]),
            deck: None,
            said_uno: OrderedHashMap::new(),
            current_player_index: 1,
            direction: Direction::Forward,
            stack: StackState::default(),
            flags: TurnFlags::default(),
        }
    }

    #[test]
    fn test_envelope_shape() {
        let message = ActionMessage::new(
            "room-1",
            GameAction::PlayCard(PlayCardPayload {
                card: Card::number(Color::Red, 9),
                jumped_in: false,
                delta: delta(),
            }),
            "p1",
            "Alice",
            4,
        );
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["roomId"], "room-1");
        assert_eq!(json["action"], "PLAY_CARD");
        assert_eq!(json["data"]["card"]["color"], "red");
        assert_eq!(json["data"]["card"]["value"], "9");
        assert_eq!(json["data"]["delta"]["currentPlayerIndex"], 1);
        assert_eq!(json["data"]["delta"]["direction"], 1);
        assert_eq!(json["playerName"], "Alice");
        assert_eq!(json["version"], 4);
        assert!(json["data"]["delta"].get("deck").is_none());
    }

    #[test]
    fn test_envelope_parses_back() {
        let message = ActionMessage::new(
            "room-1",
            GameAction::WildColorSelect(WildColorPayload {
                color: Color::Green,
                delta: delta(),
            }),
            "p1",
            "Alice",
            9,
        );
        let raw = message.to_json().unwrap();
        assert_eq!(ActionMessage::from_json(&raw).unwrap(), message);
    }

    #[test]
    fn test_request_sync_has_no_data() {
        let message = ActionMessage::new("r", GameAction::RequestSync, "p2", "Bob", 0);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["action"], "REQUEST_SYNC");
        assert_eq!(message.action.kind(), "REQUEST_SYNC");
        let back: ActionMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.action, GameAction::RequestSync);
    }

    #[test]
    fn test_special_card_effect_tag() {
        let action = GameAction::SpecialCard(SpecialCardPayload {
            card: Card::new(Color::Blue, Value::Skip),
            effect: SpecialEffect::Skip {
                skipped: "Bob".to_string(),
            },
        });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "SPECIAL_CARD");
        assert_eq!(json["data"]["effect"]["effect"], "skip");
        assert_eq!(json["data"]["effect"]["skipped"], "Bob");
    }

    #[test]
    fn test_malformed_message_is_network_error() {
        let err = ActionMessage::from_json("{\"roomId\": 3}").unwrap_err();
        assert!(matches!(err, crate::errors::NetworkError::DeserializationFailed { .. }));
    }
}
