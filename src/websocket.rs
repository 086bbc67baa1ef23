use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};

use crate::actions::ActionMessage;
use crate::errors::{NetworkError, PlayerId, RoomError, UnoError, UnoResult};
use crate::session::{Room, RoomConfig, RoomMember, RoomRegistry};

/// Control frames the relay sends besides room events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WsMessage {
    Greeting { room: Room },
    Error { message: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub id_or_code: String,
    pub player: RoomMember,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub player_id: PlayerId,
}

type ApiError = (StatusCode, String);

fn status_of(err: &UnoError) -> StatusCode {
    match err {
        UnoError::Room(RoomError::RoomNotFound { .. }) => StatusCode::NOT_FOUND,
        UnoError::Room(RoomError::NotHost { .. }) | UnoError::Room(RoomError::NotAMember { .. }) => {
            StatusCode::FORBIDDEN
        }
        UnoError::Room(RoomError::RoomFull { .. })
        | UnoError::Room(RoomError::NameTaken { .. })
        | UnoError::Room(RoomError::AlreadyJoined { .. }) => StatusCode::CONFLICT,
        UnoError::Room(RoomError::CodeSpaceExhausted) => StatusCode::SERVICE_UNAVAILABLE,
        UnoError::Network(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn api_error(err: impl Into<UnoError>) -> ApiError {
    let err = err.into();
    log::warn!("❌ Request failed: {}", err);
    (status_of(&err), err.to_string())
}

/// Relays room traffic between connected participants. Holds no game state:
/// it only knows rooms and members.
#[derive(Clone)]
pub struct RelayService {
    registry: Arc<RoomRegistry>,
}

impl RelayService {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Handle a member's socket until either side goes away. Closing the
    /// socket does not leave the room; the member may reconnect.
    pub async fn handle_connection(&self, socket: WebSocket, room_id: String, player_id: PlayerId) {
        log::info!("🔌 WebSocket connected: {} (room {})", player_id, room_id);
        let (mut sender, mut receiver) = socket.split();

        let subscription = match self.registry.subscribe(&room_id, &player_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                let error = WsMessage::Error {
                    message: e.to_string(),
                };
                let _ = Self::send_json(&mut sender, &error).await;
                return;
            }
        };

        match self.registry.get_room(&room_id).await {
            Ok(room) => {
                if let Err(e) = Self::send_json(&mut sender, &WsMessage::Greeting { room }).await {
                    log::error!("❌ Failed to send greeting: {}", e);
                    return;
                }
            }
            Err(e) => {
                log::error!("❌ Room {} vanished during connect: {}", room_id, e);
                return;
            }
        }

        let player_for_updates = player_id.clone();
        let mut update_task = tokio::spawn(async move {
            let events = subscription.into_stream();
            tokio::pin!(events);
            while let Some(event) = events.next().await {
                if let Err(e) = Self::send_json(&mut sender, &event).await {
                    log::error!("Failed to send to {}: {:?}", player_for_updates, e);
                    break;
                }
            }
        });

        let registry = self.registry.clone();
        let room_for_messages = room_id.clone();
        let player_for_messages = player_id.clone();
        let mut message_task = tokio::spawn(async move {
            while let Some(Ok(message)) = receiver.next().await {
                match message {
                    Message::Text(text) => {
                        if let Err(e) = Self::handle_text_message(
                            &registry,
                            &room_for_messages,
                            &player_for_messages,
                            text.as_str(),
                        )
                        .await
                        {
                            log::error!("Error relaying from {}: {}", player_for_messages, e);
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        tokio::select! {
            _ = &mut update_task => {
                message_task.abort();
            }
            _ = &mut message_task => {
                update_task.abort();
            }
        }

        log::info!("WebSocket {} closed for room {}", player_id, room_id);
    }

    /// Validates an inbound frame and fans it out to the rest of the room.
    /// Returns how many subscribers it reached.
    pub async fn handle_text_message(
        registry: &RoomRegistry,
        room_id: &str,
        player_id: &str,
        text: &str,
    ) -> UnoResult<usize> {
        log::debug!("🔍 WebSocket received raw message: {}", text);
        let message = ActionMessage::from_json(text)?;

        if message.room_id != room_id {
            return Err(NetworkError::deserialization_failed(format!(
                "message for room {} sent on room {}",
                message.room_id, room_id
            ))
            .into());
        }
        if message.player_id != player_id {
            return Err(RoomError::not_a_member(message.player_id).into());
        }

        let reached = registry
            .broadcast(room_id, message, Some(player_id))
            .await?;
        Ok(reached)
    }

    async fn send_json<T: Serialize>(
        sender: &mut futures::stream::SplitSink<WebSocket, Message>,
        message: &T,
    ) -> Result<(), axum::Error> {
        let json = serde_json::to_string(message).map_err(axum::Error::new)?;
        sender
            .send(Message::Text(json.into()))
            .await
            .map_err(axum::Error::new)
    }
}

async fn hello() -> &'static str {
    "UNO relay"
}

async fn list_rooms(State(service): State<RelayService>) -> Json<Vec<Room>> {
    Json(service.registry.list_rooms().await)
}

async fn create_room(
    State(service): State<RelayService>,
    Json(config): Json<RoomConfig>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    log::info!("Creating room {:?} for {}", config.name, config.host.name);
    let room = service.registry.create_room(config).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn join_room(
    State(service): State<RelayService>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<Room>, ApiError> {
    let room = service
        .registry
        .join_room(&request.id_or_code, request.player)
        .await
        .map_err(api_error)?;
    Ok(Json(room))
}

async fn get_room(
    State(service): State<RelayService>,
    Path(room_id): Path<String>,
) -> Result<Json<Room>, ApiError> {
    let room = service.registry.get_room(&room_id).await.map_err(api_error)?;
    Ok(Json(room))
}

async fn leave_room(
    State(service): State<RelayService>,
    Path(room_id): Path<String>,
    Json(request): Json<LeaveRequest>,
) -> Result<Json<Option<Room>>, ApiError> {
    let room = service
        .registry
        .leave_room(&room_id, &request.player_id)
        .await
        .map_err(api_error)?;
    Ok(Json(room))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((room_id, player_id)): Path<(String, String)>,
    State(service): State<RelayService>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        service.handle_connection(socket, room_id, player_id).await
    })
}

pub fn router(service: RelayService) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/join", post(join_room))
        .route("/rooms/{room_id}", get(get_room))
        .route("/rooms/{room_id}/leave", post(leave_room))
        .route("/ws/rooms/{room_id}/{player_id}", get(ws_handler))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::GameAction;
    use crate::config::RoomSettings;
    use crate::session::RoomEvent;

    async fn room_with_two() -> (Arc<RoomRegistry>, Room) {
        let registry = Arc::new(RoomRegistry::default());
        let room = registry
            .create_room(RoomConfig {
                name: "Lobby".to_string(),
                max_players: 4,
                settings: RoomSettings::default(),
                host: RoomMember::new("a", "Alice"),
            })
            .await
            .unwrap();
        registry
            .join_room(&room.code, RoomMember::new("b", "Bob"))
            .await
            .unwrap();
        (registry, room)
    }

    #[tokio::test]
    async fn test_relays_to_other_members() {
        let (registry, room) = room_with_two().await;
        let mut alice = registry.subscribe(&room.id, "a").await.unwrap();
        let mut bob = registry.subscribe(&room.id, "b").await.unwrap();

        let message = ActionMessage::new(room.id.clone(), GameAction::RequestSync, "a", "Alice", 3);
        let text = message.to_json().unwrap();
        RelayService::handle_text_message(&registry, &room.id, "a", &text)
            .await
            .unwrap();

        assert_eq!(bob.try_recv(), Some(RoomEvent::Action(message)));
        assert_eq!(alice.try_recv(), None);
    }

    #[tokio::test]
    async fn test_rejects_spoofed_sender() {
        let (registry, room) = room_with_two().await;
        let message = ActionMessage::new(room.id.clone(), GameAction::RequestSync, "b", "Bob", 0);
        let err = RelayService::handle_text_message(&registry, &room.id, "a", &message.to_json().unwrap())
            .await
            .unwrap_err();
        assert_eq!(status_of(&err), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        let (registry, room) = room_with_two().await;
        let err = RelayService::handle_text_message(&registry, &room.id, "a", "{not json")
            .await
            .unwrap_err();
        assert!(matches!(err, UnoError::Network(NetworkError::DeserializationFailed { .. })));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(&RoomError::not_found("XYZ").into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(&RoomError::RoomFull { max_players: 2 }.into()),
            StatusCode::CONFLICT
        );
    }
}
