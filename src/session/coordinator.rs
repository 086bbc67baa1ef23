use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::actions::ActionMessage;
use crate::errors::{NetworkError, RoomError, RoomId, RoomResult, UnoResult};

use super::room::{generate_room_code, Room, RoomConfig, RoomMember};
use super::subscription::{Dispatch, RoomEvent, Subscription};
use super::Relay;

const CODE_ATTEMPTS: usize = 64;

struct RoomEntry {
    room: Room,
    events: broadcast::Sender<Dispatch>,
}

impl RoomEntry {
    fn publish(&self, event: RoomEvent, exclude: Option<&str>) -> usize {
        // No receivers is not an error: the room may simply be idle.
        self.events
            .send(Dispatch {
                event,
                exclude: exclude.map(str::to_string),
            })
            .unwrap_or(0)
    }
}

/// In-memory room store. The outer lock guards the set of rooms; each room
/// has its own lock so membership changes are serialized per room.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<RoomEntry>>>>,
    channel_capacity: usize,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RoomRegistry {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    async fn entry(&self, room_id: &str) -> RoomResult<Arc<Mutex<RoomEntry>>> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::not_found(room_id))
    }

    /// Looks a room up by id, or by its code (case-insensitive).
    async fn find(
        rooms: &HashMap<RoomId, Arc<Mutex<RoomEntry>>>,
        id_or_code: &str,
    ) -> RoomResult<Arc<Mutex<RoomEntry>>> {
        if let Some(entry) = rooms.get(id_or_code) {
            return Ok(entry.clone());
        }
        let code = id_or_code.trim().to_ascii_uppercase();
        for entry in rooms.values() {
            if entry.lock().await.room.code == code {
                return Ok(entry.clone());
            }
        }
        Err(RoomError::not_found(id_or_code))
    }

    pub async fn create_room(&self, config: RoomConfig) -> RoomResult<Room> {
        let mut rooms = self.rooms.write().await;

        let mut taken = Vec::with_capacity(rooms.len());
        for entry in rooms.values() {
            taken.push(entry.lock().await.room.code.clone());
        }
        let code = {
            let mut rng = rand::thread_rng();
            (0..CODE_ATTEMPTS)
                .map(|_| generate_room_code(&mut rng))
                .find(|code| !taken.contains(code))
                .ok_or(RoomError::CodeSpaceExhausted)?
        };

        let id = Uuid::new_v4().to_string();
        let room = Room::new(id.clone(), code, config)?;
        let (events, _) = broadcast::channel(self.channel_capacity);
        rooms.insert(
            id.clone(),
            Arc::new(Mutex::new(RoomEntry {
                room: room.clone(),
                events,
            })),
        );
        info!("🏠 Room {} ({}) created by {}", room.name, room.code, room.host);
        Ok(room)
    }

    pub async fn join_room(&self, id_or_code: &str, member: RoomMember) -> RoomResult<Room> {
        // Held until the member is in; the room lock is always taken second.
        let rooms = self.rooms.read().await;
        let entry = Self::find(&rooms, id_or_code).await?;
        let mut entry = entry.lock().await;
        entry.room.add_member(member.clone())?;
        let room = entry.room.clone();
        info!("👋 {} joined room {}", member.name, room.code);
        entry.publish(
            RoomEvent::PlayerJoined {
                room_id: room.id.clone(),
                player: member.clone(),
            },
            Some(&member.id),
        );
        Ok(room)
    }

    /// Removes a member. Returns the room as it stands afterwards, or `None`
    /// when the last member left and the room was closed.
    ///
    /// The set of rooms stays write-locked until the member is gone, so a
    /// join can never land in a room that is about to be closed.
    pub async fn leave_room(&self, room_id: &str, player_id: &str) -> RoomResult<Option<Room>> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::not_found(room_id))?;
        let mut guard = entry.lock().await;
        let new_host = guard.room.remove_member(player_id)?;

        if guard.room.players.is_empty() {
            drop(guard);
            rooms.remove(room_id);
            info!("Room {} closed", room_id);
            return Ok(None);
        }
        drop(rooms);

        guard.publish(
            RoomEvent::PlayerLeft {
                room_id: room_id.to_string(),
                player_id: player_id.to_string(),
            },
            None,
        );
        if let Some(host) = new_host {
            info!("👑 {} is now host of room {}", host, room_id);
            guard.publish(
                RoomEvent::HostChanged {
                    room_id: room_id.to_string(),
                    host,
                },
                None,
            );
        }
        Ok(Some(guard.room.clone()))
    }

    pub async fn get_room(&self, room_id: &str) -> RoomResult<Room> {
        let entry = self.entry(room_id).await?;
        let room = entry.lock().await.room.clone();
        Ok(room)
    }

    pub async fn list_rooms(&self) -> Vec<Room> {
        let rooms = self.rooms.read().await;
        let mut listed = Vec::with_capacity(rooms.len());
        for entry in rooms.values() {
            listed.push(entry.lock().await.room.clone());
        }
        listed.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
        listed
    }

    pub async fn subscribe(&self, room_id: &str, player_id: &str) -> RoomResult<Subscription> {
        let entry = self.entry(room_id).await?;
        let entry = entry.lock().await;
        if !entry.room.is_member(player_id) {
            return Err(RoomError::not_a_member(player_id));
        }
        Ok(Subscription::new(
            room_id.to_string(),
            player_id.to_string(),
            entry.events.subscribe(),
        ))
    }

    /// Relays `message` to the room, skipping `exclude`. Returns how many
    /// subscribers it was queued for.
    pub async fn broadcast(
        &self,
        room_id: &str,
        message: ActionMessage,
        exclude: Option<&str>,
    ) -> RoomResult<usize> {
        let entry = self.entry(room_id).await?;
        let entry = entry.lock().await;
        if !entry.room.is_member(&message.player_id) {
            return Err(RoomError::not_a_member(message.player_id));
        }
        debug!("📡 {} from {} in room {}", message.action.kind(), message.player_name, room_id);
        Ok(entry.publish(RoomEvent::Action(message), exclude))
    }

    pub async fn is_host(&self, room_id: &str, player_id: &str) -> bool {
        match self.entry(room_id).await {
            Ok(entry) => entry.lock().await.room.is_host(player_id),
            Err(_) => false,
        }
    }

    pub async fn player_count(&self, room_id: &str) -> usize {
        match self.entry(room_id).await {
            Ok(entry) => entry.lock().await.room.player_count(),
            Err(_) => 0,
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[async_trait]
impl Relay for RoomRegistry {
    async fn create_room(&self, config: RoomConfig) -> RoomResult<Room> {
        RoomRegistry::create_room(self, config).await
    }

    async fn join_room(&self, id_or_code: &str, member: RoomMember) -> RoomResult<Room> {
        RoomRegistry::join_room(self, id_or_code, member).await
    }

    async fn leave_room(&self, room_id: &str, player_id: &str) -> RoomResult<Option<Room>> {
        RoomRegistry::leave_room(self, room_id, player_id).await
    }

    async fn broadcast(
        &self,
        room_id: &str,
        message: ActionMessage,
        exclude: Option<&str>,
    ) -> UnoResult<()> {
        RoomRegistry::broadcast(self, room_id, message, exclude)
            .await
            .map(|_| ())
            .map_err(|err| NetworkError::send_failed(err.to_string()).into())
    }

    async fn subscribe(&self, room_id: &str, player_id: &str) -> RoomResult<Subscription> {
        RoomRegistry::subscribe(self, room_id, player_id).await
    }

    async fn is_host(&self, room_id: &str, player_id: &str) -> bool {
        RoomRegistry::is_host(self, room_id, player_id).await
    }

    async fn player_count(&self, room_id: &str) -> usize {
        RoomRegistry::player_count(self, room_id).await
    }

    async fn get_room(&self, room_id: &str) -> RoomResult<Room> {
        RoomRegistry::get_room(self, room_id).await
    }
}
