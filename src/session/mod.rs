// Session coordinator: rooms, membership and message fan-out.
//
// Participants only ever talk to a `Relay`. `RoomRegistry` is the in-process
// implementation; the relay server exposes the same registry over HTTP and
// WebSocket.

use async_trait::async_trait;

use crate::actions::ActionMessage;
use crate::errors::{RoomResult, UnoResult};

pub mod coordinator;
pub mod room;
pub mod subscription;

pub use self::coordinator::RoomRegistry;
pub use self::room::{generate_room_code, Room, RoomConfig, RoomMember};
pub use self::subscription::{Dispatch, RoomEvent, Subscription};

#[async_trait]
pub trait Relay: Send + Sync {
    async fn create_room(&self, config: RoomConfig) -> RoomResult<Room>;

    /// Joins by room id or by the 6-character code.
    async fn join_room(&self, id_or_code: &str, member: RoomMember) -> RoomResult<Room>;

    async fn leave_room(&self, room_id: &str, player_id: &str) -> RoomResult<Option<Room>>;

    async fn broadcast(
        &self,
        room_id: &str,
        message: ActionMessage,
        exclude: Option<&str>,
    ) -> UnoResult<()>;

    async fn subscribe(&self, room_id: &str, player_id: &str) -> RoomResult<Subscription>;

    async fn is_host(&self, room_id: &str, player_id: &str) -> bool;

    async fn player_count(&self, room_id: &str) -> usize;

    async fn get_room(&self, room_id: &str) -> RoomResult<Room>;
}
