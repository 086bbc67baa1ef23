use futures::stream::{Stream, StreamExt};
use log::warn;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_stream::wrappers::BroadcastStream;

use crate::actions::ActionMessage;
use crate::errors::{PlayerId, RoomId};

use super::room::RoomMember;

/// What a room tells its members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum RoomEvent {
    PlayerJoined { room_id: RoomId, player: RoomMember },
    PlayerLeft { room_id: RoomId, player_id: PlayerId },
    HostChanged { room_id: RoomId, host: PlayerId },
    Action(ActionMessage),
}

/// A room event plus the member it must not be delivered to.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub event: RoomEvent,
    pub exclude: Option<PlayerId>,
}

impl Dispatch {
    fn is_for(&self, player_id: &str) -> bool {
        self.exclude.as_deref() != Some(player_id)
    }
}

/// One member's feed of room events. Dropping it unsubscribes.
pub struct Subscription {
    room_id: RoomId,
    player_id: PlayerId,
    receiver: broadcast::Receiver<Dispatch>,
}

impl Subscription {
    pub fn new(room_id: RoomId, player_id: PlayerId, receiver: broadcast::Receiver<Dispatch>) -> Self {
        Self {
            room_id,
            player_id,
            receiver,
        }
    }

    /// Next event addressed to this member; `None` once the room is gone.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(dispatch) if dispatch.is_for(&self.player_id) => return Some(dispatch.event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Subscriber {} in room {} lagged, {} events skipped",
                        self.player_id, self.room_id, skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next event already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<RoomEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(dispatch) if dispatch.is_for(&self.player_id) => return Some(dispatch.event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Subscriber {} lagged, {} events skipped", self.player_id, skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Converts the subscription into a stream, for forwarding to a socket.
    pub fn into_stream(self) -> impl Stream<Item = RoomEvent> + Send + 'static {
        let player_id = self.player_id;
        BroadcastStream::new(self.receiver).filter_map(move |item| {
            let event = match item {
                Ok(dispatch) if dispatch.is_for(&player_id) => Some(dispatch.event),
                Ok(_) => None,
                Err(err) => {
                    warn!("Dropped events for {}: {}", player_id, err);
                    None
                }
            };
            futures::future::ready(event)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(name: &str) -> RoomEvent {
        RoomEvent::PlayerJoined {
            room_id: "r".to_string(),
            player: RoomMember::new(name.to_lowercase(), name),
        }
    }

    #[tokio::test]
    async fn test_excluded_member_skips_event() {
        let (tx, _) = broadcast::channel(8);
        let mut alice = Subscription::new("r".into(), "a".into(), tx.subscribe());
        let mut bob = Subscription::new("r".into(), "b".into(), tx.subscribe());

        tx.send(Dispatch {
            event: joined("Cara"),
            exclude: Some("a".to_string()),
        })
        .unwrap();
        tx.send(Dispatch {
            event: joined("Dan"),
            exclude: None,
        })
        .unwrap();

        assert_eq!(alice.recv().await, Some(joined("Dan")));
        assert_eq!(bob.try_recv(), Some(joined("Cara")));
        assert_eq!(bob.try_recv(), Some(joined("Dan")));
        assert_eq!(bob.try_recv(), None);
    }

    #[tokio::test]
    async fn test_stream_ends_when_room_closes() {
        let (tx, _) = broadcast::channel(8);
        let subscription = Subscription::new("r".into(), "a".into(), tx.subscribe());
        tx.send(Dispatch {
            event: joined("Bob"),
            exclude: None,
        })
        .unwrap();
        drop(tx);

        let events: Vec<RoomEvent> = subscription.into_stream().collect().await;
        assert_eq!(events, vec![joined("Bob")]);
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(joined("Bob")).unwrap();
        assert_eq!(json["type"], "playerJoined");
        assert_eq!(json["data"]["roomId"], "r");
        assert_eq!(json["data"]["player"]["name"], "Bob");
    }
}
