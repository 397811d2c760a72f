//! Message router
//!
//! Classifies each message read after the join handshake and applies it
//! to the registry and rooms. Decisions depend on the message `type` and
//! the role of the sender:
//!
//! | type              | host                          | client                    |
//! |-------------------|-------------------------------|---------------------------|
//! | `chat`            | broadcast to target room      | broadcast to target room  |
//! | `accept-private`  | open private room, notify     | forward to host           |
//! | `reject-private`  | notify clients                | forward to host           |
//! | `request-private` | forward to clients            | forward to host           |
//! | `JOIN:<room>`     | dropped (not JSON)            | move to room if it exists |
//! | anything else     | forward to clients            | forward to host           |
//!
//! Nothing is ever reported back to the sender. Malformed messages and
//! unreachable targets are logged and dropped, as is anything sent by a
//! host that has since been replaced in its room.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::connection::Peer;
use crate::message::{parse_move_line, Envelope, Notice};
use crate::registry::RoomRegistry;
use crate::room::Room;
use crate::types::{Role, RoomId};

/// Routing state of one connection
///
/// Owned by the connection's session; the router updates `room` when a
/// client moves and records private rooms opened by a host.
#[derive(Debug)]
pub struct Membership {
    pub peer: Peer,
    pub role: Role,
    pub room: Arc<Room>,
    /// Private rooms this host opened with `accept-private`
    pub private_rooms: Vec<RoomId>,
}

impl Membership {
    pub fn new(peer: Peer, role: Role, room: Arc<Room>) -> Self {
        Self {
            peer,
            role,
            room,
            private_rooms: Vec::new(),
        }
    }
}

/// Outcome of routing one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Written to this many connections
    Delivered(usize),
    /// Client moved to another room
    Moved(RoomId),
    /// Private room opened; this many clients notified
    PrivateOpened { room_id: RoomId, notified: usize },
    /// Nothing was written
    Dropped,
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<RoomRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Route one inbound message from `member`
    pub async fn dispatch(&self, member: &mut Membership, payload: &str) -> Route {
        if member.role == Role::Client {
            if let Some(target) = parse_move_line(payload) {
                return self.move_client(member, target).await;
            }
        }

        let envelope = match Envelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed message from {}: {}", member.peer.id(), e);
                return Route::Dropped;
            }
        };

        match member.role {
            Role::Host => self.route_host(member, envelope, payload).await,
            Role::Client => self.route_client(member, envelope, payload).await,
        }
    }

    async fn route_host(
        &self,
        member: &mut Membership,
        envelope: Envelope,
        payload: &str,
    ) -> Route {
        // A replaced host keeps its connection but loses host powers
        if !member.room.is_hosted_by(member.peer.id()).await {
            debug!(
                "{} is no longer host of room {}, dropping message",
                member.peer.id(),
                member.room.id()
            );
            return Route::Dropped;
        }

        match envelope {
            Envelope::Chat { room_id } => self.chat(RoomId::new(room_id), payload).await,
            Envelope::AcceptPrivate { client_id } => self.accept_private(member, &client_id).await,
            Envelope::RejectPrivate { client_id } => {
                let notice = Notice::PrivateRejected { client_id };
                self.notify_clients(&member.room, &notice).await
            }
            Envelope::RequestPrivate {} | Envelope::Other => {
                Route::Delivered(member.room.broadcast_to_clients(payload).await)
            }
        }
    }

    async fn route_client(&self, member: &Membership, envelope: Envelope, payload: &str) -> Route {
        if !member.room.has_host().await {
            debug!(
                "Room {} has no host, dropping message from {}",
                member.room.id(),
                member.peer.id()
            );
            return Route::Dropped;
        }

        match envelope {
            Envelope::Chat { room_id } => self.chat(RoomId::new(room_id), payload).await,
            _ => Route::Delivered(usize::from(member.room.forward_to_host(payload).await)),
        }
    }

    /// Broadcast a chat payload to the host and clients of its target room
    async fn chat(&self, target: RoomId, payload: &str) -> Route {
        let Some(room) = self.registry.get(&target).await else {
            debug!("Chat target {} not found", target);
            return Route::Dropped;
        };
        Route::Delivered(room.broadcast_to_all(payload).await)
    }

    async fn accept_private(&self, member: &mut Membership, client_id: &str) -> Route {
        let room_id = member.room.id().private_for(client_id);
        self.registry
            .create_private(room_id.clone(), member.peer.clone())
            .await;
        if !member.private_rooms.contains(&room_id) {
            member.private_rooms.push(room_id.clone());
        }
        info!("Host {} opened private room {}", member.peer.id(), room_id);

        let notice = Notice::JoinPrivate {
            room_id: room_id.to_string(),
            client_id: client_id.to_string(),
        };
        match self.notify_clients(&member.room, &notice).await {
            Route::Delivered(notified) => Route::PrivateOpened { room_id, notified },
            _ => Route::PrivateOpened { room_id, notified: 0 },
        }
    }

    async fn notify_clients(&self, room: &Room, notice: &Notice) -> Route {
        match notice.to_json() {
            Ok(json) => Route::Delivered(room.broadcast_to_clients(&json).await),
            Err(e) => {
                warn!("Failed to encode notice: {}", e);
                Route::Dropped
            }
        }
    }

    async fn move_client(&self, member: &mut Membership, target: Option<RoomId>) -> Route {
        let Some(target) = target else {
            debug!("Ignoring move line without a room from {}", member.peer.id());
            return Route::Dropped;
        };

        match self
            .registry
            .move_client(&member.peer, &member.room, &target)
            .await
        {
            Some(room) => {
                info!(
                    "Client {} moved from {} to {}",
                    member.peer.id(),
                    member.room.id(),
                    target
                );
                member.room = room;
                Route::Moved(target)
            }
            None => {
                debug!("Move target {} not found, ignoring", target);
                Route::Dropped
            }
        }
    }
}
