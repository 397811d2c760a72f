//! Per-connection session loop
//!
//! Awaiting-Join → Host-Active | Client-Active → closed.
//! The first message must be a `JOIN:<roomId>:<role>` handshake; every
//! later message goes to the `MessageRouter`. Leaving either active state
//! runs the role's cleanup exactly once.

use std::sync::Arc;

use tracing::{debug, info};

use crate::connection::{MessageSource, Peer};
use crate::error::RelayError;
use crate::message::Handshake;
use crate::registry::RoomRegistry;
use crate::router::{Membership, MessageRouter};
use crate::types::Role;

/// Drives one connection through its lifetime
#[derive(Debug, Clone)]
pub struct SessionHandler {
    registry: Arc<RoomRegistry>,
    router: MessageRouter,
}

impl SessionHandler {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            router: MessageRouter::new(Arc::clone(&registry)),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Run the session until the connection closes or fails
    ///
    /// Returns an error for a bad handshake, a client join to a missing or
    /// hostless room, or a read failure. Room cleanup has already happened
    /// by the time this returns.
    pub async fn run<S: MessageSource>(
        &self,
        source: &mut S,
        peer: Peer,
    ) -> Result<(), RelayError> {
        let Some(first) = source.receive().await? else {
            debug!("Connection {} closed before joining", peer.id());
            return Ok(());
        };
        let handshake = Handshake::parse(&first)?;
        info!(
            "Connection {} joining room {} as {}",
            peer.id(),
            handshake.room_id,
            handshake.role
        );

        let mut member = match handshake.role {
            Role::Host => {
                let (room, previous) = self
                    .registry
                    .set_host(&handshake.room_id, peer.clone())
                    .await;
                if let Some(previous) = previous.filter(|p| p != &peer) {
                    info!(
                        "Host {} replaced {} in room {}",
                        peer.id(),
                        previous.id(),
                        handshake.room_id
                    );
                }
                Membership::new(peer, Role::Host, room)
            }
            Role::Client => {
                let room = self
                    .registry
                    .join_as_client(&handshake.room_id, peer.clone())
                    .await?;
                Membership::new(peer, Role::Client, room)
            }
        };

        let result = self.read_loop(source, &mut member).await;
        self.leave(&member).await;
        result
    }

    async fn read_loop<S: MessageSource>(
        &self,
        source: &mut S,
        member: &mut Membership,
    ) -> Result<(), RelayError> {
        loop {
            let next = tokio::select! {
                _ = member.peer.closed() => {
                    debug!("Connection {} closed by relay", member.peer.id());
                    return Ok(());
                }
                next = source.receive() => next?,
            };

            let Some(payload) = next else {
                return Ok(());
            };
            debug!("Message from {} {}: {}", member.role, member.peer.id(), payload);
            let route = self.router.dispatch(member, &payload).await;
            debug!("Routed message from {}: {:?}", member.peer.id(), route);
        }
    }

    async fn leave(&self, member: &Membership) {
        match member.role {
            Role::Host => {
                let id = member.peer.id();
                if self.registry.remove_if_hosted_by(member.room.id(), id).await {
                    info!("Host {} left, room {} closed", id, member.room.id());
                }
                for room_id in &member.private_rooms {
                    if self.registry.remove_if_hosted_by(room_id, id).await {
                        info!("Private room {} closed with its host", room_id);
                    }
                }
            }
            Role::Client => {
                member.room.remove_client(&member.peer).await;
                info!("Client {} left room {}", member.peer.id(), member.room.id());
            }
        }
    }
}
