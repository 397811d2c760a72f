//! Room registry
//!
//! Process-wide map from `RoomId` to `Room`, behind one map-level lock.
//! Lock order is always registry first, then room. Neither lock is held
//! while a payload is written to a connection.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::connection::Peer;
use crate::error::RelayError;
use crate::room::Room;
use crate::types::{ConnectionId, RoomId};

/// Registry of live rooms
///
/// Owned by the server and injected into every session, so each test
/// can start from a fresh one.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the room, creating an empty one if needed
    pub async fn get_or_create(&self, room_id: &RoomId) -> Arc<Room> {
        let mut rooms = self.rooms.lock().await;
        Self::entry(&mut rooms, room_id)
    }

    pub async fn get(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    /// Remove the room; idempotent
    pub async fn delete(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        let removed = self.rooms.lock().await.remove(room_id);
        if removed.is_some() {
            debug!("Room {} deleted", room_id);
        }
        removed
    }

    /// Create the room if needed and make `host` its host
    ///
    /// Returns the room and the host it replaced, if any. Existing clients
    /// are kept.
    pub async fn set_host(&self, room_id: &RoomId, host: Peer) -> (Arc<Room>, Option<Peer>) {
        let mut rooms = self.rooms.lock().await;
        let room = Self::entry(&mut rooms, room_id);
        let previous = room.set_host(host).await;
        (room, previous)
    }

    /// Add `peer` to the clients of an existing room that has a host
    pub async fn join_as_client(
        &self,
        room_id: &RoomId,
        peer: Peer,
    ) -> Result<Arc<Room>, RelayError> {
        let rooms = self.rooms.lock().await;
        let room = rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RelayError::RoomNotFound(room_id.clone()))?;

        if !room.has_host().await {
            return Err(RelayError::HostAbsent(room_id.clone()));
        }
        room.add_client(peer).await;
        Ok(room)
    }

    /// Move a client from `from` into the clients of `to`
    ///
    /// Returns the new room, or `None` (and leaves membership untouched)
    /// if `to` does not exist.
    pub async fn move_client(&self, peer: &Peer, from: &Room, to: &RoomId) -> Option<Arc<Room>> {
        let rooms = self.rooms.lock().await;
        let target = rooms.get(to).cloned()?;

        from.remove_client(peer).await;
        target.add_client(peer.clone()).await;
        Some(target)
    }

    /// Insert a fresh room hosted by `host`, replacing any room of that name
    pub async fn create_private(&self, room_id: RoomId, host: Peer) -> Arc<Room> {
        let room = Arc::new(Room::with_host(room_id.clone(), host));
        let replaced = self
            .rooms
            .lock()
            .await
            .insert(room_id.clone(), Arc::clone(&room));
        if replaced.is_some() {
            info!("Private room {} recreated", room_id);
        }
        room
    }

    /// Delete the room if `host` is still its host
    ///
    /// The host reference is cleared before removal, so members still
    /// holding the room see it as hostless.
    pub async fn remove_if_hosted_by(&self, room_id: &RoomId, host: ConnectionId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(room_id).cloned() else {
            return false;
        };
        if !room.clear_host_if(host).await {
            return false;
        }
        rooms.remove(room_id);
        debug!("Room {} deleted with its host", room_id);
        true
    }

    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }

    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.lock().await.keys().cloned().collect()
    }

    fn entry(rooms: &mut HashMap<RoomId, Arc<Room>>, room_id: &RoomId) -> Arc<Room> {
        let room = rooms.entry(room_id.clone()).or_insert_with(|| {
            debug!("Room {} created", room_id);
            Arc::new(Room::new(room_id.clone()))
        });
        Arc::clone(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let registry = RoomRegistry::new();
        let id = RoomId::new("abc");

        assert!(registry.get(&id).await.is_none());
        let first = registry.get_or_create(&id).await;
        let second = registry.get_or_create(&id).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let registry = RoomRegistry::new();
        let id = RoomId::new("abc");
        registry.get_or_create(&id).await;

        assert!(registry.delete(&id).await.is_some());
        assert!(registry.delete(&id).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_host_then_clients() {
        let registry = RoomRegistry::new();
        let id = RoomId::new("abc");
        let (h1, _rx_h1) = Peer::channel(4);
        let (h2, _rx_h2) = Peer::channel(4);

        let (room, previous) = registry.set_host(&id, h1.clone()).await;
        assert!(previous.is_none());

        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (c, rx) = Peer::channel(4);
            registry.join_as_client(&id, c).await.unwrap();
            receivers.push(rx);
        }

        let (same, previous) = registry.set_host(&id, h2.clone()).await;
        assert!(Arc::ptr_eq(&room, &same));
        assert_eq!(previous, Some(h1));
        assert_eq!(room.host().await, Some(h2));
        assert_eq!(room.client_count().await, 5);
    }

    #[tokio::test]
    async fn test_join_as_client_requires_room_and_host() {
        let registry = RoomRegistry::new();
        let id = RoomId::new("abc");
        let (c, _rx) = Peer::channel(4);

        let err = registry.join_as_client(&id, c.clone()).await.unwrap_err();
        assert!(matches!(err, RelayError::RoomNotFound(_)));
        assert!(registry.get(&id).await.is_none());

        registry.get_or_create(&id).await;
        let err = registry.join_as_client(&id, c).await.unwrap_err();
        assert!(matches!(err, RelayError::HostAbsent(_)));
    }

    #[tokio::test]
    async fn test_move_client() {
        let registry = RoomRegistry::new();
        let (h, _rx_h) = Peer::channel(4);
        let (c, _rx_c) = Peer::channel(4);
        let from = RoomId::new("abc");
        let to = RoomId::new("def");
        let (src, _) = registry.set_host(&from, h).await;
        registry.join_as_client(&from, c.clone()).await.unwrap();

        assert!(registry.move_client(&c, &src, &RoomId::new("nope")).await.is_none());
        assert!(src.contains_client(&c).await);

        let dst = registry.get_or_create(&to).await;
        let moved = registry.move_client(&c, &src, &to).await.unwrap();
        assert!(Arc::ptr_eq(&moved, &dst));
        assert!(!src.contains_client(&c).await);
        assert!(dst.contains_client(&c).await);
    }

    #[tokio::test]
    async fn test_create_private_replaces() {
        let registry = RoomRegistry::new();
        let id = RoomId::new("abc-private-c1");
        let (h, _rx_h) = Peer::channel(4);
        let (c, _rx_c) = Peer::channel(4);

        let first = registry.create_private(id.clone(), h.clone()).await;
        first.add_client(c).await;
        let second = registry.create_private(id.clone(), h.clone()).await;

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.room_ids().await, vec![id.clone()]);
        assert_eq!(second.client_count().await, 0);
        assert_eq!(second.host().await, Some(h));
    }

    #[tokio::test]
    async fn test_remove_if_hosted_by() {
        let registry = RoomRegistry::new();
        let id = RoomId::new("abc");
        let (old, _rx_old) = Peer::channel(4);
        let (new, _rx_new) = Peer::channel(4);
        registry.set_host(&id, old.clone()).await;
        let (room, _) = registry.set_host(&id, new.clone()).await;

        // Stale host leaving must not tear down the reconnected host's room
        assert!(!registry.remove_if_hosted_by(&id, old.id()).await);
        assert!(registry.get(&id).await.is_some());

        assert!(registry.remove_if_hosted_by(&id, new.id()).await);
        assert!(registry.get(&id).await.is_none());
        assert!(!room.has_host().await);
        assert!(!registry.remove_if_hosted_by(&id, new.id()).await);
    }
}
