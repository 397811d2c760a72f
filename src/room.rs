//! Room struct definition
//!
//! A signaling room: at most one host and any number of clients.
//! Every method takes the room's own lock for the membership change
//! only; payloads are written after the lock is released.

use std::collections::HashSet;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connection::Peer;
use crate::types::{ConnectionId, RoomId};

/// Mutable membership, guarded by `Room::state`
#[derive(Debug, Default)]
struct RoomState {
    /// Current host (None until a host joins, or after it leaves)
    host: Option<Peer>,
    /// Joined clients; never contains the host
    clients: HashSet<Peer>,
}

/// Signaling room
///
/// Shared as `Arc<Room>` between the registry and the sessions of its
/// members.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    state: Mutex<RoomState>,
}

impl Room {
    /// Create an empty room with no host
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            state: Mutex::new(RoomState::default()),
        }
    }

    /// Create a room with the given host and no clients
    pub fn with_host(id: RoomId, host: Peer) -> Self {
        Self {
            id,
            state: Mutex::new(RoomState {
                host: Some(host),
                clients: HashSet::new(),
            }),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Add a client
    ///
    /// Returns false if it was already a member or is this room's host.
    pub async fn add_client(&self, peer: Peer) -> bool {
        let mut state = self.state.lock().await;
        if state.host.as_ref() == Some(&peer) {
            return false;
        }
        state.clients.insert(peer)
    }

    /// Remove a client; a no-op for non-members
    pub async fn remove_client(&self, peer: &Peer) -> bool {
        self.state.lock().await.clients.remove(peer)
    }

    /// Replace the host, returning the previous one
    pub async fn set_host(&self, peer: Peer) -> Option<Peer> {
        let mut state = self.state.lock().await;
        state.clients.remove(&peer);
        state.host.replace(peer)
    }

    /// Drop the host reference, returning it
    pub async fn clear_host(&self) -> Option<Peer> {
        self.state.lock().await.host.take()
    }

    /// Drop the host reference only if it is still `id`
    pub async fn clear_host_if(&self, id: ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        if state.host.as_ref().map(Peer::id) == Some(id) {
            state.host = None;
            true
        } else {
            false
        }
    }

    pub async fn host(&self) -> Option<Peer> {
        self.state.lock().await.host.clone()
    }

    pub async fn has_host(&self) -> bool {
        self.state.lock().await.host.is_some()
    }

    pub async fn is_hosted_by(&self, id: ConnectionId) -> bool {
        self.state.lock().await.host.as_ref().map(Peer::id) == Some(id)
    }

    /// Snapshot of the current clients
    pub async fn clients(&self) -> Vec<Peer> {
        self.state.lock().await.clients.iter().cloned().collect()
    }

    pub async fn client_count(&self) -> usize {
        self.state.lock().await.clients.len()
    }

    pub async fn contains_client(&self, peer: &Peer) -> bool {
        self.state.lock().await.clients.contains(peer)
    }

    /// Write `payload` to every client
    ///
    /// Returns the number of successful deliveries. Failed recipients are
    /// evicted and closed; delivery to the rest continues.
    pub async fn broadcast_to_clients(&self, payload: &str) -> usize {
        let recipients = self.clients().await;
        self.deliver(recipients, payload).await
    }

    /// Write `payload` to the host and every client
    pub async fn broadcast_to_all(&self, payload: &str) -> usize {
        let recipients = {
            let state = self.state.lock().await;
            state
                .host
                .iter()
                .chain(state.clients.iter())
                .cloned()
                .collect::<Vec<_>>()
        };
        self.deliver(recipients, payload).await
    }

    /// Write `payload` to the host, if any
    ///
    /// Returns false when there is no host or the write failed.
    pub async fn forward_to_host(&self, payload: &str) -> bool {
        let Some(host) = self.host().await else {
            debug!("Room {} has no host, dropping forward", self.id);
            return false;
        };
        self.deliver(vec![host], payload).await == 1
    }

    /// Send to each recipient independently, then evict failures
    async fn deliver(&self, recipients: Vec<Peer>, payload: &str) -> usize {
        let mut delivered = 0;
        let mut defunct = Vec::new();

        for peer in recipients {
            match peer.send(payload.to_string()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Send to {} in room {} failed: {}", peer.id(), self.id, e);
                    defunct.push(peer);
                }
            }
        }

        if !defunct.is_empty() {
            let mut state = self.state.lock().await;
            for peer in &defunct {
                // The host's own session tears the room down once closed
                state.clients.remove(peer);
            }
        }
        for peer in defunct {
            peer.close();
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> (Peer, tokio::sync::mpsc::Receiver<String>) {
        Peer::channel(8)
    }

    #[tokio::test]
    async fn test_room_creation() {
        let room = Room::new(RoomId::new("abc"));

        assert_eq!(room.id(), &RoomId::new("abc"));
        assert!(!room.has_host().await);
        assert_eq!(room.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_room_add_remove_client() {
        let room = Room::new(RoomId::new("abc"));
        let (a, _rx_a) = peer();
        let (b, _rx_b) = peer();

        assert!(room.add_client(a.clone()).await);
        assert!(!room.add_client(a.clone()).await);
        assert!(room.add_client(b.clone()).await);
        assert_eq!(room.client_count().await, 2);

        assert!(room.remove_client(&a).await);
        assert!(!room.remove_client(&a).await);
        assert!(room.contains_client(&b).await);
        assert!(!room.contains_client(&a).await);
    }

    #[tokio::test]
    async fn test_room_host_replacement_keeps_clients() {
        let (h1, _rx1) = peer();
        let (h2, _rx2) = peer();
        let (c, _rx_c) = peer();
        let room = Room::with_host(RoomId::new("abc"), h1.clone());
        room.add_client(c.clone()).await;

        let previous = room.set_host(h2.clone()).await;

        assert_eq!(previous, Some(h1.clone()));
        assert_eq!(room.host().await, Some(h2.clone()));
        assert!(room.is_hosted_by(h2.id()).await);
        assert!(!room.is_hosted_by(h1.id()).await);
        assert!(room.contains_client(&c).await);
    }

    #[tokio::test]
    async fn test_room_host_never_a_client() {
        let (h, _rx_h) = peer();
        let room = Room::new(RoomId::new("abc"));
        room.add_client(h.clone()).await;

        room.set_host(h.clone()).await;
        assert!(!room.contains_client(&h).await);
        assert!(!room.add_client(h.clone()).await);
    }

    #[tokio::test]
    async fn test_room_clear_host_if() {
        let (h, _rx_h) = peer();
        let (other, _rx_o) = peer();
        let room = Room::with_host(RoomId::new("abc"), h.clone());

        assert!(!room.clear_host_if(other.id()).await);
        assert!(room.has_host().await);
        assert!(room.clear_host_if(h.id()).await);
        assert!(!room.has_host().await);
        assert_eq!(room.clear_host().await, None);
    }

    #[tokio::test]
    async fn test_broadcast_to_clients_excludes_host() {
        let (h, mut rx_h) = peer();
        let (a, mut rx_a) = peer();
        let (b, mut rx_b) = peer();
        let room = Room::with_host(RoomId::new("abc"), h);
        room.add_client(a).await;
        room.add_client(b).await;

        assert_eq!(room.broadcast_to_clients(r#"{"type":"ping"}"#).await, 2);

        assert_eq!(rx_a.recv().await.as_deref(), Some(r#"{"type":"ping"}"#));
        assert_eq!(rx_b.recv().await.as_deref(), Some(r#"{"type":"ping"}"#));
        assert!(rx_h.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_to_all_includes_host() {
        let (h, mut rx_h) = peer();
        let (a, mut rx_a) = peer();
        let room = Room::with_host(RoomId::new("abc"), h);
        room.add_client(a).await;

        assert_eq!(room.broadcast_to_all("hello").await, 2);
        assert_eq!(rx_h.recv().await.as_deref(), Some("hello"));
        assert_eq!(rx_a.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_broadcast_partial_delivery_evicts_defunct() {
        let room = Room::new(RoomId::new("abc"));
        let (alive, mut rx_alive) = peer();
        let (dead, rx_dead) = peer();
        drop(rx_dead);
        room.add_client(alive.clone()).await;
        room.add_client(dead.clone()).await;

        assert_eq!(room.broadcast_to_clients("hi").await, 1);

        assert_eq!(rx_alive.recv().await.as_deref(), Some("hi"));
        assert!(!room.contains_client(&dead).await);
        assert!(dead.is_closed());
        assert!(room.contains_client(&alive).await);
    }

    #[tokio::test]
    async fn test_slow_client_marked_defunct() {
        let room = Room::new(RoomId::new("abc"));
        let (slow, _rx_slow) = Peer::channel(1);
        room.add_client(slow.clone()).await;

        assert_eq!(room.broadcast_to_clients("one").await, 1);
        assert_eq!(room.broadcast_to_clients("two").await, 0);
        assert!(slow.is_closed());
        assert_eq!(room.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_forward_to_host() {
        let room = Room::new(RoomId::new("abc"));
        assert!(!room.forward_to_host("offer").await);

        let (h, mut rx_h) = peer();
        room.set_host(h).await;
        assert!(room.forward_to_host("offer").await);
        assert_eq!(rx_h.recv().await.as_deref(), Some("offer"));
    }
}
