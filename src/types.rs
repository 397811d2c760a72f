//! Basic type definitions for the signaling relay
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based identity of one live connection
//! - `RoomId`: opaque room name chosen by the peers
//! - `Role`: which side of the negotiation a connection joined as

use std::str::FromStr;

use uuid::Uuid;

use crate::error::RelayError;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Room membership is tested against this id,
/// never against anything the peer sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier
///
/// Opaque and case-sensitive. Private rooms derive their name from
/// the parent room and the client id carried in `accept-private`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Name of the private room split off from this one for `client_id`
    pub fn private_for(&self, client_id: &str) -> Self {
        Self(format!("{}-private-{}", self.0, client_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role declared in the join handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

impl FromStr for Role {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Role::Host),
            "client" => Ok(Role::Client),
            other => Err(RelayError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => write!(f, "host"),
            Role::Client => write!(f, "client"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_private_room_name() {
        let room = RoomId::new("abc");
        assert_eq!(room.private_for("A1"), RoomId::new("abc-private-A1"));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("host".parse::<Role>().unwrap(), Role::Host);
        assert_eq!("client".parse::<Role>().unwrap(), Role::Client);
        assert!(matches!(
            "HOST".parse::<Role>(),
            Err(RelayError::UnknownRole(r)) if r == "HOST"
        ));
    }
}
