//! Message protocol definitions
//!
//! Two wire shapes share one connection:
//! - colon-delimited control lines (`JOIN:<roomId>:<role>` handshake and
//!   the client's inline `JOIN:<newRoomId>` move)
//! - JSON envelopes tagged by a `type` field, decoded with Serde's
//!   internally tagged enums

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::types::{Role, RoomId};

/// Prefix shared by the handshake and the inline move line
pub const JOIN_PREFIX: &str = "JOIN:";

/// Parsed `JOIN:<roomId>:<role>` handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub room_id: RoomId,
    pub role: Role,
}

impl Handshake {
    /// Parse the first message of a connection
    ///
    /// Exactly three colon-separated fields are required, and the room
    /// id must be non-empty.
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        let parts: Vec<&str> = text.split(':').collect();
        let [keyword, room_id, role] = parts.as_slice() else {
            return Err(RelayError::Handshake(text.to_string()));
        };
        if *keyword != "JOIN" || room_id.is_empty() {
            return Err(RelayError::Handshake(text.to_string()));
        }

        Ok(Self {
            room_id: RoomId::new(*room_id),
            role: role.parse()?,
        })
    }
}

/// Parse an inline room-move line sent by a client mid-session
///
/// Returns `None` when the text is not a `JOIN:` line. A line with an
/// empty target yields `Some(None)` so callers can tell it apart from
/// JSON and ignore it.
pub fn parse_move_line(text: &str) -> Option<Option<RoomId>> {
    let rest = text.strip_prefix(JOIN_PREFIX)?;
    let target = rest.split(':').next().unwrap_or_default();
    if target.is_empty() {
        Some(None)
    } else {
        Some(Some(RoomId::new(target)))
    }
}

/// Inbound JSON envelope
///
/// Known types decode into their own variant; any other `type` lands in
/// `Other` and is relayed verbatim. A missing or non-string `type`, or a
/// known type missing its required field, fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Envelope {
    /// Broadcast to the host and clients of `room_id`
    Chat {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    /// Host accepts a private session with `client_id`
    AcceptPrivate {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    /// Host declines a private session with `client_id`
    RejectPrivate {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    /// Client asks its host for a private session
    RequestPrivate {},
    /// Anything else (SDP offers/answers, ICE candidates, pings)
    #[serde(other)]
    Other,
}

impl Envelope {
    pub fn decode(text: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Outbound envelope generated by the relay itself
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notice {
    /// Tells clients a private room was opened for `client_id`
    JoinPrivate {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "clientId")]
        client_id: String,
    },
    /// Tells clients the host declined `client_id`
    PrivateRejected {
        #[serde(rename = "clientId")]
        client_id: String,
    },
}

impl Notice {
    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}
