//! Error types for the signaling relay
//!
//! Defines relay-level errors and per-peer send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::RoomId;

/// Relay-level errors
///
/// Transport and handshake errors end the affected session. Routing
/// errors are absorbed by the caller and never reach the sender.
#[derive(Debug, Error)]
pub enum RelayError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// First message was not `JOIN:<roomId>:<role>`
    #[error("Invalid join handshake: {0:?}")]
    Handshake(String),

    /// Handshake role was neither `host` nor `client`
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// No room registered under the given id
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// Room exists but has no host to negotiate with
    #[error("Room has no host: {0}")]
    HostAbsent(RoomId),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Message send errors
///
/// Either one marks the recipient defunct.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The connection's write pump is gone
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection's outbound buffer is full
    #[error("Outbound buffer full")]
    Backpressure,
}
