//! WebSocket Signaling Relay Library
//!
//! Lets one host peer and many client peers find each other by room id
//! and exchange WebRTC negotiation payloads, with optional one-on-one
//! private rooms split off by the host. Built with tokio-tungstenite.
//!
//! # Protocol
//! - First message: `JOIN:<roomId>:<role>` with role `host` or `client`
//! - Then JSON envelopes tagged by `type`: `chat`, `request-private`,
//!   `accept-private`, `reject-private`, or anything else (relayed as-is)
//! - Clients may move rooms mid-session with `JOIN:<newRoomId>`
//!
//! # Architecture
//! Task per connection, sharing one `RoomRegistry`:
//! - `RoomRegistry` maps room ids to rooms behind a single map lock
//! - each `Room` guards its host and clients with its own lock
//! - `SessionHandler` runs the join handshake and read loop
//! - `MessageRouter` decides who receives each message
//! - writes go through per-connection bounded channels, never blocking
//!   the sender or holding a lock
//!
//! # Example
//! ```ignore
//! use signal_relay::{RelayConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = RelayServer::bind(RelayConfig::default()).await.unwrap();
//!     server.run().await;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod room;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use config::RelayConfig;
pub use connection::{MessageSource, Peer};
pub use error::{RelayError, SendError};
pub use handler::handle_connection;
pub use message::{Envelope, Handshake, Notice};
pub use registry::RoomRegistry;
pub use room::Room;
pub use router::{Membership, MessageRouter, Route};
pub use server::RelayServer;
pub use session::SessionHandler;
pub use types::{ConnectionId, Role, RoomId};
