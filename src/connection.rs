//! Connection capability consumed by the relay core
//!
//! The core never touches the socket. Each connection is seen as:
//! - a `Peer` handle for sending and closing, shared by every room the
//!   connection belongs to
//! - a `MessageSource` for receiving, owned by the connection's session

use std::future::Future;
use std::hash::{Hash, Hasher};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::error::{RelayError, SendError};
use crate::types::ConnectionId;

/// Send/close handle for one connection
///
/// Sends go into a bounded channel drained by the connection's write
/// pump, so a slow or broken recipient never blocks the sender.
/// Equality and hashing use the connection id only.
#[derive(Debug, Clone)]
pub struct Peer {
    id: ConnectionId,
    outbound: mpsc::Sender<String>,
    shutdown: CancellationToken,
}

impl Peer {
    /// Create a peer around the sending half of its outbound channel
    pub fn new(outbound: mpsc::Sender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            outbound,
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a peer together with the receiver its write pump drains
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a payload without waiting
    ///
    /// Fails if the buffer is full or the connection is gone; the caller
    /// treats either as the peer being defunct.
    pub fn send(&self, payload: String) -> Result<(), SendError> {
        if self.shutdown.is_cancelled() {
            return Err(SendError::ChannelClosed);
        }
        self.outbound.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Backpressure,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Ask the connection to shut down
    ///
    /// Idempotent. Both the session's read loop and the write pump stop.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once `close` has been called
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    /// Token shared with the write pump
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Peer {}

impl Hash for Peer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Receiving half of a connection
///
/// `Ok(None)` is a clean close. Any error is fatal for the session.
pub trait MessageSource: Send {
    fn receive(&mut self) -> impl Future<Output = Result<Option<String>, RelayError>> + Send;
}

/// In-memory transport, used to drive sessions without sockets
impl MessageSource for mpsc::Receiver<String> {
    fn receive(&mut self) -> impl Future<Output = Result<Option<String>, RelayError>> + Send {
        async move { Ok(self.recv().await) }
    }
}
