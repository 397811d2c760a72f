//! WebSocket connection handler
//!
//! Handles individual connections: WebSocket handshake on the configured
//! path, a write pump draining the peer's outbound channel, and a read
//! adapter feeding text frames into the session.

use std::future::Future;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::connection::{MessageSource, Peer};
use crate::error::RelayError;
use crate::session::SessionHandler;

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, runs the session to completion and
/// closes the socket. Errors are returned for the accept loop to log.
pub async fn handle_connection(
    stream: TcpStream,
    session: SessionHandler,
    config: &RelayConfig,
) -> Result<(), RelayError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake, only on the signaling endpoint
    let ws_path = config.ws_path.clone();
    let ws_stream =
        tokio_tungstenite::accept_hdr_async(stream, move |req: &Request, resp: Response| {
            check_path(&ws_path, req, resp)
        })
        .await?;
    let (ws_sender, mut ws_receiver) = ws_stream.split();

    let (msg_tx, msg_rx) = mpsc::channel::<String>(config.outbound_buffer);
    let peer = Peer::new(msg_tx);
    info!("Connection {} established from {}", peer.id(), peer_addr);

    // Spawn write task (outbound channel -> WebSocket)
    let write_task = tokio::spawn(write_pump(ws_sender, msg_rx, peer.shutdown_token()));

    let result = session.run(&mut ws_receiver, peer.clone()).await;

    peer.close();
    if let Err(e) = write_task.await {
        error!("Write task for {} failed: {}", peer.id(), e);
    }

    info!("Connection {} closed", peer.id());

    result
}

/// Accept the upgrade only on the configured endpoint
fn check_path(ws_path: &str, req: &Request, resp: Response) -> Result<Response, ErrorResponse> {
    if req.uri().path() == ws_path {
        return Ok(resp);
    }
    warn!("Rejecting upgrade on {}", req.uri().path());
    let mut err = ErrorResponse::new(Some("Not Found".to_string()));
    *err.status_mut() = StatusCode::NOT_FOUND;
    Err(err)
}

/// Drain the outbound channel onto the socket until shutdown
///
/// A failed write cancels the shutdown token so the session ends too.
async fn write_pump<S>(
    mut ws_sender: SplitSink<WebSocketStream<S>, Message>,
    mut msg_rx: mpsc::Receiver<String>,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = msg_rx.recv() => {
                let Some(text) = msg else {
                    break;
                };
                if let Err(e) = ws_sender.send(Message::Text(text)).await {
                    debug!("WebSocket send failed, ending write task: {}", e);
                    shutdown.cancel();
                    break;
                }
            }
        }
    }
    debug!("Write task ended");

    // Send close frame when done
    let _ = ws_sender.close().await;
}

/// Text frames from the read half of a WebSocket
///
/// Binary frames holding valid UTF-8 are treated as text. Ping, pong and
/// raw frames are skipped; tungstenite answers pings itself.
impl<S> MessageSource for SplitStream<WebSocketStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn receive(&mut self) -> impl Future<Output = Result<Option<String>, RelayError>> + Send {
        async move {
            while let Some(msg_result) = self.next().await {
                match msg_result? {
                    Message::Text(text) => return Ok(Some(text)),
                    Message::Binary(data) => match String::from_utf8(data) {
                        Ok(text) => return Ok(Some(text)),
                        Err(_) => warn!("Skipping non-UTF-8 binary frame"),
                    },
                    Message::Close(_) => {
                        debug!("Peer sent close frame");
                        return Ok(None);
                    }
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                }
            }
            Ok(None)
        }
    }
}
