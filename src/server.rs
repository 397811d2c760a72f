//! Relay server
//!
//! Owns the listener and the shared `RoomRegistry`, and spawns one task
//! per accepted connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::handler::handle_connection;
use crate::registry::RoomRegistry;
use crate::session::SessionHandler;

pub struct RelayServer {
    listener: TcpListener,
    session: SessionHandler,
    config: Arc<RelayConfig>,
}

impl RelayServer {
    /// Bind to `config.bind_addr` with a fresh registry
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        Ok(Self::from_listener(listener, Arc::new(RoomRegistry::new()), config))
    }

    /// Serve on an already bound listener with the given registry
    pub fn from_listener(
        listener: TcpListener,
        registry: Arc<RoomRegistry>,
        config: RelayConfig,
    ) -> Self {
        Self {
            listener,
            session: SessionHandler::new(registry),
            config: Arc::new(config),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(self.session.registry())
    }

    /// Run the accept loop
    ///
    /// Only returns if the process is shutting down; accept errors are
    /// logged and the loop continues.
    pub async fn run(self) {
        info!(
            "Signaling relay listening on {} (endpoint {})",
            self.listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| self.config.bind_addr.clone()),
            self.config.ws_path
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let session = self.session.clone();
                    let config = Arc::clone(&self.config);

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, session, &config).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
