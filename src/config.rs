//! Relay configuration
//!
//! Read from the command line and environment at startup:
//! - bind address: first argument, else `RELAY_ADDR`
//! - WebSocket endpoint: `RELAY_WS_PATH`
//! - per-connection outbound buffer: `RELAY_OUTBOUND_BUFFER`

use std::env;

use crate::error::RelayError;

/// Default listen address
pub const DEFAULT_ADDR: &str = "0.0.0.0:8090";

/// Default WebSocket endpoint
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Default outbound buffer size (messages) per connection
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub ws_path: String,
    pub outbound_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            ws_path: DEFAULT_WS_PATH.to_string(),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

impl RelayConfig {
    /// Build from the process arguments and environment
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_sources(env::args().nth(1), |key| env::var(key).ok())
    }

    /// Build from an optional address argument and a variable lookup
    pub fn from_sources<F>(arg: Option<String>, lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = arg
            .or_else(|| lookup("RELAY_ADDR"))
            .unwrap_or(defaults.bind_addr);

        let ws_path = lookup("RELAY_WS_PATH").unwrap_or(defaults.ws_path);
        if !ws_path.starts_with('/') {
            return Err(RelayError::Config(format!(
                "RELAY_WS_PATH must start with '/': {ws_path:?}"
            )));
        }

        let outbound_buffer = match lookup("RELAY_OUTBOUND_BUFFER") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(RelayError::Config(format!(
                        "RELAY_OUTBOUND_BUFFER must be a positive integer: {raw:?}"
                    )))
                }
            },
            None => defaults.outbound_buffer,
        };

        Ok(Self {
            bind_addr,
            ws_path,
            outbound_buffer,
        })
    }
}
