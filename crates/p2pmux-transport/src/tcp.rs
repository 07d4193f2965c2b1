use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::WireStream;

/// Default peer host (a local IPFS daemon).
pub const DEFAULT_HOST: &str = "localhost";

/// Default peer port (IPFS swarm port).
pub const DEFAULT_PORT: u16 = 4001;

/// TCP transport to a fixed `host:port`.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Option<Duration>,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl TcpTransport {
    /// Create a transport for `host:port` without a connect timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: None,
        }
    }

    /// Bound each connect attempt.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// `host:port` as given.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve and connect (blocking). Tries every resolved address in order.
    pub fn connect(&self) -> Result<WireStream> {
        let addr = self.address();
        let candidates: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .collect();

        let mut last_err = std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "address resolved to no candidates",
        );

        for candidate in candidates {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => {
                    info!(%addr, peer = %candidate, "connected");
                    return Ok(WireStream::from_tcp(stream));
                }
                Err(err) => {
                    debug!(peer = %candidate, error = %err, "connect attempt failed");
                    last_err = err;
                }
            }
        }

        Err(TransportError::Connect {
            addr,
            source: last_err,
        })
    }
}
