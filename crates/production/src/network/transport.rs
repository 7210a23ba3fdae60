//! Outbound calls.

use super::codec::{read_frame, write_frame, CodecError};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use twophase_messages::{Request, Response};

/// Bounds on a single call.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long to wait for the TCP connection.
    pub connect_timeout: Duration,

    /// How long to wait for the response once connected.
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(3),
        }
    }
}

impl TransportConfig {
    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Errors making a call. Callers log these; none is fatal after startup.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(SocketAddr),

    #[error("Timed out waiting for {0}")]
    RequestTimeout(SocketAddr),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Peer rejected request: {0}")]
    Remote(String),
}

/// Request/response client. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    config: TransportConfig,
}

impl Transport {
    /// Create a transport with the given bounds.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Send `request` to `addr` and wait for the response.
    ///
    /// A `Response::Error` from the peer is returned as
    /// [`TransportError::Remote`].
    pub async fn request(&self, addr: SocketAddr, request: &Request) -> Result<Response, TransportError> {
        let mut stream = self.connect(addr).await?;
        let exchange = async {
            write_frame(&mut stream, request).await?;
            read_frame::<_, Response>(&mut stream).await
        };
        match timeout(self.config.request_timeout, exchange).await {
            Err(_) => Err(TransportError::RequestTimeout(addr)),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(Response::Error(reason))) => Err(TransportError::Remote(reason)),
            Ok(Ok(response)) => Ok(response),
        }
    }

    /// Check that something accepts connections at `addr`.
    pub async fn check_reachable(&self, addr: SocketAddr) -> Result<(), TransportError> {
        self.connect(addr).await.map(drop)
    }

    async fn connect(&self, addr: SocketAddr) -> Result<TcpStream, TransportError> {
        match timeout(self.config.connect_timeout, TcpStream::connect(addr)).await {
            Err(_) => Err(TransportError::ConnectTimeout(addr)),
            Ok(Err(source)) => Err(TransportError::Connect { addr, source }),
            Ok(Ok(stream)) => Ok(stream),
        }
    }
}
