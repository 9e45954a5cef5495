use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

/// Listening TCP socket bound to a validated [`Endpoint`].
pub struct TcpTransport {
    listener: TcpListener,
    endpoint: Endpoint,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on the endpoint.
    pub async fn bind(endpoint: Endpoint) -> Result<Self> {
        let addr = endpoint.to_string();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::Bind {
                addr: addr.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.clone(),
            source: e,
        })?;

        info!(
            host = endpoint.display_host(),
            port = endpoint.port(),
            "listening on tcp socket"
        );

        Ok(Self {
            listener,
            endpoint,
            local_addr,
        })
    }

    /// Accept an incoming connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, remote) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        debug!(%remote, "accepted connection");
        Ok((stream, remote))
    }

    /// The endpoint this socket was bound with.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The address the operating system actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

/// Open a new outbound TCP connection.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let addr = format!("{host}:{port}");
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| TransportError::Connect {
            addr: addr.clone(),
            source: e,
        })?;
    debug!(%addr, "connected to tcp endpoint");
    Ok(stream)
}
