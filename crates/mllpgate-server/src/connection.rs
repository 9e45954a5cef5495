use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Result, ServerError};

/// Server-assigned connection number.
pub type ConnectionId = u64;

/// Write side of one inbound connection.
///
/// Payloads are queued to the connection's writer task, which frames and
/// writes them in order. Cloning shares the same queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    remote: SocketAddr,
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ConnectionHandle {
    /// Create a handle plus the queue its writer task drains.
    pub fn new(id: ConnectionId, remote: SocketAddr) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, remote, tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Queue an unframed acknowledgment payload.
    pub fn write(&self, payload: Bytes) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| ServerError::ConnectionGone(self.remote))
    }

    /// True once the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
