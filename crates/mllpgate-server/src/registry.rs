use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::connection::ConnectionId;

/// Observable connection state of one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub host: String,
    pub port: u16,
    pub connected: bool,
    /// Open inbound connections as `host:port`, in connect order.
    pub remote: Vec<String>,
}

impl ConnectionState {
    /// Remote endpoints joined by `", "`, or `None` when nothing is connected.
    pub fn remote_list(&self) -> Option<String> {
        if self.remote.is_empty() {
            None
        } else {
            Some(self.remote.join(", "))
        }
    }
}

/// Tracks open inbound sockets.
#[derive(Debug)]
pub struct ConnectionRegistry {
    host: String,
    port: u16,
    open: Mutex<Vec<(ConnectionId, SocketAddr)>>,
}

impl ConnectionRegistry {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            open: Mutex::new(Vec::new()),
        }
    }

    /// Track a new connection and return the updated state.
    pub fn add(&self, id: ConnectionId, remote: SocketAddr) -> ConnectionState {
        let mut open = self.lock();
        open.push((id, remote));
        self.snapshot(&open)
    }

    /// Stop tracking a connection. Returns `None` if it was not tracked.
    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionState> {
        let mut open = self.lock();
        let index = open.iter().position(|(open_id, _)| *open_id == id)?;
        open.remove(index);
        Some(self.snapshot(&open))
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshot(&self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn snapshot(&self, open: &[(ConnectionId, SocketAddr)]) -> ConnectionState {
        ConnectionState {
            host: self.host.clone(),
            port: self.port,
            connected: !open.is_empty(),
            remote: open.iter().map(|(_, addr)| addr.to_string()).collect(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ConnectionId, SocketAddr)>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
