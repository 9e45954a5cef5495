use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use mllpgate_frame::FrameError;
use mllpgate_hl7::Message;
use tokio::sync::mpsc;

use crate::registry::ConnectionState;

/// A message received on an inbound connection, awaiting acknowledgment.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// MSH-10, or a generated id when the message carries none.
    pub id: String,
    /// Code the timeout will answer with.
    pub ack: String,
    /// Payload decoded with the declared charset.
    pub text: String,
    pub message: Message,
    /// Payload bytes exactly as framed on the wire.
    pub raw: Bytes,
}

/// Notifications surfaced to the application.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// The listening socket is bound.
    Ready(ConnectionState),
    /// An inbound connection opened.
    Connected(ConnectionState),
    /// The set of open connections changed.
    StateChanged(ConnectionState),
    /// A peer ended its side of an inbound connection.
    PeerEnded(ConnectionState),
    /// An inbound connection finished closing.
    Disconnected(ConnectionState),
    /// The listening socket closed. Emitted once per server, never for a
    /// single connection; see [`ServerEvent::PeerEnded`].
    Closed(ConnectionState),
    /// A connection failed; the server keeps serving others.
    Error {
        remote: SocketAddr,
        error: Arc<FrameError>,
    },
    Message(IncomingMessage),
}

/// Receiving end of a server's notifications.
pub type EventStream = mpsc::UnboundedReceiver<ServerEvent>;

#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl EventSink {
    pub(crate) fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Dropped silently when nobody listens.
    pub(crate) fn emit(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }
}
