use std::net::SocketAddr;
use std::time::Duration;

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Construction parameters were rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport-level error (bind, accept).
    #[error("transport error: {0}")]
    Transport(#[from] mllpgate_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] mllpgate_frame::FrameError),

    /// Acknowledgment could not be built.
    #[error("hl7 error: {0}")]
    Hl7(#[from] mllpgate_hl7::Hl7Error),

    /// A message with the same control id is still awaiting its acknowledgment.
    #[error("message {id} already in progress")]
    DuplicateInFlight { id: String },

    /// The connection that delivered the message has already gone away.
    #[error("connection to {0} is gone")]
    ConnectionGone(SocketAddr),
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors reported by a single outbound exchange.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Could not reach the receiving host.
    #[error("transport error: {0}")]
    Transport(#[from] mllpgate_transport::TransportError),

    /// Writing the frame or reading the response failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No response arrived within the configured limit.
    #[error("no acknowledgment after {0:?}")]
    Timeout(Duration),

    /// The receiver closed the connection without responding.
    #[error("connection closed before an acknowledgment arrived")]
    ConnectionClosed,

    /// The response had no acknowledgment line after the header.
    #[error("response carries no acknowledgment line")]
    MalformedAck,
}
