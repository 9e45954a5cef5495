//! MLLP gateway server: acknowledgment correlation over framed TCP.
//!
//! Inbound messages are registered by control id, surfaced as
//! [`ServerEvent::Message`], and answered exactly once: either through
//! [`MllpServer::respond`] or by the default acknowledgment once the
//! configured timeout passes. [`send`] performs a single outbound exchange.

pub mod config;
pub mod connection;
pub mod correlator;
pub mod error;
pub mod event;
mod listener;
pub mod outcome;
pub mod registry;
pub mod scheduler;
pub mod sender;
pub mod server;

pub use config::{SendConfig, ServerConfig, DEFAULT_ACK_TIMEOUT, DEFAULT_SHUTDOWN_GRACE};
pub use connection::{ConnectionHandle, ConnectionId};
pub use correlator::Correlator;
pub use error::{Result, SendError, ServerError};
pub use event::{EventStream, IncomingMessage, ServerEvent};
pub use outcome::{AckOutcome, Resolution};
pub use registry::{ConnectionRegistry, ConnectionState};
pub use scheduler::AckTimer;
pub use sender::{extract_ack_line, send, send_with_config};
pub use server::MllpServer;
