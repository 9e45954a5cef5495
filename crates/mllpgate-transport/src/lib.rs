//! TCP transport layer for the mllpgate MLLP gateway.
//!
//! Provides validated bind/connect endpoints over tokio TCP sockets.
//! This is the lowest layer of mllpgate. Framing and correlation build on
//! top of the [`TcpTransport`] and [`Endpoint`] types provided here.

pub mod endpoint;
pub mod error;
pub mod tcp;

pub use endpoint::{Endpoint, ANY_HOST};
pub use error::{Result, TransportError};
pub use tcp::{connect, TcpTransport};
